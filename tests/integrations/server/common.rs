use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;

use shardkv::master::{self, MasterState};
use shardkv::server::ShardServer;

pub struct RunningMaster {
    pub addr: SocketAddr,
}

pub struct RunningShard {
    pub addr: SocketAddr,
}

fn loopback_listener() -> TcpListener {
    TcpListener::bind((IpAddr::V4(Ipv4Addr::LOCALHOST), 0)).unwrap()
}

pub fn new_master() -> RunningMaster {
    let listener = loopback_listener();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(MasterState::new());
    let queue = master::new_queue();

    {
        let state = state.clone();
        let queue = queue.clone();
        thread::spawn(move || master::dispatch_loop(state, queue));
    }
    thread::spawn(move || master::listen(listener, queue));

    RunningMaster { addr }
}

pub fn new_shard(master_addr: SocketAddr) -> RunningShard {
    let listener = loopback_listener();
    let addr = listener.local_addr().unwrap();
    let server = ShardServer::new(master_addr);
    server.register(addr.port()).unwrap();
    thread::spawn(move || server.serve(listener, 2).unwrap());
    // give the master a moment to process the INIT before the caller routes.
    std::thread::sleep(std::time::Duration::from_millis(50));
    RunningShard { addr }
}
