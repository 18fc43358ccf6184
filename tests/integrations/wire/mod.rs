//! Frame round-trip over a real loopback socket, including the boundary
//! payload size the length-prefix format has to get right: `u16::MAX`
//! bytes (`00 00 FF FF` as the four-byte big-endian length header).

use std::io::Write;
use std::net::{TcpListener, TcpStream};

fn round_trip(payload: Vec<u8>) -> Vec<u8> {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let writer = std::thread::spawn({
        let payload = payload.clone();
        move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            wire::send_frame(&mut stream, &payload).unwrap();
            stream.flush().unwrap();
        }
    });

    let (mut stream, _) = listener.accept().unwrap();
    let received = wire::recv_frame(&mut stream).unwrap().unwrap();
    writer.join().unwrap();
    received
}

#[test]
fn empty_payload_round_trips() {
    assert_eq!(round_trip(Vec::new()), Vec::<u8>::new());
}

#[test]
fn payload_at_u16_max_round_trips() {
    let payload = vec![0x5Au8; 65535];
    assert_eq!(round_trip(payload.clone()), payload);
}

#[test]
fn length_header_is_four_big_endian_bytes() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let payload = vec![0u8; 65535];

    let writer = std::thread::spawn({
        let payload = payload.clone();
        move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            wire::send_frame(&mut stream, &payload).unwrap();
        }
    });

    let (mut stream, _) = listener.accept().unwrap();
    let mut header = [0u8; 4];
    std::io::Read::read_exact(&mut stream, &mut header).unwrap();
    assert_eq!(header, [0x00, 0x00, 0xFF, 0xFF]);
    writer.join().unwrap();
}
