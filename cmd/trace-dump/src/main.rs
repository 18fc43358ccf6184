use clap::Parser;
use workload::dag::{get_possible_results, parse_txn_trace};

/// Diagnostic tool: parses a DAG trace and prints every final key-value
/// state reachable under the oracle's topological interleavings. Useful
/// for inspecting a trace file before feeding it to a live run.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opt {
    #[arg(short = 't', long = "TRACE")]
    trace: std::path::PathBuf,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let opt = Opt::parse();
    shardkv::logging::init(&opt.log_level);

    let text = std::fs::read_to_string(&opt.trace).unwrap_or_else(|e| {
        eprintln!("failed to read trace file {}: {e}", opt.trace.display());
        std::process::exit(1);
    });
    let graph = match parse_txn_trace(&text) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("failed to parse DAG trace: {e}");
            std::process::exit(1);
        }
    };

    let outcomes = get_possible_results(&graph);
    println!("{} reachable final state(s):", outcomes.len());
    for (i, state) in outcomes.iter().enumerate() {
        let mut keys: Vec<_> = state.keys().collect();
        keys.sort();
        print!("  [{i}]");
        for key in keys {
            print!(" {key}={}", String::from_utf8_lossy(&state[key]));
        }
        println!();
    }
}
