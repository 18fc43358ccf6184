//! Flat get/put trace generation for the multi-threaded client benchmark
//! driver. Grounded in `generate_traces.h`'s `TraceCmd`/`trace_init`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

pub const DEFAULT_READ_PERMILLE: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceOp {
    Get,
    Put,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceCmd {
    pub key_hash: u32,
    pub value: Vec<u8>,
    pub op: TraceOp,
}

/// Synthesizes `trace_size` commands for client thread `thread_id`, drawing
/// keys uniformly from `0..nb_keys` and choosing `Get` with probability
/// `read_permille / 1000`. `rand_start` seeds the generator so repeated runs
/// against the same parameters reproduce the same trace.
pub fn trace_init(
    thread_id: u16,
    trace_size: usize,
    nb_keys: u32,
    read_permille: u32,
    rand_start: u64,
) -> Vec<TraceCmd> {
    let nb_keys = nb_keys.max(1);
    let mut rng = StdRng::seed_from_u64(rand_start ^ ((thread_id as u64) << 32));
    (0..trace_size)
        .map(|_| {
            let key_hash = rng.gen_range(0..nb_keys);
            let is_read = rng.gen_range(0..1000) < read_permille;
            if is_read {
                TraceCmd { key_hash, value: Vec::new(), op: TraceOp::Get }
            } else {
                let value: Vec<u8> = (0..8).map(|_| rng.gen()).collect();
                TraceCmd { key_hash, value, op: TraceOp::Put }
            }
        })
        .collect()
}

/// Parses a newline-separated decimal-key line trace: every line becomes a
/// `TraceCmd` whose op is `Put` with probability `1 - read_permille/1000`,
/// else `Get`. Malformed lines are skipped rather than rejecting the whole
/// trace, matching `generate_traces.h`'s tolerant line parser.
pub fn parse_line_trace(text: &str, read_permille: u32, rand_seed: u64) -> Vec<TraceCmd> {
    let mut rng = StdRng::seed_from_u64(rand_seed);
    text.lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .map(|key_hash| {
            let is_read = rng.gen_range(0..1000) < read_permille;
            if is_read {
                TraceCmd { key_hash, value: Vec::new(), op: TraceOp::Get }
            } else {
                let value: Vec<u8> = (0..8).map(|_| rng.gen()).collect();
                TraceCmd { key_hash, value, op: TraceOp::Put }
            }
        })
        .collect()
}

/// Parses a previously generated trace back from its on-disk JSON form.
pub fn load_trace(json: &str) -> Result<Vec<TraceCmd>, serde_json::Error> {
    serde_json::from_str(json)
}

pub fn dump_trace(trace: &[TraceCmd]) -> String {
    serde_json::to_string_pretty(trace).expect("TraceCmd serializes without error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_trace_has_requested_size() {
        let trace = trace_init(0, 100, 16, DEFAULT_READ_PERMILLE, 42);
        assert_eq!(trace.len(), 100);
        assert!(trace.iter().all(|c| c.key_hash < 16));
    }

    #[test]
    fn same_seed_is_reproducible() {
        let a = trace_init(3, 20, 8, 300, 7);
        let b = trace_init(3, 20, 8, 300, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn round_trips_through_json() {
        let trace = trace_init(1, 5, 4, 500, 1);
        let json = dump_trace(&trace);
        let back = load_trace(&json).unwrap();
        assert_eq!(trace, back);
    }

    #[test]
    fn line_trace_skips_malformed_lines() {
        let trace = parse_line_trace("3\nnot-a-number\n7\n\n12", DEFAULT_READ_PERMILLE, 1);
        assert_eq!(trace.iter().map(|c| c.key_hash).collect::<Vec<_>>(), vec![3, 7, 12]);
    }

    #[test]
    fn line_trace_all_puts_when_read_permille_is_zero() {
        let trace = parse_line_trace("1\n2\n3", 0, 9);
        assert!(trace.iter().all(|c| c.op == TraceOp::Put));
    }
}
