//! DAG oracle end-to-end scenario: two sibling transactions racing to
//! overwrite the same key after a shared root both settle on exactly the
//! two topological orderings the race allows.

use workload::{get_possible_results, parse_txn_trace};

#[test]
fn sibling_writes_after_a_shared_root_yield_both_orderings() {
    let trace = r#"{
        "txns": [
            { "txn_id": 0, "cmds": [ { "op": "put", "key": 1, "value": "2" } ] },
            { "txn_id": 1, "depends_on": [0], "cmds": [ { "op": "put", "key": 1, "value": "3" } ] },
            { "txn_id": 2, "depends_on": [0], "cmds": [ { "op": "put", "key": 1, "value": "4" } ] }
        ]
    }"#;

    let graph = parse_txn_trace(trace).unwrap();
    let mut outcomes: Vec<_> = get_possible_results(&graph)
        .into_iter()
        .map(|state| state.get(&1).cloned().unwrap())
        .collect();
    outcomes.sort();

    assert_eq!(outcomes, vec![b"3".to_vec(), b"4".to_vec()]);
}
