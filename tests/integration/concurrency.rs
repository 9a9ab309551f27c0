use crate::support::{suggestion, Workspace};
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_approvals_on_one_file_lose_nothing() {
    let ws = Workspace::new();
    let doc: String = (0..8).map(|i| format!("- item-{i} is old\n")).collect();
    ws.write("list.md", &doc);

    let lifecycle = Arc::new(ws.lifecycle());
    let batch = lifecycle
        .ingest(
            "q",
            (0..8)
                .map(|i| {
                    suggestion(
                        "list.md",
                        &format!("item-{i} is old"),
                        &format!("item-{i} is new"),
                    )
                })
                .collect(),
        )
        .unwrap()
        .batch;

    let handles: Vec<_> = batch
        .suggestions
        .iter()
        .map(|s| {
            let lifecycle = Arc::clone(&lifecycle);
            let batch_id = batch.batch_id.clone();
            let id = s.suggestion_id.clone();
            thread::spawn(move || lifecycle.approve_suggestions(&batch_id, &[id]).unwrap())
        })
        .collect();
    for handle in handles {
        let report = handle.join().unwrap();
        assert_eq!(report.failed_count(), 0, "{:?}", report.failures);
    }

    let expected: String = (0..8).map(|i| format!("- item-{i} is new\n")).collect();
    assert_eq!(ws.read("list.md"), expected);
    assert_eq!(lifecycle.get_update_statistics().unwrap().applied_suggestions, 8);
}

#[test]
fn test_double_approval_applies_once() {
    let ws = Workspace::new();
    ws.write("a.md", "counter = 1\n");
    let lifecycle = Arc::new(ws.lifecycle());
    let batch = lifecycle
        .ingest("q", vec![suggestion("a.md", "counter = 1", "counter = 2")])
        .unwrap()
        .batch;
    let id = batch.suggestions[0].suggestion_id.clone();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let lifecycle = Arc::clone(&lifecycle);
            let batch_id = batch.batch_id.clone();
            let id = id.clone();
            thread::spawn(move || lifecycle.approve_suggestions(&batch_id, &[id]).unwrap())
        })
        .collect();
    let applied: usize = handles
        .into_iter()
        .map(|h| h.join().unwrap().succeeded_count())
        .sum();

    assert_eq!(applied, 1);
    assert_eq!(ws.read("a.md"), "counter = 2\n");
    assert_eq!(lifecycle.get_applied_updates().unwrap().len(), 1);
}
