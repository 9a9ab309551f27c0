use crate::support::{ids, suggestion, Workspace};
use proptest::prelude::*;

fn apply_then_revert(ws: &Workspace, file: &str, original: &str, suggested: &str) -> String {
    let lifecycle = ws.lifecycle();
    let batch = lifecycle
        .ingest("round trip", vec![suggestion(file, original, suggested)])
        .unwrap()
        .batch;
    let report = lifecycle
        .approve_suggestions(&batch.batch_id, &ids(&batch))
        .unwrap();
    assert_eq!(report.failed_count(), 0, "{:?}", report.failures);

    let summary = lifecycle.revert_all_updates().unwrap();
    assert_eq!(summary.reverted_and_removed_count, 1);
    assert!(lifecycle.get_applied_updates().unwrap().is_empty());
    ws.read(file)
}

#[test]
fn test_round_trip_normalized_match_restores_bytes() {
    let ws = Workspace::new();
    let doc = "# Runner\r\n\r\nThe runner   loops until\r\n  a final output is produced.\r\n";
    ws.write("runner.md", doc);

    let restored = apply_then_revert(
        &ws,
        "runner.md",
        "The runner loops until a final output is produced.",
        "The runner loops until the agent returns a final output.",
    );
    assert_eq!(restored, doc);
}

#[test]
fn test_round_trip_with_unicode() {
    let ws = Workspace::new();
    let doc = "Caf\u{e9} r\u{e9}sum\u{e9}: \u{201c}na\u{ef}ve\u{201d} approach \u{2192} fine.\n";
    ws.write("u.md", doc);

    let restored = apply_then_revert(&ws, "u.md", "\u{201c}na\u{ef}ve\u{201d} approach", "careful approach");
    assert_eq!(restored, doc);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_apply_then_revert_is_identity(
        prefix in "[a-z .\n]{0,120}",
        suffix in "[a-z .\n]{0,120}",
        marker in 0u32..10_000,
        suggested in "[A-Za-z ]{0,40}",
    ) {
        let ws = Workspace::new();
        // Uppercase plus digits never occurs in the lowercase filler.
        let original = format!("MARKER{marker} TEXT");
        let doc = format!("{prefix}{original}{suffix}");
        ws.write("doc.md", &doc);

        let lifecycle = ws.lifecycle();
        let batch = lifecycle
            .ingest("prop", vec![suggestion("doc.md", &original, &suggested)])
            .unwrap()
            .batch;
        let report = lifecycle
            .approve_suggestions(&batch.batch_id, &ids(&batch))
            .unwrap();
        prop_assert_eq!(report.failed_count(), 0);
        prop_assert_eq!(ws.read("doc.md"), format!("{prefix}{suggested}{suffix}"));

        let summary = lifecycle.revert_all_updates().unwrap();
        prop_assert_eq!(summary.reverted_and_removed_count, 1);
        prop_assert_eq!(ws.read("doc.md"), doc);
    }
}
