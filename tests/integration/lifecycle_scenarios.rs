use crate::support::{ids, suggestion, Workspace};
use doc_patcher::{ErrorKind, MatchTier, SuggestionStatus};

#[test]
fn test_partial_batch_apply() {
    let ws = Workspace::new();
    ws.write("install.md", "# Install\nRun pip install agents.\n");
    ws.write("tools.md", "# Tools\nTools are plain functions.\n");
    ws.write("handoffs.md", "# Handoffs\nAgents hand off to agents.\n");
    let lifecycle = ws.lifecycle();

    let batch = lifecycle
        .ingest(
            "modernize docs",
            vec![
                suggestion("install.md", "pip install agents", "uv add agents"),
                suggestion("tools.md", "Tools are decorated coroutines.", "Tools are async."),
                suggestion("handoffs.md", "hand off to agents", "delegate to agents"),
            ],
        )
        .unwrap()
        .batch;

    let report = lifecycle
        .approve_suggestions(&batch.batch_id, &ids(&batch))
        .unwrap();

    assert_eq!(report.succeeded_count(), 2);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.failures[0].suggestion_id, batch.suggestions[1].suggestion_id);
    assert_eq!(report.failures[0].kind, ErrorKind::MatchNotFound);

    assert_eq!(ws.read("install.md"), "# Install\nRun uv add agents.\n");
    assert_eq!(ws.read("tools.md"), "# Tools\nTools are plain functions.\n");
    assert_eq!(ws.read("handoffs.md"), "# Handoffs\nAgents delegate to agents.\n");

    let pending = lifecycle.get_pending_updates(Some(&batch.batch_id)).unwrap();
    assert_eq!(pending[0].suggestions.len(), 1);
    assert_eq!(pending[0].suggestions[0].status, SuggestionStatus::Pending);

    let stats = lifecycle.get_update_statistics().unwrap();
    assert_eq!(stats.applied_suggestions, 2);
    assert_eq!(stats.pending_suggestions, 1);
    assert_eq!(stats.pending_batches, 1);
    assert_eq!(stats.applied_batches, 1);
}

#[test]
fn test_revert_all_aggregate() {
    let ws = Workspace::new();
    ws.write("a.md", "Configure the client with a key.\n");
    ws.write("b.md", "Streaming is disabled by default.\n");
    let lifecycle = ws.lifecycle();

    let batch = lifecycle
        .ingest(
            "q",
            vec![
                suggestion("a.md", "with a key", "with an API key"),
                suggestion("b.md", "disabled by default", "enabled by default"),
            ],
        )
        .unwrap()
        .batch;
    let report = lifecycle
        .approve_suggestions(&batch.batch_id, &ids(&batch))
        .unwrap();
    assert_eq!(report.succeeded_count(), 2);

    // A human rewrites b.md afterwards.
    ws.write("b.md", "This page moved to the streaming guide.\n");

    let summary = lifecycle.revert_all_updates().unwrap();
    assert_eq!(summary.reverted_and_removed_count, 1);
    assert_eq!(summary.failed_to_revert_count, 1);
    assert_eq!(summary.details[0].kind, ErrorKind::MatchNotFound);

    assert_eq!(ws.read("a.md"), "Configure the client with a key.\n");
    let remaining = lifecycle.get_applied_updates().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].file_path, "b.md");

    let stats = lifecycle.get_update_statistics().unwrap();
    assert_eq!(stats.pending_suggestions, 1);
    assert_eq!(stats.applied_suggestions, 1);
}

#[test]
fn test_reject_is_idempotent_noop() {
    let ws = Workspace::new();
    ws.write("a.md", "Old text.\n");
    let lifecycle = ws.lifecycle();
    let batch = lifecycle
        .ingest("q", vec![suggestion("a.md", "Old text.", "New text.")])
        .unwrap()
        .batch;

    let first = lifecycle
        .reject_suggestions(&batch.batch_id, &ids(&batch))
        .unwrap();
    assert_eq!(first.succeeded_count(), 1);

    let second = lifecycle
        .reject_suggestions(&batch.batch_id, &ids(&batch))
        .unwrap();
    assert_eq!(second.succeeded_count(), 0);
    assert_eq!(second.failures[0].kind, ErrorKind::InvalidStateTransition);

    // Rejected is terminal for approval too, and files are untouched.
    let approve = lifecycle
        .approve_suggestions(&batch.batch_id, &ids(&batch))
        .unwrap();
    assert_eq!(approve.failures[0].kind, ErrorKind::InvalidStateTransition);
    assert_eq!(ws.read("a.md"), "Old text.\n");
    assert_eq!(lifecycle.get_update_statistics().unwrap().rejected_suggestions, 1);
}

#[test]
fn test_ambiguity_is_a_hard_stop() {
    let ws = Workspace::new();
    let doc = "Set OPENAI_API_KEY first.\n\nLater: Set OPENAI_API_KEY first.\n";
    ws.write("a.md", doc);
    let lifecycle = ws.lifecycle();
    let batch = lifecycle
        .ingest(
            "q",
            vec![suggestion("a.md", "Set OPENAI_API_KEY first.", "Export OPENAI_API_KEY.")],
        )
        .unwrap()
        .batch;

    let report = lifecycle
        .approve_suggestions(&batch.batch_id, &ids(&batch))
        .unwrap();
    assert_eq!(report.failures[0].kind, ErrorKind::AmbiguousMatch);
    assert_eq!(ws.read("a.md"), doc);
    assert_eq!(lifecycle.get_update_statistics().unwrap().pending_suggestions, 1);
}

#[test]
fn test_exact_precedes_fuzzy() {
    let ws = Workspace::new();
    // The second line is a close variant; the verbatim first line must win.
    ws.write(
        "a.md",
        "Install the package with pip.\nInstall the packages with pip!\n",
    );
    let lifecycle = ws.lifecycle();
    let batch = lifecycle
        .ingest(
            "q",
            vec![suggestion("a.md", "Install the package with pip.", "Install it with uv.")],
        )
        .unwrap()
        .batch;

    let report = lifecycle
        .approve_suggestions(&batch.batch_id, &ids(&batch))
        .unwrap();
    assert_eq!(report.succeeded[0].match_tier, MatchTier::Exact);
    assert_eq!(
        ws.read("a.md"),
        "Install it with uv.\nInstall the packages with pip!\n"
    );
}

#[test]
fn test_fuzzy_apply_records_located_text() {
    let ws = Workspace::new();
    ws.write(
        "a.md",
        "# Agents\n\nUse the \u{201c}default\u{201d} agent for\nsimple tasks.\n",
    );
    let lifecycle = ws.lifecycle();
    let batch = lifecycle
        .ingest(
            "q",
            vec![suggestion(
                "a.md",
                "Use the \"default\" agent for simple tasks.",
                "Use the triage agent for simple tasks.",
            )],
        )
        .unwrap()
        .batch;

    let report = lifecycle
        .approve_suggestions(&batch.batch_id, &ids(&batch))
        .unwrap();
    let update = &report.succeeded[0];
    assert_eq!(update.match_tier, MatchTier::Fuzzy);
    assert_eq!(
        update.applied_original_content,
        "Use the \u{201c}default\u{201d} agent for\nsimple tasks."
    );

    lifecycle.revert_update(&update.update_id).unwrap();
    assert_eq!(
        ws.read("a.md"),
        "# Agents\n\nUse the \u{201c}default\u{201d} agent for\nsimple tasks.\n"
    );
}

#[test]
fn test_paths_outside_docs_are_file_io() {
    let ws = Workspace::new();
    let lifecycle = ws.lifecycle();
    let batch = lifecycle
        .ingest(
            "q",
            vec![suggestion("../store/updates.json", "batches", "hacked")],
        )
        .unwrap()
        .batch;

    let report = lifecycle
        .approve_suggestions(&batch.batch_id, &ids(&batch))
        .unwrap();
    assert_eq!(report.failures[0].kind, ErrorKind::FileIo);
    assert_eq!(lifecycle.get_update_statistics().unwrap().pending_suggestions, 1);
}

#[test]
fn test_state_survives_reopen() {
    let ws = Workspace::new();
    ws.write("a.md", "alpha\n");
    let batch = {
        let lifecycle = ws.lifecycle();
        let batch = lifecycle
            .ingest("q", vec![suggestion("a.md", "alpha", "beta")])
            .unwrap()
            .batch;
        lifecycle
            .approve_suggestions(&batch.batch_id, &ids(&batch))
            .unwrap();
        batch
    };

    let reopened = ws.lifecycle();
    let applied = reopened.get_applied_updates().unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].batch_id, batch.batch_id);

    let summary = reopened.revert_all_updates().unwrap();
    assert_eq!(summary.reverted_and_removed_count, 1);
    assert_eq!(ws.read("a.md"), "alpha\n");
}

#[test]
fn test_revert_all_unwinds_stacked_updates() {
    let ws = Workspace::new();
    let doc = "Intro.\nalpha beta gamma\nOutro.\n";
    ws.write("a.md", doc);
    let lifecycle = ws.lifecycle();

    // The second patch rewrites text that contains the first patch's output.
    let batch = lifecycle
        .ingest(
            "q",
            vec![
                suggestion("a.md", "beta", "BETA"),
                suggestion("a.md", "alpha BETA gamma", "delta epsilon"),
            ],
        )
        .unwrap()
        .batch;
    let report = lifecycle
        .approve_suggestions(&batch.batch_id, &ids(&batch))
        .unwrap();
    assert_eq!(report.succeeded_count(), 2, "{:?}", report.failures);
    assert_eq!(ws.read("a.md"), "Intro.\ndelta epsilon\nOutro.\n");

    let summary = lifecycle.revert_all_updates().unwrap();
    assert_eq!(summary.reverted_and_removed_count, 2);
    assert_eq!(summary.failed_to_revert_count, 0);
    assert_eq!(ws.read("a.md"), doc);
    assert!(lifecycle.get_applied_updates().unwrap().is_empty());
    assert_eq!(lifecycle.get_update_statistics().unwrap().pending_suggestions, 2);
}
