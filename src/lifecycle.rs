//! Suggestion lifecycle orchestration.
//!
//! [`UpdateLifecycle`] is the façade the CLI talks to. It turns queries into
//! pending batches, drives approvals through the [`PatchApplier`], rejects,
//! reverts through the [`Reverter`] and reports statistics. Per-suggestion
//! failures never fail a whole call; they are returned as [`ItemFailure`]s.

use crate::applier::PatchApplier;
use crate::locks::FileLocks;
use crate::matcher::Matcher;
use crate::reverter::{RevertError, RevertSummary, Reverter};
use crate::safety::DocsGuard;
use crate::sections::DocumentSection;
use crate::store::{
    AppliedUpdate, Batch, Statistics, StoreError, SuggestionStatus, SuggestionStore,
};
use crate::suggest::{partition_valid, QuarantinedSuggestion, UpdateSuggestion};
use crate::upstream::{call_with_timeout, Generator, Retriever, UpstreamError};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Failure taxonomy reported per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No tier located the text
    MatchNotFound,
    /// A tier located the text more than once
    AmbiguousMatch,
    /// Reading, writing or resolving the file failed
    FileIo,
    /// The suggestion is not in the state the operation needs
    InvalidStateTransition,
    /// Retrieval or generation failed or timed out
    Upstream,
    /// The id is not part of the batch
    UnknownSuggestion,
    /// The update store failed
    Store,
}

impl ErrorKind {
    pub fn from_store(err: &StoreError) -> Self {
        match err {
            StoreError::StatusMismatch { .. }
            | StoreError::IllegalTransition { .. }
            | StoreError::AlreadyApplied { .. } => ErrorKind::InvalidStateTransition,
            StoreError::SuggestionNotFound(_) => ErrorKind::UnknownSuggestion,
            _ => ErrorKind::Store,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MatchNotFound => "match not found",
            ErrorKind::AmbiguousMatch => "ambiguous match",
            ErrorKind::FileIo => "file I/O",
            ErrorKind::InvalidStateTransition => "invalid state transition",
            ErrorKind::Upstream => "upstream",
            ErrorKind::UnknownSuggestion => "unknown suggestion",
            ErrorKind::Store => "store",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Revert(#[from] RevertError),

    #[error("batch not found: {0}")]
    BatchNotFound(String),

    #[error("no retriever or generator configured")]
    UpstreamNotConfigured,

    #[error("no relevant documentation sections for query '{query}'")]
    NoRelevantSections { query: String },

    #[error("no valid suggestions for query '{query}' ({quarantined} quarantined)")]
    NoSuggestions { query: String, quarantined: usize },
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Store(err) => ErrorKind::from_store(err),
            LifecycleError::Revert(err) => err.kind(),
            LifecycleError::BatchNotFound(_) => ErrorKind::UnknownSuggestion,
            LifecycleError::Upstream(_)
            | LifecycleError::UpstreamNotConfigured
            | LifecycleError::NoRelevantSections { .. }
            | LifecycleError::NoSuggestions { .. } => ErrorKind::Upstream,
        }
    }
}

/// Why one id in an approve or reject call did not go through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub suggestion_id: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Per-id outcome of a batch operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationReport<T> {
    pub succeeded: Vec<T>,
    pub failures: Vec<ItemFailure>,
}

impl<T> Default for OperationReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> OperationReport<T> {
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    fn fail(&mut self, suggestion_id: &str, kind: ErrorKind, message: impl fmt::Display) {
        self.failures.push(ItemFailure {
            suggestion_id: suggestion_id.to_string(),
            kind,
            message: message.to_string(),
        });
    }
}

/// Applied updates for the approved ids.
pub type ApproveReport = OperationReport<AppliedUpdate>;
/// Ids moved to `rejected`.
pub type RejectReport = OperationReport<String>;

/// A persisted batch plus whatever was held back at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub batch: Batch,
    pub quarantined: Vec<QuarantinedSuggestion>,
}

/// Validated suggestions for a query, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisPreview {
    pub suggestions: Vec<UpdateSuggestion>,
    pub quarantined: Vec<QuarantinedSuggestion>,
}

/// Ids in first-seen order, duplicates dropped.
fn dedup_ids(ids: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect()
}

pub struct UpdateLifecycle {
    store: Arc<dyn SuggestionStore>,
    applier: PatchApplier,
    reverter: Reverter,
    retriever: Option<Arc<dyn Retriever>>,
    generator: Option<Arc<dyn Generator>>,
    upstream_timeout: Option<Duration>,
    max_sections: usize,
}

impl UpdateLifecycle {
    /// Wire the components together and recover interrupted approvals.
    pub fn new(
        store: Arc<dyn SuggestionStore>,
        guard: DocsGuard,
        matcher: Matcher,
    ) -> Result<Self, LifecycleError> {
        let locks = Arc::new(FileLocks::new());
        let matcher = Arc::new(matcher);
        let lifecycle = Self {
            applier: PatchApplier::new(
                Arc::clone(&store),
                guard.clone(),
                Arc::clone(&locks),
                Arc::clone(&matcher),
            ),
            reverter: Reverter::new(Arc::clone(&store), guard, locks, matcher),
            store,
            retriever: None,
            generator: None,
            upstream_timeout: None,
            max_sections: crate::config::DEFAULT_MAX_SECTIONS,
        };
        lifecycle.recover_interrupted()?;
        Ok(lifecycle)
    }

    pub fn with_upstream(
        mut self,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        self.retriever = Some(retriever);
        self.generator = Some(generator);
        self
    }

    pub fn with_upstream_limits(mut self, timeout: Option<Duration>, max_sections: usize) -> Self {
        self.upstream_timeout = timeout;
        self.max_sections = max_sections;
        self
    }

    /// Return suggestions stranded in `approved` by a crash to `pending`.
    ///
    /// Applied updates always carry an `applied` suggestion, so an
    /// `approved` one never had its file write recorded.
    pub fn recover_interrupted(&self) -> Result<usize, StoreError> {
        let mut recovered = 0;
        for batch in self.store.batches()? {
            for suggestion in &batch.suggestions {
                if suggestion.status != SuggestionStatus::Approved {
                    continue;
                }
                self.store.transition_suggestion(
                    &suggestion.suggestion_id,
                    SuggestionStatus::Approved,
                    SuggestionStatus::Pending,
                )?;
                warn!(
                    suggestion_id = %suggestion.suggestion_id,
                    "reset interrupted approval to pending"
                );
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    /// Retrieve sections for `query`, generate suggestions and save them as
    /// a pending batch.
    ///
    /// Nothing is persisted if either collaborator fails or times out.
    pub fn analyze_and_save(&self, query: &str) -> Result<IngestReport, LifecycleError> {
        let suggestions = self.generate(query)?;
        self.ingest(query, suggestions)
    }

    /// Run retrieval, generation and validation without creating a batch.
    pub fn analyze(&self, query: &str) -> Result<AnalysisPreview, LifecycleError> {
        let (suggestions, quarantined) = partition_valid(self.generate(query)?);
        Ok(AnalysisPreview {
            suggestions,
            quarantined,
        })
    }

    fn generate(&self, query: &str) -> Result<Vec<UpdateSuggestion>, LifecycleError> {
        let (Some(retriever), Some(generator)) = (&self.retriever, &self.generator) else {
            return Err(LifecycleError::UpstreamNotConfigured);
        };

        let retriever = Arc::clone(retriever);
        let owned_query = query.to_string();
        let mut sections: Vec<DocumentSection> =
            call_with_timeout("retrieval", self.upstream_timeout, move || {
                retriever.search(&owned_query)
            })?;
        sections.truncate(self.max_sections);
        if sections.is_empty() {
            return Err(LifecycleError::NoRelevantSections {
                query: query.to_string(),
            });
        }
        info!(query, sections = sections.len(), "retrieved sections");

        let generator = Arc::clone(generator);
        let owned_query = query.to_string();
        Ok(call_with_timeout("generation", self.upstream_timeout, move || {
            generator.generate(&owned_query, &sections)
        })?)
    }

    /// Validate `suggestions` and persist the valid ones as one pending batch.
    pub fn ingest(
        &self,
        query: &str,
        suggestions: Vec<UpdateSuggestion>,
    ) -> Result<IngestReport, LifecycleError> {
        let (valid, quarantined) = partition_valid(suggestions);
        for q in &quarantined {
            warn!(
                index = q.index,
                section_id = %q.section_id,
                issues = %q.issues.join("; "),
                "quarantined suggestion"
            );
        }
        if valid.is_empty() {
            return Err(LifecycleError::NoSuggestions {
                query: query.to_string(),
                quarantined: quarantined.len(),
            });
        }

        let batch = self.store.create_batch(query, valid)?;
        Ok(IngestReport { batch, quarantined })
    }

    /// Pending batches, optionally narrowed to one.
    pub fn get_pending_updates(&self, batch_id: Option<&str>) -> Result<Vec<Batch>, LifecycleError> {
        let mut pending = self.store.get_pending()?;
        if let Some(batch_id) = batch_id {
            pending.retain(|b| b.batch_id == batch_id);
        }
        Ok(pending)
    }

    fn require_batch(&self, batch_id: &str) -> Result<Batch, LifecycleError> {
        self.store
            .get_batch(batch_id)?
            .ok_or_else(|| LifecycleError::BatchNotFound(batch_id.to_string()))
    }

    /// Apply each pending suggestion in `ids`, reporting per id.
    ///
    /// A suggestion is claimed (`pending -> approved`) before its file is
    /// touched; if applying fails it goes back to `pending`.
    pub fn approve_suggestions(
        &self,
        batch_id: &str,
        ids: &[String],
    ) -> Result<ApproveReport, LifecycleError> {
        let batch = self.require_batch(batch_id)?;
        let mut report = ApproveReport::default();

        for id in dedup_ids(ids) {
            let Some(suggestion) = batch.suggestion(id) else {
                report.fail(
                    id,
                    ErrorKind::UnknownSuggestion,
                    format!("not part of batch {batch_id}"),
                );
                continue;
            };

            if let Err(err) = self.store.transition_suggestion(
                id,
                SuggestionStatus::Pending,
                SuggestionStatus::Approved,
            ) {
                report.fail(id, ErrorKind::from_store(&err), err);
                continue;
            }

            match self.applier.apply(batch_id, suggestion) {
                Ok(update) => report.succeeded.push(update),
                Err(err) => {
                    warn!(suggestion_id = id, error = %err, "apply failed");
                    if let Err(reset) = self.store.transition_suggestion(
                        id,
                        SuggestionStatus::Approved,
                        SuggestionStatus::Pending,
                    ) {
                        warn!(suggestion_id = id, error = %reset, "failed to release claim");
                    }
                    report.fail(id, err.kind(), err);
                }
            }
        }

        info!(
            batch_id,
            applied = report.succeeded_count(),
            failed = report.failed_count(),
            "approve finished"
        );
        Ok(report)
    }

    /// Reject each pending suggestion in `ids`. Files are never touched.
    pub fn reject_suggestions(
        &self,
        batch_id: &str,
        ids: &[String],
    ) -> Result<RejectReport, LifecycleError> {
        let batch = self.require_batch(batch_id)?;
        let mut report = RejectReport::default();

        for id in dedup_ids(ids) {
            if batch.suggestion(id).is_none() {
                report.fail(
                    id,
                    ErrorKind::UnknownSuggestion,
                    format!("not part of batch {batch_id}"),
                );
                continue;
            }
            match self.store.transition_suggestion(
                id,
                SuggestionStatus::Pending,
                SuggestionStatus::Rejected,
            ) {
                Ok(()) => report.succeeded.push(id.to_string()),
                Err(err) => report.fail(id, ErrorKind::from_store(&err), err),
            }
        }

        info!(
            batch_id,
            rejected = report.succeeded_count(),
            failed = report.failed_count(),
            "reject finished"
        );
        Ok(report)
    }

    pub fn revert_all_updates(&self) -> Result<RevertSummary, LifecycleError> {
        Ok(self.reverter.revert_all()?)
    }

    /// Revert a single applied update and return its record.
    pub fn revert_update(&self, update_id: &str) -> Result<AppliedUpdate, LifecycleError> {
        let update = self
            .store
            .get_applied()?
            .into_iter()
            .find(|u| u.update_id == update_id)
            .ok_or_else(|| StoreError::UpdateNotFound(update_id.to_string()))?;
        self.reverter.revert(&update)?;
        Ok(update)
    }

    pub fn get_applied_updates(&self) -> Result<Vec<AppliedUpdate>, LifecycleError> {
        Ok(self.store.get_applied()?)
    }

    pub fn get_update_statistics(&self) -> Result<Statistics, LifecycleError> {
        Ok(self.store.statistics()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChangeType, JsonStore};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    struct Fixture {
        _dir: tempfile::TempDir,
        docs: PathBuf,
        store_dir: PathBuf,
        lifecycle: UpdateLifecycle,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        let store_dir = dir.path().join("store");
        let lifecycle = open(&docs, &store_dir);
        Fixture {
            _dir: dir,
            docs,
            store_dir,
            lifecycle,
        }
    }

    fn open(docs: &std::path::Path, store_dir: &std::path::Path) -> UpdateLifecycle {
        let store = Arc::new(JsonStore::open(store_dir).unwrap());
        let guard = DocsGuard::new(docs, Some(store_dir)).unwrap();
        UpdateLifecycle::new(store, guard, Matcher::default()).unwrap()
    }

    fn suggestion(file: &str, original: &str, suggested: &str) -> UpdateSuggestion {
        UpdateSuggestion {
            section_id: "sec".to_string(),
            section_title: "Section".to_string(),
            file_path: file.to_string(),
            original_content: original.to_string(),
            suggested_content: suggested.to_string(),
            change_type: ChangeType::Modification,
            confidence_score: 0.9,
            reasoning: "r".to_string(),
        }
    }

    fn ids(batch: &Batch) -> Vec<String> {
        batch
            .suggestions
            .iter()
            .map(|s| s.suggestion_id.clone())
            .collect()
    }

    #[test]
    fn test_ingest_quarantines_invalid() {
        let fx = fixture();
        let report = fx
            .lifecycle
            .ingest(
                "q",
                vec![suggestion("a.md", "x", "y"), suggestion("a.md", "", "y")],
            )
            .unwrap();
        assert_eq!(report.batch.suggestions.len(), 1);
        assert_eq!(report.quarantined.len(), 1);

        let none = fx.lifecycle.ingest("q", vec![suggestion("a.md", "x", "x")]);
        assert!(matches!(
            none,
            Err(LifecycleError::NoSuggestions { quarantined: 1, .. })
        ));
    }

    #[test]
    fn test_approve_reports_per_id() {
        let fx = fixture();
        fs::write(fx.docs.join("a.md"), "alpha beta\n").unwrap();
        let batch = fx
            .lifecycle
            .ingest(
                "q",
                vec![
                    suggestion("a.md", "alpha", "ALPHA"),
                    suggestion("a.md", "gamma delta epsilon", "zeta"),
                ],
            )
            .unwrap()
            .batch;

        let mut wanted = ids(&batch);
        wanted.push("nope".to_string());
        wanted.push(wanted[0].clone());

        let report = fx.lifecycle.approve_suggestions(&batch.batch_id, &wanted).unwrap();
        assert_eq!(report.succeeded_count(), 1);
        let kinds: Vec<ErrorKind> = report.failures.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![ErrorKind::MatchNotFound, ErrorKind::UnknownSuggestion]
        );

        let stats = fx.lifecycle.get_update_statistics().unwrap();
        assert_eq!(stats.applied_suggestions, 1);
        assert_eq!(stats.pending_suggestions, 1);
        assert_eq!(stats.approved_suggestions, 0);
    }

    #[test]
    fn test_approve_applied_is_invalid_transition() {
        let fx = fixture();
        fs::write(fx.docs.join("a.md"), "alpha\n").unwrap();
        let batch = fx
            .lifecycle
            .ingest("q", vec![suggestion("a.md", "alpha", "beta")])
            .unwrap()
            .batch;

        fx.lifecycle.approve_suggestions(&batch.batch_id, &ids(&batch)).unwrap();
        let again = fx.lifecycle.approve_suggestions(&batch.batch_id, &ids(&batch)).unwrap();
        assert_eq!(again.failures[0].kind, ErrorKind::InvalidStateTransition);
        assert_eq!(fs::read_to_string(fx.docs.join("a.md")).unwrap(), "beta\n");
    }

    #[test]
    fn test_reject_twice() {
        let fx = fixture();
        let batch = fx
            .lifecycle
            .ingest("q", vec![suggestion("a.md", "alpha", "beta")])
            .unwrap()
            .batch;

        let first = fx.lifecycle.reject_suggestions(&batch.batch_id, &ids(&batch)).unwrap();
        assert_eq!(first.succeeded, ids(&batch));
        let second = fx.lifecycle.reject_suggestions(&batch.batch_id, &ids(&batch)).unwrap();
        assert_eq!(second.failures[0].kind, ErrorKind::InvalidStateTransition);
        assert!(fx.lifecycle.get_pending_updates(None).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_batch() {
        let fx = fixture();
        let result = fx.lifecycle.approve_suggestions("batch_missing", &[]);
        assert!(matches!(result, Err(LifecycleError::BatchNotFound(_))));
    }

    #[test]
    fn test_recovery_resets_stranded_approvals() {
        let fx = fixture();
        let batch = fx
            .lifecycle
            .ingest("q", vec![suggestion("a.md", "alpha", "beta")])
            .unwrap()
            .batch;
        let store = JsonStore::open(&fx.store_dir).unwrap();
        store
            .transition_suggestion(
                &batch.suggestions[0].suggestion_id,
                SuggestionStatus::Pending,
                SuggestionStatus::Approved,
            )
            .unwrap();

        let reopened = open(&fx.docs, &fx.store_dir);
        let stats = reopened.get_update_statistics().unwrap();
        assert_eq!(stats.pending_suggestions, 1);
        assert_eq!(stats.approved_suggestions, 0);
    }

    #[test]
    fn test_revert_update_single() {
        let fx = fixture();
        fs::write(fx.docs.join("a.md"), "alpha\n").unwrap();
        let batch = fx
            .lifecycle
            .ingest("q", vec![suggestion("a.md", "alpha", "beta")])
            .unwrap()
            .batch;
        let report = fx.lifecycle.approve_suggestions(&batch.batch_id, &ids(&batch)).unwrap();
        let update_id = &report.succeeded[0].update_id;

        fx.lifecycle.revert_update(update_id).unwrap();
        assert_eq!(fs::read_to_string(fx.docs.join("a.md")).unwrap(), "alpha\n");
        assert_eq!(fx.lifecycle.get_pending_updates(None).unwrap().len(), 1);

        let missing = fx.lifecycle.revert_update(update_id).unwrap_err();
        assert!(matches!(
            missing,
            LifecycleError::Store(StoreError::UpdateNotFound(_))
        ));
    }

    struct FixedRetriever(Vec<DocumentSection>);

    impl Retriever for FixedRetriever {
        fn search(&self, _query: &str) -> Result<Vec<DocumentSection>, UpstreamError> {
            Ok(self.0.clone())
        }
    }

    struct EchoGenerator {
        called: AtomicBool,
    }

    impl Generator for EchoGenerator {
        fn generate(
            &self,
            _query: &str,
            sections: &[DocumentSection],
        ) -> Result<Vec<UpdateSuggestion>, UpstreamError> {
            self.called.store(true, Ordering::SeqCst);
            Ok(sections
                .iter()
                .map(|s| suggestion(&s.file_path, &s.content, "rewritten"))
                .collect())
        }
    }

    fn section(id: &str) -> DocumentSection {
        DocumentSection {
            id: id.to_string(),
            title: id.to_string(),
            content: format!("body of {id}"),
            file_path: format!("{id}.md"),
            section_type: "h1".to_string(),
            parent_section: None,
        }
    }

    #[test]
    fn test_analyze_and_save_limits_sections() {
        let fx = fixture();
        let generator = Arc::new(EchoGenerator {
            called: AtomicBool::new(false),
        });
        let lifecycle = fx
            .lifecycle
            .with_upstream(
                Arc::new(FixedRetriever(vec![section("a"), section("b"), section("c")])),
                generator.clone(),
            )
            .with_upstream_limits(None, 2);

        let report = lifecycle.analyze_and_save("rewrite").unwrap();
        assert_eq!(report.batch.suggestions.len(), 2);
        assert_eq!(report.batch.query, "rewrite");
        assert!(generator.called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_analyze_without_sections_skips_generation() {
        let fx = fixture();
        let generator = Arc::new(EchoGenerator {
            called: AtomicBool::new(false),
        });
        let lifecycle = fx
            .lifecycle
            .with_upstream(Arc::new(FixedRetriever(Vec::new())), generator.clone());

        let result = lifecycle.analyze_and_save("anything");
        assert!(matches!(
            result,
            Err(LifecycleError::NoRelevantSections { .. })
        ));
        assert!(!generator.called.load(Ordering::SeqCst));
        assert!(lifecycle.get_pending_updates(None).unwrap().is_empty());
    }

    #[test]
    fn test_analyze_without_upstream() {
        let fx = fixture();
        assert!(matches!(
            fx.lifecycle.analyze_and_save("q"),
            Err(LifecycleError::UpstreamNotConfigured)
        ));
    }

    struct SlowGenerator(Duration);

    impl Generator for SlowGenerator {
        fn generate(
            &self,
            _query: &str,
            sections: &[DocumentSection],
        ) -> Result<Vec<UpdateSuggestion>, UpstreamError> {
            thread::sleep(self.0);
            Ok(sections
                .iter()
                .map(|s| suggestion(&s.file_path, &s.content, "late"))
                .collect())
        }
    }

    #[test]
    fn test_generation_timeout_persists_nothing() {
        let fx = fixture();
        let lifecycle = fx
            .lifecycle
            .with_upstream(
                Arc::new(FixedRetriever(vec![section("a")])),
                Arc::new(SlowGenerator(Duration::from_secs(2))),
            )
            .with_upstream_limits(Some(Duration::from_millis(50)), 5);

        let result = lifecycle.analyze_and_save("rewrite");
        assert!(matches!(
            result,
            Err(LifecycleError::Upstream(UpstreamError::Timeout {
                stage: "generation",
                ..
            }))
        ));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Upstream);
        assert!(lifecycle.get_pending_updates(None).unwrap().is_empty());
        assert_eq!(lifecycle.get_update_statistics().unwrap().total_batches, 0);
    }

    #[test]
    fn test_analyze_preview_does_not_persist() {
        let fx = fixture();
        let mut bad = section("b");
        bad.content = String::new();
        let lifecycle = fx.lifecycle.with_upstream(
            Arc::new(FixedRetriever(vec![section("a"), bad])),
            Arc::new(EchoGenerator {
                called: AtomicBool::new(false),
            }),
        );

        let preview = lifecycle.analyze("rewrite").unwrap();
        assert_eq!(preview.suggestions.len(), 1);
        assert_eq!(preview.suggestions[0].original_content, "body of a");
        assert_eq!(preview.quarantined.len(), 1);
        assert_eq!(preview.quarantined[0].index, 1);
        assert!(lifecycle.get_pending_updates(None).unwrap().is_empty());
    }
}
