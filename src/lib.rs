//! Doc Patcher: review-and-apply engine for suggested documentation edits
//!
//! An external pipeline proposes literal text replacements for documentation
//! files. This crate stores them as reviewable batches, locates each
//! replacement's original text unambiguously, patches the file and keeps
//! enough to undo every patch later.
//!
//! # Architecture
//!
//! All file mutation compiles down to a single primitive: [`Edit`], a
//! verified byte-span replacement. Intelligence lives in span acquisition
//! (the tiered [`Matcher`]), not in the application logic.
//!
//! - [`store`] persists batches, suggestions and applied updates
//! - [`matcher`] finds the unique span for a text fragment
//! - [`applier`] patches a file forward and records an [`AppliedUpdate`]
//! - [`reverter`] undoes applied updates
//! - [`lifecycle`] ties them together behind the suggestion state machine
//!
//! # Safety
//!
//! - Every splice verifies the expected before-text
//! - Atomic file writes (tempfile + fsync + rename)
//! - Documentation root enforcement
//! - Ambiguous matches are never applied
//!
//! # Example
//!
//! ```no_run
//! use doc_patcher::{DocsGuard, JsonStore, Matcher, UpdateLifecycle};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(JsonStore::open(".doc-patcher")?);
//! let guard = DocsGuard::new("docs", Some(".doc-patcher".as_ref()))?;
//! let lifecycle = UpdateLifecycle::new(store, guard, Matcher::default())?;
//!
//! for batch in lifecycle.get_pending_updates(None)? {
//!     let ids: Vec<String> = batch
//!         .suggestions
//!         .iter()
//!         .map(|s| s.suggestion_id.clone())
//!         .collect();
//!     let report = lifecycle.approve_suggestions(&batch.batch_id, &ids)?;
//!     println!("{} applied, {} failed", report.succeeded_count(), report.failed_count());
//! }
//! # Ok(())
//! # }
//! ```

pub mod applier;
pub mod config;
pub mod edit;
pub mod lifecycle;
pub mod locks;
pub mod matcher;
pub mod reverter;
pub mod safety;
pub mod sections;
pub mod store;
pub mod suggest;
pub mod upstream;

// Re-exports
pub use applier::{PatchApplier, PatchError};
pub use config::{load_from_path, load_from_str, ConfigError, Settings};
pub use edit::{write_atomic, Edit, EditError, EditResult, EditVerification};
pub use lifecycle::{
    AnalysisPreview, ApproveReport, ErrorKind, IngestReport, ItemFailure, LifecycleError,
    RejectReport, UpdateLifecycle,
};
pub use matcher::{MatchOutcome, MatchTier, MatchedSpan, Matcher, MatcherConfig, Span};
pub use reverter::{RevertError, RevertFailure, RevertSummary, Reverter};
pub use safety::{DocsGuard, SafetyError};
pub use sections::{DocumentSection, KeywordRetriever, SectionIndex};
pub use store::{
    AppliedUpdate, Batch, BatchStatus, ChangeType, JsonStore, Statistics, StoreError,
    Suggestion, SuggestionStatus, SuggestionStore,
};
pub use suggest::{parse_generation_response, QuarantinedSuggestion, UpdateSuggestion};
pub use upstream::{Generator, ResponseFileGenerator, Retriever, UpstreamError};
