//! Undo of applied updates.
//!
//! A revert relies only on the [`AppliedUpdate`] record: it finds the text
//! that was inserted and splices the removed text back. Offsets recorded at
//! application time are tried first and the matcher covers files that have
//! shifted since.

use crate::applier::{read_document, require_match, write_document, PatchError};
use crate::edit::{Edit, EditError, EditResult};
use crate::lifecycle::ErrorKind;
use crate::locks::FileLocks;
use crate::matcher::{MatchTier, MatchedSpan, Matcher};
use crate::safety::DocsGuard;
use crate::store::{AppliedUpdate, StoreError, SuggestionStore};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
#[error("failed to revert {update_id}: {source}")]
pub struct RevertError {
    pub update_id: String,
    #[source]
    pub source: PatchError,
}

impl RevertError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// One update `revert_all` could not undo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevertFailure {
    pub update_id: String,
    pub suggestion_id: String,
    pub file_path: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Aggregate result of reverting every applied update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RevertSummary {
    pub reverted_and_removed_count: usize,
    pub failed_to_revert_count: usize,
    pub details: Vec<RevertFailure>,
}

pub struct Reverter {
    store: Arc<dyn SuggestionStore>,
    guard: DocsGuard,
    locks: Arc<FileLocks>,
    matcher: Arc<Matcher>,
}

impl Reverter {
    pub fn new(
        store: Arc<dyn SuggestionStore>,
        guard: DocsGuard,
        locks: Arc<FileLocks>,
        matcher: Arc<Matcher>,
    ) -> Self {
        Self {
            store,
            guard,
            locks,
            matcher,
        }
    }

    /// Restore the text `update` replaced, then drop the record.
    ///
    /// If the inserted text cannot be found the file and the record are left
    /// untouched so the revert can be retried.
    pub fn revert(&self, update: &AppliedUpdate) -> Result<(), RevertError> {
        let wrap = |source: PatchError| RevertError {
            update_id: update.update_id.clone(),
            source,
        };
        let path = self
            .guard
            .validate_path(&update.file_path)
            .map_err(|e| wrap(e.into()))?;
        self.locks
            .with_lock(&path, || self.revert_locked(update, &path))
            .map_err(wrap)
    }

    fn revert_locked(&self, update: &AppliedUpdate, path: &Path) -> Result<(), PatchError> {
        let content = read_document(path)?;
        let located = self.locate_inserted(update, &content)?;
        debug!(
            update_id = %update.update_id,
            tier = %located.tier,
            span = %located.span,
            "located applied text"
        );

        let current = located
            .span
            .slice(&content)
            .ok_or(EditError::InvalidByteRange {
                span: located.span,
                file_len: content.len(),
            })?;
        let edit = Edit::new(
            path,
            located.span,
            &update.applied_original_content,
            current,
        );
        let restored = match edit.apply_to(&content)? {
            EditResult::Applied { content, .. } => Some(content),
            EditResult::Unchanged => None,
        };

        if let Some(restored) = &restored {
            self.guard.revalidate(path)?;
            write_document(path, restored)?;
        }

        if let Err(err) = self.store.remove_applied(&update.update_id) {
            if restored.is_some() {
                if let Err(undo) = write_document(path, &content) {
                    warn!(
                        file = %path.display(),
                        error = %undo,
                        "failed to restore file after store error"
                    );
                }
            }
            return Err(err.into());
        }

        info!(
            update_id = %update.update_id,
            suggestion_id = %update.suggestion_id,
            file = %update.file_path,
            "reverted update"
        );
        Ok(())
    }

    /// The recorded span if it still holds the inserted text, else a matcher search.
    fn locate_inserted(
        &self,
        update: &AppliedUpdate,
        content: &str,
    ) -> Result<MatchedSpan, PatchError> {
        let hint = update.inserted_span();
        if hint.slice(content) == Some(update.applied_new_content.as_str()) {
            return Ok(MatchedSpan {
                span: hint,
                tier: MatchTier::Exact,
                score: 1.0,
            });
        }
        if update.applied_new_content.is_empty() {
            // Nothing to search for: a removal is only revertible at its recorded offset.
            return Err(PatchError::MatchNotFound {
                file: update.file_path.clone(),
            });
        }
        require_match(
            self.matcher.locate(content, &update.applied_new_content),
            &update.file_path,
        )
    }

    /// Revert every stored update independently, collecting failures.
    ///
    /// Updates unwind newest first, so a patch applied on top of an earlier
    /// one is undone before the earlier one is looked for.
    pub fn revert_all(&self) -> Result<RevertSummary, StoreError> {
        let mut summary = RevertSummary::default();
        for update in self.store.get_applied()?.into_iter().rev() {
            match self.revert(&update) {
                Ok(()) => summary.reverted_and_removed_count += 1,
                Err(err) => {
                    warn!(
                        update_id = %update.update_id,
                        error = %err,
                        "revert failed; update kept"
                    );
                    summary.failed_to_revert_count += 1;
                    summary.details.push(RevertFailure {
                        update_id: update.update_id.clone(),
                        suggestion_id: update.suggestion_id.clone(),
                        file_path: update.file_path.clone(),
                        kind: err.kind(),
                        message: err.source.to_string(),
                    });
                }
            }
        }
        info!(
            reverted = summary.reverted_and_removed_count,
            failed = summary.failed_to_revert_count,
            "revert-all finished"
        );
        Ok(summary)
    }
}
