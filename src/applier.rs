//! Forward patching of documentation files.
//!
//! The applier is the only code path that writes a suggestion's text into a
//! documentation file. Each application is: resolve the path, take the
//! file's lock, locate the original text, splice, write atomically, record.

use crate::edit::{write_atomic, Edit, EditError, EditResult};
use crate::lifecycle::ErrorKind;
use crate::locks::FileLocks;
use crate::matcher::{MatchOutcome, MatchTier, MatchedSpan, Matcher};
use crate::safety::{DocsGuard, SafetyError};
use crate::store::{AppliedUpdate, StoreError, Suggestion, SuggestionStore};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("original text not found in {file}")]
    MatchNotFound { file: String },

    #[error("original text is ambiguous in {file}: {count} {tier} matches")]
    AmbiguousMatch {
        file: String,
        tier: MatchTier,
        count: usize,
    },

    #[error("failed to {action} {path}: {source}")]
    FileIo {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Safety(#[from] SafetyError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PatchError::MatchNotFound { .. } | PatchError::Edit(_) => ErrorKind::MatchNotFound,
            PatchError::AmbiguousMatch { .. } => ErrorKind::AmbiguousMatch,
            PatchError::FileIo { .. } | PatchError::Safety(_) => ErrorKind::FileIo,
            PatchError::Store(err) => ErrorKind::from_store(err),
        }
    }
}

pub(crate) fn read_document(path: &Path) -> Result<String, PatchError> {
    fs::read_to_string(path).map_err(|source| PatchError::FileIo {
        action: "read",
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn write_document(path: &Path, content: &str) -> Result<(), PatchError> {
    write_atomic(path, content.as_bytes()).map_err(|source| PatchError::FileIo {
        action: "write",
        path: path.to_path_buf(),
        source,
    })
}

/// Turn a matcher outcome into a span or the matching error.
pub(crate) fn require_match(outcome: MatchOutcome, file: &str) -> Result<MatchedSpan, PatchError> {
    match outcome {
        MatchOutcome::Found(matched) => Ok(matched),
        MatchOutcome::NotFound => Err(PatchError::MatchNotFound {
            file: file.to_string(),
        }),
        MatchOutcome::Ambiguous { tier, count } => Err(PatchError::AmbiguousMatch {
            file: file.to_string(),
            tier,
            count,
        }),
    }
}

/// Splices approved suggestions into their files and records the result.
pub struct PatchApplier {
    store: Arc<dyn SuggestionStore>,
    guard: DocsGuard,
    locks: Arc<FileLocks>,
    matcher: Arc<Matcher>,
}

impl PatchApplier {
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

    /// Apply `suggestion` (already claimed as `approved`) from `batch_id`.
    ///
    /// On success the file holds the suggested text and the returned
    /// [`AppliedUpdate`] is persisted with the suggestion marked applied. On
    /// any error the file is left as it was.
    pub fn apply(&self, batch_id: &str, suggestion: &Suggestion) -> Result<AppliedUpdate, PatchError> {
        let path = self.guard.validate_path(&suggestion.file_path)?;
        self.locks
            .with_lock(&path, || self.apply_locked(batch_id, suggestion, &path))
    }

    fn apply_locked(
        &self,
        batch_id: &str,
        suggestion: &Suggestion,
        path: &Path,
    ) -> Result<AppliedUpdate, PatchError> {
        let content = read_document(path)?;
        let matched = require_match(
            self.matcher.locate(&content, &suggestion.original_content),
            &suggestion.file_path,
        )?;
        debug!(
            suggestion_id = %suggestion.suggestion_id,
            tier = %matched.tier,
            score = matched.score,
            span = %matched.span,
            "located original text"
        );

        let removed = matched
            .span
            .slice(&content)
            .ok_or(EditError::InvalidByteRange {
                span: matched.span,
                file_len: content.len(),
            })?
            .to_string();

        let edit = Edit::new(path, matched.span, &suggestion.suggested_content, &removed);
        let patched = match edit.apply_to(&content)? {
            EditResult::Applied { content, .. } => Some(content),
            EditResult::Unchanged => None,
        };

        if let Some(patched) = &patched {
            self.guard.revalidate(path)?;
            write_document(path, patched)?;
        }

        let update = AppliedUpdate {
            update_id: format!("update_{}", Uuid::new_v4().simple()),
            suggestion_id: suggestion.suggestion_id.clone(),
            batch_id: batch_id.to_string(),
            file_path: suggestion.file_path.clone(),
            applied_original_content: removed,
            applied_new_content: suggestion.suggested_content.clone(),
            match_span: matched.span,
            match_tier: matched.tier,
            applied_at: Utc::now(),
        };

        if let Err(err) = self.store.record_applied(update.clone()) {
            if patched.is_some() {
                if let Err(restore) = write_document(path, &content) {
                    warn!(
                        file = %path.display(),
                        error = %restore,
                        "failed to restore file after store error"
                    );
                }
            }
            return Err(err.into());
        }

        info!(
            update_id = %update.update_id,
            suggestion_id = %suggestion.suggestion_id,
            file = %suggestion.file_path,
            tier = %matched.tier,
            "applied suggestion"
        );
        Ok(update)
    }
}
