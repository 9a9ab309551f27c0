//! Durable repository for batches, suggestions and applied updates.
//!
//! Every mutation is a read-modify-write of the persisted snapshot performed
//! under one process-wide lock, and every write goes through a temp file plus
//! rename so a crash leaves either the old or the new snapshot on disk.

mod errors;
mod schema;

pub use errors::StoreError;
pub use schema::{
    AppliedUpdate, Batch, BatchStatus, ChangeType, Statistics, StoreSnapshot, Suggestion,
    SuggestionStatus,
};

use crate::edit::write_atomic;
use crate::suggest::UpdateSuggestion;
use chrono::Utc;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

/// Repository contract the lifecycle code talks to. The encoding is hidden.
///
/// Status changes that involve `applied` are owned by [`record_applied`] and
/// [`remove_applied`] so an [`AppliedUpdate`] exists exactly while its
/// suggestion is applied.
///
/// [`record_applied`]: SuggestionStore::record_applied
/// [`remove_applied`]: SuggestionStore::remove_applied
pub trait SuggestionStore: Send + Sync {
    /// Persist a new batch with all its suggestions in `pending`, atomically.
    fn create_batch(
        &self,
        query: &str,
        suggestions: Vec<UpdateSuggestion>,
    ) -> Result<Batch, StoreError>;

    /// Every batch, unfiltered, in creation order.
    fn batches(&self) -> Result<Vec<Batch>, StoreError>;

    fn get_batch(&self, batch_id: &str) -> Result<Option<Batch>, StoreError>;

    /// Batches with at least one pending suggestion, showing only those.
    fn get_pending(&self) -> Result<Vec<Batch>, StoreError>;

    /// Applied updates in the order they were recorded.
    fn get_applied(&self) -> Result<Vec<AppliedUpdate>, StoreError>;

    /// Move a suggestion to `status` if the lifecycle allows it.
    fn update_suggestion_status(
        &self,
        suggestion_id: &str,
        status: SuggestionStatus,
    ) -> Result<(), StoreError>;

    /// Compare-and-set: move from `from` to `to`, failing with
    /// [`StoreError::StatusMismatch`] if the current status differs.
    fn transition_suggestion(
        &self,
        suggestion_id: &str,
        from: SuggestionStatus,
        to: SuggestionStatus,
    ) -> Result<(), StoreError>;

    /// Store `update` and mark its (approved) suggestion applied in one write.
    fn record_applied(&self, update: AppliedUpdate) -> Result<(), StoreError>;

    /// Drop an applied update and return its suggestion to pending in one write.
    fn remove_applied(&self, update_id: &str) -> Result<AppliedUpdate, StoreError>;

    fn statistics(&self) -> Result<Statistics, StoreError>;
}

/// [`SuggestionStore`] persisted as a single pretty-printed JSON document.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    pub const FILE_NAME: &'static str = "updates.json";

    /// Open (creating the directory if needed) the store under `dir`.
    ///
    /// An existing file that fails to parse or violates the store invariants
    /// is an error; it is never treated as empty.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let store = Self {
            path: dir.join(Self::FILE_NAME),
            lock: Mutex::new(()),
        };
        let snapshot = store.load()?;
        info!(
            path = %store.path.display(),
            batches = snapshot.batches.len(),
            applied = snapshot.applied.len(),
            "opened update store"
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StoreSnapshot, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(source) if source.kind() == ErrorKind::NotFound => {
                return Ok(StoreSnapshot::default())
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let snapshot: StoreSnapshot =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let issues = snapshot.integrity_issues();
        if !issues.is_empty() {
            return Err(StoreError::Corrupt {
                path: self.path.clone(),
                reason: issues.join("; "),
            });
        }
        Ok(snapshot)
    }

    fn save(&self, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.path, &bytes).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn read<R>(&self, f: impl FnOnce(&StoreSnapshot) -> R) -> Result<R, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.load()?;
        Ok(f(&snapshot))
    }

    /// Load, mutate, save under the store lock. Nothing is written if `f` fails.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut StoreSnapshot) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut snapshot = self.load()?;
        let result = f(&mut snapshot)?;
        self.save(&snapshot)?;
        Ok(result)
    }
}

fn new_batch_id() -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let tag = Uuid::new_v4().simple().to_string();
    format!("batch_{stamp}_{}", &tag[..8])
}

fn set_status(
    snapshot: &mut StoreSnapshot,
    suggestion_id: &str,
    expected: Option<SuggestionStatus>,
    to: SuggestionStatus,
) -> Result<(), StoreError> {
    let suggestion = snapshot
        .find_suggestion_mut(suggestion_id)
        .ok_or_else(|| StoreError::SuggestionNotFound(suggestion_id.to_string()))?;
    let from = suggestion.status;

    if let Some(expected) = expected {
        if from != expected {
            return Err(StoreError::StatusMismatch {
                suggestion_id: suggestion_id.to_string(),
                expected,
                actual: from,
            });
        }
    }

    let managed = from == SuggestionStatus::Applied || to == SuggestionStatus::Applied;
    if managed || !from.can_transition_to(to) {
        return Err(StoreError::IllegalTransition {
            suggestion_id: suggestion_id.to_string(),
            from,
            to,
        });
    }

    suggestion.status = to;
    debug!(suggestion_id, %from, %to, "suggestion status changed");
    Ok(())
}

impl SuggestionStore for JsonStore {
    fn create_batch(
        &self,
        query: &str,
        suggestions: Vec<UpdateSuggestion>,
    ) -> Result<Batch, StoreError> {
        if suggestions.is_empty() {
            return Err(StoreError::EmptyBatch);
        }

        self.mutate(|snapshot| {
            let batch_id = new_batch_id();
            if snapshot.batches.iter().any(|b| b.batch_id == batch_id) {
                return Err(StoreError::DuplicateId(batch_id));
            }

            let suggestions = suggestions
                .into_iter()
                .enumerate()
                .map(|(i, s)| Suggestion {
                    suggestion_id: format!("{batch_id}_{i}"),
                    section_id: s.section_id,
                    section_title: s.section_title,
                    file_path: s.file_path,
                    original_content: s.original_content,
                    suggested_content: s.suggested_content,
                    change_type: s.change_type,
                    confidence_score: s.confidence_score,
                    reasoning: s.reasoning,
                    status: SuggestionStatus::Pending,
                })
                .collect::<Vec<_>>();

            if let Some(dup) = suggestions
                .iter()
                .find(|s| snapshot.find_suggestion(&s.suggestion_id).is_some())
            {
                return Err(StoreError::DuplicateId(dup.suggestion_id.clone()));
            }

            let batch = Batch {
                batch_id,
                query: query.to_string(),
                created_at: Utc::now(),
                suggestions,
            };
            snapshot.batches.push(batch.clone());
            info!(
                batch_id = %batch.batch_id,
                suggestions = batch.suggestions.len(),
                "created batch"
            );
            Ok(batch)
        })
    }

    fn batches(&self) -> Result<Vec<Batch>, StoreError> {
        self.read(|snapshot| snapshot.batches.clone())
    }

    fn get_batch(&self, batch_id: &str) -> Result<Option<Batch>, StoreError> {
        self.read(|snapshot| {
            snapshot
                .batches
                .iter()
                .find(|b| b.batch_id == batch_id)
                .cloned()
        })
    }

    fn get_pending(&self) -> Result<Vec<Batch>, StoreError> {
        self.read(|snapshot| {
            snapshot
                .batches
                .iter()
                .filter_map(Batch::pending_view)
                .collect()
        })
    }

    fn get_applied(&self) -> Result<Vec<AppliedUpdate>, StoreError> {
        self.read(|snapshot| snapshot.applied.clone())
    }

    fn update_suggestion_status(
        &self,
        suggestion_id: &str,
        status: SuggestionStatus,
    ) -> Result<(), StoreError> {
        self.mutate(|snapshot| set_status(snapshot, suggestion_id, None, status))
    }

    fn transition_suggestion(
        &self,
        suggestion_id: &str,
        from: SuggestionStatus,
        to: SuggestionStatus,
    ) -> Result<(), StoreError> {
        self.mutate(|snapshot| set_status(snapshot, suggestion_id, Some(from), to))
    }

    fn record_applied(&self, update: AppliedUpdate) -> Result<(), StoreError> {
        self.mutate(|snapshot| {
            if snapshot.applied.iter().any(|u| u.update_id == update.update_id) {
                return Err(StoreError::DuplicateId(update.update_id.clone()));
            }
            if let Some(existing) = snapshot.applied_for(&update.suggestion_id) {
                return Err(StoreError::AlreadyApplied {
                    suggestion_id: update.suggestion_id.clone(),
                    update_id: existing.update_id.clone(),
                });
            }

            let suggestion = snapshot
                .find_suggestion_mut(&update.suggestion_id)
                .ok_or_else(|| StoreError::SuggestionNotFound(update.suggestion_id.clone()))?;
            if suggestion.status != SuggestionStatus::Approved {
                return Err(StoreError::StatusMismatch {
                    suggestion_id: update.suggestion_id.clone(),
                    expected: SuggestionStatus::Approved,
                    actual: suggestion.status,
                });
            }
            suggestion.status = SuggestionStatus::Applied;

            info!(
                update_id = %update.update_id,
                suggestion_id = %update.suggestion_id,
                file = %update.file_path,
                "recorded applied update"
            );
            snapshot.applied.push(update);
            Ok(())
        })
    }

    fn remove_applied(&self, update_id: &str) -> Result<AppliedUpdate, StoreError> {
        self.mutate(|snapshot| {
            let idx = snapshot
                .applied
                .iter()
                .position(|u| u.update_id == update_id)
                .ok_or_else(|| StoreError::UpdateNotFound(update_id.to_string()))?;
            let update = snapshot.applied.remove(idx);

            if let Some(suggestion) = snapshot.find_suggestion_mut(&update.suggestion_id) {
                suggestion.status = SuggestionStatus::Pending;
            }
            info!(update_id, suggestion_id = %update.suggestion_id, "removed applied update");
            Ok(update)
        })
    }

    fn statistics(&self) -> Result<Statistics, StoreError> {
        self.read(StoreSnapshot::statistics)
    }
}
