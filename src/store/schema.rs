use crate::matcher::{MatchTier, Span};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Addition,
    /// Generators commonly say "update" for an in-place rewrite
    #[serde(alias = "update")]
    Modification,
    Removal,
    Clarification,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeType::Addition => "addition",
            ChangeType::Modification => "modification",
            ChangeType::Removal => "removal",
            ChangeType::Clarification => "clarification",
        };
        f.write_str(name)
    }
}

/// Suggestion lifecycle.
///
/// ```text
/// pending -> approved -> applied -> (revert) -> pending
/// pending -> rejected
/// ```
///
/// `approved -> pending` covers a failed apply and crash recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Applied,
    Rejected,
}

impl SuggestionStatus {
    pub fn can_transition_to(self, next: SuggestionStatus) -> bool {
        use SuggestionStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Applied)
                | (Approved, Pending)
                | (Applied, Pending)
        )
    }
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Approved => "approved",
            SuggestionStatus::Applied => "applied",
            SuggestionStatus::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// One proposed replacement, owned by exactly one [`Batch`].
///
/// Everything but `status` is fixed at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub suggestion_id: String,
    pub section_id: String,
    pub section_title: String,
    pub file_path: String,
    /// Text expected to exist verbatim in the file
    pub original_content: String,
    pub suggested_content: String,
    pub change_type: ChangeType,
    pub confidence_score: f64,
    pub reasoning: String,
    pub status: SuggestionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Completed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Pending => f.write_str("pending"),
            BatchStatus::Completed => f.write_str("completed"),
        }
    }
}

/// Suggestions generated from one query, reviewed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: String,
    pub query: String,
    pub created_at: DateTime<Utc>,
    pub suggestions: Vec<Suggestion>,
}

impl Batch {
    /// Pending while any suggestion awaits a decision.
    pub fn status(&self) -> BatchStatus {
        if self.has_status(SuggestionStatus::Pending) {
            BatchStatus::Pending
        } else {
            BatchStatus::Completed
        }
    }

    pub fn has_status(&self, status: SuggestionStatus) -> bool {
        self.suggestions.iter().any(|s| s.status == status)
    }

    pub fn suggestion(&self, suggestion_id: &str) -> Option<&Suggestion> {
        self.suggestions
            .iter()
            .find(|s| s.suggestion_id == suggestion_id)
    }

    /// Copy of this batch restricted to pending suggestions, or `None` if
    /// nothing is pending.
    pub fn pending_view(&self) -> Option<Batch> {
        let suggestions: Vec<Suggestion> = self
            .suggestions
            .iter()
            .filter(|s| s.status == SuggestionStatus::Pending)
            .cloned()
            .collect();
        if suggestions.is_empty() {
            return None;
        }
        Some(Batch {
            batch_id: self.batch_id.clone(),
            query: self.query.clone(),
            created_at: self.created_at,
            suggestions,
        })
    }
}

/// Durable record of an applied patch; the only input revert needs.
///
/// Holds the literal text removed and inserted, which can differ from the
/// suggestion when a normalized or fuzzy tier located the span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedUpdate {
    pub update_id: String,
    pub suggestion_id: String,
    pub batch_id: String,
    pub file_path: String,
    pub applied_original_content: String,
    pub applied_new_content: String,
    /// Span of the removed text at application time
    pub match_span: Span,
    pub match_tier: MatchTier,
    pub applied_at: DateTime<Utc>,
}

impl AppliedUpdate {
    /// Span the inserted text occupied right after application.
    pub fn inserted_span(&self) -> Span {
        Span::new(
            self.match_span.start,
            self.match_span.start + self.applied_new_content.len(),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub pending_suggestions: usize,
    pub approved_suggestions: usize,
    pub applied_suggestions: usize,
    pub rejected_suggestions: usize,
    pub total_suggestions: usize,
    /// Batches with at least one pending suggestion
    pub pending_batches: usize,
    /// Batches with at least one applied suggestion
    pub applied_batches: usize,
    pub total_batches: usize,
}

/// Whole persisted state: the pending-updates and applied-updates collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub batches: Vec<Batch>,
    #[serde(default)]
    pub applied: Vec<AppliedUpdate>,
}

impl StoreSnapshot {
    pub fn find_suggestion_mut(&mut self, suggestion_id: &str) -> Option<&mut Suggestion> {
        self.batches
            .iter_mut()
            .flat_map(|b| b.suggestions.iter_mut())
            .find(|s| s.suggestion_id == suggestion_id)
    }

    pub fn find_suggestion(&self, suggestion_id: &str) -> Option<&Suggestion> {
        self.batches
            .iter()
            .flat_map(|b| b.suggestions.iter())
            .find(|s| s.suggestion_id == suggestion_id)
    }

    pub fn applied_for(&self, suggestion_id: &str) -> Option<&AppliedUpdate> {
        self.applied
            .iter()
            .find(|u| u.suggestion_id == suggestion_id)
    }

    pub fn statistics(&self) -> Statistics {
        let mut stats = Statistics {
            total_batches: self.batches.len(),
            ..Statistics::default()
        };
        for batch in &self.batches {
            for suggestion in &batch.suggestions {
                stats.total_suggestions += 1;
                match suggestion.status {
                    SuggestionStatus::Pending => stats.pending_suggestions += 1,
                    SuggestionStatus::Approved => stats.approved_suggestions += 1,
                    SuggestionStatus::Applied => stats.applied_suggestions += 1,
                    SuggestionStatus::Rejected => stats.rejected_suggestions += 1,
                }
            }
            if batch.has_status(SuggestionStatus::Pending) {
                stats.pending_batches += 1;
            }
            if batch.has_status(SuggestionStatus::Applied) {
                stats.applied_batches += 1;
            }
        }
        stats
    }

    /// Check cross-record invariants, returning every violation found.
    pub fn integrity_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut batch_ids = HashSet::new();
        let mut statuses: HashMap<&str, SuggestionStatus> = HashMap::new();

        for batch in &self.batches {
            if !batch_ids.insert(batch.batch_id.as_str()) {
                issues.push(format!("duplicate batch id '{}'", batch.batch_id));
            }
            if batch.suggestions.is_empty() {
                issues.push(format!("batch '{}' has no suggestions", batch.batch_id));
            }
            for s in &batch.suggestions {
                if statuses.insert(&s.suggestion_id, s.status).is_some() {
                    issues.push(format!("duplicate suggestion id '{}'", s.suggestion_id));
                }
            }
        }

        let mut update_ids = HashSet::new();
        let mut applied_suggestions = HashSet::new();
        for update in &self.applied {
            if !update_ids.insert(update.update_id.as_str()) {
                issues.push(format!("duplicate update id '{}'", update.update_id));
            }
            if !applied_suggestions.insert(update.suggestion_id.as_str()) {
                issues.push(format!(
                    "suggestion '{}' has more than one applied update",
                    update.suggestion_id
                ));
            }
            match statuses.get(update.suggestion_id.as_str()) {
                None => issues.push(format!(
                    "applied update '{}' references unknown suggestion '{}'",
                    update.update_id, update.suggestion_id
                )),
                Some(SuggestionStatus::Applied) => {}
                Some(other) => issues.push(format!(
                    "applied update '{}' exists but suggestion '{}' is {}",
                    update.update_id, update.suggestion_id, other
                )),
            }
        }

        issues
    }
}
