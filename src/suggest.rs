//! Incoming suggestions and the validation boundary in front of the store.
//!
//! Generators are loosely typed; nothing reaches [`crate::store`] without
//! passing [`UpdateSuggestion::validate`].

use crate::sections::DocumentSection;
use crate::store::ChangeType;
use crate::upstream::UpstreamError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A replacement proposed by the generation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSuggestion {
    pub section_id: String,
    pub section_title: String,
    pub file_path: String,
    pub original_content: String,
    pub suggested_content: String,
    pub change_type: ChangeType,
    pub confidence_score: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField(&'static str),
    ConfidenceOutOfRange(String),
    NoChange,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField(field) => write!(f, "missing required field '{field}'"),
            ValidationIssue::ConfidenceOutOfRange(value) => {
                write!(f, "confidence_score {value} is outside [0, 1]")
            }
            ValidationIssue::NoChange => {
                write!(f, "suggested_content is identical to original_content")
            }
        }
    }
}

impl UpdateSuggestion {
    pub fn validate(&self) -> Result<(), Vec<ValidationIssue>> {
        let mut issues = Vec::new();

        if self.original_content.trim().is_empty() {
            issues.push(ValidationIssue::MissingField("original_content"));
        }
        if self.file_path.trim().is_empty() {
            issues.push(ValidationIssue::MissingField("file_path"));
        }
        if self.section_id.trim().is_empty() {
            issues.push(ValidationIssue::MissingField("section_id"));
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            issues.push(ValidationIssue::ConfidenceOutOfRange(
                self.confidence_score.to_string(),
            ));
        }
        if self.original_content == self.suggested_content {
            issues.push(ValidationIssue::NoChange);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

/// A suggestion held back at ingestion, with the reasons.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarantinedSuggestion {
    pub index: usize,
    pub section_id: String,
    pub issues: Vec<String>,
}

/// Split `suggestions` into those fit for the store and the quarantined rest.
pub fn partition_valid(
    suggestions: Vec<UpdateSuggestion>,
) -> (Vec<UpdateSuggestion>, Vec<QuarantinedSuggestion>) {
    let mut valid = Vec::new();
    let mut quarantined = Vec::new();
    for (index, suggestion) in suggestions.into_iter().enumerate() {
        match suggestion.validate() {
            Ok(()) => valid.push(suggestion),
            Err(issues) => quarantined.push(QuarantinedSuggestion {
                index,
                section_id: suggestion.section_id,
                issues: issues.iter().map(ToString::to_string).collect(),
            }),
        }
    }
    (valid, quarantined)
}

#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    #[serde(default)]
    suggestions: Vec<RawSuggestion>,
}

/// Loose shape a generator emits; every field is optional.
#[derive(Debug, Deserialize)]
struct RawSuggestion {
    section_id: Option<String>,
    section_title: Option<String>,
    file_path: Option<String>,
    original_content: Option<String>,
    suggested_content: Option<String>,
    change_type: Option<ChangeType>,
    confidence_score: Option<f64>,
    reasoning: Option<String>,
}

const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Parse a generator's JSON response into suggestions tied to `sections`.
///
/// The response may be wrapped in a Markdown code fence. Each entry is tied
/// to a section by id, then by title containment, then by position. Shape
/// problems beyond that are left for [`UpdateSuggestion::validate`].
pub fn parse_generation_response(
    response: &str,
    sections: &[DocumentSection],
) -> Result<Vec<UpdateSuggestion>, UpstreamError> {
    let envelope: ResponseEnvelope = serde_json::from_str(strip_code_fence(response))
        .map_err(|e| UpstreamError::MalformedResponse(e.to_string()))?;

    Ok(envelope
        .suggestions
        .into_iter()
        .enumerate()
        .map(|(idx, raw)| {
            let section = resolve_section(&raw, idx, sections);
            UpdateSuggestion {
                section_id: raw
                    .section_id
                    .or_else(|| section.map(|s| s.id.clone()))
                    .unwrap_or_default(),
                section_title: raw
                    .section_title
                    .or_else(|| section.map(|s| s.title.clone()))
                    .unwrap_or_default(),
                file_path: raw
                    .file_path
                    .or_else(|| section.map(|s| s.file_path.clone()))
                    .unwrap_or_default(),
                original_content: raw.original_content.unwrap_or_default(),
                suggested_content: raw.suggested_content.unwrap_or_default(),
                change_type: raw.change_type.unwrap_or(ChangeType::Modification),
                confidence_score: raw.confidence_score.unwrap_or(DEFAULT_CONFIDENCE),
                reasoning: raw.reasoning.unwrap_or_default(),
            }
        })
        .collect())
}

fn resolve_section<'a>(
    raw: &RawSuggestion,
    idx: usize,
    sections: &'a [DocumentSection],
) -> Option<&'a DocumentSection> {
    if let Some(id) = &raw.section_id {
        if let Some(section) = sections.iter().find(|s| &s.id == id) {
            return Some(section);
        }
    }
    if let Some(title) = raw.section_title.as_deref().map(str::to_lowercase) {
        if !title.is_empty() {
            let by_title = sections.iter().find(|s| {
                let candidate = s.title.to_lowercase();
                candidate.contains(&title) || title.contains(&candidate)
            });
            if by_title.is_some() {
                return by_title;
            }
        }
    }
    sections.get(idx)
}

fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") up to the first newline.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
