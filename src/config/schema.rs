use crate::matcher::MatcherConfig;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DOCS_ROOT: &str = "docs";
pub const DEFAULT_STORAGE_DIR: &str = ".doc-patcher";
pub const DEFAULT_MAX_SECTIONS: usize = 20;

/// Contents of `doc-patcher.toml`. Every section is optional.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub upstream: UpstreamSettings,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PathSettings {
    /// Documentation tree suggestions may patch
    pub docs_root: PathBuf,
    /// Directory holding the update store
    pub storage_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            docs_root: PathBuf::from(DEFAULT_DOCS_ROOT),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamSettings {
    pub timeout_secs: Option<u64>,
    /// Retrieval hits handed to the generator
    pub max_sections: usize,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            max_sections: DEFAULT_MAX_SECTIONS,
        }
    }
}

impl UpstreamSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.paths.docs_root.as_os_str().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "paths.docs_root",
            });
        }
        if self.paths.storage_dir.as_os_str().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "paths.storage_dir",
            });
        }

        let m = &self.matcher;
        if !(m.fuzzy_threshold > 0.0 && m.fuzzy_threshold <= 1.0) {
            issues.push(ValidationIssue::OutOfRange {
                field: "matcher.fuzzy_threshold",
                message: format!("{} is not in (0, 1]", m.fuzzy_threshold),
            });
        }
        if !(0.0..1.0).contains(&m.fuzzy_margin) {
            issues.push(ValidationIssue::OutOfRange {
                field: "matcher.fuzzy_margin",
                message: format!("{} is not in [0, 1)", m.fuzzy_margin),
            });
        }
        if !(0.0..1.0).contains(&m.length_tolerance) {
            issues.push(ValidationIssue::OutOfRange {
                field: "matcher.length_tolerance",
                message: format!("{} is not in [0, 1)", m.length_tolerance),
            });
        }

        if self.upstream.max_sections == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "upstream.max_sections",
                message: "must be at least 1".to_string(),
            });
        }
        if self.upstream.timeout_secs == Some(0) {
            issues.push(ValidationIssue::OutOfRange {
                field: "upstream.timeout_secs",
                message: "must be at least 1 when set".to_string(),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Anchor relative paths at `base`, the directory of the config file.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.paths.docs_root, &mut self.paths.storage_dir] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    MissingField {
        field: &'static str,
    },
    OutOfRange {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "missing required field '{field}'")
            }
            ValidationIssue::OutOfRange { field, message } => write!(f, "{field}: {message}"),
        }
    }
}
