use crate::matcher::Span;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental mutation primitive: byte-span replacement with verification.
///
/// Applying a suggestion and reverting one both compile down to this. The
/// matcher decides where; the edit only checks that the span still holds what
/// the matcher saw before splicing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until apply_to() is called"]
pub struct Edit {
    /// File the span refers to (used for error reporting)
    pub file: PathBuf,
    pub span: Span,
    /// New text to insert at the span
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: EditVerification,
}

/// What the span must still hold for the edit to go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    ExactMatch(String),
    /// xxh3 of the expected text, used for long spans
    Hash(u64),
}

/// Spans longer than this are verified by hash.
const HASH_THRESHOLD: usize = 1024;

impl EditVerification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    pub fn from_text(text: &str) -> Self {
        match text.len() {
            n if n > HASH_THRESHOLD => EditVerification::Hash(xxh3_64(text.as_bytes())),
            _ => EditVerification::ExactMatch(text.to_owned()),
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Before-text verification failed at {file}:{span}")]
    BeforeTextMismatch {
        file: PathBuf,
        span: Span,
        found: String,
    },

    #[error("Invalid byte range {span} in file of length {file_len}")]
    InvalidByteRange { span: Span, file_len: usize },
}

/// Result of applying an edit to in-memory content.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult carries the spliced content"]
pub enum EditResult {
    /// The span was replaced
    Applied { content: String, bytes_changed: usize },
    /// The span already holds the new text
    Unchanged,
}

impl Edit {
    /// Edit replacing `span` with `new_text`, guarded by `expected_before`.
    pub fn new(
        file: impl Into<PathBuf>,
        span: Span,
        new_text: impl Into<String>,
        expected_before: &str,
    ) -> Self {
        Self {
            file: file.into(),
            span,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before),
        }
    }

    /// Validate the edit against content, returning the text currently at the span.
    fn validate<'a>(&self, content: &'a str) -> Result<&'a str, EditError> {
        let current = self
            .span
            .slice(content)
            .ok_or(EditError::InvalidByteRange {
                span: self.span,
                file_len: content.len(),
            })?;

        if current == self.new_text {
            return Ok(current);
        }

        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                file: self.file.clone(),
                span: self.span,
                found: current.to_string(),
            });
        }

        Ok(current)
    }

    /// Splice `new_text` into `content` at the span after verification.
    pub fn apply_to(&self, content: &str) -> Result<EditResult, EditError> {
        let current = self.validate(content)?;
        if current == self.new_text {
            return Ok(EditResult::Unchanged);
        }

        let mut spliced =
            String::with_capacity(content.len() + self.new_text.len() - self.span.len());
        spliced.push_str(&content[..self.span.start]);
        spliced.push_str(&self.new_text);
        spliced.push_str(&content[self.span.end..]);

        Ok(EditResult::Applied {
            content: spliced,
            bytes_changed: self.new_text.len(),
        })
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the file keeps its previous content.
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    // Same directory, so the rename cannot cross filesystems.
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "document path has no parent directory",
        )
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    // Keep the mode of the file being replaced; tempfiles are created 0600.
    if let Ok(metadata) = std::fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
