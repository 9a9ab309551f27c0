use std::path::{Path, PathBuf};
use thiserror::Error;

/// Keeps patch and revert writes inside the documentation root.
#[derive(Debug, Clone)]
pub struct DocsGuard {
    /// Canonical documentation root
    docs_root: PathBuf,
    /// Canonical directories that must never be patched
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside documentation root: {path} (root: {root})")]
    OutsideDocsRoot { path: PathBuf, root: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Failed to resolve {path}: {source}")]
    Canonicalize {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn canonicalize(path: &Path) -> Result<PathBuf, SafetyError> {
    path.canonicalize()
        .map_err(|source| SafetyError::Canonicalize {
            path: path.to_path_buf(),
            source,
        })
}

impl DocsGuard {
    /// Create a guard rooted at `docs_root`.
    ///
    /// The root is canonicalized so symlinked roots compare correctly. The
    /// update store directory and any `.git` directory under the root are
    /// forbidden when they exist.
    pub fn new(
        docs_root: impl AsRef<Path>,
        store_dir: Option<&Path>,
    ) -> Result<Self, SafetyError> {
        let docs_root = canonicalize(docs_root.as_ref())?;

        let mut forbidden_paths = Vec::new();
        if let Some(store_dir) = store_dir {
            if let Ok(store_dir) = store_dir.canonicalize() {
                forbidden_paths.push(store_dir);
            }
        }
        if let Ok(git_dir) = docs_root.join(".git").canonicalize() {
            forbidden_paths.push(git_dir);
        }

        Ok(Self {
            docs_root,
            forbidden_paths,
        })
    }

    /// Resolve a suggestion's file path and check it is safe to patch.
    ///
    /// Relative paths resolve against the documentation root. Returns the
    /// canonical path.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.docs_root.join(path)
        };

        let canonical = canonicalize(&absolute)?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    /// Re-validate a previously validated path right before writing, so a
    /// symlink swapped in after validation is still caught.
    pub fn revalidate(&self, path: &Path) -> Result<PathBuf, SafetyError> {
        let canonical = canonicalize(path)?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.docs_root) {
            return Err(SafetyError::OutsideDocsRoot {
                path: canonical.to_path_buf(),
                root: self.docs_root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_validate_path_inside_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let guard = DocsGuard::new(root, None).unwrap();

        let file = root.join("guide/agents.md");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"").unwrap();

        assert!(guard.validate_path(&file).is_ok());
        assert!(guard.validate_path("guide/agents.md").is_ok());
    }

    #[test]
    fn test_validate_path_outside_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("docs");
        fs::create_dir_all(&root).unwrap();
        let guard = DocsGuard::new(&root, None).unwrap();

        let outside = temp_dir.path().join("outside.md");
        fs::write(&outside, b"").unwrap();

        assert!(matches!(
            guard.validate_path(&outside),
            Err(SafetyError::OutsideDocsRoot { .. })
        ));
        assert!(matches!(
            guard.validate_path("../outside.md"),
            Err(SafetyError::OutsideDocsRoot { .. })
        ));
    }

    #[test]
    fn test_store_dir_forbidden() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let store_dir = root.join(".updates");
        fs::create_dir_all(&store_dir).unwrap();
        fs::write(store_dir.join("updates.json"), b"{}").unwrap();

        let guard = DocsGuard::new(root, Some(&store_dir)).unwrap();
        assert!(matches!(
            guard.validate_path(".updates/updates.json"),
            Err(SafetyError::ForbiddenPath { .. })
        ));
    }

    #[test]
    fn test_missing_file_fails_to_resolve() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = DocsGuard::new(temp_dir.path(), None).unwrap();
        assert!(matches!(
            guard.validate_path("missing.md"),
            Err(SafetyError::Canonicalize { .. })
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_escape_rejected() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("docs");
        fs::create_dir_all(&root).unwrap();

        let outside = temp_dir.path().join("secret.md");
        fs::write(&outside, b"").unwrap();
        let link = root.join("escape.md");
        symlink(&outside, &link).unwrap();

        let guard = DocsGuard::new(&root, None).unwrap();
        assert!(matches!(
            guard.validate_path(&link),
            Err(SafetyError::OutsideDocsRoot { .. })
        ));
    }
}
