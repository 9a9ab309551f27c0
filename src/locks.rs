//! Per-file mutual exclusion for patch and revert.
//!
//! Two operations touching the same documentation file serialize on that
//! file's lock; operations on different files run freely.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct FileLocks {
    inner: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute `f` while holding the lock for `path`.
    ///
    /// Paths should be canonical so aliases of one file share a lock. A lock
    /// poisoned by a panicking holder is taken over; the file on disk is the
    /// state of record either way.
    ///
    /// ```
    /// use doc_patcher::locks::FileLocks;
    ///
    /// let locks = FileLocks::new();
    /// let len = locks.with_lock("docs/index.md".as_ref(), || 42);
    /// assert_eq!(len, 42);
    /// ```
    pub fn with_lock<F, R>(&self, path: &Path, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(path.to_path_buf()).or_default())
        };
        let _held = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}
