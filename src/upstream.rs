//! Retrieval and generation collaborators.
//!
//! Both are blocking calls made once per analysis. The core neither ranks
//! sections nor writes suggestions; it only consumes these interfaces.

use crate::sections::DocumentSection;
use crate::suggest::{parse_generation_response, UpdateSuggestion};
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("malformed generator response: {0}")]
    MalformedResponse(String),

    #[error("{stage} timed out after {timeout:?}")]
    Timeout {
        stage: &'static str,
        timeout: Duration,
    },
}

/// Ranked section lookup for a free-text query.
pub trait Retriever: Send + Sync {
    fn search(&self, query: &str) -> Result<Vec<DocumentSection>, UpstreamError>;
}

/// Turns a query plus candidate sections into proposed replacements.
pub trait Generator: Send + Sync {
    fn generate(
        &self,
        query: &str,
        sections: &[DocumentSection],
    ) -> Result<Vec<UpdateSuggestion>, UpstreamError>;
}

/// Generator backed by a response file an external pipeline already produced.
#[derive(Debug, Clone)]
pub struct ResponseFileGenerator {
    path: PathBuf,
}

impl ResponseFileGenerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Generator for ResponseFileGenerator {
    fn generate(
        &self,
        _query: &str,
        sections: &[DocumentSection],
    ) -> Result<Vec<UpdateSuggestion>, UpstreamError> {
        let response = fs::read_to_string(&self.path).map_err(|e| {
            UpstreamError::Generation(format!("cannot read {}: {e}", self.path.display()))
        })?;
        parse_generation_response(&response, sections)
    }
}

/// Run `call` on a worker thread, giving up after `timeout`.
///
/// Without a timeout the call runs inline. On timeout the worker is left to
/// finish on its own and its result is discarded.
pub fn call_with_timeout<T, F>(
    stage: &'static str,
    timeout: Option<Duration>,
    call: F,
) -> Result<T, UpstreamError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, UpstreamError> + Send + 'static,
{
    let Some(timeout) = timeout else {
        return call();
    };

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // The receiver is gone after a timeout; nothing to report then.
        let _ = tx.send(call());
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(UpstreamError::Timeout { stage, timeout }),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(UpstreamError::Generation(format!(
            "{stage} worker exited without a result"
        ))),
    }
}
