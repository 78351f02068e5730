//! Content access seam for the detection engine.

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced to the engine by a content source.
///
/// A source resolves retryable conditions itself (one transient retry,
/// rate-limit wait-and-resume); what reaches the engine fails the
/// repository.
#[derive(Debug, Error)]
pub enum FetchError {
    /// A retryable failure persisted beyond the retry budget.
    #[error("transient error fetching '{path}': {reason}")]
    Transient { path: String, reason: String },

    /// The repository became unavailable mid-scan.
    #[error("repository unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Provides file content for one repository during detection.
///
/// The engine pulls content lazily so a candidate file is only fetched
/// when earlier, more reliable candidates did not already match.
/// Implementations memoize, making repeated requests for the same path
/// free.
#[async_trait]
pub trait ContentSource: Send {
    /// Names of the repository's root directory entries, fetched at most
    /// once. Needed to resolve wildcard candidate paths.
    async fn root_entries(&mut self) -> Result<Vec<String>, FetchError>;

    /// Content of one file, or `None` when the file does not exist.
    async fn fetch(&mut self, path: &str) -> Result<Option<String>, FetchError>;
}

/// In-memory content source over a fixed file set.
///
/// Backs engine unit tests and any caller that already holds the content.
#[derive(Debug, Default)]
pub struct StaticSource {
    entries: Vec<String>,
    files: std::collections::HashMap<String, String>,
}

impl StaticSource {
    /// Builds a source from `(path, content)` pairs. Root entries are the
    /// top-level path components of the provided files.
    #[must_use]
    pub fn new(files: &[(&str, &str)]) -> Self {
        let mut entries: Vec<String> = files
            .iter()
            .map(|(path, _)| {
                path.split('/')
                    .next()
                    .unwrap_or(path)
                    .to_string()
            })
            .collect();
        entries.dedup();
        Self {
            entries,
            files: files
                .iter()
                .map(|(path, content)| (path.to_string(), content.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl ContentSource for StaticSource {
    async fn root_entries(&mut self) -> Result<Vec<String>, FetchError> {
        Ok(self.entries.clone())
    }

    async fn fetch(&mut self, path: &str) -> Result<Option<String>, FetchError> {
        Ok(self.files.get(path).cloned())
    }
}
