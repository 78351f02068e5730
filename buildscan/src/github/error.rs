//! Remote API error taxonomy.

use thiserror::Error;

/// Classified errors from the remote repository host.
///
/// The classification drives containment: `NotFound` is a normal negative
/// result, `RateLimited` is absorbed by the rate budget tracker,
/// `Transient` earns one retry within a task, and the rest fail the
/// repository without aborting the run.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested resource does not exist.
    #[error("resource not found")]
    NotFound,

    /// The remote API reports the rate quota as exhausted.
    #[error("API rate limit exceeded")]
    RateLimited,

    /// A retryable failure: network error or server-side 5xx.
    #[error("transient API error: {0}")]
    Transient(String),

    /// The repository exists but cannot be accessed (blocked, disabled,
    /// permission revoked mid-scan).
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    /// Anything else, including unexpected response shapes.
    #[error("API error: {0}")]
    Other(String),
}

impl ApiError {
    /// Classifies an octocrab error into the taxonomy above.
    #[must_use]
    pub fn classify(err: octocrab::Error) -> Self {
        match err {
            octocrab::Error::GitHub { source, .. } => {
                let status = source.status_code.as_u16();
                let message = source.message.clone();
                match status {
                    404 => Self::NotFound,
                    429 => Self::RateLimited,
                    403 if message.to_lowercase().contains("rate limit") => Self::RateLimited,
                    403 | 410 | 451 => Self::Unavailable(message),
                    500..=599 => Self::Transient(message),
                    _ => Self::Other(format!("{status}: {message}")),
                }
            }
            // Everything below the GitHub layer (connection resets, DNS,
            // timeouts) is worth one retry.
            other => Self::Transient(other.to_string()),
        }
    }
}
