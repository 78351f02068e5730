//! Repository discovery error types.

use crate::github::ApiError;
use thiserror::Error;

/// Errors that can occur during repository discovery.
///
/// Both variants abort the run: discovery happens before the concurrent
/// phase, and a missing single-repository target is a user-facing error,
/// not a benign empty result.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Remote API error.
    #[error("GitHub API error: {0}")]
    Api(#[from] ApiError),

    /// The requested single repository does not exist or is inaccessible.
    #[error("repository {org}/{name} not found")]
    RepositoryNotFound { org: String, name: String },
}
