//! Runner error types.

/// Errors that abort a scan before or during setup.
///
/// Everything that happens after the concurrent phase starts is contained
/// per repository and never surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Configuration loading and validation errors.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Discovery failure, including an unresolvable single-repository
    /// target.
    #[error(transparent)]
    Discovery(#[from] crate::discovery::DiscoveryError),

    /// A detection pattern failed to compile.
    #[error("invalid detection pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Remote API client initialization errors.
    #[error(transparent)]
    Api(#[from] crate::github::ApiError),
}
