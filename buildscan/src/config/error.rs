//! Configuration error types.

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
///
/// These are the only errors that abort a run before the concurrent phase
/// starts; everything else is contained at repository granularity.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("Failed to parse YAML in '{path}': {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A settings value is out of range or missing.
    #[error("Invalid configuration: {message}")]
    Validation { message: String },

    /// An exclusion glob does not parse.
    #[error("Invalid exclusion pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}
