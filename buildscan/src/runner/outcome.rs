//! Per-repository analysis outcomes.

use crate::detect::Finding;

/// Result of analyzing a single repository.
///
/// Produced by one worker task; failure of one repository never affects
/// its siblings.
#[derive(Debug, Clone)]
pub enum RepoOutcome {
    /// Analysis completed and produced findings.
    Analyzed {
        /// Repository name.
        repository: String,
        /// Findings for this repository.
        findings: Vec<Finding>,
    },

    /// Analysis completed but no build configuration was found.
    NoBuildConfig {
        /// Repository name.
        repository: String,
    },

    /// Analysis failed.
    Failed {
        /// Repository name.
        repository: String,
        /// Why the repository could not be analyzed.
        reason: String,
    },
}

impl RepoOutcome {
    /// The repository this outcome belongs to.
    #[must_use]
    pub fn repository(&self) -> &str {
        match self {
            Self::Analyzed { repository, .. }
            | Self::NoBuildConfig { repository }
            | Self::Failed { repository, .. } => repository,
        }
    }
}
