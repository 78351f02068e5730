//! Discovered repository information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A repository discovered in the target organization.
///
/// Immutable once produced by discovery; shared read-only by the
/// orchestrator and the detection engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Repository owner (user or organization).
    pub owner: String,

    /// Repository name.
    pub name: String,

    /// Full repository name in "owner/name" format.
    pub full_name: String,

    /// Default branch name (e.g., "main").
    pub default_branch: String,

    /// Whether the repository is archived.
    pub archived: bool,

    /// Whether the repository is a fork.
    pub fork: bool,

    /// Whether the repository has no content.
    pub empty: bool,
}

impl RepositoryRef {
    /// Builds a reference with default flags, mostly useful in tests and
    /// when resolving search hits before full metadata is known.
    #[must_use]
    pub fn named(owner: &str, name: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            full_name: format!("{owner}/{name}"),
            default_branch: "main".to_string(),
            archived: false,
            fork: false,
            empty: false,
        }
    }
}

/// Why a discovered repository was not analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExclusionReason {
    /// The repository is archived.
    Archived,

    /// The repository has no content.
    Empty,

    /// The repository is a fork and forks are excluded.
    Fork,

    /// The name appears in the exact-name exclusion list.
    ExcludedByName,

    /// The name matches an exclusion glob.
    ExcludedByPattern {
        /// The glob that matched.
        pattern: String,
    },
}

impl ExclusionReason {
    /// True for the implicit skip rules (archived/empty), as opposed to
    /// configured exclusions.
    #[must_use]
    pub fn is_implicit_skip(&self) -> bool {
        matches!(self, Self::Archived | Self::Empty)
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archived => write!(f, "archived"),
            Self::Empty => write!(f, "empty"),
            Self::Fork => write!(f, "fork"),
            Self::ExcludedByName => write!(f, "excluded by name"),
            Self::ExcludedByPattern { pattern } => write!(f, "matches pattern '{pattern}'"),
        }
    }
}

/// A repository that was discovered but not scheduled for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedRepository {
    /// Repository name.
    pub name: String,

    /// Why it was excluded.
    pub reason: ExclusionReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_fills_full_name() {
        let repo = RepositoryRef::named("acme", "svc-a");
        assert_eq!(repo.full_name, "acme/svc-a");
        assert_eq!(repo.default_branch, "main");
        assert!(!repo.archived);
    }

    #[test]
    fn implicit_skip_classification() {
        assert!(ExclusionReason::Archived.is_implicit_skip());
        assert!(ExclusionReason::Empty.is_implicit_skip());
        assert!(!ExclusionReason::ExcludedByName.is_implicit_skip());
        assert!(!ExclusionReason::ExcludedByPattern {
            pattern: "terraform-*".to_string()
        }
        .is_implicit_skip());
    }
}
