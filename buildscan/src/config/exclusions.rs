//! Repository exclusion rules.

use super::ConfigError;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Exclusion rules as configured: exact names plus glob patterns.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ExclusionSettings {
    /// Exact repository names to exclude.
    pub repositories: Vec<String>,

    /// Glob patterns to exclude, e.g. `terraform-*` or `*-infra`.
    pub patterns: Vec<String>,

    /// Also exclude forked repositories.
    pub skip_forks: bool,
}

impl ExclusionSettings {
    /// Compiles the glob patterns once so discovery does not re-parse them
    /// per repository.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] for a malformed glob.
    pub fn compile(&self) -> Result<CompiledExclusions, ConfigError> {
        let mut patterns = Vec::with_capacity(self.patterns.len());
        for raw in &self.patterns {
            let pattern = Pattern::new(raw).map_err(|e| ConfigError::InvalidPattern {
                pattern: raw.clone(),
                source: e,
            })?;
            patterns.push((raw.clone(), pattern));
        }
        Ok(CompiledExclusions {
            names: self.repositories.iter().cloned().collect(),
            patterns,
            skip_forks: self.skip_forks,
        })
    }
}

/// Compiled exclusion rules ready for per-repository evaluation.
#[derive(Debug, Clone)]
pub struct CompiledExclusions {
    names: HashSet<String>,
    patterns: Vec<(String, Pattern)>,
    skip_forks: bool,
}

impl CompiledExclusions {
    /// Returns the configured pattern (or marker for an exact-name match)
    /// that excludes `repo_name`, if any.
    #[must_use]
    pub fn matches(&self, repo_name: &str) -> Option<ExclusionMatch> {
        if self.names.contains(repo_name) {
            return Some(ExclusionMatch::ExactName);
        }
        for (raw, pattern) in &self.patterns {
            if pattern.matches(repo_name) {
                return Some(ExclusionMatch::Pattern(raw.clone()));
            }
        }
        None
    }

    /// Whether forked repositories are excluded.
    #[must_use]
    pub fn skip_forks(&self) -> bool {
        self.skip_forks
    }
}

/// Which exclusion rule matched a repository name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionMatch {
    /// The name appears in the exact-name exclusion list.
    ExactName,

    /// The name matches this glob pattern.
    Pattern(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(names: &[&str], patterns: &[&str]) -> CompiledExclusions {
        ExclusionSettings {
            repositories: names.iter().map(|s| s.to_string()).collect(),
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
            skip_forks: false,
        }
        .compile()
        .unwrap()
    }

    #[test]
    fn exact_name_match() {
        let rules = rules(&["documentation"], &[]);
        assert_eq!(
            rules.matches("documentation"),
            Some(ExclusionMatch::ExactName)
        );
        assert_eq!(rules.matches("docs"), None);
    }

    #[test]
    fn glob_pattern_match() {
        let rules = rules(&[], &["terraform-*", "*-infra"]);
        assert_eq!(
            rules.matches("terraform-aws"),
            Some(ExclusionMatch::Pattern("terraform-*".to_string()))
        );
        assert_eq!(
            rules.matches("network-infra"),
            Some(ExclusionMatch::Pattern("*-infra".to_string()))
        );
        assert_eq!(rules.matches("svc-a"), None);
    }

    #[test]
    fn first_matching_pattern_is_reported() {
        let rules = rules(&[], &["legacy-*", "legacy-api*"]);
        assert_eq!(
            rules.matches("legacy-api"),
            Some(ExclusionMatch::Pattern("legacy-*".to_string()))
        );
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let settings = ExclusionSettings {
            repositories: vec![],
            patterns: vec!["[unclosed".to_string()],
            skip_forks: false,
        };
        assert!(matches!(
            settings.compile(),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }
}
