//! Scanner configuration.
//!
//! This module defines the resolved settings object consumed by every other
//! component, plus YAML loading and validation. Merging of CLI flags over
//! file values happens in the CLI crate; the library only sees the result.

mod error;
mod exclusions;

pub use error::ConfigError;
pub use exclusions::{CompiledExclusions, ExclusionMatch, ExclusionSettings};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Hard ceiling on the worker pool, so one scan cannot monopolize the
/// shared API rate budget.
pub const MAX_WORKERS: usize = 16;

/// Resolved scanner settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// GitHub organization to audit.
    pub organization: String,

    /// Worker pool and inter-call pacing.
    pub parallelism: ParallelismSettings,

    /// Repository exclusion rules.
    pub exclusions: ExclusionSettings,

    /// Analysis mode selection.
    pub analysis: AnalysisSettings,

    /// Repository-list caching.
    pub caching: CacheSettings,

    /// Rate budget tuning.
    pub rate_budget: RateBudgetSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            organization: String::new(),
            parallelism: ParallelismSettings::default(),
            exclusions: ExclusionSettings::default(),
            analysis: AnalysisSettings::default(),
            caching: CacheSettings::default(),
            rate_budget: RateBudgetSettings::default(),
        }
    }
}

/// Worker pool and pacing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ParallelismSettings {
    /// Number of parallel repository tasks.
    pub max_workers: usize,

    /// Baseline delay between remote calls, in seconds.
    pub rate_limit_delay: f64,
}

impl Default for ParallelismSettings {
    fn default() -> Self {
        Self {
            max_workers: 8,
            rate_limit_delay: 0.05,
        }
    }
}

/// Analysis mode settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Only analyze repositories that contain the marker file.
    pub marker_only: bool,

    /// Analyze exactly one named repository instead of the organization.
    pub single_repository: Option<String>,

    /// Marker filename used by the fast discovery path.
    pub marker_file: String,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            marker_only: false,
            single_repository: None,
            marker_file: "Jenkinsfile".to_string(),
        }
    }
}

/// Repository-list cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether discovery results are cached between runs.
    pub enabled: bool,

    /// Directory holding cache entries.
    pub directory: PathBuf,

    /// Entry lifetime in seconds.
    pub duration: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from(".cache"),
            duration: 3600,
        }
    }
}

/// Rate budget tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateBudgetSettings {
    /// Remaining-quota level below which every call is slowed down.
    pub low_water_mark: u32,

    /// Re-check quota metadata every Nth call once the cached view is stale.
    pub recheck_interval: u64,
}

impl Default for RateBudgetSettings {
    fn default() -> Self {
        Self {
            low_water_mark: 100,
            recheck_interval: 10,
        }
    }
}

/// How repositories are selected for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Every non-archived, non-empty repository in the organization.
    Full,

    /// Only repositories containing the marker file.
    MarkerOnly,

    /// Exactly one named repository.
    Single(String),
}

impl AnalysisMode {
    /// Stable key fragment used to partition cache entries by mode.
    #[must_use]
    pub fn cache_key(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::MarkerOnly => "marker",
            Self::Single(_) => "single",
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::MarkerOnly => write!(f, "marker-only"),
            Self::Single(name) => write!(f, "single:{name}"),
        }
    }
}

impl Settings {
    /// Loads settings from a YAML file.
    ///
    /// Missing sections fall back to defaults; [`Settings::validate`] is
    /// applied before returning.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, is not valid
    /// YAML, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let settings: Settings = serde_yaml::from_str(&raw).map_err(|e| ConfigError::Yaml {
            path: path.display().to_string(),
            source: e,
        })?;
        settings.validate()?;
        info!(path = %path.display(), organization = %settings.organization, "Loaded configuration");
        Ok(settings)
    }

    /// Returns the effective analysis mode.
    #[must_use]
    pub fn mode(&self) -> AnalysisMode {
        if let Some(name) = &self.analysis.single_repository {
            AnalysisMode::Single(name.clone())
        } else if self.analysis.marker_only {
            AnalysisMode::MarkerOnly
        } else {
            AnalysisMode::Full
        }
    }

    /// Baseline inter-call delay as a [`Duration`].
    #[must_use]
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs_f64(self.parallelism.rate_limit_delay.max(0.0))
    }

    /// Validates the settings, rejecting values that would misbehave at
    /// scan time.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for out-of-range values and
    /// [`ConfigError::InvalidPattern`] for malformed exclusion globs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.organization.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "'organization' is required".to_string(),
            });
        }
        if self.parallelism.max_workers < 1 || self.parallelism.max_workers > MAX_WORKERS {
            return Err(ConfigError::Validation {
                message: format!("max_workers must be between 1 and {MAX_WORKERS}"),
            });
        }
        if !self.parallelism.rate_limit_delay.is_finite() || self.parallelism.rate_limit_delay < 0.0
        {
            return Err(ConfigError::Validation {
                message: "rate_limit_delay must be non-negative".to_string(),
            });
        }
        if self.rate_budget.recheck_interval == 0 {
            return Err(ConfigError::Validation {
                message: "recheck_interval must be at least 1".to_string(),
            });
        }
        if self.analysis.marker_file.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "marker_file must not be empty".to_string(),
            });
        }
        // Surface malformed globs before the scan starts rather than
        // mid-discovery.
        self.exclusions.compile()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn valid_settings() -> Settings {
        Settings {
            organization: "acme".to_string(),
            ..Settings::default()
        }
    }

    #[test]
    fn defaults_are_sensible() {
        let settings = Settings::default();
        assert_eq!(settings.parallelism.max_workers, 8);
        assert_eq!(settings.parallelism.rate_limit_delay, 0.05);
        assert_eq!(settings.rate_budget.low_water_mark, 100);
        assert_eq!(settings.rate_budget.recheck_interval, 10);
        assert_eq!(settings.analysis.marker_file, "Jenkinsfile");
        assert_eq!(settings.caching.duration, 3600);
    }

    #[test]
    fn mode_selection() {
        let mut settings = valid_settings();
        assert_eq!(settings.mode(), AnalysisMode::Full);

        settings.analysis.marker_only = true;
        assert_eq!(settings.mode(), AnalysisMode::MarkerOnly);

        // A single repository target takes precedence over marker mode.
        settings.analysis.single_repository = Some("svc-a".to_string());
        assert_eq!(settings.mode(), AnalysisMode::Single("svc-a".to_string()));
    }

    #[test]
    fn validate_rejects_missing_organization() {
        let settings = Settings::default();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn validate_rejects_worker_count_out_of_range() {
        let mut settings = valid_settings();
        settings.parallelism.max_workers = 0;
        assert!(settings.validate().is_err());

        settings.parallelism.max_workers = MAX_WORKERS + 1;
        assert!(settings.validate().is_err());

        settings.parallelism.max_workers = MAX_WORKERS;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn validate_rejects_negative_delay() {
        let mut settings = valid_settings();
        settings.parallelism.rate_limit_delay = -0.1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn load_from_yaml_with_partial_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(
            &path,
            r#"
organization: acme
parallelism:
  max_workers: 4
exclusions:
  patterns:
    - "terraform-*"
"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.organization, "acme");
        assert_eq!(settings.parallelism.max_workers, 4);
        // Untouched sections keep their defaults.
        assert_eq!(settings.parallelism.rate_limit_delay, 0.05);
        assert_eq!(settings.exclusions.patterns, vec!["terraform-*"]);
    }

    #[test]
    fn load_rejects_invalid_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "organization: [unclosed").unwrap();

        assert!(matches!(
            Settings::load(&path),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn load_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nope.yaml");
        assert!(matches!(Settings::load(&path), Err(ConfigError::Io { .. })));
    }
}
