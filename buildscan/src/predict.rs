//! API usage prediction.
//!
//! A dry-run estimator that forecasts the remote calls a scan would make
//! and classifies the rate-limit risk before anything is fetched. The
//! predictor is a pure function of repository counts, analysis mode and a
//! static per-mode cost model; the only remote call it may trigger is
//! [`estimate_org_size`], used to size an organization when neither a
//! cache entry nor a known count is available.

use crate::github::{ApiError, RepoHost};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Remote calls per repository in full analysis mode: one root listing
/// plus the bounded set of candidate file fetches.
pub const FULL_CALLS_PER_REPOSITORY: u64 = 10;

/// Remote calls per repository in marker-only mode; the marker guarantees
/// a CI descriptor, so fewer candidates are probed blind.
pub const MARKER_CALLS_PER_REPOSITORY: u64 = 6;

/// Remote calls per repository when the host supports bulk fetching
/// multiple files in one operation.
pub const BULK_CALLS_PER_REPOSITORY: u64 = 3;

/// Repositories returned per discovery page.
const REPOS_PER_PAGE: u64 = 100;

/// Organization size estimates are capped here; beyond this the forecast
/// is dominated by per-repository costs anyway.
const ORG_SIZE_ESTIMATE_CAP: u64 = 1000;

/// Cost model selector for the prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostMode {
    /// Full analysis: paginated discovery, per-file fetches.
    Full,

    /// Marker-only analysis: one search call, fewer fetches per repo.
    MarkerOnly,

    /// Bulk-fetch analysis: one search call, bulk content operations.
    BulkFetch,
}

impl CostMode {
    /// Per-repository call cost for this mode.
    #[must_use]
    pub fn calls_per_repository(self) -> u64 {
        match self {
            Self::Full => FULL_CALLS_PER_REPOSITORY,
            Self::MarkerOnly => MARKER_CALLS_PER_REPOSITORY,
            Self::BulkFetch => BULK_CALLS_PER_REPOSITORY,
        }
    }

    /// Discovery call cost for this mode given the organization size.
    #[must_use]
    pub fn discovery_calls(self, total_repositories: u64) -> u64 {
        match self {
            Self::Full => total_repositories.div_ceil(REPOS_PER_PAGE).max(1),
            Self::MarkerOnly | Self::BulkFetch => 1,
        }
    }
}

/// Inputs to the prediction.
#[derive(Debug, Clone)]
pub struct PredictionInput {
    /// Total repositories in the organization.
    pub total_repositories: u64,

    /// Repositories that will actually be analyzed (post-exclusion).
    pub eligible_repositories: u64,

    /// Cost model to apply.
    pub mode: CostMode,

    /// Whether a fresh cache entry covers discovery.
    pub cached: bool,

    /// Remaining quota in the current window.
    pub remaining_quota: u64,

    /// Configured inter-call delay.
    pub delay: Duration,
}

/// Four-level rate-limit risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateRisk {
    /// Under 50% of the remaining quota.
    Safe,

    /// 50–80% of the remaining quota.
    Moderate,

    /// 80–100% of the remaining quota.
    Risky,

    /// Over the remaining quota.
    Exceeded,
}

impl fmt::Display for RateRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Safe => "safe",
            Self::Moderate => "moderate",
            Self::Risky => "risky",
            Self::Exceeded => "exceeded",
        };
        write!(f, "{label}")
    }
}

/// Forecast of a scan's API usage.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    /// Total repositories considered.
    pub total_repositories: u64,

    /// Repositories that would be analyzed.
    pub eligible_repositories: u64,

    /// Calls needed for discovery (zero when served from cache).
    pub discovery_calls: u64,

    /// Calls needed per repository.
    pub calls_per_repository: u64,

    /// Total predicted calls.
    pub total_calls: u64,

    /// Coarse wall-clock estimate from the configured delay.
    #[serde(skip)]
    pub estimated_duration: Duration,

    /// Risk classification against the remaining quota.
    pub risk: RateRisk,

    /// Textual recommendations chosen by threshold rules.
    pub recommendations: Vec<String>,
}

/// Predicts the API usage of a scan. Pure; performs no remote calls.
#[must_use]
pub fn predict(input: &PredictionInput) -> Prediction {
    let discovery_calls = if input.cached {
        0
    } else {
        input.mode.discovery_calls(input.total_repositories)
    };
    let calls_per_repository = input.mode.calls_per_repository();
    let total_calls = discovery_calls + input.eligible_repositories * calls_per_repository;

    let risk = classify_risk(total_calls, input.remaining_quota);
    let estimated_duration = input.delay * u32::try_from(total_calls).unwrap_or(u32::MAX);

    let mut recommendations = Vec::new();
    match risk {
        RateRisk::Exceeded => {
            if input.mode == CostMode::Full {
                recommendations
                    .push("Switch to marker-only mode to reduce API calls".to_string());
            }
            if !input.cached {
                recommendations.push("Enable caching to skip repeated discovery".to_string());
            }
            recommendations.push("Split the scan across multiple quota windows".to_string());
        }
        RateRisk::Risky => {
            if !input.cached {
                recommendations.push("Enable caching to skip repeated discovery".to_string());
            }
            if input.mode == CostMode::Full {
                recommendations
                    .push("Consider marker-only mode to reduce API calls".to_string());
            }
        }
        RateRisk::Moderate => {
            if !input.cached {
                recommendations.push("Enable caching for repeated runs".to_string());
            }
        }
        RateRisk::Safe => {}
    }
    if estimated_duration > Duration::from_secs(3600) {
        recommendations.push(format!(
            "Estimated duration {} minutes; consider running unattended",
            estimated_duration.as_secs() / 60
        ));
    }

    Prediction {
        total_repositories: input.total_repositories,
        eligible_repositories: input.eligible_repositories,
        discovery_calls,
        calls_per_repository,
        total_calls,
        estimated_duration,
        risk,
        recommendations,
    }
}

/// Sizes an organization with a single search call, for use when neither
/// a cache entry nor a full repository count is available.
///
/// # Errors
///
/// Returns [`ApiError`] if the count query fails.
pub async fn estimate_org_size(host: &dyn RepoHost, org: &str) -> Result<u64, ApiError> {
    let count = host.org_repo_count(org).await?;
    Ok(count.min(ORG_SIZE_ESTIMATE_CAP))
}

fn classify_risk(total_calls: u64, remaining: u64) -> RateRisk {
    if total_calls * 100 < remaining * 50 {
        RateRisk::Safe
    } else if total_calls * 100 <= remaining * 80 {
        RateRisk::Moderate
    } else if total_calls <= remaining {
        RateRisk::Risky
    } else {
        RateRisk::Exceeded
    }
}
