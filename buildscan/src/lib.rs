#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

pub mod cache;
pub mod config;
pub mod detect;
pub mod discovery;
pub mod github;
pub mod predict;
pub mod rate_limit;
pub mod report;
pub mod runner;

pub use cache::{CacheEntryInfo, CacheError, CacheRecord, RepoCache};
pub use config::{AnalysisMode, ConfigError, ExclusionSettings, Settings};
pub use detect::{
    builtin_rules, ContentSource, DetectionEngine, FetchError, Finding, StaticSource,
};
pub use discovery::{
    discover, Discovered, DiscoveryError, ExcludedRepository, ExclusionReason, RepositoryRef,
};
pub use github::{ApiError, GitHubHost, RepoHost};
pub use predict::{estimate_org_size, predict, CostMode, Prediction, PredictionInput, RateRisk};
pub use rate_limit::{RateBudget, RateLimitInfo};
pub use report::AnalysisReport;
pub use runner::{RepoOutcome, Runner, RunnerError, ScanProgress};
