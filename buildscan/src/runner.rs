//! Concurrent analysis orchestration.
//!
//! [`Runner`] drives a full scan: discovery (optionally served from the
//! cache), fan-out of one task per repository across a bounded worker
//! pool, budget-gated fetching, detection, and report assembly. Failures
//! are isolated at repository granularity — a run always terminates with
//! a report, even if every repository failed.

mod error;
mod outcome;
mod progress;
mod source;

pub use error::RunnerError;
pub use outcome::RepoOutcome;
pub use progress::ScanProgress;
pub use source::BudgetedSource;

use crate::cache::RepoCache;
use crate::config::Settings;
use crate::detect::DetectionEngine;
use crate::discovery::{discover, RepositoryRef};
use crate::github::RepoHost;
use crate::rate_limit::RateBudget;
use crate::report::AnalysisReport;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Orchestrates a full organization scan.
pub struct Runner {
    settings: Settings,
    host: Arc<dyn RepoHost>,
    budget: Arc<RateBudget>,
    cache: Option<RepoCache>,
    engine: Arc<DetectionEngine>,
    progress: Arc<ScanProgress>,
}

impl Runner {
    /// Builds a runner from resolved settings and a repository host.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] if the settings are invalid or the built-in
    /// detection rules fail to compile.
    pub fn new(settings: Settings, host: Arc<dyn RepoHost>) -> Result<Self, RunnerError> {
        settings.validate()?;
        let engine = Arc::new(DetectionEngine::builtin()?);
        let budget = Arc::new(RateBudget::from_settings(&settings));
        let cache = settings.caching.enabled.then(|| {
            RepoCache::new(
                settings.caching.directory.clone(),
                Duration::from_secs(settings.caching.duration),
            )
        });
        Ok(Self {
            settings,
            host,
            budget,
            cache,
            engine,
            progress: Arc::new(ScanProgress::new()),
        })
    }

    /// Progress counters, observable while [`Runner::run`] is in flight.
    #[must_use]
    pub fn progress(&self) -> Arc<ScanProgress> {
        Arc::clone(&self.progress)
    }

    /// The shared rate budget tracker.
    #[must_use]
    pub fn budget(&self) -> Arc<RateBudget> {
        Arc::clone(&self.budget)
    }

    /// Executes the full scan and assembles the report.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] only for failures before the concurrent
    /// phase (configuration, discovery, an unresolvable single-repository
    /// target). Per-repository failures are recorded in the report.
    pub async fn run(&self) -> Result<AnalysisReport, RunnerError> {
        let discovered = discover(
            self.host.as_ref(),
            &self.settings,
            &self.budget,
            self.cache.as_ref(),
        )
        .await?;

        info!(
            organization = %self.settings.organization,
            mode = %self.settings.mode(),
            eligible = discovered.eligible.len(),
            excluded = discovered.excluded.len(),
            workers = self.settings.parallelism.max_workers,
            "Starting analysis"
        );

        let outcomes: Vec<RepoOutcome> = stream::iter(discovered.eligible.clone())
            .map(|repo| {
                let host = Arc::clone(&self.host);
                let budget = Arc::clone(&self.budget);
                let engine = Arc::clone(&self.engine);
                let progress = Arc::clone(&self.progress);
                async move {
                    analyze_repository(host.as_ref(), &budget, &engine, &repo, &progress).await
                }
            })
            .buffer_unordered(self.settings.parallelism.max_workers)
            .collect()
            .await;

        let api_calls = self.budget.calls_made().await;
        info!(
            analyzed = self.progress.completed(),
            failed = self.progress.failed(),
            api_calls,
            "Analysis complete"
        );

        Ok(AnalysisReport::assemble(
            &self.settings.organization,
            &self.settings.mode(),
            discovered,
            outcomes,
            api_calls,
            self.settings.parallelism.max_workers,
        ))
    }
}

/// Analyzes one repository, containing every failure within the task.
async fn analyze_repository(
    host: &dyn RepoHost,
    budget: &RateBudget,
    engine: &DetectionEngine,
    repo: &RepositoryRef,
    progress: &ScanProgress,
) -> RepoOutcome {
    progress.record_started();
    info!(repo = %repo.full_name, "Analyzing repository");

    let mut source = BudgetedSource::new(host, budget, repo);
    match engine.detect(repo, &mut source).await {
        Ok(findings) if findings.is_empty() => {
            progress.record_completed();
            RepoOutcome::NoBuildConfig {
                repository: repo.name.clone(),
            }
        }
        Ok(findings) => {
            progress.record_completed();
            RepoOutcome::Analyzed {
                repository: repo.name.clone(),
                findings,
            }
        }
        Err(err) => {
            progress.record_failed();
            warn!(repo = %repo.full_name, error = %err, "Could not analyze repository");
            RepoOutcome::Failed {
                repository: repo.name.clone(),
                reason: err.to_string(),
            }
        }
    }
}
