//! Shared API rate budget tracking.
//!
//! [`RateBudget`] is the single serialization point shared by every
//! concurrent repository task: each remote call first goes through
//! [`RateBudget::before_call`], which applies the inter-call delay, slows
//! down as the remaining quota shrinks, and blocks until the reset time
//! when the quota is exhausted. Quota metadata is refreshed sparingly so
//! monitoring the budget does not itself double the call volume.

mod info;

pub use info::RateLimitInfo;

use crate::github::RepoHost;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How long quota metadata from the remote API is trusted.
const QUOTA_TRUST: Duration = Duration::from_secs(30);

/// Safety margin added when waiting out a quota reset.
const RESET_MARGIN: Duration = Duration::from_secs(1);

/// Maximum time to wait for a rate limit reset (1 hour).
const MAX_WAIT_SECS: u64 = 3600;

/// Tracks the shared remote-call budget and paces callers.
///
/// Safe for concurrent use: all state lives behind one async mutex, which
/// is held only to read or update bookkeeping — never across a sleep — so
/// a task waiting out a reset does not starve its siblings' accounting.
pub struct RateBudget {
    base_delay: Duration,
    low_water: u32,
    recheck_interval: u64,
    state: Mutex<BudgetState>,
}

#[derive(Default)]
struct BudgetState {
    calls_made: u64,
    info: Option<RateLimitInfo>,
    last_refresh: Option<Instant>,
}

enum Pacing {
    Sleep(Duration),
    WaitForReset(Duration),
    AssumeReset,
}

impl RateBudget {
    /// Creates a tracker with the given baseline delay, low-water mark and
    /// quota recheck interval.
    #[must_use]
    pub fn new(base_delay: Duration, low_water: u32, recheck_interval: u64) -> Self {
        Self {
            base_delay,
            low_water,
            recheck_interval: recheck_interval.max(1),
            state: Mutex::new(BudgetState::default()),
        }
    }

    /// Creates a tracker from resolved settings.
    #[must_use]
    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        Self::new(
            settings.rate_limit_delay(),
            settings.rate_budget.low_water_mark,
            settings.rate_budget.recheck_interval,
        )
    }

    /// Gates one remote call: refreshes quota metadata when due, applies
    /// the computed inter-call delay, and blocks until the reset time when
    /// the budget is exhausted.
    ///
    /// A failed quota refresh is logged and ignored; pacing then falls
    /// back to the baseline delay rather than failing the caller.
    pub async fn before_call(&self, host: &dyn RepoHost) {
        let (refresh_due, first_call) = {
            let mut state = self.state.lock().await;
            state.calls_made += 1;
            let stale = state
                .last_refresh
                .map_or(true, |at| at.elapsed() >= QUOTA_TRUST);
            let due = state.info.is_none()
                || (stale && (state.calls_made - 1) % self.recheck_interval == 0);
            (due, state.calls_made == 1)
        };

        if refresh_due {
            self.refresh(host).await;
        }

        loop {
            let pacing = {
                let state = self.state.lock().await;
                match &state.info {
                    Some(info) if info.remaining == 0 => {
                        let wait = wait_until_reset(info);
                        if wait.is_zero() {
                            Pacing::AssumeReset
                        } else {
                            Pacing::WaitForReset(wait)
                        }
                    }
                    Some(info) => Pacing::Sleep(self.delay_for(info.remaining, first_call)),
                    None => Pacing::Sleep(if first_call {
                        Duration::ZERO
                    } else {
                        self.base_delay
                    }),
                }
            };

            match pacing {
                Pacing::Sleep(delay) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    return;
                }
                Pacing::WaitForReset(wait) => {
                    warn!(
                        wait_secs = wait.as_secs(),
                        "Rate budget exhausted, waiting for reset"
                    );
                    tokio::time::sleep(wait).await;
                    self.refresh(host).await;
                }
                Pacing::AssumeReset => {
                    // The recorded reset time has passed but no fresh quota
                    // view is available; assume the window rolled over.
                    debug!("Reset time passed without fresh quota info, resuming");
                    let mut state = self.state.lock().await;
                    state.info = None;
                    state.last_refresh = None;
                }
            }
        }
    }

    /// Handles an authoritative "quota exceeded" signal from the remote
    /// API: records the exhausted state and waits out the reset so the
    /// caller can retry transparently.
    pub async fn handle_exhausted(&self, host: &dyn RepoHost) {
        {
            let mut state = self.state.lock().await;
            let now = unix_now();
            let info = state.info.get_or_insert(RateLimitInfo {
                remaining: 0,
                reset: now + 60,
                limit: 0,
            });
            info.remaining = 0;
            if info.reset <= now {
                info.reset = now + 60;
            }
            state.last_refresh = Some(Instant::now());
        }

        loop {
            let wait = {
                let state = self.state.lock().await;
                match &state.info {
                    Some(info) if info.remaining == 0 => wait_until_reset(info),
                    _ => return,
                }
            };
            if wait.is_zero() {
                let mut state = self.state.lock().await;
                state.info = None;
                state.last_refresh = None;
                return;
            }
            warn!(
                wait_secs = wait.as_secs(),
                "Remote reported quota exceeded, waiting for reset"
            );
            tokio::time::sleep(wait).await;
            self.refresh(host).await;
        }
    }

    /// Installs an authoritative quota snapshot, e.g. from response
    /// metadata.
    pub async fn record_quota(&self, info: RateLimitInfo) {
        let mut state = self.state.lock().await;
        state.info = Some(info);
        state.last_refresh = Some(Instant::now());
    }

    /// Number of remote calls gated so far.
    pub async fn calls_made(&self) -> u64 {
        self.state.lock().await.calls_made
    }

    /// Last known remaining quota, if any refresh has happened.
    pub async fn remaining(&self) -> Option<u32> {
        self.state.lock().await.info.map(|info| info.remaining)
    }

    /// Delay applied before a call given the remaining quota.
    ///
    /// At or above the low-water mark this is the baseline delay; below
    /// it, the delay grows by one baseline unit per missing quota point,
    /// so calls slow down monotonically as the budget shrinks.
    #[must_use]
    pub fn delay_for(&self, remaining: u32, first_call: bool) -> Duration {
        if remaining >= self.low_water {
            if first_call {
                Duration::ZERO
            } else {
                self.base_delay
            }
        } else {
            self.base_delay * (1 + (self.low_water - remaining))
        }
    }

    async fn refresh(&self, host: &dyn RepoHost) {
        match host.quota().await {
            Ok(info) => {
                debug!(
                    remaining = info.remaining,
                    limit = info.limit,
                    "Refreshed rate quota"
                );
                if info.remaining < self.low_water {
                    info!(
                        remaining = info.remaining,
                        low_water = self.low_water,
                        "Rate budget running low, slowing down"
                    );
                }
                let mut state = self.state.lock().await;
                state.info = Some(info);
                state.last_refresh = Some(Instant::now());
            }
            Err(err) => {
                warn!(error = %err, "Could not refresh rate quota");
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Time to wait until the recorded reset, capped and with a safety margin.
fn wait_until_reset(info: &RateLimitInfo) -> Duration {
    let now = unix_now();
    if info.reset <= now {
        return Duration::ZERO;
    }
    let wait_secs = (info.reset - now).min(MAX_WAIT_SECS);
    Duration::from_secs(wait_secs) + RESET_MARGIN
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::RepositoryRef;
    use crate::github::{ApiError, RepoHost};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Host that serves a fixed quota sequence.
    struct QuotaHost {
        remaining: AtomicU32,
        reset: u64,
        limit: u32,
    }

    impl QuotaHost {
        fn with_remaining(remaining: u32) -> Self {
            Self {
                remaining: AtomicU32::new(remaining),
                reset: unix_now() + 120,
                limit: 5000,
            }
        }
    }

    #[async_trait]
    impl RepoHost for QuotaHost {
        async fn list_org_repos(&self, _org: &str) -> Result<Vec<RepositoryRef>, ApiError> {
            unimplemented!()
        }

        async fn search_repos_with_file(
            &self,
            _org: &str,
            _filename: &str,
        ) -> Result<Vec<String>, ApiError> {
            unimplemented!()
        }

        async fn org_repo_count(&self, _org: &str) -> Result<u64, ApiError> {
            unimplemented!()
        }

        async fn get_repo(&self, _org: &str, _name: &str) -> Result<RepositoryRef, ApiError> {
            unimplemented!()
        }

        async fn fetch_file(
            &self,
            _repo: &RepositoryRef,
            _path: &str,
        ) -> Result<Option<String>, ApiError> {
            unimplemented!()
        }

        async fn list_root(&self, _repo: &RepositoryRef) -> Result<Vec<String>, ApiError> {
            unimplemented!()
        }

        async fn quota(&self) -> Result<RateLimitInfo, ApiError> {
            Ok(RateLimitInfo {
                remaining: self.remaining.load(Ordering::SeqCst),
                reset: self.reset,
                limit: self.limit,
            })
        }
    }

    fn budget() -> RateBudget {
        RateBudget::new(Duration::from_millis(50), 100, 10)
    }

    #[test]
    fn delay_is_baseline_above_low_water() {
        let budget = budget();
        assert_eq!(
            budget.delay_for(5000, false),
            Duration::from_millis(50)
        );
        assert_eq!(budget.delay_for(100, false), Duration::from_millis(50));
    }

    #[test]
    fn delay_grows_monotonically_below_low_water() {
        let budget = budget();
        let mut previous = budget.delay_for(100, false);
        for remaining in (1..100).rev() {
            let delay = budget.delay_for(remaining, false);
            assert!(
                delay >= previous,
                "delay shrank at remaining={remaining}: {delay:?} < {previous:?}"
            );
            assert!(delay >= Duration::from_millis(50));
            previous = delay;
        }
    }

    #[test]
    fn low_quota_delay_applies_even_on_first_call() {
        let budget = budget();
        assert_eq!(budget.delay_for(5000, true), Duration::ZERO);
        assert!(budget.delay_for(50, true) > Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn counts_calls() {
        let budget = budget();
        let host = QuotaHost::with_remaining(5000);
        budget.before_call(&host).await;
        budget.before_call(&host).await;
        budget.before_call(&host).await;
        assert_eq!(budget.calls_made().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_blocks_until_reset() {
        let budget = budget();
        let host = QuotaHost::with_remaining(5000);
        budget
            .record_quota(RateLimitInfo {
                remaining: 0,
                reset: unix_now() + 90,
                limit: 5000,
            })
            .await;

        let started = tokio::time::Instant::now();
        budget.before_call(&host).await;

        // Auto-advanced virtual time must cover the wait until reset; the
        // refresh afterwards restores a healthy quota and lets the call
        // proceed.
        assert!(started.elapsed() >= Duration::from_secs(89));
    }

    #[tokio::test(start_paused = true)]
    async fn handle_exhausted_waits_then_resumes() {
        let budget = budget();
        let host = QuotaHost::with_remaining(4000);

        let started = tokio::time::Instant::now();
        budget.handle_exhausted(&host).await;
        assert!(started.elapsed() >= Duration::from_secs(59));

        // The follow-up refresh cleared the exhausted state.
        assert_eq!(budget.remaining().await, Some(4000));
    }

    #[test]
    fn wait_until_reset_in_past_is_zero() {
        let info = RateLimitInfo {
            remaining: 0,
            reset: 0,
            limit: 5000,
        };
        assert_eq!(wait_until_reset(&info), Duration::ZERO);
    }
}
