//! Repository discovery.
//!
//! Three paths produce the set of repositories to analyze:
//!
//! - **Full discovery** paginates the organization's repository list.
//! - **Marker discovery** code-searches for a marker file (a CI pipeline
//!   descriptor) and resolves each hit, a much cheaper path for large
//!   organizations.
//! - **Single-repository mode** resolves exactly one named repository and
//!   treats its absence as a hard error.
//!
//! Full and marker discovery apply the same skip rules (archived, empty)
//! and configured exclusion rules, and both can be served from the cache
//! instead of the remote API; cache and live discovery are mutually
//! exclusive sources within one run.

mod error;
mod repository;

pub use error::DiscoveryError;
pub use repository::{ExcludedRepository, ExclusionReason, RepositoryRef};

use crate::cache::RepoCache;
use crate::config::{AnalysisMode, CompiledExclusions, ConfigError, ExclusionMatch, Settings};
use crate::github::{ApiError, RepoHost};
use crate::rate_limit::RateBudget;
use tracing::{debug, info, warn};

/// Result of the discovery phase.
#[derive(Debug, Clone)]
pub struct Discovered {
    /// Repositories scheduled for analysis.
    pub eligible: Vec<RepositoryRef>,

    /// Repositories seen but not analyzed, with reasons.
    pub excluded: Vec<ExcludedRepository>,

    /// Whether the repository list came from the cache.
    pub from_cache: bool,
}

impl Discovered {
    /// Total repositories seen by discovery before filtering.
    #[must_use]
    pub fn total(&self) -> usize {
        self.eligible.len() + self.excluded.len()
    }
}

/// Discovers the repositories to analyze according to the configured mode.
///
/// # Errors
///
/// Returns [`DiscoveryError`] on remote API failure or when a single
/// repository target cannot be resolved. Exclusion globs have already been
/// validated by [`Settings::validate`]; a failure here is still surfaced
/// as an API-class error path upstream.
pub async fn discover(
    host: &dyn RepoHost,
    settings: &Settings,
    budget: &RateBudget,
    cache: Option<&RepoCache>,
) -> Result<Discovered, DiscoveryError> {
    let rules = settings
        .exclusions
        .compile()
        .map_err(|e| config_error_to_api(&e))?;

    match settings.mode() {
        AnalysisMode::Single(name) => resolve_single(host, settings, budget, &name).await,
        AnalysisMode::Full => {
            let (repos, from_cache) =
                full_repository_list(host, settings, budget, cache).await?;
            let (eligible, excluded) = partition(repos, &rules);
            info!(
                organization = %settings.organization,
                eligible = eligible.len(),
                excluded = excluded.len(),
                from_cache,
                "Full discovery complete"
            );
            Ok(Discovered {
                eligible,
                excluded,
                from_cache,
            })
        }
        AnalysisMode::MarkerOnly => {
            let (repos, from_cache) =
                marker_repository_list(host, settings, budget, cache).await?;
            let (eligible, excluded) = partition(repos, &rules);
            info!(
                organization = %settings.organization,
                marker = %settings.analysis.marker_file,
                eligible = eligible.len(),
                excluded = excluded.len(),
                from_cache,
                "Marker discovery complete"
            );
            Ok(Discovered {
                eligible,
                excluded,
                from_cache,
            })
        }
    }
}

/// Resolves exactly one named repository.
async fn resolve_single(
    host: &dyn RepoHost,
    settings: &Settings,
    budget: &RateBudget,
    name: &str,
) -> Result<Discovered, DiscoveryError> {
    info!(organization = %settings.organization, repo = name, "Resolving single repository");
    budget.before_call(host).await;
    let repo = match host.get_repo(&settings.organization, name).await {
        Ok(repo) => repo,
        Err(ApiError::NotFound) => {
            return Err(DiscoveryError::RepositoryNotFound {
                org: settings.organization.clone(),
                name: name.to_string(),
            })
        }
        Err(other) => return Err(other.into()),
    };

    if repo.archived {
        warn!(repo = %repo.full_name, "Target repository is archived");
    }

    Ok(Discovered {
        eligible: vec![repo],
        excluded: Vec::new(),
        from_cache: false,
    })
}

/// Returns the full organization repository list, from cache when fresh.
async fn full_repository_list(
    host: &dyn RepoHost,
    settings: &Settings,
    budget: &RateBudget,
    cache: Option<&RepoCache>,
) -> Result<(Vec<RepositoryRef>, bool), DiscoveryError> {
    let mode_key = AnalysisMode::Full.cache_key();
    if let Some(repos) = cache.and_then(|c| c.get(&settings.organization, mode_key)) {
        return Ok((repos, true));
    }

    info!(organization = %settings.organization, "Fetching all repositories");
    budget.before_call(host).await;
    let repos = host.list_org_repos(&settings.organization).await?;

    store(cache, &settings.organization, mode_key, &repos);
    Ok((repos, false))
}

/// Returns the marker-file repository list, from cache when fresh.
///
/// Search hits carry only repository names; each is resolved into a full
/// [`RepositoryRef`] with its own gated call.
async fn marker_repository_list(
    host: &dyn RepoHost,
    settings: &Settings,
    budget: &RateBudget,
    cache: Option<&RepoCache>,
) -> Result<(Vec<RepositoryRef>, bool), DiscoveryError> {
    let mode_key = AnalysisMode::MarkerOnly.cache_key();
    if let Some(repos) = cache.and_then(|c| c.get(&settings.organization, mode_key)) {
        return Ok((repos, true));
    }

    info!(
        organization = %settings.organization,
        marker = %settings.analysis.marker_file,
        "Searching for repositories with marker file"
    );
    budget.before_call(host).await;
    let names = host
        .search_repos_with_file(&settings.organization, &settings.analysis.marker_file)
        .await?;

    let mut repos = Vec::with_capacity(names.len());
    for name in names {
        budget.before_call(host).await;
        match host.get_repo(&settings.organization, &name).await {
            Ok(repo) => repos.push(repo),
            Err(ApiError::NotFound) => {
                // A hit can disappear between search and resolve.
                debug!(repo = %name, "Search hit vanished before resolution");
            }
            Err(other) => return Err(other.into()),
        }
    }

    store(cache, &settings.organization, mode_key, &repos);
    Ok((repos, false))
}

fn store(cache: Option<&RepoCache>, organization: &str, mode: &str, repos: &[RepositoryRef]) {
    if let Some(cache) = cache {
        if let Err(err) = cache.put(organization, mode, repos) {
            warn!(error = %err, "Failed to save repository list to cache");
        }
    }
}

/// Splits a discovered list into eligible repositories and excluded ones
/// with reasons. Implicit skip rules (archived, empty) are checked before
/// the configured exclusion rules.
fn partition(
    repos: Vec<RepositoryRef>,
    rules: &CompiledExclusions,
) -> (Vec<RepositoryRef>, Vec<ExcludedRepository>) {
    let mut eligible = Vec::new();
    let mut excluded = Vec::new();

    for repo in repos {
        let reason = if repo.archived {
            Some(ExclusionReason::Archived)
        } else if repo.empty {
            Some(ExclusionReason::Empty)
        } else if repo.fork && rules.skip_forks() {
            Some(ExclusionReason::Fork)
        } else {
            rules.matches(&repo.name).map(|m| match m {
                ExclusionMatch::ExactName => ExclusionReason::ExcludedByName,
                ExclusionMatch::Pattern(pattern) => ExclusionReason::ExcludedByPattern { pattern },
            })
        };

        match reason {
            Some(reason) => {
                debug!(repo = %repo.name, reason = %reason, "Repository not scheduled");
                excluded.push(ExcludedRepository {
                    name: repo.name,
                    reason,
                });
            }
            None => eligible.push(repo),
        }
    }

    (eligible, excluded)
}

// Exclusion rules are validated at configuration time, so a compile
// failure here indicates the settings object was constructed without
// validation. Surfaced as an API-class error to keep the discovery
// signature focused.
fn config_error_to_api(err: &ConfigError) -> ApiError {
    ApiError::Other(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExclusionSettings;

    fn repo(name: &str) -> RepositoryRef {
        RepositoryRef::named("acme", name)
    }

    fn rules(patterns: &[&str]) -> CompiledExclusions {
        ExclusionSettings {
            repositories: vec!["wiki-content".to_string()],
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
            skip_forks: false,
        }
        .compile()
        .unwrap()
    }

    #[test]
    fn partition_applies_skip_and_exclusion_rules() {
        let mut archived = repo("old-svc");
        archived.archived = true;
        let mut empty = repo("empty-svc");
        empty.empty = true;

        let repos = vec![
            repo("svc-a"),
            archived,
            empty,
            repo("terraform-aws"),
            repo("wiki-content"),
        ];

        let (eligible, excluded) = partition(repos, &rules(&["terraform-*"]));

        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].name, "svc-a");
        assert_eq!(excluded.len(), 4);

        let reason_of = |name: &str| {
            excluded
                .iter()
                .find(|e| e.name == name)
                .map(|e| e.reason.clone())
                .unwrap()
        };
        assert_eq!(reason_of("old-svc"), ExclusionReason::Archived);
        assert_eq!(reason_of("empty-svc"), ExclusionReason::Empty);
        assert_eq!(
            reason_of("terraform-aws"),
            ExclusionReason::ExcludedByPattern {
                pattern: "terraform-*".to_string()
            }
        );
        assert_eq!(reason_of("wiki-content"), ExclusionReason::ExcludedByName);
    }

    #[test]
    fn partition_is_a_true_partition() {
        let repos: Vec<_> = ["svc-a", "svc-b", "terraform-x", "legacy-api"]
            .iter()
            .map(|n| repo(n))
            .collect();
        let total = repos.len();

        let (eligible, excluded) = partition(repos, &rules(&["terraform-*", "legacy-*"]));

        assert_eq!(eligible.len() + excluded.len(), total);
        for repo in &eligible {
            assert!(
                !excluded.iter().any(|e| e.name == repo.name),
                "{} is both eligible and excluded",
                repo.name
            );
        }
    }

    #[test]
    fn forks_skipped_only_when_configured() {
        let mut forked = repo("svc-fork");
        forked.fork = true;

        let keep = ExclusionSettings::default().compile().unwrap();
        let (eligible, excluded) = partition(vec![forked.clone()], &keep);
        assert_eq!(eligible.len(), 1);
        assert!(excluded.is_empty());

        let skip = ExclusionSettings {
            skip_forks: true,
            ..ExclusionSettings::default()
        }
        .compile()
        .unwrap();
        let (eligible, excluded) = partition(vec![forked], &skip);
        assert!(eligible.is_empty());
        assert_eq!(excluded[0].reason, ExclusionReason::Fork);
    }
}
