//! Remote repository host boundary.
//!
//! [`RepoHost`] is the seam between the scanner and the GitHub REST API:
//! every remote operation the scanner performs goes through it, which keeps
//! discovery and orchestration testable against an in-memory fake.
//! [`GitHubHost`] is the octocrab-backed production implementation.

mod error;

pub use error::ApiError;

use crate::discovery::RepositoryRef;
use crate::rate_limit::RateLimitInfo;
use async_trait::async_trait;
use octocrab::Octocrab;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Results per page for list and search calls.
const RESULTS_PER_PAGE: u8 = 100;

/// Maximum results taken from a code search.
const MAX_SEARCH_RESULTS: usize = 1000;

/// Remote repository host operations consumed by the scanner.
///
/// All operations are idempotent reads. Implementations must be safe to
/// share across concurrent repository tasks.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Lists all repositories of an organization, paginating internally.
    async fn list_org_repos(&self, org: &str) -> Result<Vec<RepositoryRef>, ApiError>;

    /// Searches the organization for repositories containing `filename`,
    /// returning deduplicated repository names.
    async fn search_repos_with_file(
        &self,
        org: &str,
        filename: &str,
    ) -> Result<Vec<String>, ApiError>;

    /// Returns the total repository count of an organization without
    /// enumerating it.
    async fn org_repo_count(&self, org: &str) -> Result<u64, ApiError>;

    /// Resolves a single repository by name.
    async fn get_repo(&self, org: &str, name: &str) -> Result<RepositoryRef, ApiError>;

    /// Fetches one file's content from the repository's default branch.
    ///
    /// Returns `Ok(None)` when the file does not exist; absence of an
    /// optional file is a normal negative result, not an error.
    async fn fetch_file(
        &self,
        repo: &RepositoryRef,
        path: &str,
    ) -> Result<Option<String>, ApiError>;

    /// Lists the paths of the repository's root directory entries.
    async fn list_root(&self, repo: &RepositoryRef) -> Result<Vec<String>, ApiError>;

    /// Reads the current core rate quota.
    async fn quota(&self) -> Result<RateLimitInfo, ApiError>;
}

/// Octocrab-backed [`RepoHost`] implementation.
pub struct GitHubHost {
    octocrab: Octocrab,
}

impl GitHubHost {
    /// Builds a host from a personal access token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the underlying client cannot be constructed.
    pub fn new(token: String) -> Result<Self, ApiError> {
        let octocrab = Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(ApiError::classify)?;
        Ok(Self { octocrab })
    }
}

/// Converts an octocrab repository model into a [`RepositoryRef`].
fn repo_ref_from(repo: &octocrab::models::Repository) -> Option<RepositoryRef> {
    let owner = repo.owner.as_ref()?.login.clone();
    let name = repo.name.clone();
    Some(RepositoryRef {
        full_name: format!("{owner}/{name}"),
        owner,
        name,
        default_branch: repo
            .default_branch
            .clone()
            .unwrap_or_else(|| "main".to_string()),
        archived: repo.archived.unwrap_or(false),
        fork: repo.fork.unwrap_or(false),
        empty: repo.size.map(|size| size == 0).unwrap_or(false),
    })
}

#[async_trait]
impl RepoHost for GitHubHost {
    async fn list_org_repos(&self, org: &str) -> Result<Vec<RepositoryRef>, ApiError> {
        let mut page = self
            .octocrab
            .orgs(org)
            .list_repos()
            .per_page(RESULTS_PER_PAGE)
            .send()
            .await
            .map_err(ApiError::classify)?;

        let mut repos: Vec<RepositoryRef> = page.items.iter().filter_map(repo_ref_from).collect();

        while let Some(next_page) = self
            .octocrab
            .get_page::<octocrab::models::Repository>(&page.next)
            .await
            .map_err(ApiError::classify)?
        {
            repos.extend(next_page.items.iter().filter_map(repo_ref_from));
            page.next = next_page.next;
            if page.next.is_none() {
                break;
            }
        }

        debug!(org, count = repos.len(), "Listed organization repositories");
        Ok(repos)
    }

    async fn search_repos_with_file(
        &self,
        org: &str,
        filename: &str,
    ) -> Result<Vec<String>, ApiError> {
        let query = format!("org:{org} filename:{filename}");
        debug!(query = %query, "Executing code search");

        let mut page = self
            .octocrab
            .search()
            .code(&query)
            .per_page(RESULTS_PER_PAGE)
            .send()
            .await
            .map_err(ApiError::classify)?;

        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for item in &page.items {
            let name = item.repository.name.clone();
            if seen.insert(name.clone()) {
                names.push(name);
            }
        }

        while let Some(next_page) = self
            .octocrab
            .get_page::<octocrab::models::Code>(&page.next)
            .await
            .map_err(ApiError::classify)?
        {
            if names.len() >= MAX_SEARCH_RESULTS {
                warn!(max = MAX_SEARCH_RESULTS, "Reached maximum search results");
                break;
            }
            for item in &next_page.items {
                let name = item.repository.name.clone();
                if seen.insert(name.clone()) {
                    names.push(name);
                }
            }
            page.next = next_page.next;
            if page.next.is_none() {
                break;
            }
        }

        Ok(names)
    }

    async fn org_repo_count(&self, org: &str) -> Result<u64, ApiError> {
        let query = format!("org:{org}");
        let page = self
            .octocrab
            .search()
            .repositories(&query)
            .per_page(1)
            .send()
            .await
            .map_err(ApiError::classify)?;
        Ok(page.total_count.unwrap_or(0))
    }

    async fn get_repo(&self, org: &str, name: &str) -> Result<RepositoryRef, ApiError> {
        let repo = self
            .octocrab
            .repos(org, name)
            .get()
            .await
            .map_err(ApiError::classify)?;
        repo_ref_from(&repo)
            .ok_or_else(|| ApiError::Other(format!("repository {org}/{name} has no owner")))
    }

    async fn fetch_file(
        &self,
        repo: &RepositoryRef,
        path: &str,
    ) -> Result<Option<String>, ApiError> {
        let result = self
            .octocrab
            .repos(&repo.owner, &repo.name)
            .get_content()
            .path(path)
            .r#ref(&repo.default_branch)
            .send()
            .await;

        match result {
            Ok(contents) => Ok(contents
                .items
                .into_iter()
                .next()
                .and_then(|item| item.decoded_content())),
            Err(err) => match ApiError::classify(err) {
                ApiError::NotFound => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn list_root(&self, repo: &RepositoryRef) -> Result<Vec<String>, ApiError> {
        let contents = self
            .octocrab
            .repos(&repo.owner, &repo.name)
            .get_content()
            .r#ref(&repo.default_branch)
            .send()
            .await
            .map_err(ApiError::classify)?;
        Ok(contents.items.into_iter().map(|item| item.path).collect())
    }

    async fn quota(&self) -> Result<RateLimitInfo, ApiError> {
        let rate_limit = self
            .octocrab
            .ratelimit()
            .get()
            .await
            .map_err(ApiError::classify)?;
        let core = &rate_limit.resources.core;
        Ok(RateLimitInfo {
            remaining: core.remaining as u32,
            reset: core.reset,
            limit: core.limit as u32,
        })
    }
}
