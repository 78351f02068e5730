//! Budget-gated content source for worker tasks.

use crate::detect::{ContentSource, FetchError};
use crate::discovery::RepositoryRef;
use crate::github::{ApiError, RepoHost};
use crate::rate_limit::RateBudget;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, warn};

/// [`ContentSource`] that consults the shared rate budget before every
/// remote call, retries transient failures once (consuming budget again),
/// and absorbs quota-exceeded signals via the tracker's wait-and-resume
/// path.
///
/// Fetched content and the root listing are memoized for the lifetime of
/// the repository task, so shared candidate files cost one call each.
pub struct BudgetedSource<'a> {
    host: &'a dyn RepoHost,
    budget: &'a RateBudget,
    repo: &'a RepositoryRef,
    root: Option<Vec<String>>,
    files: HashMap<String, Option<String>>,
}

impl<'a> BudgetedSource<'a> {
    /// Creates a source for one repository task.
    #[must_use]
    pub fn new(host: &'a dyn RepoHost, budget: &'a RateBudget, repo: &'a RepositoryRef) -> Self {
        Self {
            host,
            budget,
            repo,
            root: None,
            files: HashMap::new(),
        }
    }
}

#[async_trait]
impl ContentSource for BudgetedSource<'_> {
    async fn root_entries(&mut self) -> Result<Vec<String>, FetchError> {
        if let Some(entries) = &self.root {
            return Ok(entries.clone());
        }

        let mut retried = false;
        let entries = loop {
            self.budget.before_call(self.host).await;
            match self.host.list_root(self.repo).await {
                Ok(entries) => break entries,
                // A repository with no default branch yet lists as empty.
                Err(ApiError::NotFound) => break Vec::new(),
                Err(ApiError::RateLimited) => {
                    self.budget.handle_exhausted(self.host).await;
                }
                Err(ApiError::Transient(reason)) if !retried => {
                    debug!(repo = %self.repo.name, error = %reason, "Retrying root listing");
                    retried = true;
                }
                Err(ApiError::Transient(reason)) => {
                    return Err(FetchError::Transient {
                        path: "/".to_string(),
                        reason,
                    })
                }
                Err(ApiError::Unavailable(reason)) | Err(ApiError::Other(reason)) => {
                    return Err(FetchError::Unavailable { reason })
                }
            }
        };

        self.root = Some(entries.clone());
        Ok(entries)
    }

    async fn fetch(&mut self, path: &str) -> Result<Option<String>, FetchError> {
        if let Some(content) = self.files.get(path) {
            return Ok(content.clone());
        }

        let mut retried = false;
        let content = loop {
            self.budget.before_call(self.host).await;
            match self.host.fetch_file(self.repo, path).await {
                Ok(content) => break content,
                Err(ApiError::NotFound) => break None,
                Err(ApiError::RateLimited) => {
                    // Authoritative signal despite the tracker's estimate;
                    // wait out the reset and retry transparently.
                    self.budget.handle_exhausted(self.host).await;
                }
                Err(ApiError::Transient(reason)) if !retried => {
                    warn!(
                        repo = %self.repo.name,
                        path,
                        error = %reason,
                        "Transient fetch error, retrying once"
                    );
                    retried = true;
                }
                Err(ApiError::Transient(reason)) => {
                    return Err(FetchError::Transient {
                        path: path.to_string(),
                        reason,
                    })
                }
                Err(ApiError::Unavailable(reason)) | Err(ApiError::Other(reason)) => {
                    return Err(FetchError::Unavailable { reason })
                }
            }
        };

        self.files.insert(path.to_string(), content.clone());
        Ok(content)
    }
}
