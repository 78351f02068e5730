//! Analysis report assembly.
//!
//! Findings arrive from worker tasks in completion order, which is not
//! deterministic. Assembly sorts and groups everything by stable keys so
//! two scans over unchanged content produce byte-identical reports
//! regardless of worker count.

use crate::config::AnalysisMode;
use crate::detect::{Finding, ARTIFACTORY_TOOL};
use crate::discovery::{Discovered, ExcludedRepository};
use crate::runner::RepoOutcome;
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregated result of one scan. Immutable once assembled.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Organization that was scanned.
    pub organization: String,

    /// Analysis mode the scan ran in.
    pub mode: String,

    /// All findings, sorted by tool, repository, file path and version.
    pub findings: Vec<Finding>,

    /// Tool → version → repositories groupings (dependency repository
    /// references are grouped separately below).
    pub tools: Vec<ToolUsage>,

    /// Dependency repository (Artifactory) usage groupings.
    pub dependency_repositories: Vec<DependencyRepositoryUsage>,

    /// Repositories analyzed without any build configuration found.
    pub no_build_config: Vec<String>,

    /// Repositories excluded by policy or skip rules, with reasons.
    pub excluded: Vec<ExcludedRepository>,

    /// Repositories that could not be analyzed, with reasons.
    pub failed: Vec<FailedRepository>,

    /// Run statistics.
    pub stats: RunStats,
}

/// Versions of one tool across the organization.
#[derive(Debug, Clone, Serialize)]
pub struct ToolUsage {
    /// Tool name.
    pub tool: String,

    /// Versions in use, sorted.
    pub versions: Vec<VersionUsage>,
}

/// Repositories using one specific tool version.
#[derive(Debug, Clone, Serialize)]
pub struct VersionUsage {
    /// Version string ("unknown" when none was extracted).
    pub version: String,

    /// Repositories using this version, sorted.
    pub repositories: Vec<String>,
}

/// Repositories referencing one dependency repository.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyRepositoryUsage {
    /// Referenced repository id (e.g. "libs-release").
    pub repository_id: String,

    /// Repositories referencing it, sorted.
    pub used_by: Vec<String>,
}

/// A repository that could not be analyzed.
#[derive(Debug, Clone, Serialize)]
pub struct FailedRepository {
    /// Repository name.
    pub repository: String,

    /// Why analysis failed.
    pub reason: String,
}

/// Scan statistics.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    /// Repositories seen by discovery before filtering.
    pub repositories_discovered: usize,

    /// Repositories analyzed to completion.
    pub repositories_analyzed: usize,

    /// Repositories that failed analysis.
    pub repositories_failed: usize,

    /// Repositories excluded or skipped.
    pub repositories_excluded: usize,

    /// Total findings.
    pub findings: usize,

    /// Remote calls gated by the rate budget.
    pub api_calls: u64,

    /// Worker pool size used.
    pub workers: usize,

    /// Whether the repository list came from the cache.
    pub from_cache: bool,
}

impl AnalysisReport {
    /// Assembles the final report from discovery results and per-task
    /// outcomes, sorting every collection deterministically.
    #[must_use]
    pub fn assemble(
        organization: &str,
        mode: &AnalysisMode,
        discovered: Discovered,
        outcomes: Vec<RepoOutcome>,
        api_calls: u64,
        workers: usize,
    ) -> Self {
        let mut findings = Vec::new();
        let mut no_build_config = Vec::new();
        let mut failed = Vec::new();
        let mut analyzed = 0usize;

        for outcome in outcomes {
            match outcome {
                RepoOutcome::Analyzed {
                    findings: repo_findings,
                    ..
                } => {
                    analyzed += 1;
                    findings.extend(repo_findings);
                }
                RepoOutcome::NoBuildConfig { repository } => {
                    analyzed += 1;
                    no_build_config.push(repository);
                }
                RepoOutcome::Failed { repository, reason } => {
                    failed.push(FailedRepository { repository, reason });
                }
            }
        }

        findings.sort_by(|a, b| {
            (&a.tool, &a.repository, &a.file_path, &a.version)
                .cmp(&(&b.tool, &b.repository, &b.file_path, &b.version))
        });
        no_build_config.sort();
        failed.sort_by(|a, b| a.repository.cmp(&b.repository));

        let mut excluded = discovered.excluded.clone();
        excluded.sort_by(|a, b| a.name.cmp(&b.name));

        let stats = RunStats {
            repositories_discovered: discovered.total(),
            repositories_analyzed: analyzed,
            repositories_failed: failed.len(),
            repositories_excluded: excluded.len(),
            findings: findings.len(),
            api_calls,
            workers,
            from_cache: discovered.from_cache,
        };

        Self {
            organization: organization.to_string(),
            mode: mode.to_string(),
            tools: group_tools(&findings),
            dependency_repositories: group_dependency_repositories(&findings),
            findings,
            no_build_config,
            excluded,
            failed,
            stats,
        }
    }

    /// True when at least one repository could not be analyzed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Groups non-Artifactory findings by tool, then version.
fn group_tools(findings: &[Finding]) -> Vec<ToolUsage> {
    let mut by_tool: BTreeMap<&str, BTreeMap<&str, Vec<&str>>> = BTreeMap::new();
    for finding in findings {
        if finding.tool == ARTIFACTORY_TOOL {
            continue;
        }
        by_tool
            .entry(&finding.tool)
            .or_default()
            .entry(finding.version.as_deref().unwrap_or("unknown"))
            .or_default()
            .push(&finding.repository);
    }

    by_tool
        .into_iter()
        .map(|(tool, versions)| ToolUsage {
            tool: tool.to_string(),
            versions: versions
                .into_iter()
                .map(|(version, mut repositories)| {
                    repositories.sort_unstable();
                    repositories.dedup();
                    VersionUsage {
                        version: version.to_string(),
                        repositories: repositories.iter().map(|r| r.to_string()).collect(),
                    }
                })
                .collect(),
        })
        .collect()
}

/// Groups Artifactory findings by the referenced repository id.
fn group_dependency_repositories(findings: &[Finding]) -> Vec<DependencyRepositoryUsage> {
    let mut by_id: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for finding in findings {
        if finding.tool != ARTIFACTORY_TOOL {
            continue;
        }
        by_id
            .entry(finding.version.as_deref().unwrap_or("unknown"))
            .or_default()
            .push(&finding.repository);
    }

    by_id
        .into_iter()
        .map(|(id, mut used_by)| {
            used_by.sort_unstable();
            used_by.dedup();
            DependencyRepositoryUsage {
                repository_id: id.to_string(),
                used_by: used_by.iter().map(|r| r.to_string()).collect(),
            }
        })
        .collect()
}
