//! CLI for buildscan.
//!
//! Scans a GitHub organization for build tool configurations and reports
//! tool versions, Java versions and Artifactory repository usage. Also
//! exposes the usage predictor (`--predict`) and a cache management
//! subcommand group.

use buildscan::{
    estimate_org_size, predict, AnalysisMode, AnalysisReport, CostMode, GitHubHost,
    PredictionInput, RateRisk, RepoCache, RepoHost, Runner, RunnerError, Settings,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default configuration file, used when present and no --config is given.
const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// buildscan - audit a GitHub organization for build tool versions.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to a YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// GitHub organization name (overrides the config file).
    #[arg(long)]
    org: Option<String>,

    /// Analyze a single named repository instead of the organization.
    #[arg(long)]
    repo: Option<String>,

    /// GitHub Personal Access Token.
    #[arg(long, env = "GITHUB_TOKEN")]
    token: Option<String>,

    /// Only analyze repositories containing the marker file (much faster).
    #[arg(long)]
    marker_only: bool,

    /// Number of parallel workers.
    #[arg(long)]
    workers: Option<usize>,

    /// Delay between API calls in seconds.
    #[arg(long)]
    rate_limit_delay: Option<f64>,

    /// Cache repository lists between runs.
    #[arg(long)]
    use_cache: bool,

    /// Directory for cache files.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Write the JSON report to this file.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Predict API usage instead of scanning.
    #[arg(long)]
    predict: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage cached repository lists.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// List cache entries.
    List,
    /// Show one cache entry in detail.
    Inspect {
        /// Entry file name, as shown by `cache list`.
        file: String,
    },
    /// Remove cache entries.
    Clear {
        /// Only clear entries of this organization.
        #[arg(long)]
        org: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = Args::parse();

    if let Some(Command::Cache { action }) = &args.command {
        return run_cache(&args, action);
    }

    let settings = match resolve_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };

    let Some(token) = args.token.clone() else {
        error!("GitHub token is required. Set GITHUB_TOKEN or use --token.");
        return ExitCode::from(2);
    };

    if args.predict {
        return match run_predict(&settings, token).await {
            Ok(()) => ExitCode::from(0),
            Err(e) => {
                error!(error = %e, "Prediction failed");
                ExitCode::from(2)
            }
        };
    }

    match run_scan(&settings, token).await {
        Ok(report) => {
            print_summary(&report);

            if let Some(path) = &args.output {
                if let Err(e) = write_json_report(&report, path) {
                    error!(error = %e, "Could not write JSON report");
                    return ExitCode::from(2);
                }
                println!("\nJSON report saved to: {}", path.display());
            }

            if report.has_failures() {
                ExitCode::from(1)
            } else {
                ExitCode::from(0)
            }
        }
        Err(e) => {
            error!(error = %e, "Critical failure");
            ExitCode::from(2)
        }
    }
}

/// Initializes tracing with environment filter support.
///
/// Sets up the global tracing subscriber with:
/// - Compact log formatting (single-line output)
/// - Log level filtering via `RUST_LOG` env var (defaults to "info")
fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// Loads the config file when available and applies CLI overrides on top.
fn resolve_settings(args: &Args) -> Result<Settings, buildscan::ConfigError> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Settings::load(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => Settings::default(),
    };

    if let Some(org) = &args.org {
        settings.organization = org.clone();
    }
    if let Some(repo) = &args.repo {
        settings.analysis.single_repository = Some(repo.clone());
    }
    if args.marker_only {
        settings.analysis.marker_only = true;
    }
    if let Some(workers) = args.workers {
        settings.parallelism.max_workers = workers;
    }
    if let Some(delay) = args.rate_limit_delay {
        settings.parallelism.rate_limit_delay = delay;
    }
    if args.use_cache {
        settings.caching.enabled = true;
    }
    if let Some(dir) = &args.cache_dir {
        settings.caching.directory = dir.clone();
    }

    settings.validate()?;
    Ok(settings)
}

/// Runs the full scan.
async fn run_scan(settings: &Settings, token: String) -> Result<AnalysisReport, RunnerError> {
    let host = Arc::new(GitHubHost::new(token)?);
    let runner = Runner::new(settings.clone(), host)?;
    runner.run().await
}

/// Runs the dry-run predictor: sizes the organization (from cache when
/// possible, otherwise with a single remote call), reads the remaining
/// quota, and prints the forecast.
async fn run_predict(settings: &Settings, token: String) -> Result<(), RunnerError> {
    let host = GitHubHost::new(token)?;

    let cache = settings.caching.enabled.then(|| {
        RepoCache::new(
            settings.caching.directory.clone(),
            Duration::from_secs(settings.caching.duration),
        )
    });

    let mode = settings.mode();
    let cost_mode = match mode {
        AnalysisMode::MarkerOnly => CostMode::MarkerOnly,
        _ => CostMode::Full,
    };

    let cached_repos = cache
        .as_ref()
        .and_then(|c| c.get(&settings.organization, mode.cache_key()));

    let (total, eligible, cached) = match &cached_repos {
        Some(repos) => (repos.len() as u64, count_eligible(settings, repos), true),
        None => {
            let size = estimate_org_size(&host, &settings.organization).await?;
            (size, size, false)
        }
    };

    let remaining = host.quota().await.map(|q| u64::from(q.remaining)).unwrap_or(0);

    let prediction = predict(&PredictionInput {
        total_repositories: total,
        eligible_repositories: eligible,
        mode: cost_mode,
        cached,
        remaining_quota: remaining,
        delay: settings.rate_limit_delay(),
    });

    println!("API Usage Prediction for {}:", settings.organization);
    println!("  Mode: {mode}");
    println!("  Total repositories: {}", prediction.total_repositories);
    println!(
        "  Repositories to analyze: {}",
        prediction.eligible_repositories
    );
    println!("  Discovery calls: {}", prediction.discovery_calls);
    println!(
        "  Calls per repository: {}",
        prediction.calls_per_repository
    );
    println!("  Total predicted calls: {}", prediction.total_calls);
    println!("  Remaining quota: {remaining}");
    println!(
        "  Estimated duration: {:.1} minutes",
        prediction.estimated_duration.as_secs_f64() / 60.0
    );
    println!("  Risk: {}", prediction.risk);

    if !prediction.recommendations.is_empty() {
        println!("\nRecommendations:");
        for recommendation in &prediction.recommendations {
            println!("  - {recommendation}");
        }
    }
    if prediction.risk == RateRisk::Exceeded {
        println!("\nPredicted calls exceed the remaining quota; the scan would stall on resets.");
    }

    Ok(())
}

/// Applies the configured exclusion rules to a cached list to count the
/// repositories a scan would actually analyze.
fn count_eligible(settings: &Settings, repos: &[buildscan::RepositoryRef]) -> u64 {
    let Ok(rules) = settings.exclusions.compile() else {
        return repos.len() as u64;
    };
    repos
        .iter()
        .filter(|r| {
            !r.archived
                && !r.empty
                && !(r.fork && rules.skip_forks())
                && rules.matches(&r.name).is_none()
        })
        .count() as u64
}

/// Runs a cache management action.
fn run_cache(args: &Args, action: &CacheAction) -> ExitCode {
    let dir = args
        .cache_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(".cache"));
    let cache = RepoCache::new(dir, Duration::from_secs(3600));

    match action {
        CacheAction::List => match cache.entries() {
            Ok(entries) if entries.is_empty() => {
                println!("No cache entries found");
                ExitCode::from(0)
            }
            Ok(entries) => {
                println!(
                    "{:<40} {:<20} {:<8} {:>8} {:>12} {:>10}",
                    "File", "Organization", "Mode", "Age", "Repositories", "Size"
                );
                for entry in entries {
                    println!(
                        "{:<40} {:<20} {:<8} {:>8} {:>12} {:>10}",
                        entry.file_name,
                        entry.organization.as_deref().unwrap_or("?"),
                        entry.mode.as_deref().unwrap_or("?"),
                        entry
                            .age_secs
                            .map(format_age)
                            .unwrap_or_else(|| "?".to_string()),
                        entry
                            .repositories
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| "error".to_string()),
                        format!("{} B", entry.size_bytes),
                    );
                }
                ExitCode::from(0)
            }
            Err(e) => {
                error!(error = %e, "Could not list cache entries");
                ExitCode::from(2)
            }
        },
        CacheAction::Inspect { file } => match cache.inspect(file) {
            Ok(record) => {
                println!("Cache entry: {file}");
                println!("  Organization: {}", record.organization);
                println!("  Mode: {}", record.mode);
                println!("  Duration: {}s", record.duration_secs);
                println!("  Repositories: {}", record.repositories.len());
                for repo in record.repositories.iter().take(10) {
                    println!("    - {}", repo.full_name);
                }
                if record.repositories.len() > 10 {
                    println!("    ... and {} more", record.repositories.len() - 10);
                }
                ExitCode::from(0)
            }
            Err(e) => {
                error!(error = %e, "Could not inspect cache entry");
                ExitCode::from(2)
            }
        },
        CacheAction::Clear { org } => match cache.clear(org.as_deref()) {
            Ok(removed) => {
                println!("Cleared {removed} cache entries");
                ExitCode::from(0)
            }
            Err(e) => {
                error!(error = %e, "Could not clear cache");
                ExitCode::from(2)
            }
        },
    }
}

fn format_age(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}

/// Prints the final report summary.
fn print_summary(report: &AnalysisReport) {
    println!("\nAnalysis report for {} ({} mode):", report.organization, report.mode);

    if report.tools.is_empty() {
        println!("\nNo build tool versions found");
    } else {
        for tool in &report.tools {
            println!("\n{} versions:", tool.tool);
            for version in &tool.versions {
                println!(
                    "  {} - {} repositories",
                    version.version,
                    version.repositories.len()
                );
                for repo in &version.repositories {
                    println!("    - {repo}");
                }
            }
        }
    }

    if !report.dependency_repositories.is_empty() {
        println!("\nArtifactory repositories in use:");
        for usage in &report.dependency_repositories {
            println!(
                "  {} - referenced by {} repositories",
                usage.repository_id,
                usage.used_by.len()
            );
        }
    }

    if !report.no_build_config.is_empty() {
        println!("\nNo build configuration found:");
        for repo in &report.no_build_config {
            println!("  - {repo}");
        }
    }

    if !report.excluded.is_empty() {
        println!("\nExcluded:");
        for excluded in &report.excluded {
            println!("  - {} ({})", excluded.name, excluded.reason);
        }
    }

    if !report.failed.is_empty() {
        println!("\nCould not be analyzed:");
        for failed in &report.failed {
            println!("  - {} ({})", failed.repository, failed.reason);
        }
    }

    println!("\nSummary:");
    println!(
        "  Repositories discovered: {}",
        report.stats.repositories_discovered
    );
    println!(
        "  Repositories analyzed: {}",
        report.stats.repositories_analyzed
    );
    println!("  Repositories failed: {}", report.stats.repositories_failed);
    println!(
        "  Repositories excluded: {}",
        report.stats.repositories_excluded
    );
    println!("  Findings: {}", report.stats.findings);
    println!("  API calls made: {}", report.stats.api_calls);
    println!("  Workers: {}", report.stats.workers);
    if report.stats.from_cache {
        println!("  Repository list served from cache");
    }
}

fn write_json_report(report: &AnalysisReport, path: &Path) -> std::io::Result<()> {
    let payload = serde_json::to_string_pretty(report)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, payload)
}
