//! End-to-end scan tests against an in-memory repository host.

use async_trait::async_trait;
use buildscan::{
    AnalysisMode, ApiError, ExclusionReason, RateLimitInfo, RepoHost, RepositoryRef, Runner,
    Settings,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// In-memory repository host serving a fixed organization.
#[derive(Default)]
struct FakeOrg {
    repos: Vec<RepositoryRef>,
    files: HashMap<(String, String), String>,
    calls: AtomicU64,
}

impl FakeOrg {
    fn new() -> Self {
        Self::default()
    }

    fn repo(mut self, name: &str) -> Self {
        self.repos.push(RepositoryRef::named("acme", name));
        self
    }

    fn file(mut self, repo: &str, path: &str, content: &str) -> Self {
        self.files
            .insert((repo.to_string(), path.to_string()), content.to_string());
        self
    }

    fn remote_calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepoHost for FakeOrg {
    async fn list_org_repos(&self, _org: &str) -> Result<Vec<RepositoryRef>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.repos.clone())
    }

    async fn search_repos_with_file(
        &self,
        _org: &str,
        filename: &str,
    ) -> Result<Vec<String>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut names: Vec<String> = self
            .files
            .keys()
            .filter(|(_, path)| path == filename)
            .map(|(repo, _)| repo.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn org_repo_count(&self, _org: &str) -> Result<u64, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.repos.len() as u64)
    }

    async fn get_repo(&self, _org: &str, name: &str) -> Result<RepositoryRef, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.repos
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn fetch_file(
        &self,
        repo: &RepositoryRef,
        path: &str,
    ) -> Result<Option<String>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .files
            .get(&(repo.name.clone(), path.to_string()))
            .cloned())
    }

    async fn list_root(&self, repo: &RepositoryRef) -> Result<Vec<String>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut entries: Vec<String> = self
            .files
            .keys()
            .filter(|(name, path)| name == &repo.name && !path.contains('/'))
            .map(|(_, path)| path.clone())
            .collect();
        entries.sort();
        Ok(entries)
    }

    async fn quota(&self) -> Result<RateLimitInfo, ApiError> {
        Ok(RateLimitInfo {
            remaining: 5000,
            reset: 0,
            limit: 5000,
        })
    }
}

const MAVEN_WRAPPER_386: &str = "distributionUrl=https://repo.maven.apache.org/maven2/org/apache/maven/apache-maven/3.8.6/apache-maven-3.8.6-bin.zip\n";

fn acme_org() -> FakeOrg {
    FakeOrg::new()
        .repo("svc-a")
        .repo("svc-b")
        .repo("terraform-x")
        .file("svc-a", ".mvn/wrapper/maven-wrapper.properties", MAVEN_WRAPPER_386)
        .file("svc-a", "pom.xml", "<project></project>")
        .file("svc-b", "README.md", "# svc-b")
        .file("terraform-x", "main.tf", "resource {}")
}

fn acme_settings() -> Settings {
    let mut settings = Settings {
        organization: "acme".to_string(),
        ..Settings::default()
    };
    settings.parallelism.max_workers = 2;
    settings.parallelism.rate_limit_delay = 0.0;
    settings.exclusions.patterns.push("terraform-*".to_string());
    settings
}

#[tokio::test]
async fn full_scan_classifies_every_repository() {
    let runner = Runner::new(acme_settings(), Arc::new(acme_org())).unwrap();
    let report = runner.run().await.unwrap();

    // svc-a: maven 3.8.6 from the wrapper properties.
    assert_eq!(report.findings.len(), 1);
    let finding = &report.findings[0];
    assert_eq!(finding.tool, "maven");
    assert_eq!(finding.version.as_deref(), Some("3.8.6"));
    assert_eq!(finding.repository, "svc-a");
    assert_eq!(
        finding.file_path,
        ".mvn/wrapper/maven-wrapper.properties"
    );

    // svc-b: analyzed, nothing found.
    assert_eq!(report.no_build_config, vec!["svc-b"]);

    // terraform-x: excluded by pattern, never analyzed.
    assert_eq!(report.excluded.len(), 1);
    assert_eq!(report.excluded[0].name, "terraform-x");
    assert_eq!(
        report.excluded[0].reason,
        ExclusionReason::ExcludedByPattern {
            pattern: "terraform-*".to_string()
        }
    );

    assert!(report.failed.is_empty());
    assert_eq!(report.mode, AnalysisMode::Full.to_string());
    assert_eq!(report.stats.repositories_discovered, 3);
    assert_eq!(report.stats.repositories_analyzed, 2);
    assert_eq!(report.stats.repositories_excluded, 1);
}

#[tokio::test]
async fn discovered_set_is_partitioned_completely() {
    let runner = Runner::new(acme_settings(), Arc::new(acme_org())).unwrap();
    let report = runner.run().await.unwrap();

    let analyzed: Vec<&str> = report
        .findings
        .iter()
        .map(|f| f.repository.as_str())
        .chain(report.no_build_config.iter().map(String::as_str))
        .chain(report.failed.iter().map(|f| f.repository.as_str()))
        .collect();

    // No repository is both analyzed and excluded, and together they
    // cover everything discovery saw.
    for excluded in &report.excluded {
        assert!(!analyzed.contains(&excluded.name.as_str()));
    }
    let mut all: Vec<&str> = analyzed
        .into_iter()
        .chain(report.excluded.iter().map(|e| e.name.as_str()))
        .collect();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), report.stats.repositories_discovered);
}

#[tokio::test]
async fn repeated_scans_are_byte_identical() {
    let mut payloads = Vec::new();
    for workers in [1, 2, 8] {
        let mut settings = acme_settings();
        settings.parallelism.max_workers = workers;
        let runner = Runner::new(settings, Arc::new(acme_org())).unwrap();
        let report = runner.run().await.unwrap();
        payloads.push(serde_json::to_vec(&report).unwrap());
    }

    assert_eq!(payloads[0], payloads[1]);
    assert_eq!(payloads[1], payloads[2]);
}

#[tokio::test]
async fn cached_discovery_skips_remote_listing() {
    let cache_dir = tempfile::tempdir().unwrap();

    let mut settings = acme_settings();
    settings.caching.enabled = true;
    settings.caching.directory = cache_dir.path().to_path_buf();

    // First run populates the cache.
    let host = Arc::new(acme_org());
    let runner = Runner::new(settings.clone(), Arc::clone(&host) as Arc<dyn RepoHost>).unwrap();
    let first = runner.run().await.unwrap();
    assert!(!first.stats.from_cache);

    // Second run is served from the cache: same report content, and the
    // host never sees another listing call.
    let host2 = Arc::new(acme_org());
    let runner = Runner::new(settings, Arc::clone(&host2) as Arc<dyn RepoHost>).unwrap();
    let calls_before = host2.remote_calls();
    let second = runner.run().await.unwrap();
    assert!(second.stats.from_cache);
    assert_eq!(first.findings, second.findings);

    // Only per-repository fetches happened; list_org_repos adds exactly
    // one call per invocation, so a cached run costs fewer calls than the
    // repository count would otherwise require.
    let listing_calls = host2.remote_calls() - calls_before;
    assert!(listing_calls > 0);
    let fresh_host = Arc::new(acme_org());
    let fresh_runner = Runner::new(
        {
            let mut s = acme_settings();
            s.caching.enabled = false;
            s
        },
        Arc::clone(&fresh_host) as Arc<dyn RepoHost>,
    )
    .unwrap();
    fresh_runner.run().await.unwrap();
    assert_eq!(fresh_host.remote_calls(), listing_calls + 1);
}

#[tokio::test]
async fn marker_mode_restricts_the_scan() {
    let host = acme_org().file("svc-a", "Jenkinsfile", "pipeline { }");

    let mut settings = acme_settings();
    settings.analysis.marker_only = true;

    let runner = Runner::new(settings, Arc::new(host)).unwrap();
    let report = runner.run().await.unwrap();

    assert_eq!(report.stats.repositories_discovered, 1);
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].repository, "svc-a");
    assert!(report.no_build_config.is_empty());
}

#[tokio::test]
async fn gradle_and_artifactory_detection_end_to_end() {
    let host = FakeOrg::new()
        .repo("svc-g")
        .file(
            "svc-g",
            "gradle/wrapper/gradle-wrapper.properties",
            "distributionUrl=https\\://services.gradle.org/distributions/gradle-8.5-bin.zip",
        )
        .file(
            "svc-g",
            "build.gradle",
            r#"
repositories {
    maven { url "https://repo.acme.io/artifactory/libs-release" }
    maven { url "https://repo.acme.io/artifactory/libs-snapshot" }
}
"#,
        );

    let runner = Runner::new(acme_settings(), Arc::new(host)).unwrap();
    let report = runner.run().await.unwrap();

    let gradle = report
        .findings
        .iter()
        .find(|f| f.tool == "gradle")
        .unwrap();
    assert_eq!(gradle.version.as_deref(), Some("8.5"));

    assert_eq!(report.dependency_repositories.len(), 2);
    assert_eq!(
        report.dependency_repositories[0].repository_id,
        "libs-release"
    );
    assert_eq!(report.dependency_repositories[0].used_by, vec!["svc-g"]);
}
