//! Build tool detection engine.
//!
//! Given lazy access to one repository's files, the engine walks the
//! ordered rule tables and produces [`Finding`]s. Candidate files are
//! tried most-reliable-first and the first successful pattern match for a
//! tool wins — the engine does not keep scanning for a "better" match.
//! Absence of every candidate file yields no finding for that tool, not
//! an error.

mod finding;
mod rules;
mod source;

pub use finding::Finding;
pub use rules::{builtin_rules, CandidateFile, PathSpec, ToolRule, ARTIFACTORY_TOOL};
pub use source::{ContentSource, FetchError, StaticSource};

use crate::discovery::RepositoryRef;
use regex::Regex;
use tracing::{debug, trace};

/// Applies ordered, tool-specific pattern tables to repository content.
pub struct DetectionEngine {
    rules: Vec<ToolRule>,
}

impl DetectionEngine {
    /// Builds an engine over custom rule tables.
    #[must_use]
    pub fn new(rules: Vec<ToolRule>) -> Self {
        Self { rules }
    }

    /// Builds an engine with the built-in rule tables.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] if a built-in pattern fails to compile.
    pub fn builtin() -> Result<Self, regex::Error> {
        Ok(Self::new(builtin_rules()?))
    }

    /// Runs all rules against one repository.
    ///
    /// Fetches are lazy: a candidate file is only requested when earlier
    /// candidates for its tool have not already matched. Wildcard paths
    /// trigger a single root-directory listing.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the source fails; missing files are a
    /// normal negative result and never an error.
    pub async fn detect(
        &self,
        repo: &RepositoryRef,
        source: &mut dyn ContentSource,
    ) -> Result<Vec<Finding>, FetchError> {
        let mut findings = Vec::new();

        for rule in &self.rules {
            let before = findings.len();
            'candidates: for candidate in &rule.candidates {
                let paths = self.resolve_paths(&candidate.path, source).await?;
                for path in paths {
                    let Some(content) = source.fetch(&path).await? else {
                        trace!(repo = %repo.name, path = %path, "Candidate file absent");
                        continue;
                    };

                    if rule.collect_all {
                        for value in collect_matches(&candidate.patterns, &content) {
                            findings.push(self.finding(rule, repo, &path, value));
                        }
                    } else if let Some(value) = first_match(&candidate.patterns, &content) {
                        debug!(
                            repo = %repo.name,
                            tool = %rule.tool,
                            path = %path,
                            version = %value,
                            "Version detected"
                        );
                        findings.push(self.finding(rule, repo, &path, value));
                        // First match wins for this tool.
                        break 'candidates;
                    }
                }
            }
            if rule.collect_all && findings.len() > before {
                debug!(
                    repo = %repo.name,
                    tool = %rule.tool,
                    count = findings.len() - before,
                    "References collected"
                );
            }
        }

        Ok(findings)
    }

    async fn resolve_paths(
        &self,
        spec: &PathSpec,
        source: &mut dyn ContentSource,
    ) -> Result<Vec<String>, FetchError> {
        match spec {
            PathSpec::Exact(path) => Ok(vec![path.clone()]),
            PathSpec::Suffix(suffix) => {
                let mut paths: Vec<String> = source
                    .root_entries()
                    .await?
                    .into_iter()
                    .filter(|entry| entry.ends_with(suffix.as_str()))
                    .collect();
                paths.sort();
                Ok(paths)
            }
        }
    }

    fn finding(&self, rule: &ToolRule, repo: &RepositoryRef, path: &str, value: String) -> Finding {
        Finding {
            tool: rule.tool.clone(),
            version: Some(value),
            file_path: path.to_string(),
            repository: repo.name.clone(),
            branch: repo.default_branch.clone(),
            detection_method: format!("found in {path}"),
        }
    }
}

/// Applies patterns in order and returns the first extracted value.
fn first_match(patterns: &[Regex], content: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|pattern| pattern.captures(content).and_then(|caps| extract(&caps)))
}

/// Collects every distinct extracted value across all patterns.
fn collect_matches(patterns: &[Regex], content: &str) -> Vec<String> {
    let mut values = Vec::new();
    for pattern in patterns {
        for caps in pattern.captures_iter(content) {
            if let Some(value) = extract(&caps) {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
    }
    values
}

/// Pulls the extracted value out of a capture set.
///
/// Patterns with multiple groups (Jenkins tool configurations) put the
/// version in the last participating group.
fn extract(caps: &regex::Captures<'_>) -> Option<String> {
    let matched = caps.iter().skip(1).flatten().last()?;
    let value = matched.as_str().trim();
    let value = value.strip_prefix("VERSION_").unwrap_or(value);
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAVEN_WRAPPER: &str = "distributionUrl=https://repo.maven.apache.org/maven2/org/apache/maven/apache-maven/3.8.6/apache-maven-3.8.6-bin.zip\n";
    const GRADLE_WRAPPER: &str =
        "distributionUrl=https\\://services.gradle.org/distributions/gradle-8.5-bin.zip\n";

    fn repo() -> RepositoryRef {
        RepositoryRef::named("acme", "svc-a")
    }

    async fn detect(files: &[(&str, &str)]) -> Vec<Finding> {
        let engine = DetectionEngine::builtin().unwrap();
        let mut source = StaticSource::new(files);
        engine.detect(&repo(), &mut source).await.unwrap()
    }

    #[tokio::test]
    async fn maven_version_from_wrapper_properties() {
        let findings = detect(&[(".mvn/wrapper/maven-wrapper.properties", MAVEN_WRAPPER)]).await;

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].tool, "maven");
        assert_eq!(findings[0].version.as_deref(), Some("3.8.6"));
        assert_eq!(
            findings[0].file_path,
            ".mvn/wrapper/maven-wrapper.properties"
        );
        assert_eq!(findings[0].branch, "main");
    }

    #[tokio::test]
    async fn first_candidate_wins_when_both_match() {
        // Both the wrapper and the pom declare a Maven version; the
        // wrapper is the more reliable source and must win.
        let findings = detect(&[
            (".mvn/wrapper/maven-wrapper.properties", MAVEN_WRAPPER),
            ("pom.xml", "<maven.version>9.9.9</maven.version>"),
        ])
        .await;

        let maven: Vec<_> = findings.iter().filter(|f| f.tool == "maven").collect();
        assert_eq!(maven.len(), 1);
        assert_eq!(maven[0].version.as_deref(), Some("3.8.6"));
        assert!(maven[0]
            .detection_method
            .contains(".mvn/wrapper/maven-wrapper.properties"));
    }

    #[tokio::test]
    async fn gradle_version_from_all_distribution() {
        let findings = detect(&[(
            "gradle/wrapper/gradle-wrapper.properties",
            "distributionUrl=https\\://services.gradle.org/distributions/gradle-7.6.1-all.zip",
        )])
        .await;

        assert_eq!(findings[0].tool, "gradle");
        assert_eq!(findings[0].version.as_deref(), Some("7.6.1"));
    }

    #[tokio::test]
    async fn no_candidate_files_means_no_findings() {
        let findings = detect(&[("README.md", "# nothing to see")]).await;
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn jenkins_tool_block_uses_last_capture_group() {
        let jenkinsfile = r#"
pipeline {
    tool 'builders' {
        maven 'maven-3.9.4'
    }
}
"#;
        let findings = detect(&[("Jenkinsfile", jenkinsfile)]).await;
        let maven = findings.iter().find(|f| f.tool == "maven").unwrap();
        assert_eq!(maven.version.as_deref(), Some("maven-3.9.4"));
    }

    #[tokio::test]
    async fn java_version_prefix_is_stripped() {
        let findings = detect(&[(
            "build.gradle",
            "sourceCompatibility = JavaVersion.VERSION_17\n",
        )])
        .await;
        let java = findings.iter().find(|f| f.tool == "java").unwrap();
        assert_eq!(java.version.as_deref(), Some("17"));
    }

    #[tokio::test]
    async fn artifactory_references_are_collected_not_first_match() {
        let build_gradle = r#"
repositories {
    maven { url "https://repo.acme.io/artifactory/libs-release" }
    maven { url "https://repo.acme.io/artifactory/libs-snapshot" }
}
"#;
        let findings = detect(&[("build.gradle", build_gradle)]).await;

        let refs: Vec<_> = findings
            .iter()
            .filter(|f| f.tool == ARTIFACTORY_TOOL)
            .collect();
        assert_eq!(refs.len(), 2);
        let ids: Vec<_> = refs.iter().filter_map(|f| f.version.as_deref()).collect();
        assert!(ids.contains(&"libs-release"));
        assert!(ids.contains(&"libs-snapshot"));
    }

    #[tokio::test]
    async fn suffix_paths_resolved_via_root_listing() {
        // settings.gradle is only found through the suffix rule, which
        // consults the root listing instead of fetching by name.
        let findings = detect(&[(
            "settings.gradle",
            r#"maven { url "https://repo.acme.io/artifactory/plugins-release" }"#,
        )])
        .await;

        let refs: Vec<_> = findings
            .iter()
            .filter(|f| f.tool == ARTIFACTORY_TOOL)
            .collect();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].version.as_deref(), Some("plugins-release"));
        assert_eq!(refs[0].file_path, "settings.gradle");
    }

    #[tokio::test]
    async fn multiple_tools_in_one_repository() {
        let findings = detect(&[
            (".mvn/wrapper/maven-wrapper.properties", MAVEN_WRAPPER),
            ("gradle/wrapper/gradle-wrapper.properties", GRADLE_WRAPPER),
            ("pom.xml", "<java.version>11</java.version>"),
        ])
        .await;

        let tools: Vec<_> = findings.iter().map(|f| f.tool.as_str()).collect();
        assert!(tools.contains(&"maven"));
        assert!(tools.contains(&"gradle"));
        assert!(tools.contains(&"java"));
    }
}
