//! Detection rule tables.
//!
//! Rules are data: an ordered list of candidate files per tool and an
//! ordered list of version-extraction patterns per file. Order encodes
//! reliability — wrapper properties files pin the exact tool version and
//! are tried before manifests and CI descriptors. The matching algorithm
//! in the parent module never changes when a tool is added here.

use regex::Regex;

/// Tool name used for dependency repository reference findings.
pub const ARTIFACTORY_TOOL: &str = "artifactory";

/// How a candidate file is located.
#[derive(Debug, Clone)]
pub enum PathSpec {
    /// A well-known path, fetched directly.
    Exact(String),

    /// Any root-level entry with this suffix. Requires a root directory
    /// listing, since the exact name is unknown in advance.
    Suffix(String),
}

/// One candidate file with its ordered extraction patterns.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// Where to find the file.
    pub path: PathSpec,

    /// Patterns tried in order; the first capture wins.
    pub patterns: Vec<Regex>,
}

/// Ordered detection rule for one tool.
#[derive(Debug, Clone)]
pub struct ToolRule {
    /// Tool name reported in findings.
    pub tool: String,

    /// When true, every match in every candidate file produces a finding
    /// instead of stopping at the first (used for dependency repository
    /// references, which legitimately occur many times per manifest).
    pub collect_all: bool,

    /// Candidate files in reliability order.
    pub candidates: Vec<CandidateFile>,
}

fn candidate(path: PathSpec, patterns: &[&str]) -> Result<CandidateFile, regex::Error> {
    let mut compiled = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        compiled.push(Regex::new(pattern)?);
    }
    Ok(CandidateFile {
        path,
        patterns: compiled,
    })
}

fn exact(path: &str, patterns: &[&str]) -> Result<CandidateFile, regex::Error> {
    candidate(PathSpec::Exact(path.to_string()), patterns)
}

fn suffix(suffix_str: &str, patterns: &[&str]) -> Result<CandidateFile, regex::Error> {
    candidate(PathSpec::Suffix(suffix_str.to_string()), patterns)
}

/// Builds the built-in rule tables.
///
/// # Errors
///
/// Returns [`regex::Error`] if a pattern fails to compile.
pub fn builtin_rules() -> Result<Vec<ToolRule>, regex::Error> {
    Ok(vec![
        ToolRule {
            tool: "maven".to_string(),
            collect_all: false,
            candidates: vec![
                // The wrapper distribution URL pins the exact Maven version.
                exact(
                    ".mvn/wrapper/maven-wrapper.properties",
                    &[r"distributionUrl=.*?apache-maven-([\d.]+)-bin\.zip"],
                )?,
                // Older projects keep the wrapper properties at the root.
                exact(
                    "maven-wrapper.properties",
                    &[r"distributionUrl=.*?apache-maven-([\d.]+)-bin\.zip"],
                )?,
                exact("pom.xml", &[r"(?i)<maven\.version>([^<]+)</maven\.version>"])?,
                // Jenkins tool configuration often names the exact version.
                exact(
                    "Jenkinsfile",
                    &[
                        r#"(?is)tool\s*['"]([^'"]+)['"]\s*\{.*?maven\s*['"]([^'"]+)['"]"#,
                        r#"(?i)maven\s*['"]([^'"]+)['"]"#,
                    ],
                )?,
            ],
        },
        ToolRule {
            tool: "gradle".to_string(),
            collect_all: false,
            candidates: vec![
                exact(
                    "gradle/wrapper/gradle-wrapper.properties",
                    &[
                        r"distributionUrl=.*?gradle-([\d.]+)-bin\.zip",
                        r"distributionUrl=.*?gradle-([\d.]+)-all\.zip",
                    ],
                )?,
                exact(
                    "gradle.properties",
                    &[r#"(?im)^\s*gradleVersion\s*=\s*['"]?([\d.]+)['"]?"#],
                )?,
                exact(
                    "build.gradle",
                    &[r#"(?i)gradleVersion\s*=\s*['"]([^'"]+)['"]"#],
                )?,
                exact(
                    "Jenkinsfile",
                    &[
                        r#"(?is)tool\s*['"]([^'"]+)['"]\s*\{.*?gradle\s*['"]([^'"]+)['"]"#,
                        r#"(?i)gradle\s*['"]([^'"]+)['"]"#,
                    ],
                )?,
            ],
        },
        ToolRule {
            tool: "java".to_string(),
            collect_all: false,
            candidates: vec![
                exact(
                    "pom.xml",
                    &[
                        r"(?i)<java\.version>([^<]+)</java\.version>",
                        r"(?i)<maven\.compiler\.source>([^<]+)</maven\.compiler\.source>",
                        r"(?i)<maven\.compiler\.target>([^<]+)</maven\.compiler\.target>",
                    ],
                )?,
                exact(
                    "build.gradle",
                    &[
                        r#"(?i)sourceCompatibility\s*=\s*['"]([^'"]+)['"]"#,
                        r"(?i)sourceCompatibility\s*=\s*JavaVersion\.VERSION_([^\s]+)",
                        r#"(?i)targetCompatibility\s*=\s*['"]([^'"]+)['"]"#,
                        r"(?i)targetCompatibility\s*=\s*JavaVersion\.VERSION_([^\s]+)",
                    ],
                )?,
                exact(
                    "build.gradle.kts",
                    &[
                        r"(?i)sourceCompatibility\s*=\s*JavaVersion\.VERSION_([^\s)]+)",
                        r"(?i)targetCompatibility\s*=\s*JavaVersion\.VERSION_([^\s)]+)",
                    ],
                )?,
                exact(
                    "gradle.properties",
                    &[r"(?im)^\s*java\.version\s*=\s*([^\s]+)"],
                )?,
            ],
        },
        ToolRule {
            tool: "gradle-publish-plugin".to_string(),
            collect_all: false,
            candidates: vec![exact(
                "gradle.properties",
                &[
                    r#"(?im)^\s*publishPluginVersion\s*=\s*['"]([^'"\s]+)['"]"#,
                    r"(?im)^\s*publishPluginVersion\s*=\s*([^\s]+)",
                ],
            )?],
        },
        ToolRule {
            tool: ARTIFACTORY_TOOL.to_string(),
            collect_all: true,
            candidates: vec![
                exact(
                    "Jenkinsfile",
                    &[
                        r#"(?i)artifactory\s*\(\s*['"]([^'"]+)['"]"#,
                        r#"(?i)rtUpload[^'"]*['"]([^'"]+)['"]"#,
                        r#"(?i)artifactory[^'"\s]*/([A-Za-z0-9._-]+)['"]"#,
                    ],
                )?,
                exact(
                    "pom.xml",
                    &[r"(?i)<url>\s*https?://[^<]*artifactory[^<]*/([A-Za-z0-9._-]+)\s*</url>"],
                )?,
                // Covers build.gradle, settings.gradle and friends.
                suffix(
                    ".gradle",
                    &[r#"(?i)['"]https?://[^'"]*artifactory[^'"]*/([A-Za-z0-9._-]+)/?['"]"#],
                )?,
            ],
        },
    ])
}
