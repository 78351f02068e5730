//! Detection findings.

use serde::Serialize;

/// One detected (tool, version, file, repository) tuple.
///
/// Immutable after creation; accumulated into the final report. A tool
/// may produce zero, one, or many findings per repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Build tool name (e.g. "maven", "gradle", "java", "artifactory").
    pub tool: String,

    /// Extracted version string, when one was found. For dependency
    /// repository references this holds the referenced repository id.
    pub version: Option<String>,

    /// Path of the file the match came from.
    pub file_path: String,

    /// Repository name.
    pub repository: String,

    /// Branch that was analyzed.
    pub branch: String,

    /// How the version was found, for transparency in the report.
    pub detection_method: String,
}
