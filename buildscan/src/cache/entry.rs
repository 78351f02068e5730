//! Persisted cache record types.

use crate::discovery::RepositoryRef;
use serde::{Deserialize, Serialize};

/// Schema version of persisted cache records. Bump on incompatible
/// changes; entries with a different version are discarded as misses
/// instead of being misinterpreted.
pub const CACHE_SCHEMA: u32 = 1;

/// One persisted discovery result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Record format version.
    pub schema: u32,

    /// Organization the list was discovered for.
    pub organization: String,

    /// Discovery mode key ("full" or "marker").
    pub mode: String,

    /// Unix timestamp at creation.
    pub created_unix: u64,

    /// Lifetime in seconds, fixed at creation.
    pub duration_secs: u64,

    /// The discovered repository list.
    pub repositories: Vec<RepositoryRef>,
}

/// Metadata about a cache entry, for the list/inspect surface.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryInfo {
    /// File name of the entry inside the cache directory.
    pub file_name: String,

    /// Organization, when the entry is readable.
    pub organization: Option<String>,

    /// Discovery mode key, when the entry is readable.
    pub mode: Option<String>,

    /// Age in seconds, when the entry is readable.
    pub age_secs: Option<u64>,

    /// Number of cached repositories, when the entry is readable.
    pub repositories: Option<usize>,

    /// Entry size in bytes.
    pub size_bytes: u64,
}
