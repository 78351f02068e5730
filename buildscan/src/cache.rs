//! Time-boxed discovery result cache.
//!
//! Repository lists are expensive to rebuild: a full discovery of a large
//! organization costs one paginated listing, a marker discovery one search
//! plus one resolve per hit. [`RepoCache`] persists the discovered list
//! per (organization, mode) key so repeated runs skip those calls while
//! the entry is fresh.
//!
//! Entries are plain JSON files with a schema version; anything
//! unreadable, expired, or from a different schema is treated as a cache
//! miss, never as a fatal error. Expiry does not delete files —
//! [`RepoCache::clear`] is the only eviction.

mod entry;

pub use entry::{CacheEntryInfo, CacheRecord, CACHE_SCHEMA};

use crate::discovery::RepositoryRef;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from the explicit cache management surface (put/inspect/clear).
///
/// The read path ([`RepoCache::get`]) never returns these; it degrades to
/// a miss instead.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure.
    #[error("cache I/O error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Entry exists but cannot be decoded.
    #[error("corrupt cache entry '{path}': {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// No such entry.
    #[error("cache entry '{path}' not found")]
    NotFound { path: String },
}

/// Discovery result cache rooted at a directory.
pub struct RepoCache {
    dir: PathBuf,
    duration: Duration,
}

impl RepoCache {
    /// Creates a cache handle. The directory is created lazily on first
    /// write.
    #[must_use]
    pub fn new(dir: PathBuf, duration: Duration) -> Self {
        Self { dir, duration }
    }

    /// Returns the cached repository list for `(organization, mode)` if an
    /// entry exists, is fresh, and decodes cleanly. Anything else is a
    /// miss; expired entries are left on disk.
    #[must_use]
    pub fn get(&self, organization: &str, mode: &str) -> Option<Vec<RepositoryRef>> {
        let path = self.entry_path(organization, mode);
        let record = match read_record(&path) {
            Ok(record) => record,
            Err(CacheError::NotFound { .. }) => {
                debug!(path = %path.display(), "Cache entry not found");
                return None;
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Unreadable cache entry, treating as miss");
                return None;
            }
        };

        if record.schema != CACHE_SCHEMA {
            warn!(
                path = %path.display(),
                found = record.schema,
                expected = CACHE_SCHEMA,
                "Cache entry has incompatible schema, treating as miss"
            );
            return None;
        }

        let age = unix_now().saturating_sub(record.created_unix);
        if age > record.duration_secs {
            debug!(
                path = %path.display(),
                age_secs = age,
                duration_secs = record.duration_secs,
                "Cache entry expired"
            );
            return None;
        }

        info!(
            organization,
            mode,
            count = record.repositories.len(),
            age_secs = age,
            "Loaded repository list from cache"
        );
        Some(record.repositories)
    }

    /// Persists a discovered repository list under `(organization, mode)`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the entry cannot be written; callers
    /// treat this as non-fatal and log it.
    pub fn put(
        &self,
        organization: &str,
        mode: &str,
        repositories: &[RepositoryRef],
    ) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.display().to_string(),
            source: e,
        })?;

        let record = CacheRecord {
            schema: CACHE_SCHEMA,
            organization: organization.to_string(),
            mode: mode.to_string(),
            created_unix: unix_now(),
            duration_secs: self.duration.as_secs(),
            repositories: repositories.to_vec(),
        };

        let path = self.entry_path(organization, mode);
        let payload = serde_json::to_string(&record).map_err(|e| CacheError::Corrupt {
            path: path.display().to_string(),
            source: e,
        })?;
        std::fs::write(&path, payload).map_err(|e| CacheError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        info!(
            organization,
            mode,
            count = repositories.len(),
            "Saved repository list to cache"
        );
        Ok(())
    }

    /// Removes cache entries, optionally only those of one organization.
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be read.
    pub fn clear(&self, organization: Option<&str>) -> Result<usize, CacheError> {
        let mut removed = 0;
        for path in self.entry_files()? {
            if let Some(org) = organization {
                let prefix = format!("{}_", sanitize(org));
                let matches = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix));
                if !matches {
                    continue;
                }
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "Cleared cache entry");
                    removed += 1;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Could not remove cache entry");
                }
            }
        }
        Ok(removed)
    }

    /// Lists all entries with their metadata. Unreadable entries are still
    /// listed, with the decodable fields absent.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be read.
    pub fn entries(&self) -> Result<Vec<CacheEntryInfo>, CacheError> {
        let mut infos = Vec::new();
        for path in self.entry_files()? {
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
                .to_string();
            let size_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            let info = match read_record(&path) {
                Ok(record) => CacheEntryInfo {
                    file_name,
                    organization: Some(record.organization),
                    mode: Some(record.mode),
                    age_secs: Some(unix_now().saturating_sub(record.created_unix)),
                    repositories: Some(record.repositories.len()),
                    size_bytes,
                },
                Err(_) => CacheEntryInfo {
                    file_name,
                    organization: None,
                    mode: None,
                    age_secs: None,
                    repositories: None,
                    size_bytes,
                },
            };
            infos.push(info);
        }
        infos.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(infos)
    }

    /// Reads one entry by file name for inspection.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the entry is missing or undecodable.
    pub fn inspect(&self, file_name: &str) -> Result<CacheRecord, CacheError> {
        read_record(&self.dir.join(file_name))
    }

    fn entry_path(&self, organization: &str, mode: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{mode}.json", sanitize(organization)))
    }

    fn entry_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.display().to_string(),
            source: e,
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Io {
                path: self.dir.display().to_string(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

fn read_record(path: &Path) -> Result<CacheRecord, CacheError> {
    if !path.exists() {
        return Err(CacheError::NotFound {
            path: path.display().to_string(),
        });
    }
    let raw = std::fs::read_to_string(path).map_err(|e| CacheError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&raw).map_err(|e| CacheError::Corrupt {
        path: path.display().to_string(),
        source: e,
    })
}

fn sanitize(organization: &str) -> String {
    organization.replace(['/', '\\'], "_")
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
