//! Persistent tier for the cache
//!
//! A `CacheStore` holds serialized cache entries between runs. Every operation
//! returns a `Result` so callers can see exactly what failed; the cache
//! manager decides how to degrade.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use thiserror::Error;

/// File name prefix for persisted entries
const ENTRY_PREFIX: &str = "cache_";

/// File name suffix for persisted entries
const ENTRY_SUFFIX: &str = ".json";

/// Largest payload the default store accepts, in bytes
pub const DEFAULT_ENTRY_LIMIT: usize = 5 * 1024 * 1024;

/// Errors raised by a persistent cache store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing files failed
    #[error("cache store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// An entry could not be serialized or parsed
    #[error("cache entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The entry is larger than the store accepts
    #[error("cache store quota exceeded: entry is {size} bytes, limit is {limit}")]
    QuotaExceeded { size: usize, limit: usize },
}

/// Key/value persistence for serialized cache entries
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Loads the raw payload for a key, `Ok(None)` when absent
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores a raw payload, replacing any previous one
    fn save(&self, key: &str, payload: &str) -> Result<(), StoreError>;

    /// Removes a key; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Removes every entry owned by this store
    fn clear(&self) -> Result<(), StoreError>;

    /// Keys of every stored entry, in no particular order
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Stores each entry as `cache_<key>.json` in a directory
///
/// Defaults to the XDG cache directory (`~/.cache/econdash/` on Linux).
/// Keys are percent-encoded into file names, so distinct keys never share a
/// file and `keys()` recovers them exactly.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    max_entry_bytes: Option<usize>,
}

impl FileStore {
    /// Creates a store in the XDG-compliant cache directory, capped at
    /// [`DEFAULT_ENTRY_LIMIT`] bytes per entry
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "econdash")?;
        Some(
            Self::with_dir(project_dirs.cache_dir().to_path_buf())
                .with_entry_limit(DEFAULT_ENTRY_LIMIT),
        )
    }

    /// Creates a store rooted at a custom directory
    pub fn with_dir(dir: PathBuf) -> Self {
        Self {
            dir,
            max_entry_bytes: None,
        }
    }

    /// Rejects entries larger than `limit` bytes with [`StoreError::QuotaExceeded`]
    pub fn with_entry_limit(mut self, limit: usize) -> Self {
        self.max_entry_bytes = Some(limit);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{ENTRY_PREFIX}{}{ENTRY_SUFFIX}", urlencoding::encode(key)))
    }

    /// Entry file names in the store directory; empty when it doesn't exist
    fn entry_files(&self) -> Result<Vec<(String, PathBuf)>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(ENTRY_PREFIX) && name.ends_with(ENTRY_SUFFIX) {
                files.push((name, entry.path()));
            }
        }
        Ok(files)
    }
}

impl CacheStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.entry_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, key: &str, payload: &str) -> Result<(), StoreError> {
        if let Some(limit) = self.max_entry_bytes {
            if payload.len() > limit {
                return Err(StoreError::QuotaExceeded {
                    size: payload.len(),
                    limit,
                });
            }
        }
        fs::create_dir_all(&self.dir)?;
        fs::write(self.entry_path(key), payload)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn clear(&self) -> Result<(), StoreError> {
        for (_, path) in self.entry_files()? {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entry_files()?
            .into_iter()
            .filter_map(|(name, _)| {
                let encoded = &name[ENTRY_PREFIX.len()..name.len() - ENTRY_SUFFIX.len()];
                // Files not written by this store may not decode
                urlencoding::decode(encoded).ok().map(|key| key.into_owned())
            })
            .collect())
    }
}
