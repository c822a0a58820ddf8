//! Persistence backends.
//!
//! The watchlist and the panel flag are persisted as strings under fixed
//! logical names. Production code uses [`FileStorage`], one file per name
//! inside a scoped directory; tests use [`MemoryStorage`].

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fs_err as fs;

/// Logical name of the persisted watchlist.
pub const WATCHLIST_KEY: &str = "watched-resources";

/// Logical name of the persisted panel collapse flag.
pub const COLLAPSED_KEY: &str = "watched-resources-collapsed";

/// Default root directory name under the home directory.
pub const DEFAULT_ROOT_DIR: &str = ".crossview";

/// Storage errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(String),

    /// Logical name cannot be mapped to a file.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Backend lock was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// A store of string values addressed by logical name.
pub trait Storage: Send + Sync {
    /// Reads the value stored under `key`, `None` if never written.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replaces the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Location of persisted client state.
///
/// Production code uses `StorageConfig::default()` which points to
/// `~/.crossview/`. Tests use `StorageConfig::with_root(temp_dir)`.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
    scope: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let root = dirs::home_dir()
            .map(|home| home.join(DEFAULT_ROOT_DIR))
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_ROOT_DIR));
        Self { root, scope: None }
    }
}

impl StorageConfig {
    /// Creates a config with a custom root directory.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scope: None,
        }
    }

    /// Scopes the store to a subdirectory, e.g. one per dashboard host.
    #[must_use]
    pub fn with_scope(mut self, scope: impl AsRef<str>) -> Self {
        self.scope = Some(sanitize(scope.as_ref()));
        self
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory values are written to.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        match &self.scope {
            Some(scope) => self.root.join(scope),
            None => self.root.clone(),
        }
    }
}

/// File backend, one `<name>.json` file per logical name.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Creates a backend writing under the configured directory.
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self { dir: config.dir() }
    }

    /// Returns the path backing a logical name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains path separators.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::Io(e.to_string()))?;

        // Each writer gets its own temp file, then renames it over the target.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| StorageError::Io(e.to_string()))?;
        tmp.write_all(value.as_bytes())
            .map_err(|e| StorageError::Io(e.to_string()))?;
        tmp.flush().map_err(|e| StorageError::Io(e.to_string()))?;
        tmp.persist(&path)
            .map_err(|e| StorageError::Io(format!("{}: {}", path.display(), e.error)))?;
        Ok(())
    }
}

fn sanitize(scope: &str) -> String {
    let cleaned: String = scope
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get(WATCHLIST_KEY).expect("get"), None);

        storage.set(WATCHLIST_KEY, "[]").expect("set");
        assert_eq!(storage.get(WATCHLIST_KEY).expect("get"), Some("[]".to_string()));
    }

    #[test]
    fn test_memory_storage_clones_share_values() {
        let storage = MemoryStorage::new();
        let clone = storage.clone();
        storage.set(COLLAPSED_KEY, "true").expect("set");
        assert_eq!(clone.get(COLLAPSED_KEY).expect("get"), Some("true".to_string()));
    }

    #[test]
    fn test_file_storage_missing_is_none() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(&StorageConfig::with_root(tmp.path()));
        assert_eq!(storage.get(WATCHLIST_KEY).expect("get"), None);
    }

    #[test]
    fn test_file_storage_write_creates_dir() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = StorageConfig::with_root(tmp.path().join("nested")).with_scope("localhost:3001");
        let storage = FileStorage::new(&config);

        storage.set(WATCHLIST_KEY, "[1]").expect("set");
        assert_eq!(storage.get(WATCHLIST_KEY).expect("get"), Some("[1]".to_string()));
        assert!(config.dir().join("watched-resources.json").exists());
        assert!(config.dir().ends_with("localhost_3001"));
    }

    #[test]
    fn test_file_storage_overwrites() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(&StorageConfig::with_root(tmp.path()));
        storage.set(COLLAPSED_KEY, "true").expect("set");
        storage.set(COLLAPSED_KEY, "false").expect("set");
        assert_eq!(storage.get(COLLAPSED_KEY).expect("get"), Some("false".to_string()));
    }

    #[test]
    fn test_file_storage_concurrent_writers() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = StorageConfig::with_root(tmp.path()).with_scope("localhost:3001");

        let writers: Vec<_> = (0..8)
            .map(|writer| {
                let storage = FileStorage::new(&config);
                std::thread::spawn(move || {
                    (0..100)
                        .filter(|i| {
                            let value = format!("[{}, {}]", writer, i);
                            storage.set(WATCHLIST_KEY, &value).is_err()
                        })
                        .count()
                })
            })
            .collect();

        let failed: usize = writers
            .into_iter()
            .map(|w| w.join().expect("writer panicked"))
            .sum();
        assert_eq!(failed, 0);

        let storage = FileStorage::new(&config);
        let value = storage.get(WATCHLIST_KEY).expect("get").expect("value");
        assert!(serde_json::from_str::<Vec<u32>>(&value).is_ok());

        // No temp files left behind.
        let files = std::fs::read_dir(config.dir()).expect("read dir").count();
        assert_eq!(files, 1);
    }

    #[test]
    fn test_file_storage_rejects_bad_keys() {
        let storage = FileStorage::new(&StorageConfig::with_root("/tmp/crossview-test"));
        assert!(storage.path_for("").is_err());
        assert!(storage.path_for("../escape").is_err());
        assert!(storage.path_for(".hidden").is_err());
        assert!(storage.path_for(WATCHLIST_KEY).is_ok());
    }

    #[test]
    fn test_scope_sanitized() {
        assert_eq!(sanitize("https://host:8443"), "https___host_8443");
        assert_eq!(sanitize(".."), "_");
        assert_eq!(sanitize("prod-eu"), "prod-eu");
    }
}
