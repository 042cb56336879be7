//! File-backed durable store.
//!
//! Each key is stored as `<percent-encoded key>.json` in the data directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{check_quota, DurableStore, StorageError};

/// File extension for stored values.
const VALUE_EXTENSION: &str = "json";

/// Extension used for in-progress writes before they are renamed into place.
const TEMP_EXTENSION: &str = "tmp";

/// Durable store that keeps one file per key.
#[derive(Clone, Debug)]
pub struct FileStore {
    data_dir: PathBuf,
    quota: Option<u64>,
}

impl FileStore {
    /// Creates a new store rooted at `data_dir`.
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            quota: None,
        }
    }

    /// Rejects writes that would push total stored bytes past `quota`.
    pub fn with_quota(mut self, quota: u64) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Returns the full path for a key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", urlencoding::encode(key), VALUE_EXTENSION))
    }

    fn stored_len(path: &Path) -> Result<u64, StorageError> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn total_len(&self) -> Result<u64, StorageError> {
        let mut total = 0;
        for key in self.keys("")? {
            total += Self::stored_len(&self.path(&key))?;
        }
        Ok(total)
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path(key);

        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.data_dir).map_err(|e| StorageError::io(&self.data_dir, e))?;

        let path = self.path(key);

        if self.quota.is_some() {
            let replaced = Self::stored_len(&path)?;
            check_quota(self.quota, self.total_len()?, replaced, value.len() as u64)?;
        }

        // Write next to the target and rename so readers never see a torn value
        let temp_path = path.with_extension(TEMP_EXTENSION);
        fs::write(&temp_path, value).map_err(|e| StorageError::io(&temp_path, e))?;
        fs::rename(&temp_path, &path).map_err(|e| StorageError::io(&path, e))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path(key);

        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.data_dir, e)),
        };

        let mut keys = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(&self.data_dir, e))?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            if path.extension().and_then(|s| s.to_str()) != Some(VALUE_EXTENSION) {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            // Files we didn't write (bad encoding) are skipped
            if let Ok(key) = urlencoding::decode(stem) {
                if key.starts_with(prefix) {
                    keys.push(key.into_owned());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().to_path_buf());
        (store, temp_dir)
    }

    #[test]
    fn test_path_encodes_key() {
        let (store, _temp) = test_store();
        let path = store.path("caresync:pending-queue");
        assert!(path.ends_with("caresync%3Apending-queue.json"));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let (store, _temp) = test_store();
        assert!(store.get("caresync:nothing").unwrap().is_none());
    }

    #[test]
    fn test_set_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested_dir = temp_dir.path().join("nested").join("data");
        let store = FileStore::new(nested_dir.clone());

        store.set("caresync:k", "v").unwrap();

        assert!(nested_dir.exists());
        assert_eq!(store.get("caresync:k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_set_overwrites_and_leaves_no_temp_file() {
        let (store, temp_dir) = test_store();

        store.set("caresync:k", "first").unwrap();
        store.set("caresync:k", "second").unwrap();

        assert_eq!(store.get("caresync:k").unwrap().as_deref(), Some("second"));
        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_remove() {
        let (store, _temp) = test_store();
        store.set("caresync:k", "v").unwrap();

        assert!(store.remove("caresync:k").unwrap());
        assert!(!store.remove("caresync:k").unwrap());
        assert!(store.get("caresync:k").unwrap().is_none());
    }

    #[test]
    fn test_keys_filters_by_prefix_and_ignores_foreign_files() {
        let (store, temp_dir) = test_store();
        store.set("caresync:b", "1").unwrap();
        store.set("caresync:a", "2").unwrap();
        store.set("other:c", "3").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "not a value").unwrap();

        assert_eq!(
            store.keys("caresync:").unwrap(),
            vec!["caresync:a".to_string(), "caresync:b".to_string()]
        );
        assert_eq!(store.keys("").unwrap().len(), 3);
    }

    #[test]
    fn test_keys_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("missing"));
        assert!(store.keys("caresync:").unwrap().is_empty());
    }

    #[test]
    fn test_quota_rejects_write_and_keeps_old_value() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().to_path_buf()).with_quota(10);

        store.set("caresync:k", "12345").unwrap();
        let err = store.set("caresync:k", "12345678901").unwrap_err();

        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert_eq!(store.get("caresync:k").unwrap().as_deref(), Some("12345"));
    }
}
