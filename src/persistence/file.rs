//! File-backed key-value store
//!
//! Each key is one `<key>.json` file under the data directory. Writes go to a
//! temporary file first and are renamed into place.

use super::{KeyValueStore, PersistenceResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Key-value store persisted as files in a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> PersistenceResult<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: &str) -> PersistenceResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(path = ?path, bytes = value.len(), "File store entry written");
        Ok(())
    }

    async fn delete(&self, key: &str) -> PersistenceResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.get("tableSettings").await.unwrap(), None);
        store.delete("tableSettings").await.unwrap();
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.put("tableSettings", "{\"a\":1}").await.unwrap();
        store.put("tableSettings", "{\"a\":2}").await.unwrap();

        assert_eq!(
            store.get("tableSettings").await.unwrap().as_deref(),
            Some("{\"a\":2}")
        );
        assert!(dir.path().join("tableSettings.json").exists());
    }

    #[test]
    fn test_keys_are_sanitized() {
        let store = FileStore::new("/data");
        assert_eq!(
            store.path_for("../etc/passwd"),
            PathBuf::from("/data/___etc_passwd.json")
        );
    }
}
