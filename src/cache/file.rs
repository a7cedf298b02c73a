//! File-based cache backend.
//!
//! One JSON envelope per fingerprint, stored as
//! `<cache_dir>/<version>_<digest>.json`. Writes go to a temp file in the
//! same directory and are renamed into place, so readers never observe a
//! partial entry. Expiry is enforced on read by the store.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use glob::Pattern;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::debug;

use super::error::{CacheError, CacheResult};
use super::CacheBackend;
use crate::core::Fingerprint;

/// Local JSON-file cache backend
pub struct FileBackend {
    /// Directory holding the entry files
    dir: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the entry file for a fingerprint
    pub fn path_for(&self, key: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }

    /// All entry files with their fingerprints
    async fn entries(&self) -> CacheResult<Vec<(Fingerprint, PathBuf, u64)>> {
        let mut found = Vec::new();

        if !fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Ok(found);
        }

        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            if let Some(key) = fingerprint_from_stem(stem) {
                let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                found.push((key, path, size));
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl CacheBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &Fingerprint) -> CacheResult<Option<String>> {
        let path = self.path_for(key);

        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &Fingerprint, value: &str, _ttl: Duration) -> CacheResult<()> {
        fs::create_dir_all(&self.dir).await?;

        let dir = self.dir.clone();
        let path = self.path_for(key);
        let bytes = value.as_bytes().to_vec();

        tokio::task::spawn_blocking(move || -> CacheResult<()> {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| CacheError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(CacheError::backend)??;

        debug!(path = %self.path_for(key).display(), "Wrote cache file");
        Ok(())
    }

    async fn remove(&self, key: &Fingerprint) -> CacheResult<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self, pattern: &str) -> CacheResult<usize> {
        let pattern = Pattern::new(pattern).map_err(CacheError::backend)?;
        let mut removed = 0;

        for (key, path, _) in self.entries().await? {
            if !pattern.matches(key.as_str()) {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(removed)
    }

    async fn entry_count(&self) -> CacheResult<usize> {
        Ok(self.entries().await?.len())
    }

    async fn size_bytes(&self) -> CacheResult<Option<u64>> {
        let total = self.entries().await?.iter().map(|(_, _, size)| size).sum();
        Ok(Some(total))
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }
}

/// `v1:abcd` -> `v1_abcd`
fn file_stem(key: &Fingerprint) -> String {
    key.as_str().replacen(':', "_", 1)
}

/// `v1_abcd` -> `v1:abcd`. The digest is hex, so the last `_` splits it off.
fn fingerprint_from_stem(stem: &str) -> Option<Fingerprint> {
    let (version, digest) = stem.rsplit_once('_')?;
    if version.is_empty() || digest.is_empty() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(Fingerprint::from_raw(format!("{}:{}", version, digest)))
}
