//! Durable snapshot storage for the cache store

use super::CacheEntry;
use crate::error::{Error, InternalError, IoError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

/// File name used by [`FileSlot`]
pub const CACHE_FILE_NAME: &str = "landmark-cache.json";

/// Everything needed to rebuild a cache store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot<V> {
    pub saved_at: DateTime<Utc>,
    // Vec of pairs keeps insertion order stable in the file
    pub entries: Vec<(String, CacheEntry<V>)>,
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
}

/// A single durable record holding the serialized snapshot
#[async_trait]
pub trait CacheSlot: Send + Sync {
    /// Read the stored snapshot, `None` if nothing was saved yet
    async fn load(&self) -> Result<Option<String>>;

    /// Replace the stored snapshot
    async fn save(&self, data: &str) -> Result<()>;

    /// Remove the stored snapshot
    async fn discard(&self) -> Result<()>;
}

/// Snapshot stored as a JSON file in a directory
pub struct FileSlot {
    dir: PathBuf,
}

impl FileSlot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CACHE_FILE_NAME)
    }

    fn io_error(path: &Path, err: std::io::Error) -> Error {
        IoError::from_std(err).with_path(path).into()
    }
}

#[async_trait]
impl CacheSlot for FileSlot {
    async fn load(&self) -> Result<Option<String>> {
        let path = self.path();
        match fs::read_to_string(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }

    async fn save(&self, data: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Self::io_error(&self.dir, e))?;

        // write then rename so a crash never leaves a half-written file
        let path = self.path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)
            .await
            .map_err(|e| Self::io_error(&tmp, e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| Self::io_error(&path, e))
    }

    async fn discard(&self) -> Result<()> {
        let path = self.path();
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }
}

/// In-process slot, mostly for tests and ephemeral sessions
#[derive(Default)]
pub struct MemorySlot {
    data: Mutex<Option<String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw contents, if any
    pub fn contents(&self) -> Option<String> {
        self.data.lock().ok().and_then(|guard| guard.clone())
    }

    /// Seed the slot with raw contents
    pub fn put(&self, data: impl Into<String>) {
        if let Ok(mut guard) = self.data.lock() {
            *guard = Some(data.into());
        }
    }
}

#[async_trait]
impl CacheSlot for MemorySlot {
    async fn load(&self) -> Result<Option<String>> {
        self.data
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| InternalError::assertion("memory slot lock poisoned").into())
    }

    async fn save(&self, data: &str) -> Result<()> {
        self.put(data);
        Ok(())
    }

    async fn discard(&self) -> Result<()> {
        if let Ok(mut guard) = self.data.lock() {
            *guard = None;
        }
        Ok(())
    }
}
