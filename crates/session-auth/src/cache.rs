//! Session-scoped key/value cache
//!
//! The credential store mirrors the access token here so it survives a
//! client restart within the same session. Two backends:
//! - `MemorySessionCache`: process memory only, lost on exit
//! - `FileSessionCache`: JSON map on disk, written atomically (temp file +
//!   rename) with owner-only permissions since it holds a bearer token

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Boxed future returned by `SessionCache` operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Key/value storage scoped to one client session.
pub trait SessionCache: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>>;

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> CacheFuture<'a, ()>;

    fn remove<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()>;
}

/// In-process cache. The default when no cache file is configured.
#[derive(Default)]
pub struct MemorySessionCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionCache for MemorySessionCache {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.entries.lock().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            self.entries
                .lock()
                .await
                .insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            self.entries.lock().await.remove(key);
            Ok(())
        })
    }
}

/// File-backed cache holding a flat JSON object of string values.
///
/// The Mutex serializes writes so concurrent `set`/`remove` calls cannot
/// interleave their temp-file renames.
pub struct FileSessionCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileSessionCache {
    /// Open the cache at `path`. A missing file is an empty cache; the file
    /// is created on the first write.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let entries = if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Cache(format!("reading session cache: {e}")))?;
            let entries: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::Cache(format!("parsing session cache: {e}")))?;
            info!(path = %path.display(), keys = entries.len(), "loaded session cache");
            entries
        } else {
            debug!(path = %path.display(), "session cache file not found, starting empty");
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionCache for FileSessionCache {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.entries.lock().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            entries.insert(key.to_string(), value.to_string());
            write_atomic(&self.path, &entries).await
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            if entries.remove(key).is_some() {
                write_atomic(&self.path, &entries).await?;
            }
            Ok(())
        })
    }
}

/// Write the cache map atomically: temp file in the same directory, 0600 on
/// unix, then rename over the target.
async fn write_atomic(path: &Path, entries: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| Error::Cache(format!("serializing session cache: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Cache("session cache path has no parent directory".into()))?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::Cache(format!("creating session cache directory: {e}")))?;

    let tmp_path = dir.join(format!(".session-cache.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Cache(format!("writing temp session cache: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Cache(format!("setting session cache permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Cache(format!("renaming temp session cache: {e}")))?;

    debug!(path = %path.display(), "persisted session cache");
    Ok(())
}
