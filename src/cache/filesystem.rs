//! Filesystem cache provider
//!
//! Layout: `root/<path without leading slash>/<options hash>`, one directory
//! per source path. Writes go through temp file + rename. Empty directories
//! are left behind by eviction; their number is bounded by distinct paths.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::{cache_relative_path, CacheError, CacheProvider, EvictionPolicy, Sweeper};
use crate::disk::write_file_atomic;
use crate::image_optimizer::sniff_mime_type;
use crate::resource::Resource;

/// Outcome of one eviction walk
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
}

pub struct FilesystemCache {
    root: PathBuf,
    life_time: Duration,
    sweeper: Sweeper,
}

impl FilesystemCache {
    /// Create the cache and start its eviction task on the current runtime
    pub fn new(root: impl Into<PathBuf>, policy: EvictionPolicy) -> Self {
        let root: PathBuf = root.into();
        let life_time = policy.life_time;

        let sweep_root = Arc::new(root.clone());
        let sweeper = Sweeper::spawn("fs", policy.clean_interval, move || {
            let root = Arc::clone(&sweep_root);
            async move {
                sweep_expired(&root, life_time).await;
            }
        });

        Self {
            root,
            life_time,
            sweeper,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run one eviction pass now
    pub async fn evict_expired(&self) -> SweepReport {
        sweep_expired(&self.root, self.life_time).await
    }

    fn family_dir(&self, path: &str) -> Result<PathBuf, CacheError> {
        Ok(self.root.join(cache_relative_path(path)?))
    }
}

fn is_expired(modified: SystemTime, life_time: Duration) -> bool {
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age > life_time)
        .unwrap_or(false)
}

#[async_trait]
impl CacheProvider for FilesystemCache {
    async fn get(&self, resource: &Resource) -> Result<Resource, CacheError> {
        let Some(hash) = resource.options_hash() else {
            return Err(CacheError::Miss);
        };
        let file_path = self.family_dir(resource.path())?.join(hash);

        let metadata = match tokio::fs::metadata(&file_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CacheError::Miss),
            Err(e) => return Err(CacheError::Io(e)),
        };
        if !metadata.is_file() {
            return Err(CacheError::Miss);
        }
        let modified = metadata.modified()?;
        if is_expired(modified, self.life_time) {
            return Err(CacheError::Miss);
        }

        let body = match tokio::fs::read(&file_path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CacheError::Miss),
            Err(e) => return Err(CacheError::Io(e)),
        };

        let mut cached = Resource::new(resource.path())
            .with_mime_type(sniff_mime_type(&body))
            .with_body(body)
            .with_modified_at(modified);
        if let Some(options) = resource.options() {
            cached = cached.with_options(Arc::clone(options));
        }
        Ok(cached)
    }

    async fn set(&self, resource: &Resource) -> Result<(), CacheError> {
        let Some(hash) = resource.options_hash() else {
            return Err(CacheError::MissingOptions {
                path: resource.path().to_string(),
            });
        };
        let file_path = self.family_dir(resource.path())?.join(hash);

        write_file_atomic(&file_path, resource.body()).await?;
        Ok(())
    }

    /// Remove the derivative files of `path`
    ///
    /// Only regular files directly inside the family directory go; nested
    /// directories belong to other logical paths (`/a.jpg/b.jpg`).
    async fn del(&self, path: &str) -> Result<(), CacheError> {
        let dir = self.family_dir(path)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(CacheError::Io(e)),
        };

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::Io(e)),
            }
        }

        // Fails harmlessly while nested families remain.
        let _ = tokio::fs::remove_dir(&dir).await;

        tracing::debug!(path = %path, derivatives = removed, "Removed filesystem cache family");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fs"
    }

    fn shutdown(&self) {
        self.sweeper.stop();
    }
}

/// Walk `root` and remove regular files older than `life_time`
///
/// Failures on single entries are logged and skipped.
pub async fn sweep_expired(root: &Path, life_time: Duration) -> SweepReport {
    let mut report = SweepReport::default();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Failed to read cache directory");
                report.failed += 1;
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Failed to list cache directory");
                    report.failed += 1;
                    break;
                }
            };

            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to stat cache entry");
                    report.failed += 1;
                    continue;
                }
            };

            if metadata.is_dir() {
                pending.push(path);
                continue;
            }
            if !metadata.is_file() {
                continue;
            }

            let expired = metadata
                .modified()
                .map(|modified| is_expired(modified, life_time))
                .unwrap_or(false);
            if !expired {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => report.removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to evict cache file");
                    report.failed += 1;
                }
            }
        }
    }

    tracing::debug!(
        root = %root.display(),
        removed = report.removed,
        failed = report.failed,
        "Filesystem cache sweep finished"
    );
    report
}
