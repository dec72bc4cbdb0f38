//! Filesystem source provider: `root/<path without leading slash>`

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{ensure_safe_path, SourceError, SourceProvider};
use crate::disk::write_file_atomic;
use crate::resource::{relative_path, Resource};

pub struct FilesystemSource {
    root: PathBuf,
}

impl FilesystemSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, SourceError> {
        ensure_safe_path(path)?;
        Ok(self.root.join(relative_path(path)))
    }
}

fn not_found_or_io(path: &str, err: std::io::Error) -> SourceError {
    if err.kind() == ErrorKind::NotFound {
        SourceError::NotFound {
            path: path.to_string(),
        }
    } else {
        SourceError::Io(err)
    }
}

#[async_trait]
impl SourceProvider for FilesystemSource {
    async fn get(&self, path: &str) -> Result<Resource, SourceError> {
        let file_path = self.resolve(path)?;

        let metadata = tokio::fs::metadata(&file_path)
            .await
            .map_err(|e| not_found_or_io(path, e))?;
        if !metadata.is_file() {
            return Err(SourceError::NotAFile {
                path: path.to_string(),
            });
        }

        let body = tokio::fs::read(&file_path)
            .await
            .map_err(|e| not_found_or_io(path, e))?;

        let mut resource = Resource::new(path).with_body(body);
        if let Ok(modified) = metadata.modified() {
            resource = resource.with_modified_at(modified);
        }
        Ok(resource)
    }

    async fn set(&self, resource: &Resource) -> Result<(), SourceError> {
        let file_path = self.resolve(resource.path())?;
        write_file_atomic(&file_path, resource.body()).await?;

        tracing::debug!(
            path = %resource.path(),
            size = resource.size(),
            "Stored source image"
        );
        Ok(())
    }

    async fn del(&self, path: &str) -> Result<(), SourceError> {
        let file_path = self.resolve(path)?;
        tokio::fs::remove_file(&file_path)
            .await
            .map_err(|e| not_found_or_io(path, e))
    }

    fn name(&self) -> &'static str {
        "fs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn provider() -> (TempDir, FilesystemSource) {
        let dir = TempDir::new().unwrap();
        let source = FilesystemSource::new(dir.path());
        (dir, source)
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (dir, source) = provider();
        let resource = Resource::new("/albums/2024/a.jpg").with_body(vec![1u8, 2, 3]);

        source.set(&resource).await.unwrap();

        assert!(dir.path().join("albums/2024/a.jpg").is_file());
        let fetched = source.get("/albums/2024/a.jpg").await.unwrap();
        assert_eq!(fetched.body().as_ref(), &[1, 2, 3]);
        assert_eq!(fetched.size(), 3);
        assert_eq!(fetched.name(), "a.jpg");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_dir, source) = provider();
        let err = source.get("/missing.jpg").await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_directory_is_not_a_file() {
        let (dir, source) = provider();
        std::fs::create_dir_all(dir.path().join("folder.jpg")).unwrap();
        let err = source.get("/folder.jpg").await.unwrap_err();
        assert!(matches!(err, SourceError::NotAFile { .. }));
    }

    #[tokio::test]
    async fn test_traversal_rejected_before_storage() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(dir.path().join("secret.jpg"), b"secret").unwrap();
        let source = FilesystemSource::new(&root);

        assert!(matches!(
            source.get("/../secret.jpg").await.unwrap_err(),
            SourceError::InvalidPath { .. }
        ));
        assert!(matches!(
            source.del("/../secret.jpg").await.unwrap_err(),
            SourceError::InvalidPath { .. }
        ));
        let hostile = Resource::new("/../../etc/x.jpg").with_body(vec![0u8]);
        assert!(matches!(
            source.set(&hostile).await.unwrap_err(),
            SourceError::InvalidPath { .. }
        ));
        assert!(dir.path().join("secret.jpg").exists());
    }

    #[tokio::test]
    async fn test_del_removes_and_reports_missing() {
        let (_dir, source) = provider();
        source
            .set(&Resource::new("/a.png").with_body(vec![9u8]))
            .await
            .unwrap();

        source.del("/a.png").await.unwrap();

        assert!(matches!(
            source.get("/a.png").await.unwrap_err(),
            SourceError::NotFound { .. }
        ));
        assert!(matches!(
            source.del("/a.png").await.unwrap_err(),
            SourceError::NotFound { .. }
        ));
    }
}
