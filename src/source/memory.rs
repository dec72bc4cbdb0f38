//! In-process source provider for ephemeral deployments

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::SystemTime;

use super::{ensure_safe_path, SourceError, SourceProvider};
use crate::resource::Resource;

#[derive(Default)]
pub struct MemorySource {
    files: RwLock<HashMap<String, (Bytes, SystemTime)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(path: &str) -> Result<String, SourceError> {
        ensure_safe_path(path)?;
        Ok(Resource::new(path).path().to_string())
    }
}

#[async_trait]
impl SourceProvider for MemorySource {
    async fn get(&self, path: &str) -> Result<Resource, SourceError> {
        let key = Self::key(path)?;
        let files = self.files.read();
        let (body, modified_at) = files.get(&key).ok_or_else(|| SourceError::NotFound {
            path: path.to_string(),
        })?;

        Ok(Resource::new(key.as_str())
            .with_body(body.clone())
            .with_modified_at(*modified_at))
    }

    async fn set(&self, resource: &Resource) -> Result<(), SourceError> {
        let key = Self::key(resource.path())?;
        self.files
            .write()
            .insert(key, (resource.body().clone(), SystemTime::now()));
        Ok(())
    }

    async fn del(&self, path: &str) -> Result<(), SourceError> {
        let key = Self::key(path)?;
        match self.files.write().remove(&key) {
            Some(_) => Ok(()),
            None => Err(SourceError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
