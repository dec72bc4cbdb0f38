//! The image-in-transit entity passed between providers and handlers

use bytes::Bytes;
use std::sync::Arc;
use std::time::SystemTime;

use crate::image_optimizer::Options;

/// An image at a logical path
///
/// Providers always hand back a fresh `Resource`; the body is a cheaply
/// cloned `Bytes` so two resources never alias a mutable buffer.
#[derive(Debug, Clone)]
pub struct Resource {
    path: String,
    name: String,
    options: Option<Arc<Options>>,
    mime_type: Option<String>,
    modified_at: SystemTime,
    body: Bytes,
}

impl Resource {
    /// Create an empty resource; a leading slash is added when missing
    pub fn new(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        let name = path.rsplit('/').next().unwrap_or_default().to_string();

        Self {
            path,
            name,
            options: None,
            mime_type: None,
            modified_at: SystemTime::now(),
            body: Bytes::new(),
        }
    }

    pub fn with_options(mut self, options: Arc<Options>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        self.mime_type = (!mime_type.is_empty()).then_some(mime_type);
        self
    }

    pub fn with_modified_at(mut self, modified_at: SystemTime) -> Self {
        self.modified_at = modified_at;
        self
    }

    /// Logical path, always with a leading slash
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> Option<&Arc<Options>> {
        self.options.as_ref()
    }

    /// Options digest, or `None` for source-only resources
    pub fn options_hash(&self) -> Option<&str> {
        self.options.as_deref().map(Options::hash)
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn modified_at(&self) -> SystemTime {
        self.modified_at
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Byte count of the body
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Path relative to a storage root
    pub fn relative_path(&self) -> &str {
        relative_path(&self.path)
    }
}

/// Strip every leading slash so the path can be joined onto a root directory
pub fn relative_path(path: &str) -> &str {
    path.trim_start_matches('/')
}
