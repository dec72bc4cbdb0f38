//! Request orchestration
//!
//! GET: cache lookup, then source fetch and transform on a miss, then a
//! detached cache write once the response is built. POST and DELETE mutate
//! the source and invalidate the path's derivative family.

use chrono::{DateTime, Utc};
use http::header::{
    CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, IF_MODIFIED_SINCE, LAST_MODIFIED,
};
use http::{HeaderMap, Method, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use super::response::ImageResponse;
use super::special_endpoints::{handle_health, handle_metrics, HEALTH_PATH, METRICS_PATH};
use super::upload::{extract_image, UploadReceipt};
use crate::cache::{CacheProvider, FilesystemCache, MemoryCache};
use crate::config::{Config, ProviderKind};
use crate::constants::{
    DEFAULT_CACHE_LIFE_TIME_SECS, DEFAULT_MAX_BODY_SIZE, DEFAULT_REQUEST_TIMEOUT_SECS,
    X_IMAGE_FROM,
};
use crate::error::ServiceError;
use crate::image_optimizer::{ImageProcessor, TransformEngine};
use crate::metrics::Metrics;
use crate::pipeline::{ImageRequest, NegotiationPipeline};
use crate::resource::Resource;
use crate::security::validate_body_size;
use crate::source::{FilesystemSource, MemorySource, SourceProvider};

/// Value of `X-Image-From` for cache hits
pub const FROM_CACHE: &str = "cache";
/// Value of `X-Image-From` for freshly transformed images
pub const FROM_SOURCE: &str = "source";

/// The request orchestrator
///
/// Collaborators are injected once at startup and shared by every request.
pub struct ImageService {
    pipeline: NegotiationPipeline,
    source: Arc<dyn SourceProvider>,
    cache: Arc<dyn CacheProvider>,
    engine: Arc<dyn TransformEngine>,
    metrics: Arc<Metrics>,
    request_timeout: Duration,
    max_body_size: usize,
    cache_max_age: u64,
    start_time: Instant,
}

impl ImageService {
    pub fn new(
        pipeline: NegotiationPipeline,
        source: Arc<dyn SourceProvider>,
        cache: Arc<dyn CacheProvider>,
        engine: Arc<dyn TransformEngine>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            pipeline,
            source,
            cache,
            engine,
            metrics,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            cache_max_age: DEFAULT_CACHE_LIFE_TIME_SECS,
            start_time: Instant::now(),
        }
    }

    /// Build the service and its providers from configuration
    ///
    /// Cache providers start their eviction task here, so this must run
    /// inside a Tokio runtime.
    pub fn from_config(config: &Config, metrics: Arc<Metrics>) -> Self {
        let image = &config.image;

        let source: Arc<dyn SourceProvider> = match image.source.provider {
            ProviderKind::Fs => Arc::new(FilesystemSource::new(&image.source.fs.path)),
            ProviderKind::Memory => Arc::new(MemorySource::new()),
        };

        let policy = image.cache.eviction_policy();
        let cache: Arc<dyn CacheProvider> = match image.cache.provider {
            ProviderKind::Fs => Arc::new(FilesystemCache::new(&image.cache.fs.path, policy)),
            ProviderKind::Memory => {
                Arc::new(MemoryCache::new(image.cache.memory.limit_bytes(), policy))
            }
        };

        tracing::info!(
            source = source.name(),
            cache = cache.name(),
            life_time_seconds = policy.life_time.as_secs(),
            clean_interval_seconds = policy.clean_interval.as_secs(),
            "Image providers initialized"
        );

        Self::new(
            NegotiationPipeline::from_config(config),
            source,
            cache,
            Arc::new(
                ImageProcessor::new(image.max_concurrent_transforms)
                    .with_limits(image.dimension_limits()),
            ),
            metrics,
        )
        .with_request_timeout(config.server.request_timeout())
        .with_max_body_size(config.server.max_body_size)
        .with_cache_max_age(policy.life_time.as_secs())
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// `max-age` advertised in `Cache-Control`
    pub fn with_cache_max_age(mut self, seconds: u64) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Stop background work owned by the providers
    pub fn shutdown(&self) {
        self.cache.shutdown();
    }

    /// Answer one request; every failure becomes an error response
    pub async fn handle(&self, request: ImageRequest) -> ImageResponse {
        if request.method == Method::GET {
            match request.path.as_str() {
                HEALTH_PATH => return handle_health(self.start_time),
                METRICS_PATH => return handle_metrics(&self.metrics),
                _ => {}
            }
        }

        let outcome = match tokio::time::timeout(self.request_timeout, self.dispatch(&request)).await
        {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout {
                timeout_ms: self.request_timeout.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(response) => response,
            Err(err) => {
                if err.to_http_status().is_server_error() {
                    tracing::error!(path = %request.path, error = %err, "Request failed");
                } else {
                    tracing::debug!(path = %request.path, error = %err, "Request rejected");
                }
                ImageResponse::failure(&err)
            }
        }
    }

    async fn dispatch(&self, request: &ImageRequest) -> Result<ImageResponse, ServiceError> {
        match request.method {
            Method::GET => self.get(request).await,
            Method::POST => self.upload(request).await,
            Method::DELETE => self.delete(request).await,
            ref other => Err(ServiceError::MethodNotAllowed {
                method: other.to_string(),
            }),
        }
    }

    /// GET: serve a derivative from the cache or build it from the source
    pub async fn get(&self, request: &ImageRequest) -> Result<ImageResponse, ServiceError> {
        let negotiated = self.pipeline.negotiate_read(request)?;
        let resource = negotiated.resource;

        match self.cache.get(&resource).await {
            Ok(hit) => {
                self.metrics.record_cache_hit();
                self.metrics.record_delivered(hit.size());
                return Ok(self.serve(&hit, FROM_CACHE, &negotiated.headers, &request.headers));
            }
            Err(err) if err.is_miss() => {}
            Err(err) => {
                tracing::warn!(
                    path = %resource.path(),
                    provider = self.cache.name(),
                    error = %err,
                    "Cache lookup failed, falling back to source"
                );
            }
        }

        let original = self.source.get(resource.path()).await.map_err(|err| {
            let mapped = ServiceError::from_source(resource.path(), err);
            if let ServiceError::IoFailure { message } = &mapped {
                tracing::error!(path = %resource.path(), error = %message, "Source provider failed");
            }
            mapped
        })?;

        let options = match resource.options() {
            Some(options) => Arc::clone(options),
            None => {
                return Err(ServiceError::EngineFailure {
                    message: "negotiated resource has no options".to_string(),
                })
            }
        };

        let started = Instant::now();
        let output = self
            .engine
            .transform(original.body().clone(), Arc::clone(&options))
            .await?;
        self.metrics
            .observe_transform(started.elapsed().as_secs_f64());

        let derivative = Resource::new(resource.path())
            .with_options(options)
            .with_body(output.body)
            .with_mime_type(output.mime_type)
            .with_modified_at(original.modified_at());

        self.metrics.record_cache_miss();
        self.metrics.record_delivered(derivative.size());
        let response = self.serve(&derivative, FROM_SOURCE, &negotiated.headers, &request.headers);

        self.populate_cache(derivative);

        Ok(response)
    }

    /// Write a derivative to the cache without holding up the response
    ///
    /// The task is detached from the request, so a client disconnect or the
    /// request deadline does not cancel it.
    fn populate_cache(&self, derivative: Resource) {
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            if let Err(err) = cache.set(&derivative).await {
                tracing::error!(
                    path = %derivative.path(),
                    provider = cache.name(),
                    error = %err,
                    "Cache population failed"
                );
            }
        });
    }

    fn serve(
        &self,
        resource: &Resource,
        from: &str,
        negotiated: &HeaderMap,
        request: &HeaderMap,
    ) -> ImageResponse {
        let mut response = ImageResponse::new(StatusCode::OK);
        response.extend_headers(negotiated);
        if let Some(mime_type) = resource.mime_type() {
            response.set_header(CONTENT_TYPE, mime_type);
        }
        response.set_header(X_IMAGE_FROM, from);
        response.set_header(LAST_MODIFIED, &http_date(resource.modified_at()));
        response.set_header(
            CACHE_CONTROL,
            &format!("public, max-age={}", self.cache_max_age),
        );

        if not_modified(request, resource.modified_at()) {
            response.status = StatusCode::NOT_MODIFIED;
            response.headers.remove(CONTENT_TYPE);
            return response;
        }

        response.body = resource.body().clone();
        response
    }

    /// Check an upload from its head alone, before any body is read
    ///
    /// Runs path safety, the extension filter and auth, then rejects a
    /// declared `Content-Length` above the body limit. Returns the decoded
    /// path.
    pub fn admit_upload(&self, head: &ImageRequest) -> Result<String, ServiceError> {
        let path = self.pipeline.negotiate_write(head)?;

        let declared = head
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<usize>().ok());
        if let Some(size) = declared {
            if size > self.max_body_size {
                return Err(ServiceError::PayloadTooLarge {
                    size,
                    max_size: self.max_body_size,
                });
            }
        }

        Ok(path)
    }

    /// POST: store a new source image and drop its stale derivatives
    pub async fn upload(&self, request: &ImageRequest) -> Result<ImageResponse, ServiceError> {
        let path = self.admit_upload(request)?;

        validate_body_size(request.body.len(), self.max_body_size).map_err(|_| {
            ServiceError::PayloadTooLarge {
                size: request.body.len(),
                max_size: self.max_body_size,
            }
        })?;

        let content_type = request
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let image = extract_image(content_type, request.body.clone()).await?;

        let resource = Resource::new(&path)
            .with_body(image)
            .with_modified_at(SystemTime::now());
        self.source.set(&resource).await.map_err(|err| {
            let mapped = ServiceError::from_source(&path, err);
            tracing::error!(path = %path, error = %mapped, "Source write failed");
            mapped
        })?;

        if let Err(err) = self.cache.del(&path).await {
            tracing::warn!(path = %path, error = %err, "Cache invalidation after upload failed");
        }

        let receipt = UploadReceipt::new(&path, resource.body());
        self.metrics.record_received(receipt.size);
        tracing::info!(
            path = %path,
            size = receipt.size,
            mime_type = %receipt.mime_type,
            "Image uploaded"
        );

        let body = serde_json::to_value(&receipt).map_err(|e| ServiceError::IoFailure {
            message: e.to_string(),
        })?;
        Ok(ImageResponse::json(StatusCode::CREATED, &body))
    }

    /// DELETE: clear the cache family, and the source too with `from=source`
    pub async fn delete(&self, request: &ImageRequest) -> Result<ImageResponse, ServiceError> {
        let path = self.pipeline.negotiate_write(request)?;
        let from_source = request.query_param("from").as_deref() == Some(FROM_SOURCE);

        let cache_cleared = match self.cache.del(&path).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "Cache delete failed");
                false
            }
        };

        let source_cleared = if from_source {
            match self.source.del(&path).await {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "Source delete failed");
                    false
                }
            }
        } else {
            false
        };

        let body = serde_json::json!({
            "cache": cache_cleared,
            "source": source_cleared,
        });
        Ok(ImageResponse::json(StatusCode::OK, &body))
    }
}

/// RFC 7231 IMF-fixdate
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Whether `If-Modified-Since` is at or after `modified_at` (second precision)
fn not_modified(request: &HeaderMap, modified_at: SystemTime) -> bool {
    let since = match request
        .get(IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
    {
        Some(since) => since.timestamp(),
        None => return false,
    };

    let modified = modified_at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    modified <= since
}
