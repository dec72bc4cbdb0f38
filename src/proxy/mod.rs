// Proxy module - Pingora ProxyHttp implementation
// Every request is answered locally in request_filter; nothing is proxied.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_http::ResponseHeader;
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;

use crate::config::Config;
use crate::constants::X_IMAGE_FROM;
use crate::error::ServiceError;
use crate::metrics::Metrics;
use crate::pipeline::{ImageRequest, RequestContext};

pub mod image_handler;
pub mod response;
pub mod special_endpoints;
pub mod upload;

pub use image_handler::ImageService;
pub use response::ImageResponse;

/// HyperpicProxy implements the Pingora ProxyHttp trait
pub struct HyperpicProxy {
    service: Arc<ImageService>,
    metrics: Arc<Metrics>,
}

impl HyperpicProxy {
    pub fn new(service: Arc<ImageService>) -> Self {
        let metrics = Arc::clone(service.metrics());
        Self { service, metrics }
    }

    /// Build the proxy and its providers from configuration
    pub fn from_config(config: &Config, metrics: Arc<Metrics>) -> Self {
        Self::new(Arc::new(ImageService::from_config(config, metrics)))
    }

    pub fn service(&self) -> &Arc<ImageService> {
        &self.service
    }

    /// Read the whole request body, stopping once it exceeds `limit`
    async fn read_body(session: &mut Session, limit: usize) -> Result<Bytes, ServiceError> {
        let mut body = BytesMut::new();
        loop {
            match session.read_request_body().await {
                Ok(Some(chunk)) => {
                    body.extend_from_slice(&chunk);
                    if body.len() > limit {
                        return Err(ServiceError::PayloadTooLarge {
                            size: body.len(),
                            max_size: limit,
                        });
                    }
                }
                Ok(None) => return Ok(body.freeze()),
                Err(e) => {
                    return Err(ServiceError::BadRequest {
                        message: format!("Failed to read request body: {}", e),
                    })
                }
            }
        }
    }

    async fn write_response(session: &mut Session, response: ImageResponse) -> Result<()> {
        let mut header = ResponseHeader::build(response.status.as_u16(), None)?;
        for (name, value) in response.header_pairs() {
            header.insert_header(name, value)?;
        }

        let has_body = !response.body.is_empty();
        session
            .write_response_header(Box::new(header), !has_body)
            .await?;
        if has_body {
            session
                .write_response_body(Some(response.body), true)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProxyHttp for HyperpicProxy {
    type CTX = RequestContext;

    fn new_ctx(&self) -> Self::CTX {
        RequestContext::new("GET".to_string(), "/".to_string())
    }

    /// Never reached: request_filter answers every request
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        Err(pingora_core::Error::explain(
            pingora_core::ErrorType::InternalError,
            "hyperpic has no upstream",
        ))
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let req = session.req_header();
        let method = req.method.clone();
        let path = req.uri.path().to_string();
        let query = req.uri.query().map(str::to_string);
        let headers = req.headers.clone();

        *ctx = RequestContext::new(method.to_string(), path.clone());

        let mut request = ImageRequest {
            method,
            path,
            query,
            headers,
            body: Bytes::new(),
        };

        // Path, extension and auth are settled on the head; the body is only
        // buffered for uploads that pass them.
        if request.method == http::Method::POST {
            let admitted = match self.service.admit_upload(&request) {
                Ok(_) => Self::read_body(session, self.service.max_body_size()).await,
                Err(err) => Err(err),
            };
            match admitted {
                Ok(body) => request.body = body,
                Err(err) => {
                    tracing::debug!(request_id = %ctx.request_id(), error = %err, "Upload rejected");
                    Self::write_response(session, ImageResponse::failure(&err)).await?;
                    return Ok(true);
                }
            }
        }

        let response = self.service.handle(request).await;
        match response.headers.get(&X_IMAGE_FROM).and_then(|v| v.to_str().ok()) {
            Some(image_handler::FROM_CACHE) => ctx.set_image_from(image_handler::FROM_CACHE),
            Some(image_handler::FROM_SOURCE) => ctx.set_image_from(image_handler::FROM_SOURCE),
            _ => {}
        }

        Self::write_response(session, response).await?;
        Ok(true)
    }

    async fn logging(
        &self,
        session: &mut Session,
        _e: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status_code = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(500);

        self.metrics.record_request(ctx.method(), status_code);

        tracing::info!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            status = status_code,
            duration_ms = ctx.elapsed_ms(),
            from = ctx.image_from().unwrap_or("-"),
            "Request completed"
        );
    }
}
