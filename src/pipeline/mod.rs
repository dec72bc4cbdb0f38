// Request pipeline module - request context and the negotiation chain
//
// Every image request runs the same ordered steps before any provider is
// touched: path safety, extension filter, options parsing, content type
// negotiation, client hints. Write requests run path safety, extension
// filter and bearer auth.

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, VARY};
use http::{HeaderMap, HeaderValue, Method};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::auth;
use crate::config::Config;
use crate::constants::NEGOTIABLE_MIME_TYPES;
use crate::error::ServiceError;
use crate::image_optimizer::{extension_of, format_from_mime, Options};
use crate::resource::Resource;
use crate::security::check_path_traversal;

pub mod accept;
pub mod client_hints;

pub use accept::negotiate_content_type;
pub use client_hints::apply_client_hints;

/// Per-request state carried through the proxy hooks
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: String,
    path: String,
    started_at: Instant,
    image_from: Option<&'static str>,
}

impl RequestContext {
    /// Create a new RequestContext with a fresh UUID v4 request ID
    pub fn new(method: String, path: String) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method,
            path,
            started_at: Instant::now(),
            image_from: None,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Milliseconds since the request was accepted
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Where the served image came from (`cache` or `source`)
    pub fn image_from(&self) -> Option<&'static str> {
        self.image_from
    }

    pub fn set_image_from(&mut self, from: &'static str) {
        self.image_from = Some(from);
    }
}

/// An inbound request, independent of the HTTP server in front of it
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub method: Method,
    /// Raw, still percent-encoded path
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ImageRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Value of a query parameter, percent-decoded
    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| urlencoding::decode(v).ok().map(|v| v.into_owned()))
    }
}

/// Outcome of a successful read negotiation
#[derive(Debug)]
pub struct Negotiated {
    /// Resource carrying the final, frozen options
    pub resource: Resource,
    /// Headers the response must carry (`Content-Type`, `Vary`, `Content-DPR`)
    pub headers: HeaderMap,
}

/// The ordered negotiation chain
#[derive(Debug, Clone)]
pub struct NegotiationPipeline {
    extensions: HashSet<String>,
    save_data_quality: u8,
    secret: String,
}

impl NegotiationPipeline {
    pub fn new<I, S>(extensions: I, save_data_quality: u8, secret: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().to_lowercase())
                .collect(),
            save_data_quality,
            secret: secret.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.image.support.extensions,
            config.image.save_data_quality,
            config.auth.secret.clone(),
        )
    }

    /// Negotiate a GET request into a resource with final options
    pub fn negotiate_read(&self, request: &ImageRequest) -> Result<Negotiated, ServiceError> {
        let path = self.resolve_path(&request.path)?;
        self.filter_extension(&path)?;

        let mut options = parse_options(request.query.as_deref())?;
        let mut headers = HeaderMap::new();
        resolve_content_type(&request.headers, &mut options, &mut headers);
        apply_client_hints(
            &request.headers,
            &mut options,
            &mut headers,
            self.save_data_quality,
        );

        let resource = Resource::new(path).with_options(Arc::new(options));
        Ok(Negotiated { resource, headers })
    }

    /// Check a POST or DELETE request and return its decoded path
    pub fn negotiate_write(&self, request: &ImageRequest) -> Result<String, ServiceError> {
        let path = self.resolve_path(&request.path)?;
        self.filter_extension(&path)?;

        auth::authorize(&request.headers, &self.secret).map_err(|err| {
            tracing::debug!(path = %path, error = %err, "Write request rejected");
            ServiceError::from(err)
        })?;

        Ok(path)
    }

    /// Percent-decode the path and reject traversal attempts
    pub fn resolve_path(&self, raw: &str) -> Result<String, ServiceError> {
        let invalid = || ServiceError::InvalidPath {
            path: raw.to_string(),
        };

        let decoded = urlencoding::decode(raw).map_err(|_| invalid())?;
        if check_path_traversal(&decoded).is_err() {
            tracing::warn!(path = %raw, "Rejected request path traversal attempt");
            return Err(invalid());
        }

        if decoded.starts_with('/') {
            Ok(decoded.into_owned())
        } else {
            Ok(format!("/{}", decoded))
        }
    }

    /// Reject paths whose extension is not in the allow-set
    pub fn filter_extension(&self, path: &str) -> Result<(), ServiceError> {
        let extension = extension_of(path);
        if extension.is_empty() || !self.extensions.contains(&extension) {
            return Err(ServiceError::UnsupportedMedia {
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

/// Build options from the raw query string
pub fn parse_options(query: Option<&str>) -> Result<Options, ServiceError> {
    Options::from_query(query.unwrap_or("")).map_err(|err| ServiceError::MalformedOptions {
        message: err.to_string(),
    })
}

/// Resolve an unset output format from the `Accept` header
///
/// An explicit `fm` leaves `Accept` ignored and no header is written.
pub fn resolve_content_type(request: &HeaderMap, options: &mut Options, response: &mut HeaderMap) {
    if !options.format.is_unknown() {
        return;
    }

    let accept = request.get(ACCEPT).and_then(|v| v.to_str().ok());
    let mime = negotiate_content_type(accept, NEGOTIABLE_MIME_TYPES);
    options.format = format_from_mime(mime);

    response.insert(CONTENT_TYPE, HeaderValue::from_static(mime));
    response.append(VARY, HeaderValue::from_static("Accept"));
}
