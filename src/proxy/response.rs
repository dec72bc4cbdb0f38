//! Framework-free responses
//!
//! Handlers build an `ImageResponse`; the Pingora adapter is the only code
//! that writes to the session. This keeps every handler testable without a
//! live connection and records the status at the point it is decided.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::error::ServiceError;

#[derive(Debug, Clone)]
pub struct ImageResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ImageResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Response carrying `body` with the given content type
    pub fn with_body(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Self {
        let mut response = Self::new(status);
        response.body = body.into();
        response.set_header(CONTENT_TYPE, content_type);
        response
    }

    /// JSON body, always marked `nosniff`
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut response = Self::with_body(status, "application/json", value.to_string());
        response.set_header(
            HeaderName::from_static("x-content-type-options"),
            "nosniff",
        );
        response
    }

    /// Prometheus text exposition
    pub fn prometheus(body: String) -> Self {
        Self::with_body(StatusCode::OK, "text/plain; version=0.0.4", body)
    }

    /// JSON error body `{"error":{"code":..,"message":..}}`
    pub fn failure(err: &ServiceError) -> Self {
        let status = err.to_http_status();
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": err.public_message(),
            }
        });

        let mut response = Self::json(status, &body);
        if let ServiceError::MethodNotAllowed { .. } = err {
            response.set_header(http::header::ALLOW, "GET, POST, DELETE");
        }
        response
    }

    /// Replace a header; values that are not valid header text are dropped
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
    }

    /// Merge negotiated headers, keeping every `Vary` entry
    pub fn extend_headers(&mut self, headers: &HeaderMap) {
        let mut last: Option<&HeaderName> = None;
        for (name, value) in headers {
            if name == http::header::VARY {
                self.headers.append(name.clone(), value.clone());
            } else {
                if last != Some(name) {
                    self.headers.remove(name);
                }
                self.headers.append(name.clone(), value.clone());
            }
            last = Some(name);
        }
    }

    /// `Vary` entries joined into a single header value
    pub fn vary(&self) -> Option<String> {
        let values: Vec<&str> = self
            .headers
            .get_all(http::header::VARY)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    /// Header pairs ready to be written, with `Vary` folded into one line
    /// and `Content-Length` set from the body
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(name, _)| **name != http::header::VARY && **name != CONTENT_LENGTH)
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        if let Some(vary) = self.vary() {
            pairs.push(("vary".to_string(), vary));
        }
        pairs.push(("content-length".to_string(), self.body.len().to_string()));
        pairs
    }
}
