//! Canonical response and conversion from/to the wire.

use super::headers::Headers;
use super::APPLICATION_JSON;
use bytes::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Response, StatusCode};

/// Protocol-neutral response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl CanonicalResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// A response whose body is the serialized JSON value.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        let mut response = Self::new(status);
        response.headers.insert("Content-Type", APPLICATION_JSON);
        response.body = Bytes::from(value.to_string());
        response
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn content_type(&self) -> Option<String> {
        self.headers.get_line(CONTENT_TYPE.as_str())
    }

    pub fn body_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn from_wire(resp: &Response<Bytes>) -> Self {
        Self {
            status: resp.status().as_u16(),
            headers: Headers::from_header_map(resp.headers()),
            body: resp.body().clone(),
        }
    }

    /// Convert to a wire response, flattening multi-valued headers.
    ///
    /// A status outside the valid range becomes `500`.
    pub fn to_wire(&self) -> Response<Bytes> {
        let mut resp = Response::new(self.body.clone());
        *resp.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        *resp.headers_mut() = self.headers.to_header_map();
        resp
    }
}
