//! Canonical request and conversion from/to the wire.

use super::headers::Headers;
use bytes::Bytes;
use hyper::header::HOST;
use hyper::Request;

/// Protocol-neutral request, owned by the pipeline for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    /// Uppercase HTTP method
    pub method: String,
    /// Absolute URL when the target is known, otherwise path and query
    pub url: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl CanonicalRequest {
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            method: method.to_uppercase(),
            url: url.into(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// The path component of the URL, without query or fragment.
    pub fn path(&self) -> &str {
        let (path, _) = split_url(&self.url);
        path
    }

    /// The raw query string, if any.
    pub fn query(&self) -> Option<&str> {
        let (_, query) = split_url(&self.url);
        query
    }

    /// Decoded query parameters in order of appearance.
    pub fn query_params(&self) -> Vec<(String, String)> {
        self.query().map(parse_query_string).unwrap_or_default()
    }

    pub fn header_line(&self, name: &str) -> Option<String> {
        self.headers.get_line(name)
    }

    /// Build from an intercepted wire request.
    ///
    /// Proxy-style requests carry an absolute URI; origin-form requests are
    /// made absolute with the `Host` header when present.
    pub fn from_wire(req: &Request<Bytes>) -> Self {
        let uri = req.uri();
        let url = if uri.scheme().is_some() {
            uri.to_string()
        } else {
            let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
            match req.headers().get(HOST).and_then(|h| h.to_str().ok()) {
                Some(host) => format!("http://{host}{path_and_query}"),
                None => path_and_query.to_string(),
            }
        };

        Self {
            method: req.method().as_str().to_uppercase(),
            url,
            headers: Headers::from_header_map(req.headers()),
            body: req.body().clone(),
        }
    }

    /// Convert back to a wire request, flattening multi-valued headers.
    pub fn to_wire(&self) -> Result<Request<Bytes>, hyper::http::Error> {
        let mut req = Request::builder()
            .method(self.method.as_str())
            .uri(self.url.as_str())
            .body(self.body.clone())?;
        *req.headers_mut() = self.headers.to_header_map();
        Ok(req)
    }
}

/// Split a URL into its path and optional query, ignoring scheme, authority
/// and fragment. Never fails: an empty URL yields path `/`.
fn split_url(url: &str) -> (&str, Option<&str>) {
    let without_fragment = url.split('#').next().unwrap_or("");
    let after_authority = match without_fragment.find("://") {
        Some(idx) => {
            let rest = &without_fragment[idx + 3..];
            match rest.find(['/', '?']) {
                Some(slash) => &rest[slash..],
                None => "",
            }
        }
        None => without_fragment,
    };

    let (path, query) = match after_authority.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (after_authority, None),
    };
    let path = if path.is_empty() { "/" } else { path };
    (path, query.filter(|q| !q.is_empty()))
}

/// Parse a query string into decoded key/value pairs.
pub(crate) fn parse_query_string(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}
