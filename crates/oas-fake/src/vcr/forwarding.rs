//! Forwarding intercepted calls to their real target.

use super::client::HttpClient;
use super::interceptor::InterceptError;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::HOST;
use hyper::{Request, Response};
use tracing::debug;

/// JSON error response, tagged with the failure kind.
pub fn error_response(status: u16, kind: &str, message: &str) -> Response<Bytes> {
    let body = serde_json::json!({ "error": message, "kind": kind }).to_string();
    let mut response = Response::new(Bytes::from(body));
    *response.status_mut() =
        hyper::StatusCode::from_u16(status).unwrap_or(hyper::StatusCode::INTERNAL_SERVER_ERROR);
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    if let Ok(value) = hyper::header::HeaderValue::from_str(kind) {
        response.headers_mut().insert(super::server::ERROR_HEADER, value);
    }
    response
}

/// Absolute URL of the real target: the request URI when absolute
/// (proxy-style), else `upstream` + path, else the `Host` header.
pub fn target_url(request: &Request<Bytes>, upstream: Option<&str>) -> Option<String> {
    let uri = request.uri();
    if uri.scheme().is_some() {
        return Some(uri.to_string());
    }
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    if let Some(upstream) = upstream {
        return Some(format!("{}{}", upstream.trim_end_matches('/'), path_and_query));
    }
    request
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(|host| format!("http://{host}{path_and_query}"))
}

/// Send the request to `target` and collect the whole response.
pub async fn forward(
    client: &HttpClient,
    request: &Request<Bytes>,
    target: &str,
) -> Result<Response<Bytes>, InterceptError> {
    debug!("Forwarding to: {}", target);
    let fail = |reason: String| InterceptError::Forward {
        target: target.to_string(),
        reason,
    };

    let mut upstream_req = Request::builder()
        .method(request.method().clone())
        .uri(target);
    // Copy headers (skip host, the client sets it from the target)
    for (key, value) in request.headers() {
        if key != HOST {
            upstream_req = upstream_req.header(key, value);
        }
    }
    let upstream_req = upstream_req
        .body(Full::new(request.body().clone()))
        .map_err(|e| fail(e.to_string()))?;

    let upstream_response = client
        .request(upstream_req)
        .await
        .map_err(|e| fail(e.to_string()))?;
    let (parts, body) = upstream_response.into_parts();
    let body = body
        .collect()
        .await
        .map_err(|e| fail(e.to_string()))?
        .to_bytes();
    Ok(Response::from_parts(parts, body))
}
