//! Protocol-neutral HTTP messages.
//!
//! The interception layers speak `hyper` types; the pipeline works on
//! [`CanonicalRequest`] / [`CanonicalResponse`]. Conversions live here so the
//! rest of the crate never touches wire types.
//!
//! # Module Structure
//!
//! - `headers` - Case-insensitive multi-valued header map
//! - `request` - Canonical request and wire conversion
//! - `response` - Canonical response and wire conversion

mod headers;
mod request;
mod response;

pub use headers::Headers;
pub use request::CanonicalRequest;
pub use response::CanonicalResponse;

/// Media type used for every synthesized body.
pub const APPLICATION_JSON: &str = "application/json";

/// True for `application/json` and structured `+json` media types.
pub fn is_json_media_type(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence == APPLICATION_JSON || essence.ends_with("+json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_json_media_type() {
        assert!(is_json_media_type("application/json"));
        assert!(is_json_media_type("Application/JSON; charset=utf-8"));
        assert!(is_json_media_type("application/problem+json"));
        assert!(!is_json_media_type("text/plain"));
        assert!(!is_json_media_type(""));
    }
}
