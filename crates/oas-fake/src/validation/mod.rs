//! Contract conformance checks for requests and responses.
//!
//! Both validators are pure functions of the contract and the message; they
//! hold no mutable state and can be shared across concurrent calls.
//!
//! # Module Structure
//!
//! - `schema` - OpenAPI schema normalisation and JSON-Schema evaluation
//! - `request` - Operation lookup, parameters and request bodies
//! - `response` - Status, content type and response bodies

mod request;
mod response;
mod schema;

pub use request::RequestValidator;
pub use response::ResponseValidator;
pub use schema::{check_value, normalize_schema, SchemaCache};

/// Whether an actual `Content-Type` satisfies a declared media type.
/// Parameters are ignored; `*/*` and `type/*` ranges are honored.
pub(crate) fn media_type_matches(declared: &str, actual: &str) -> bool {
    fn essence(media_type: &str) -> String {
        media_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase()
    }
    let declared = essence(declared);
    let actual = essence(actual);
    if declared == "*/*" || declared == actual {
        return true;
    }
    match declared.strip_suffix("/*") {
        Some(top) => actual.split('/').next() == Some(top),
        None => false,
    }
}
