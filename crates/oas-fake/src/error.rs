//! Error taxonomy for the interception pipeline.

use crate::http::{CanonicalRequest, CanonicalResponse};
use crate::vcr::InterceptError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to the caller of a single intercepted call or session start.
#[derive(Debug, Error)]
pub enum FakeError {
    #[error("No OpenAPI contract has been bound to the session")]
    SchemaNotBound,

    #[error("OpenAPI contract file not found: {}", .0.display())]
    SchemaNotFound(PathBuf),

    #[error("Failed to parse OpenAPI contract: {0}")]
    ContractParse(String),

    #[error("Request validation failed for {} {}: {mismatch}", .request.method, .request.url)]
    RequestValidationFailed {
        request: Box<CanonicalRequest>,
        mismatch: Mismatch,
    },

    #[error("Response validation failed for {method} {path} (status {}): {mismatch}", .response.status)]
    ResponseValidationFailed {
        response: Box<CanonicalResponse>,
        path: String,
        method: String,
        mismatch: Mismatch,
    },

    #[error("No callback registered for {method} {path} and no default response provided")]
    NoOverrideAvailable { method: String, path: String },

    #[error("Invalid mode \"{0}\". Valid modes are: record, replay, passthrough")]
    InvalidModeString(String),

    #[error("Failed to generate a fake response for {method} {path}: {reason}")]
    GenerationFailed {
        method: String,
        path: String,
        reason: String,
    },

    #[error(transparent)]
    Intercept(#[from] InterceptError),
}

impl FakeError {
    /// Short machine-readable name, used in the `x-oas-fake-error` header.
    pub fn kind(&self) -> &'static str {
        match self {
            FakeError::SchemaNotBound => "schema-not-bound",
            FakeError::SchemaNotFound(_) => "schema-not-found",
            FakeError::ContractParse(_) => "contract-parse",
            FakeError::RequestValidationFailed { .. } => "request-validation",
            FakeError::ResponseValidationFailed { .. } => "response-validation",
            FakeError::NoOverrideAvailable { .. } => "no-override",
            FakeError::InvalidModeString(_) => "invalid-mode",
            FakeError::GenerationFailed { .. } => "generation",
            FakeError::Intercept(_) => "intercept",
        }
    }

    /// The structural mismatch behind a validation failure, if any.
    pub fn mismatch(&self) -> Option<&Mismatch> {
        match self {
            FakeError::RequestValidationFailed { mismatch, .. }
            | FakeError::ResponseValidationFailed { mismatch, .. } => Some(mismatch),
            _ => None,
        }
    }
}

/// What the validation collaborator found wrong with a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Mismatch {
    pub kind: MismatchKind,
    pub message: String,
}

impl Mismatch {
    pub fn new(kind: MismatchKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    /// No path pattern in the contract matches the request path
    UnknownPath,
    /// The path matches but the method is not declared for it
    MethodNotAllowed,
    MissingParameter,
    InvalidParameter,
    MissingBody,
    InvalidBody,
    /// The response status is not declared and there is no `default`
    UndeclaredStatus,
    ContentType,
    /// The contract itself holds a schema that cannot be compiled
    InvalidSchema,
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MismatchKind::UnknownPath => "unknown path",
            MismatchKind::MethodNotAllowed => "method not allowed",
            MismatchKind::MissingParameter => "missing parameter",
            MismatchKind::InvalidParameter => "invalid parameter",
            MismatchKind::MissingBody => "missing body",
            MismatchKind::InvalidBody => "invalid body",
            MismatchKind::UndeclaredStatus => "undeclared status",
            MismatchKind::ContentType => "content type",
            MismatchKind::InvalidSchema => "invalid schema",
        };
        f.write_str(name)
    }
}
