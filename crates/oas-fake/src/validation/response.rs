//! Response-side conformance.

use super::media_type_matches;
use super::schema::SchemaCache;
use crate::contract::{Contract, OperationAddress};
use crate::error::{FakeError, Mismatch, MismatchKind};
use crate::http::CanonicalResponse;
use serde_json::Value;
use std::sync::Arc;

/// Checks a (synthesized or overridden) response against the operation's
/// declared responses.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    contract: Arc<Contract>,
    schemas: SchemaCache,
}

impl ResponseValidator {
    pub fn new(contract: Arc<Contract>) -> Self {
        Self {
            contract,
            schemas: SchemaCache::new(),
        }
    }

    pub fn validate(
        &self,
        operation: &OperationAddress,
        response: &CanonicalResponse,
    ) -> Result<(), FakeError> {
        self.check(operation, response)
            .map_err(|mismatch| FakeError::ResponseValidationFailed {
                response: Box::new(response.clone()),
                path: operation.path().to_string(),
                method: operation.method().to_string(),
                mismatch,
            })
    }

    pub fn is_valid(&self, operation: &OperationAddress, response: &CanonicalResponse) -> bool {
        self.check(operation, response).is_ok()
    }

    fn check(&self, operation: &OperationAddress, response: &CanonicalResponse) -> Result<(), Mismatch> {
        let op = self.contract.operation(operation).ok_or_else(|| {
            Mismatch::new(
                MismatchKind::UnknownPath,
                format!("{operation} is not part of the contract"),
            )
        })?;
        let spec = op.response_for(response.status).ok_or_else(|| {
            Mismatch::new(
                MismatchKind::UndeclaredStatus,
                format!("status {} is not declared for {operation}", response.status),
            )
        })?;

        // A response without declared content accepts any body.
        if spec.content.is_empty() {
            return Ok(());
        }

        let content_type = response.content_type().ok_or_else(|| {
            Mismatch::new(MismatchKind::ContentType, "response has no Content-Type header")
        })?;
        let media = spec
            .content
            .iter()
            .find(|m| media_type_matches(&m.media_type, &content_type))
            .ok_or_else(|| {
                Mismatch::new(
                    MismatchKind::ContentType,
                    format!("content type '{content_type}' is not declared for status {}", response.status),
                )
            })?;

        let Some(schema) = media.schema.as_ref().filter(|_| media.is_json()) else {
            return Ok(());
        };
        let body: Value = serde_json::from_slice(&response.body).map_err(|e| {
            Mismatch::new(MismatchKind::InvalidBody, format!("response body is not valid JSON: {e}"))
        })?;
        self.schemas.check(schema, &body, MismatchKind::InvalidBody, "response body")
    }
}
