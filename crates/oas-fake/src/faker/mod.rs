//! Fake response generation.
//!
//! [`FakeResponseGenerator`] turns whatever a [`ResponseFaker`] produces into
//! a JSON [`CanonicalResponse`]. The default faker walks the contract's
//! response schema with the `fake` crate.
//!
//! # Module Structure
//!
//! - `options` - Generation knobs (optional fields, array bounds)
//! - `schema_faker` - JSON-Schema driven value generation

mod options;
mod schema_faker;

pub use options::FakerOptions;
pub use schema_faker::{FakeDataError, ResponseFaker, SchemaFaker};

use crate::contract::{Contract, OperationAddress};
use crate::error::FakeError;
use crate::http::CanonicalResponse;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Status used for the default synthesized response.
pub const DEFAULT_STATUS: u16 = 200;

/// Produces schema-conformant synthetic responses.
#[derive(Clone)]
pub struct FakeResponseGenerator {
    faker: Arc<dyn ResponseFaker>,
}

impl FakeResponseGenerator {
    /// Generator backed by the built-in [`SchemaFaker`].
    pub fn new(contract: Arc<Contract>, options: FakerOptions) -> Self {
        Self::with_faker(Arc::new(SchemaFaker::new(contract, options)))
    }

    pub fn with_faker(faker: Arc<dyn ResponseFaker>) -> Self {
        Self { faker }
    }

    /// Default response for the operation (status 200).
    pub fn generate(&self, operation: &OperationAddress) -> Result<CanonicalResponse, FakeError> {
        self.generate_for_path(operation.path(), operation.method(), DEFAULT_STATUS)
    }

    pub fn generate_with_status(
        &self,
        operation: &OperationAddress,
        status: u16,
    ) -> Result<CanonicalResponse, FakeError> {
        self.generate_for_path(operation.path(), operation.method(), status)
    }

    /// Build a JSON response for a path pattern, method and status.
    ///
    /// A value the faker cannot represent as JSON becomes a `null` body; the
    /// response validator remains the conformance gate.
    pub fn generate_for_path(
        &self,
        path: &str,
        method: &str,
        status: u16,
    ) -> Result<CanonicalResponse, FakeError> {
        let body = match self.faker.mock_response(path, &method.to_uppercase(), status) {
            Ok(value) => value,
            Err(FakeDataError::Unrepresentable(reason)) => {
                warn!(
                    "Fake data for {} {} ({}) is not representable as JSON, substituting null: {}",
                    method, path, status, reason
                );
                Value::Null
            }
            Err(e) => {
                return Err(FakeError::GenerationFailed {
                    method: method.to_uppercase(),
                    path: path.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        Ok(CanonicalResponse::json(status, &body))
    }
}
