//! The bound API contract.
//!
//! A [`Contract`] is an immutable, ordered list of operations flattened out of
//! an OpenAPI document. Everything downstream (resolver, validators, faker)
//! reads it through `Arc<Contract>` and never mutates it.
//!
//! # Module Structure
//!
//! - `types` - Operation, parameter and response descriptions
//! - `path_pattern` - `{name}` placeholder matching
//! - `loader` - YAML/JSON parsing and local `$ref` inlining

mod loader;
mod path_pattern;
mod types;

pub use path_pattern::PathPattern;
pub use types::{
    MediaType, Operation, OperationAddress, Parameter, ParameterLocation, RequestBody,
    ResponseSpec,
};

use crate::error::FakeError;
use std::path::Path;

/// Parsed API description: the operations in declared order.
#[derive(Debug, Clone)]
pub struct Contract {
    title: Option<String>,
    version: Option<String>,
    operations: Vec<Operation>,
}

impl Contract {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, FakeError> {
        let document: serde_json::Value =
            serde_yaml::from_str(yaml).map_err(|e| FakeError::ContractParse(e.to_string()))?;
        Self::from_value(document)
    }

    pub fn from_json_str(json: &str) -> Result<Self, FakeError> {
        let document: serde_json::Value =
            serde_json::from_str(json).map_err(|e| FakeError::ContractParse(e.to_string()))?;
        Self::from_value(document)
    }

    /// Load from a file; `.json` files are parsed as JSON, anything else as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FakeError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FakeError::SchemaNotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FakeError::ContractParse(format!("{}: {e}", path.display())))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_yaml_str(&contents)
        }
    }

    pub fn from_value(document: serde_json::Value) -> Result<Self, FakeError> {
        let parsed = loader::parse_document(&document)?;
        Ok(Self {
            title: parsed.title,
            version: parsed.version,
            operations: parsed.operations,
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// First operation in declared order whose pattern matches `path` and
    /// whose method equals `method` (case-insensitive).
    pub fn find(&self, path: &str, method: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| {
            op.address.method().eq_ignore_ascii_case(method) && op.pattern.matches(path)
        })
    }

    /// Whether any operation's pattern matches `path`, regardless of method.
    pub fn matches_path(&self, path: &str) -> bool {
        self.operations.iter().any(|op| op.pattern.matches(path))
    }

    /// Exact lookup by path pattern and method.
    pub fn operation(&self, address: &OperationAddress) -> Option<&Operation> {
        self.operations.iter().find(|op| &op.address == address)
    }
}
