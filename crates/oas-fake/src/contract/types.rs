//! Type definitions for contract operations.

use super::path_pattern::PathPattern;
use crate::http::is_json_media_type;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a contract operation: path pattern plus method.
///
/// The method is normalised to uppercase so equality is case-insensitive on
/// the method and exact on the path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationAddress {
    path: String,
    method: String,
}

impl OperationAddress {
    pub fn new(path: impl Into<String>, method: &str) -> Self {
        Self {
            path: path.into(),
            method: method.to_uppercase(),
        }
    }

    /// The path pattern, e.g. `/pets/{petId}`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Registry key: `METHOD:/path/pattern`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.method, self.path)
    }
}

impl fmt::Display for OperationAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    pub media_type: String,
    pub schema: Option<serde_json::Value>,
}

impl MediaType {
    pub fn is_json(&self) -> bool {
        is_json_media_type(&self.media_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    pub required: bool,
    pub content: Vec<MediaType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    pub description: Option<String>,
    pub content: Vec<MediaType>,
}

impl ResponseSpec {
    /// First JSON media type declared for this response.
    pub fn json_media(&self) -> Option<&MediaType> {
        self.content.iter().find(|m| m.is_json())
    }
}

/// One operation of the contract.
#[derive(Debug, Clone)]
pub struct Operation {
    pub address: OperationAddress,
    pub pattern: PathPattern,
    pub operation_id: Option<String>,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    /// Declared responses keyed by status (`"200"`, `"4XX"`, `"default"`)
    pub responses: Vec<(String, ResponseSpec)>,
}

impl Operation {
    /// Response declared for a status: exact code, then `NXX` range, then `default`.
    pub fn response_for(&self, status: u16) -> Option<&ResponseSpec> {
        let exact = status.to_string();
        let range = format!("{}XX", status / 100);
        self.lookup_response(|key| key == exact)
            .or_else(|| self.lookup_response(|key| key.eq_ignore_ascii_case(&range)))
            .or_else(|| self.lookup_response(|key| key == "default"))
    }

    fn lookup_response(&self, pred: impl Fn(&str) -> bool) -> Option<&ResponseSpec> {
        self.responses
            .iter()
            .find(|(key, _)| pred(key))
            .map(|(_, spec)| spec)
    }

    pub fn parameters_in(&self, location: ParameterLocation) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }
}
