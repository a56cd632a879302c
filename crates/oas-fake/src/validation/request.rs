//! Request-side conformance.

use super::schema::SchemaCache;
use crate::contract::{Contract, Operation, OperationAddress, ParameterLocation};
use crate::error::{FakeError, Mismatch, MismatchKind};
use crate::http::{is_json_media_type, CanonicalRequest};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Checks that an intercepted request addresses a contract operation and
/// carries the parameters and body it declares.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    contract: Arc<Contract>,
    schemas: SchemaCache,
}

impl RequestValidator {
    pub fn new(contract: Arc<Contract>) -> Self {
        Self {
            contract,
            schemas: SchemaCache::new(),
        }
    }

    /// Validate a request and return the operation it addresses.
    pub fn validate(&self, request: &CanonicalRequest) -> Result<OperationAddress, FakeError> {
        self.check(request)
            .map_err(|mismatch| FakeError::RequestValidationFailed {
                request: Box::new(request.clone()),
                mismatch,
            })
    }

    /// Same rules as [`validate`](Self::validate), without the error.
    pub fn is_valid(&self, request: &CanonicalRequest) -> bool {
        self.check(request).is_ok()
    }

    /// Operation lookup only: the first declared operation whose pattern
    /// matches the request path and whose method matches.
    pub fn locate(&self, request: &CanonicalRequest) -> Result<&Operation, Mismatch> {
        let path = request.path();
        if let Some(op) = self.contract.find(path, &request.method) {
            return Ok(op);
        }
        if self.contract.matches_path(path) {
            Err(Mismatch::new(
                MismatchKind::MethodNotAllowed,
                format!("{} is not declared for {}", request.method, path),
            ))
        } else {
            Err(Mismatch::new(
                MismatchKind::UnknownPath,
                format!("no operation matches {path}"),
            ))
        }
    }

    fn check(&self, request: &CanonicalRequest) -> Result<OperationAddress, Mismatch> {
        let operation = self.locate(request)?;
        debug!("Request {} {} addresses {}", request.method, request.url, operation.address);

        self.check_parameters(operation, request)?;
        self.check_body(operation, request)?;
        Ok(operation.address.clone())
    }

    fn check_parameters(&self, operation: &Operation, request: &CanonicalRequest) -> Result<(), Mismatch> {
        let path_values = operation.pattern.captures(request.path()).unwrap_or_default();
        let query = request.query_params();
        let cookies = request
            .header_line("cookie")
            .map(|line| parse_cookies(&line))
            .unwrap_or_default();

        for param in &operation.parameters {
            let raw: Vec<String> = match param.location {
                ParameterLocation::Path => lookup(&path_values, &param.name),
                ParameterLocation::Query => lookup(&query, &param.name),
                ParameterLocation::Cookie => lookup(&cookies, &param.name),
                ParameterLocation::Header => request.headers.get_all(&param.name).to_vec(),
            };

            if raw.is_empty() {
                if param.required {
                    return Err(Mismatch::new(
                        MismatchKind::MissingParameter,
                        format!("required {} parameter '{}' is missing", location_name(param.location), param.name),
                    ));
                }
                continue;
            }

            if let Some(schema) = &param.schema {
                let value = coerce(schema, &raw);
                let subject = format!("{} parameter '{}'", location_name(param.location), param.name);
                self.schemas.check(schema, &value, MismatchKind::InvalidParameter, &subject)?;
            }
        }
        Ok(())
    }

    fn check_body(&self, operation: &Operation, request: &CanonicalRequest) -> Result<(), Mismatch> {
        let Some(body_spec) = &operation.request_body else {
            return Ok(());
        };
        if request.body.is_empty() {
            if body_spec.required {
                return Err(Mismatch::new(MismatchKind::MissingBody, "request body is required"));
            }
            return Ok(());
        }

        let content_type = request.header_line("content-type").unwrap_or_default();
        if !content_type.is_empty() && !is_json_media_type(&content_type) {
            // Non-JSON bodies are accepted as long as the media type is declared.
            let declared = body_spec
                .content
                .iter()
                .any(|m| super::media_type_matches(&m.media_type, &content_type));
            return if declared || body_spec.content.is_empty() {
                Ok(())
            } else {
                Err(Mismatch::new(
                    MismatchKind::ContentType,
                    format!("request content type '{content_type}' is not declared"),
                ))
            };
        }

        let Some(schema) = body_spec
            .content
            .iter()
            .find(|m| m.is_json())
            .and_then(|m| m.schema.as_ref())
        else {
            return Ok(());
        };
        let value: Value = serde_json::from_slice(&request.body).map_err(|e| {
            Mismatch::new(MismatchKind::InvalidBody, format!("request body is not valid JSON: {e}"))
        })?;
        self.schemas.check(schema, &value, MismatchKind::InvalidBody, "request body")
    }
}

fn lookup(pairs: &[(String, String)], name: &str) -> Vec<String> {
    pairs
        .iter()
        .filter(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
        .collect()
}

fn parse_cookies(line: &str) -> Vec<(String, String)> {
    line.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

fn location_name(location: ParameterLocation) -> &'static str {
    match location {
        ParameterLocation::Path => "path",
        ParameterLocation::Query => "query",
        ParameterLocation::Header => "header",
        ParameterLocation::Cookie => "cookie",
    }
}

/// Turn textual parameter values into JSON guided by the schema's type.
/// Values that do not parse stay strings and fail the schema check.
fn coerce(schema: &Value, raw: &[String]) -> Value {
    let declared = schema.get("type").and_then(Value::as_str).unwrap_or("string");
    if declared == "array" {
        let items = schema.get("items").cloned().unwrap_or(Value::Null);
        let parts: Vec<String> = if raw.len() == 1 {
            raw[0].split(',').map(String::from).collect()
        } else {
            raw.to_vec()
        };
        return Value::Array(parts.iter().map(|p| coerce_scalar(&items, p)).collect());
    }
    coerce_scalar(schema, &raw[0])
}

fn coerce_scalar(schema: &Value, raw: &str) -> Value {
    match schema.get("type").and_then(Value::as_str) {
        Some("integer") => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        Some("number") => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        Some("boolean") => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        _ => Value::String(raw.to_string()),
    }
}
