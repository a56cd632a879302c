//! Flattening an OpenAPI document into operations.

use super::path_pattern::PathPattern;
use super::types::{
    MediaType, Operation, OperationAddress, Parameter, ParameterLocation, RequestBody,
    ResponseSpec,
};
use crate::error::FakeError;
use serde_json::{Map, Value};
use tracing::debug;

/// Methods a path item may declare.
const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Reference chains longer than this are cut to an empty schema.
const MAX_REF_DEPTH: usize = 32;

pub(super) struct ParsedDocument {
    pub title: Option<String>,
    pub version: Option<String>,
    pub operations: Vec<Operation>,
}

pub(super) fn parse_document(document: &Value) -> Result<ParsedDocument, FakeError> {
    let paths = document
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| FakeError::ContractParse("document has no 'paths' object".to_string()))?;

    let mut operations = Vec::new();
    for (raw_path, item) in paths {
        let item = resolve_refs(item, document, &mut Vec::new());
        let Some(item) = item.as_object() else {
            continue;
        };
        let pattern = PathPattern::compile(raw_path)
            .map_err(|e| FakeError::ContractParse(format!("invalid path '{raw_path}': {e}")))?;
        let shared_params = parse_parameters(item.get("parameters"));

        for (key, op) in item {
            let method = key.to_ascii_lowercase();
            if !HTTP_METHODS.contains(&method.as_str()) {
                continue;
            }
            let Some(op) = op.as_object() else {
                continue;
            };
            operations.push(parse_operation(
                raw_path,
                &method,
                pattern.clone(),
                op,
                &shared_params,
            ));
        }
    }

    debug!("Parsed {} operations from contract", operations.len());

    let info = document.get("info");
    Ok(ParsedDocument {
        title: info
            .and_then(|i| i.get("title"))
            .and_then(Value::as_str)
            .map(String::from),
        version: info
            .and_then(|i| i.get("version"))
            .and_then(Value::as_str)
            .map(String::from),
        operations,
    })
}

fn parse_operation(
    path: &str,
    method: &str,
    pattern: PathPattern,
    op: &Map<String, Value>,
    shared_params: &[Parameter],
) -> Operation {
    // Operation-level parameters override path-level ones with the same (name, in).
    let mut parameters = parse_parameters(op.get("parameters"));
    for shared in shared_params {
        let overridden = parameters
            .iter()
            .any(|p| p.name == shared.name && p.location == shared.location);
        if !overridden {
            parameters.push(shared.clone());
        }
    }

    let request_body = op.get("requestBody").and_then(Value::as_object).map(|body| {
        RequestBody {
            required: body.get("required").and_then(Value::as_bool).unwrap_or(false),
            content: parse_content(body.get("content")),
        }
    });

    let responses = op
        .get("responses")
        .and_then(Value::as_object)
        .map(|responses| {
            responses
                .iter()
                .map(|(status, spec)| {
                    (
                        status.clone(),
                        ResponseSpec {
                            description: spec
                                .get("description")
                                .and_then(Value::as_str)
                                .map(String::from),
                            content: parse_content(spec.get("content")),
                        },
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    Operation {
        address: OperationAddress::new(path, method),
        pattern,
        operation_id: op
            .get("operationId")
            .and_then(Value::as_str)
            .map(String::from),
        parameters,
        request_body,
        responses,
    }
}

fn parse_parameters(value: Option<&Value>) -> Vec<Parameter> {
    let Some(list) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|param| {
            let name = param.get("name")?.as_str()?.to_string();
            let location: ParameterLocation =
                serde_json::from_value(param.get("in")?.clone()).ok()?;
            // Path parameters are always required.
            let required = location == ParameterLocation::Path
                || param.get("required").and_then(Value::as_bool).unwrap_or(false);
            Some(Parameter {
                name,
                location,
                required,
                schema: param.get("schema").cloned(),
            })
        })
        .collect()
}

fn parse_content(value: Option<&Value>) -> Vec<MediaType> {
    value
        .and_then(Value::as_object)
        .map(|content| {
            content
                .iter()
                .map(|(media_type, media)| MediaType {
                    media_type: media_type.clone(),
                    schema: media.get("schema").cloned(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Inline local `#/...` references.
///
/// A reference already being expanded further up the chain (a recursive
/// schema) is replaced by an empty schema.
fn resolve_refs(value: &Value, root: &Value, chain: &mut Vec<String>) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                if chain.len() >= MAX_REF_DEPTH || chain.iter().any(|r| r == reference) {
                    debug!("Cutting recursive reference {}", reference);
                    return Value::Object(Map::new());
                }
                if let Some(target) = reference
                    .strip_prefix('#')
                    .and_then(|pointer| root.pointer(pointer))
                {
                    chain.push(reference.to_string());
                    let resolved = resolve_refs(target, root, chain);
                    chain.pop();
                    return resolved;
                }
                debug!("Leaving unresolvable reference {} in place", reference);
                return value.clone();
            }
            Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), resolve_refs(v, root, chain)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| resolve_refs(v, root, chain))
                .collect(),
        ),
        other => other.clone(),
    }
}
