//! OpenAPI schema objects evaluated as JSON Schema.

use crate::error::{Mismatch, MismatchKind};
use jsonschema::Validator;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Convert OpenAPI 3.0 schema dialect into plain JSON Schema.
///
/// - `nullable: true` widens `type` to include `"null"`
/// - boolean `exclusiveMinimum` / `exclusiveMaximum` become numeric bounds
/// - OpenAPI-only keywords (`example`, `discriminator`, `xml`, ...) are dropped
pub fn normalize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(obj) => Value::Object(normalize_object(obj)),
        Value::Array(items) => Value::Array(items.iter().map(normalize_schema).collect()),
        other => other.clone(),
    }
}

const OPENAPI_ONLY: [&str; 6] = [
    "nullable",
    "example",
    "discriminator",
    "xml",
    "externalDocs",
    "deprecated",
];

fn normalize_object(obj: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in obj {
        if OPENAPI_ONLY.contains(&key.as_str()) {
            continue;
        }
        let normalized = match key.as_str() {
            // Maps of name -> schema
            "properties" | "patternProperties" | "$defs" | "definitions" => match value {
                Value::Object(props) => Value::Object(
                    props
                        .iter()
                        .map(|(k, v)| (k.clone(), normalize_schema(v)))
                        .collect(),
                ),
                other => other.clone(),
            },
            // Literal values, never schemas
            "enum" | "const" | "default" | "required" => value.clone(),
            _ => normalize_schema(value),
        };
        out.insert(key.clone(), normalized);
    }

    for (flag, bound) in [("exclusiveMinimum", "minimum"), ("exclusiveMaximum", "maximum")] {
        if let Some(Value::Bool(exclusive)) = obj.get(flag) {
            out.remove(flag);
            if *exclusive {
                if let Some(limit) = out.remove(bound) {
                    out.insert(flag.to_string(), limit);
                }
            }
        }
    }

    if obj.get("nullable").and_then(Value::as_bool) == Some(true) {
        match out.get("type").cloned() {
            Some(Value::String(t)) => {
                out.insert("type".to_string(), Value::Array(vec![Value::String(t), "null".into()]));
            }
            Some(Value::Array(mut types)) => {
                if !types.iter().any(|t| t == "null") {
                    types.push("null".into());
                }
                out.insert("type".to_string(), Value::Array(types));
            }
            _ => {}
        }
        if let Some(Value::Array(choices)) = out.get_mut("enum") {
            if !choices.contains(&Value::Null) {
                choices.push(Value::Null);
            }
        }
    }
    out
}

/// Check `instance` against an OpenAPI schema.
///
/// `subject` names the checked value in the mismatch message
/// (e.g. `query parameter 'limit'`). Compiles the schema on every call;
/// validators go through a [`SchemaCache`].
pub fn check_value(
    schema: &Value,
    instance: &Value,
    kind: MismatchKind,
    subject: &str,
) -> Result<(), Mismatch> {
    let validator = compile(schema, subject)?;
    run(&validator, instance, kind, subject)
}

fn compile(schema: &Value, subject: &str) -> Result<Validator, Mismatch> {
    Validator::new(&normalize_schema(schema)).map_err(|e| {
        Mismatch::new(
            MismatchKind::InvalidSchema,
            format!("schema for {subject} cannot be compiled: {e}"),
        )
    })
}

fn run(
    validator: &Validator,
    instance: &Value,
    kind: MismatchKind,
    subject: &str,
) -> Result<(), Mismatch> {
    if validator.is_valid(instance) {
        return Ok(());
    }
    let errors: Vec<String> = validator
        .iter_errors(instance)
        .map(|e| e.to_string())
        .collect();
    Err(Mismatch::new(kind, format!("{subject}: {}", errors.join("; "))))
}

/// Compiled validators keyed by the schema they were built from.
///
/// Contract schemas never change, so each is compiled once and shared by
/// every later check. Clones share the same cache.
#[derive(Clone, Default)]
pub struct SchemaCache {
    compiled: Arc<RwLock<HashMap<String, Arc<Validator>>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// [`check_value`] with the compiled validator reused across calls.
    pub fn check(
        &self,
        schema: &Value,
        instance: &Value,
        kind: MismatchKind,
        subject: &str,
    ) -> Result<(), Mismatch> {
        let key = schema.to_string();
        let cached = self.compiled.read().get(&key).cloned();
        let validator = match cached {
            Some(validator) => validator,
            None => {
                let validator = Arc::new(compile(schema, subject)?);
                self.compiled.write().insert(key, Arc::clone(&validator));
                validator
            }
        };
        run(&validator, instance, kind, subject)
    }

    /// Number of distinct schemas compiled so far.
    pub fn len(&self) -> usize {
        self.compiled.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCache")
            .field("compiled", &self.len())
            .finish()
    }
}
