//! JSON-Schema driven fake values.

use super::options::FakerOptions;
use crate::contract::{Contract, OperationAddress};
use chrono::{DateTime, SecondsFormat, Utc};
use fake::faker::internet::en::{DomainSuffix, SafeEmail, IPv4};
use fake::faker::lorem::en::{Word, Words};
use fake::Fake;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use thiserror::Error;

/// Nesting deeper than this yields `null`.
const MAX_DEPTH: usize = 12;

#[derive(Debug, Clone, Error)]
pub enum FakeDataError {
    #[error("operation {method} {path} is not part of the contract")]
    UnknownOperation { method: String, path: String },
    #[error("generated value cannot be represented as JSON: {0}")]
    Unrepresentable(String),
}

/// The fake-generation collaborator.
pub trait ResponseFaker: Send + Sync {
    /// Fake body for the operation at `path` (pattern) / `method` and `status`.
    fn mock_response(&self, path: &str, method: &str, status: u16) -> Result<Value, FakeDataError>;
}

/// Walks response schemas of a contract and fills them with fake data.
pub struct SchemaFaker {
    contract: Arc<Contract>,
    options: FakerOptions,
    rng: Mutex<StdRng>,
}

impl SchemaFaker {
    pub fn new(contract: Arc<Contract>, options: FakerOptions) -> Self {
        Self {
            contract,
            options,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic faker, for reproducible tests.
    pub fn with_seed(contract: Arc<Contract>, options: FakerOptions, seed: u64) -> Self {
        Self {
            contract,
            options,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Fake a value for an arbitrary schema.
    pub fn fake_schema(&self, schema: &Value) -> Result<Value, FakeDataError> {
        let mut rng = self.rng.lock();
        fake_value(schema, &self.options, &mut *rng, 0)
    }
}

impl ResponseFaker for SchemaFaker {
    fn mock_response(&self, path: &str, method: &str, status: u16) -> Result<Value, FakeDataError> {
        let operation = self
            .contract
            .operation(&OperationAddress::new(path, method))
            .ok_or_else(|| FakeDataError::UnknownOperation {
                method: method.to_string(),
                path: path.to_string(),
            })?;

        // Undeclared statuses and non-JSON responses have nothing to fake.
        let schema = operation
            .response_for(status)
            .and_then(|spec| spec.json_media())
            .and_then(|media| media.schema.as_ref());

        match schema {
            Some(schema) => self.fake_schema(schema),
            None => Ok(Value::Null),
        }
    }
}

fn fake_value<R: Rng + ?Sized>(
    schema: &Value,
    options: &FakerOptions,
    rng: &mut R,
    depth: usize,
) -> Result<Value, FakeDataError> {
    if depth > MAX_DEPTH {
        return Ok(Value::Null);
    }
    let Some(obj) = schema.as_object() else {
        return Ok(Value::Null);
    };

    if let Some(choices) = obj.get("enum").and_then(Value::as_array) {
        if let Some(choice) = choices.choose(rng) {
            return Ok(choice.clone());
        }
    }
    if let Some(constant) = obj.get("const") {
        return Ok(constant.clone());
    }
    if let Some(all) = obj.get("allOf").and_then(Value::as_array) {
        return fake_value(&merge_all_of(obj, all), options, rng, depth + 1);
    }
    for key in ["oneOf", "anyOf"] {
        if let Some(first) = obj.get(key).and_then(Value::as_array).and_then(|v| v.first()) {
            return fake_value(first, options, rng, depth + 1);
        }
    }

    match schema_type(obj).as_deref() {
        Some("object") => fake_object(obj, options, rng, depth),
        Some("array") => fake_array(obj, options, rng, depth),
        Some("string") => Ok(Value::String(fake_string(obj, rng))),
        Some("integer") => Ok(Value::Number(fake_integer(obj, rng).into())),
        Some("number") => fake_number(obj, rng),
        Some("boolean") => Ok(Value::Bool(rng.gen_bool(0.5))),
        _ => Ok(Value::Null),
    }
}

/// Declared type; a 3.1 type list picks its first non-null member. Untyped
/// schemas are inferred from `properties` / `items`.
fn schema_type(obj: &Map<String, Value>) -> Option<String> {
    match obj.get("type") {
        Some(Value::String(t)) => Some(t.clone()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .map(String::from),
        _ if obj.contains_key("properties") => Some("object".to_string()),
        _ if obj.contains_key("items") => Some("array".to_string()),
        _ => None,
    }
}

fn merge_all_of(base: &Map<String, Value>, parts: &[Value]) -> Value {
    let mut merged = base.clone();
    merged.remove("allOf");
    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();

    for part in std::iter::once(&Value::Object(base.clone())).chain(parts.iter()) {
        if let Some(props) = part.get("properties").and_then(Value::as_object) {
            properties.extend(props.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if let Some(req) = part.get("required").and_then(Value::as_array) {
            for name in req {
                if !required.contains(name) {
                    required.push(name.clone());
                }
            }
        }
        if let Some(t) = part.get("type") {
            merged.entry("type").or_insert_with(|| t.clone());
        }
    }

    merged.insert("properties".to_string(), Value::Object(properties));
    merged.insert("required".to_string(), Value::Array(required));
    merged.entry("type").or_insert_with(|| Value::String("object".to_string()));
    Value::Object(merged)
}

fn fake_object<R: Rng + ?Sized>(
    obj: &Map<String, Value>,
    options: &FakerOptions,
    rng: &mut R,
    depth: usize,
) -> Result<Value, FakeDataError> {
    let required: Vec<&str> = obj
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut out = Map::new();
    if let Some(props) = obj.get("properties").and_then(Value::as_object) {
        for (name, prop_schema) in props {
            let include = required.contains(&name.as_str())
                || options.always_fake_optionals
                || rng.gen_bool(0.5);
            if include {
                out.insert(name.clone(), fake_value(prop_schema, options, rng, depth + 1)?);
            }
        }
    }
    Ok(Value::Object(out))
}

fn fake_array<R: Rng + ?Sized>(
    obj: &Map<String, Value>,
    options: &FakerOptions,
    rng: &mut R,
    depth: usize,
) -> Result<Value, FakeDataError> {
    let as_usize = |key: &str| obj.get(key).and_then(Value::as_u64).map(|v| v as usize);
    let (lo, hi) = options.item_bounds(as_usize("minItems"), as_usize("maxItems"));
    let count = rng.gen_range(lo..=hi);

    let items = obj.get("items").cloned().unwrap_or(Value::Null);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(fake_value(&items, options, rng, depth + 1)?);
    }
    Ok(Value::Array(out))
}

fn fake_string<R: Rng + ?Sized>(obj: &Map<String, Value>, rng: &mut R) -> String {
    if let Some(example) = obj.get("example").and_then(Value::as_str) {
        return example.to_string();
    }

    let format = obj.get("format").and_then(Value::as_str).unwrap_or("");
    let formatted = match format {
        "date-time" => Some(random_instant(rng).to_rfc3339_opts(SecondsFormat::Secs, true)),
        "date" => Some(random_instant(rng).format("%Y-%m-%d").to_string()),
        "uuid" => Some(uuid::Builder::from_random_bytes(rng.gen()).into_uuid().to_string()),
        "email" => Some(SafeEmail().fake_with_rng::<String, _>(rng)),
        "uri" | "url" => {
            let host: String = Word().fake_with_rng(rng);
            let suffix: String = DomainSuffix().fake_with_rng(rng);
            let segment: String = Word().fake_with_rng(rng);
            Some(format!("https://{host}.{suffix}/{segment}"))
        }
        "hostname" => {
            let host: String = Word().fake_with_rng(rng);
            let suffix: String = DomainSuffix().fake_with_rng(rng);
            Some(format!("{host}.{suffix}"))
        }
        "ipv4" => Some(IPv4().fake_with_rng::<String, _>(rng)),
        _ => None,
    };
    if let Some(value) = formatted {
        return value;
    }

    let words: Vec<String> = Words(1..4).fake_with_rng(rng);
    let mut text = words.join(" ");
    let min_len = obj.get("minLength").and_then(Value::as_u64).unwrap_or(0) as usize;
    let max_len = obj.get("maxLength").and_then(Value::as_u64).map(|v| v as usize);
    while text.chars().count() < min_len {
        text.push('x');
    }
    if let Some(max) = max_len {
        text = text.chars().take(max.max(min_len)).collect();
    }
    text
}

fn random_instant<R: Rng + ?Sized>(rng: &mut R) -> DateTime<Utc> {
    let secs = rng.gen_range(1_500_000_000i64..1_800_000_000i64);
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}

/// Inclusive bound from `minimum`/`maximum`, honouring both the boolean
/// (3.0) and numeric (3.1) forms of `exclusiveMinimum`/`exclusiveMaximum`.
fn bound(obj: &Map<String, Value>, inclusive_key: &str, exclusive_key: &str) -> (Option<f64>, bool) {
    match obj.get(exclusive_key) {
        Some(Value::Number(n)) => (n.as_f64(), true),
        Some(Value::Bool(true)) => (obj.get(inclusive_key).and_then(Value::as_f64), true),
        _ => (obj.get(inclusive_key).and_then(Value::as_f64), false),
    }
}

fn fake_integer<R: Rng + ?Sized>(obj: &Map<String, Value>, rng: &mut R) -> i64 {
    if let Some(example) = obj.get("example").and_then(Value::as_i64) {
        return example;
    }
    let (min, min_excl) = bound(obj, "minimum", "exclusiveMinimum");
    let (max, max_excl) = bound(obj, "maximum", "exclusiveMaximum");

    let mut lo = min.map(|m| m.ceil() as i64);
    if min_excl && min.map(|m| m.fract() == 0.0).unwrap_or(false) {
        lo = lo.map(|v| v.saturating_add(1));
    }
    let mut hi = max.map(|m| m.floor() as i64);
    if max_excl && max.map(|m| m.fract() == 0.0).unwrap_or(false) {
        hi = hi.map(|v| v.saturating_sub(1));
    }
    let (lo, hi) = match (lo, hi) {
        (Some(lo), Some(hi)) => (lo, hi),
        (Some(lo), None) => (lo, lo.saturating_add(999)),
        (None, Some(hi)) => (hi.saturating_sub(999).min(1).min(hi), hi),
        (None, None) => (1, 1000),
    };
    if hi < lo {
        return lo;
    }
    rng.gen_range(lo..=hi)
}

fn fake_number<R: Rng + ?Sized>(
    obj: &Map<String, Value>,
    rng: &mut R,
) -> Result<Value, FakeDataError> {
    if let Some(example) = obj.get("example").filter(|e| e.is_number()) {
        return Ok(example.clone());
    }
    let (min, min_excl) = bound(obj, "minimum", "exclusiveMinimum");
    let (max, max_excl) = bound(obj, "maximum", "exclusiveMaximum");
    let (lo, hi) = match (min, max) {
        (Some(lo), Some(hi)) => (lo, hi),
        (Some(lo), None) => (lo, lo + 1000.0),
        (None, Some(hi)) => (hi - 1000.0, hi),
        (None, None) => (0.0, 1000.0),
    };

    let span = hi - lo;
    if !span.is_finite() {
        return Err(FakeDataError::Unrepresentable(format!(
            "number range [{lo}, {hi}] is not finite"
        )));
    }
    let within = |v: f64| {
        (if min_excl { v > lo } else { v >= lo }) && (if max_excl { v < hi } else { v <= hi })
    };
    if span < 0.0 || (span == 0.0 && (min_excl || max_excl)) {
        return Err(FakeDataError::Unrepresentable(format!(
            "number range [{lo}, {hi}] is empty"
        )));
    }

    // Exclusive ends are pulled in by a sliver of the span.
    let margin = span / 1000.0;
    let inner_lo = if min_excl { lo + margin } else { lo };
    let inner_hi = if max_excl { hi - margin } else { hi };
    let raw = rng.gen_range(inner_lo..=inner_hi);
    // Two decimals unless rounding leaves the bounds.
    let rounded = (raw * 100.0).round() / 100.0;
    let value = if within(rounded) { rounded } else { raw };
    if !within(value) {
        return Err(FakeDataError::Unrepresentable(format!(
            "no representable number strictly inside [{lo}, {hi}]"
        )));
    }

    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| FakeDataError::Unrepresentable(format!("{value} is not a finite number")))
}
