//! Fake-data generation options.

use serde::{Deserialize, Serialize};

/// Array cardinality used when neither the schema nor the options say otherwise.
pub const DEFAULT_MIN_ITEMS: usize = 1;
pub const DEFAULT_MAX_ITEMS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FakerOptions {
    /// Always include optional object properties
    #[serde(default)]
    pub always_fake_optionals: bool,
    /// Lower bound for generated array length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    /// Upper bound for generated array length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

impl FakerOptions {
    /// Array length bounds after combining the options with a schema's own
    /// `minItems` / `maxItems`. The schema's constraints are never violated;
    /// the range is never inverted.
    pub fn item_bounds(&self, schema_min: Option<usize>, schema_max: Option<usize>) -> (usize, usize) {
        let lo = self
            .min_items
            .unwrap_or(DEFAULT_MIN_ITEMS)
            .max(schema_min.unwrap_or(0));
        let mut hi = self.max_items.unwrap_or(DEFAULT_MAX_ITEMS);
        if let Some(max) = schema_max {
            hi = hi.min(max);
        }
        let lo = match schema_max {
            Some(max) => lo.min(max),
            None => lo,
        };
        (lo, hi.max(lo))
    }
}
