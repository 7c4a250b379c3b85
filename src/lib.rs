//! Shop order notes in, fabrication quantities out.
//!
//! ```text
//! note text ── parse_notes ──▶ OrderRecord ── calculate_all ──▶ CalculationResult
//!                  │                              │
//!          parse_measurement             RuleRepository::resolve
//!                                        ConditionEvaluator / Formula
//! ```
//!
//! The two entry points most callers need are [`parse_notes`] and
//! [`calculate_all`]. Rule sets come from a [`RuleRepository`]; the crate ships
//! an in-memory one and a directory-backed one reading `<key>.json` documents.

extern crate self as cutsheet;

#[macro_use]
mod macros;
mod api;
mod engine;
mod error;
mod measurement;
mod notes;
mod rules;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use api::{
    CalculationDetails, CalculationVerbose, FAMILY_SUFFIX, KeyFields, OVERRIDE_FIELD, OVERRIDE_KEY, Options,
    Outcome, PropertyTrace, STYLE_FIELD, calculate_all, calculate_all_with, calculate_verbose_with,
};
pub use engine::{Formula, evaluate_formula, matches};
pub use error::{Error, FormulaError, Result};
pub use measurement::{parse_measurement, parse_measurement_value};
pub use notes::{URLS_KEY, normalize_key, parse_notes, parse_notes_value};
pub use rules::{
    Condition, DirectoryRepository, LoadStrategy, MemoryRepository, Operator, Rule, RuleRepository, RuleSet,
    RuleSetKey, Snapshot,
};

// --- Order data --------------------------------------------------------------

/// A single order field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    /// Numeric coercion used by `gte`/`lte` conditions and formula arithmetic.
    ///
    /// ```text
    /// Number(n)  -> n
    /// Bool       -> 1 / 0
    /// Text       -> trimmed; "" -> 0, numeric literal -> value, else NaN
    /// ```
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(b) => if *b { 1.0 } else { 0.0 },
            Value::Text(s) => str_to_number(s),
        }
    }

    /// String form of the value; whole numbers print without a decimal point.
    pub fn to_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

/// Format a number the way order values are rendered as text.
pub(crate) fn format_number(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if v.fract() == 0.0 && v.abs() < 1e15 {
        // whole number: print without decimal point
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Coerce a whole string to a number; anything that is not a plain numeric
/// literal is NaN.
pub(crate) fn str_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if regex!(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?$").is_match(t) { t.parse().unwrap_or(f64::NAN) } else { f64::NAN }
}

/// Structured data extracted from an order note.
///
/// Fields are keyed by name; URLs found anywhere in the note are kept apart
/// from the fields and serialize under the reserved [`URLS_KEY`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderRecord {
    #[serde(flatten)]
    fields: BTreeMap<String, Value>,
    #[serde(rename = "_urls", skip_serializing_if = "Vec::is_empty")]
    urls: Vec<String>,
}

impl OrderRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; a repeated key replaces the earlier value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key.into(), value.into());
        self
    }

    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    pub(crate) fn insert(&mut self, key: String, value: Value) {
        self.fields.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// URLs in order of appearance, duplicates preserved.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Build a record from a JSON object.
    ///
    /// Field values must be strings, booleans or numbers; the reserved
    /// `_urls` key, when present, must be an array of strings.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(map) = value else {
            return Err(Error::InvalidInputType { expected: "object", found: error::json_type_name(value) });
        };

        let mut record = OrderRecord::new();
        for (key, v) in map {
            if key == URLS_KEY {
                let serde_json::Value::Array(items) = v else {
                    return Err(Error::InvalidInputType { expected: "array", found: error::json_type_name(v) });
                };
                for item in items {
                    match item.as_str() {
                        Some(url) => record.urls.push(url.to_string()),
                        None => {
                            return Err(Error::InvalidInputType {
                                expected: "string",
                                found: error::json_type_name(item),
                            });
                        }
                    }
                }
                continue;
            }

            let value = match v {
                serde_json::Value::Bool(b) => Value::Bool(*b),
                serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
                serde_json::Value::String(s) => Value::Text(s.clone()),
                other => {
                    return Err(Error::InvalidInputType {
                        expected: "string, boolean or number",
                        found: error::json_type_name(other),
                    });
                }
            };
            record.insert(key.clone(), value);
        }
        Ok(record)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for OrderRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = OrderRecord::new();
        for (k, v) in iter {
            record.insert(k.into(), v.into());
        }
        record
    }
}

// --- Derived quantities ------------------------------------------------------

/// The six fabrication quantities a rule set can derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Property {
    Length,
    Width,
    Thickness,
    BoringPlacement,
    BoreDepth,
    BoreBoxHeight,
}

impl Property {
    /// Every property, in calculation order.
    pub const ALL: [Property; 6] = [
        Property::Length,
        Property::Width,
        Property::Thickness,
        Property::BoringPlacement,
        Property::BoreDepth,
        Property::BoreBoxHeight,
    ];

    /// Name used in rule-set documents and serialized results.
    pub fn name(self) -> &'static str {
        match self {
            Property::Length => "length",
            Property::Width => "width",
            Property::Thickness => "thickness",
            Property::BoringPlacement => "boringPlacement",
            Property::BoreDepth => "boreDepth",
            Property::BoreBoxHeight => "boreBoxHeight",
        }
    }

    /// Value used when no rule matches or evaluation fails.
    pub fn default_value(self) -> f64 {
        0.0
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Derived quantities for one order. Always carries all six properties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    pub length: f64,
    pub width: f64,
    pub thickness: f64,
    pub boring_placement: f64,
    pub bore_depth: f64,
    pub bore_box_height: f64,
}

impl CalculationResult {
    /// A result holding every property's default.
    pub fn defaults() -> Self {
        let mut result = CalculationResult::default();
        for property in Property::ALL {
            result.set(property, property.default_value());
        }
        result
    }

    pub fn get(&self, property: Property) -> f64 {
        match property {
            Property::Length => self.length,
            Property::Width => self.width,
            Property::Thickness => self.thickness,
            Property::BoringPlacement => self.boring_placement,
            Property::BoreDepth => self.bore_depth,
            Property::BoreBoxHeight => self.bore_box_height,
        }
    }

    pub fn set(&mut self, property: Property, value: f64) {
        let slot = match property {
            Property::Length => &mut self.length,
            Property::Width => &mut self.width,
            Property::Thickness => &mut self.thickness,
            Property::BoringPlacement => &mut self.boring_placement,
            Property::BoreDepth => &mut self.bore_depth,
            Property::BoreBoxHeight => &mut self.bore_box_height,
        };
        *slot = value;
    }

    /// `(property, value)` pairs in calculation order.
    pub fn iter(&self) -> impl Iterator<Item = (Property, f64)> + '_ {
        Property::ALL.into_iter().map(|p| (p, self.get(p)))
    }
}
