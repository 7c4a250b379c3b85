use crate::{Property, Value};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Comparison applied by a [`Condition`].
///
/// Any operator name not listed here deserializes to `Unsupported`, which
/// never matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Contains,
    NotContains,
    Gte,
    Lte,
    #[serde(other)]
    Unsupported,
}

/// A predicate over one order field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub variable: String,
    pub operator: Operator,
    #[serde(default, deserialize_with = "lenient_values")]
    pub values: Vec<Value>,
}

/// Accept any JSON list. `null`, arrays and objects become a NaN literal, which
/// equals nothing and fails every comparison, so one odd value cannot drop the
/// whole document.
fn lenient_values<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .map(|v| match v {
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Text(s),
            other => {
                tracing::debug!(value = %other, "unsupported condition value, never matches");
                Value::Number(f64::NAN)
            }
        })
        .collect())
}

impl Condition {
    pub fn new(variable: impl Into<String>, operator: Operator, values: Vec<Value>) -> Self {
        Condition { variable: variable.into(), operator, values }
    }
}

/// A formula guarded by a conjunction of conditions. No conditions means the
/// rule always applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub formula: String,
}

impl Rule {
    pub fn new(conditions: Vec<Condition>, formula: impl Into<String>) -> Self {
        Rule { conditions, formula: formula.into() }
    }

    /// A rule with no conditions.
    pub fn always(formula: impl Into<String>) -> Self {
        Rule::new(Vec::new(), formula)
    }
}

/// Ordered rules per derived property. Order is significant: among matching
/// rules the last one wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleSet {
    pub length: Vec<Rule>,
    pub width: Vec<Rule>,
    pub thickness: Vec<Rule>,
    pub boring_placement: Vec<Rule>,
    pub bore_depth: Vec<Rule>,
    pub bore_box_height: Vec<Rule>,
}

impl RuleSet {
    /// A rule set with no rules; every property falls back to its default.
    pub fn empty() -> Self {
        RuleSet::default()
    }

    pub fn rules(&self, property: Property) -> &[Rule] {
        match property {
            Property::Length => &self.length,
            Property::Width => &self.width,
            Property::Thickness => &self.thickness,
            Property::BoringPlacement => &self.boring_placement,
            Property::BoreDepth => &self.bore_depth,
            Property::BoreBoxHeight => &self.bore_box_height,
        }
    }

    pub fn rules_mut(&mut self, property: Property) -> &mut Vec<Rule> {
        match property {
            Property::Length => &mut self.length,
            Property::Width => &mut self.width,
            Property::Thickness => &mut self.thickness,
            Property::BoringPlacement => &mut self.boring_placement,
            Property::BoreDepth => &mut self.bore_depth,
            Property::BoreBoxHeight => &mut self.bore_box_height,
        }
    }

    /// Builder-style append of a rule for `property`.
    pub fn with_rule(mut self, property: Property, rule: Rule) -> Self {
        self.rules_mut(property).push(rule);
        self
    }

    pub fn is_empty(&self) -> bool {
        Property::ALL.iter().all(|&p| self.rules(p).is_empty())
    }

    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

/// Case-insensitive name of a rule set, e.g. `provencedoors`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleSetKey(String);

impl RuleSetKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        RuleSetKey(key.as_ref().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name the directory repository reads for this key.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for RuleSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RuleSetKey {
    fn from(s: &str) -> Self {
        RuleSetKey::new(s)
    }
}
