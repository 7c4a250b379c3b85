//! Rule set selection and per-property calculation.
//!
//! ```text
//! OrderRecord ── rule_set_key ──▶ RuleSetKey ── repo.resolve ──▶ Arc<RuleSet>
//!                                                                  │
//!            for each Property (fixed order):                      ▼
//!              rules ── filter(matches) ── last ── Formula ── evaluate ── value
//!                          │ none                    │ error        (NaN kept)
//!                          └──────────── default ◀───┘
//! ```
//!
//! A failure in one property never affects the others, and the result always
//! carries all six properties.

use super::condition::matches;
use super::formula::Formula;
use super::metrics::{RunMetrics, RunResult};
use crate::notes::normalize_key;
use crate::rules::{Rule, RuleRepository, RuleSetKey};
use crate::{CalculationResult, Options, OrderRecord, Outcome, Property, PropertyTrace, Value};
use std::time::Instant;

/// Calculates the derived properties of one order.
///
/// Usage: `Calculator::new(order, repo, options).run()`.
pub struct Calculator<'a, R: RuleRepository + ?Sized> {
    order: &'a OrderRecord,
    repo: &'a R,
    options: &'a Options,
}

impl<'a, R: RuleRepository + ?Sized> Calculator<'a, R> {
    pub fn new(order: &'a OrderRecord, repo: &'a R, options: &'a Options) -> Self {
        Calculator { order, repo, options }
    }

    /// Rule set key for the order; see [`rule_set_key`].
    pub fn rule_set_key(&self) -> RuleSetKey {
        rule_set_key(self.order, self.options)
    }

    /// Compute one property from its ordered rule list.
    fn calculate_property(&self, property: Property, rules: &[Rule]) -> PropertyTrace {
        let matched: Vec<usize> =
            rules.iter().enumerate().filter(|(_, rule)| matches(rule, self.order)).map(|(idx, _)| idx).collect();
        let default = property.default_value();

        let Some(&selected) = matched.last() else {
            tracing::debug!(property = property.name(), considered = rules.len(), "no matching rule, using default");
            return PropertyTrace {
                property,
                considered: rules.len(),
                matched,
                selected: None,
                formula: None,
                outcome: Outcome::NoMatch,
                value: default,
            };
        };

        // Later rules override earlier, more general ones.
        let formula = &rules[selected].formula;
        let (outcome, value) = match Formula::parse(formula) {
            Ok(parsed) => {
                let v = parsed.evaluate(self.order);
                if v.is_finite() {
                    tracing::debug!(property = property.name(), rule = selected, formula = %formula, value = v, "evaluated");
                    (Outcome::Evaluated(v), v)
                } else {
                    tracing::warn!(
                        property = property.name(),
                        rule = selected,
                        formula = %formula,
                        value = v,
                        "formula produced a non-finite value"
                    );
                    (Outcome::NonFinite(v), v)
                }
            }
            Err(err) => {
                tracing::warn!(property = property.name(), rule = selected, error = %err, "using default");
                (Outcome::Failed(err.to_string()), default)
            }
        };

        PropertyTrace {
            property,
            considered: rules.len(),
            matched,
            selected: Some(selected),
            formula: Some(formula.clone()),
            outcome,
            value,
        }
    }

    /// Resolve the rule set, compute every property and return traces and
    /// timing details.
    pub fn run_with_metrics(self) -> RunResult {
        let total_start = Instant::now();
        let key = self.rule_set_key();
        let rule_set = self.repo.resolve(&key);
        tracing::debug!(key = %key, empty = rule_set.is_empty(), "resolved rule set");

        let evaluate_start = Instant::now();
        let mut result = CalculationResult::defaults();
        let mut traces = Vec::with_capacity(Property::ALL.len());
        for property in Property::ALL {
            let trace = self.calculate_property(property, rule_set.rules(property));
            result.set(property, trace.value);
            traces.push(trace);
        }
        let evaluate = evaluate_start.elapsed();

        RunResult {
            key,
            rule_set_empty: rule_set.is_empty(),
            result,
            traces,
            metrics: RunMetrics { total: total_start.elapsed(), evaluate },
        }
    }

    /// Compute every property, discarding traces and timings.
    pub fn run(self) -> CalculationResult {
        self.run_with_metrics().result
    }
}

/// Choose the rule set key for `order`.
///
/// ```text
/// override flag truthy            -> options.override_key
/// otherwise                       -> normalize(style) + options.family_suffix
///   normalize: lower-case, keep [a-z0-9]
///   false, 0, NaN, "" and missing styles normalize to ""
/// ```
pub(crate) fn rule_set_key(order: &OrderRecord, options: &Options) -> RuleSetKey {
    if lookup(order, &options.fields.override_flag).is_some_and(is_truthy_flag) {
        return RuleSetKey::new(&options.override_key);
    }

    let style =
        lookup(order, &options.fields.style).filter(|v| !is_falsy(v)).map(Value::to_text).unwrap_or_default();
    let normalized: String =
        style.to_lowercase().chars().filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit()).collect();
    RuleSetKey::new(format!("{normalized}{}", options.family_suffix))
}

fn lookup<'o>(order: &'o OrderRecord, field: &str) -> Option<&'o Value> {
    order.get(field).or_else(|| order.get(&normalize_key(field)))
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => !b,
        Value::Number(n) => *n == 0.0 || n.is_nan(),
        Value::Text(s) => s.is_empty(),
    }
}

fn is_truthy_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Text(s) => s.eq_ignore_ascii_case("yes") || s.eq_ignore_ascii_case("y"),
        Value::Number(_) => false,
    }
}
