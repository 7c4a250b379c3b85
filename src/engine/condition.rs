//! Rule condition matching.
//!
//! A rule applies when every one of its conditions holds (an empty list
//! holds trivially). Conditions never fail: anything that cannot be compared
//! is simply false.
//!
//! ```text
//! contains     order[var] strictly equals one of values
//! notContains  !contains
//! gte / lte    Number(order[var]) >= / <= Number(values[0]); NaN -> false
//! other        false
//! ```

use crate::rules::{Condition, Operator, Rule};
use crate::{OrderRecord, Value};

/// Whether `rule` applies to `order`.
pub fn matches(rule: &Rule, order: &OrderRecord) -> bool {
    rule.conditions.iter().all(|cond| holds(cond, order))
}

pub(crate) fn holds(cond: &Condition, order: &OrderRecord) -> bool {
    let actual = order.get(&cond.variable);
    match cond.operator {
        Operator::Contains => contains(&cond.values, actual),
        Operator::NotContains => !contains(&cond.values, actual),
        Operator::Gte => compare(actual, cond.values.first(), |a, b| a >= b),
        Operator::Lte => compare(actual, cond.values.first(), |a, b| a <= b),
        Operator::Unsupported => false,
    }
}

// Strict equality: a missing field equals nothing, and "2" is not 2.
fn contains(values: &[Value], actual: Option<&Value>) -> bool {
    actual.is_some_and(|actual| values.iter().any(|v| v == actual))
}

fn compare(actual: Option<&Value>, bound: Option<&Value>, cmp: fn(f64, f64) -> bool) -> bool {
    let a = actual.map_or(f64::NAN, Value::to_number);
    let b = bound.map_or(f64::NAN, Value::to_number);
    // IEEE comparisons against NaN are already false.
    cmp(a, b)
}
