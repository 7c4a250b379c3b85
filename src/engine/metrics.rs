//! Calculation run metrics.
//!
//! - `Calculator::run` for normal operation.
//! - `Calculator::run_with_metrics` for debugging rule sets: the rule set
//!   key, per-property traces and timings.

use crate::rules::RuleSetKey;
use crate::{CalculationResult, PropertyTrace};
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Total elapsed time for [`Calculator::run_with_metrics`](super::Calculator::run_with_metrics),
    /// including the repository lookup.
    pub total: Duration,
    /// Time spent matching conditions and evaluating formulas.
    pub evaluate: Duration,
}

/// Calculator output bundled with traces and timing information.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub key: RuleSetKey,
    pub rule_set_empty: bool,
    pub result: CalculationResult,
    /// One trace per property, in calculation order.
    pub traces: Vec<PropertyTrace>,
    pub metrics: RunMetrics,
}
