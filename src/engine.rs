//! Calculation engine.
//!
//! Split into focused submodules under `src/engine/`:
//!
//! ```text
//! OrderRecord ─┐
//!              │  Calculator::new             (calculator.rs)
//!              └───────────────┬──────────────
//!                              │ rule_set_key + RuleRepository::resolve
//!                              v
//!               per property:  matches         (condition.rs)
//!                              │ last match
//!                              v
//!                              Formula          (formula.rs)
//!                              │ parse + evaluate (sandboxed)
//!                              v
//!                     CalculationResult + traces (metrics.rs)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `calculator.rs`: key derivation, rule selection, default fallback.
//! - `condition.rs`: condition semantics (`contains`, `notContains`, `gte`,
//!   `lte`).
//! - `formula.rs`: tokenizer, recursive-descent parser and evaluator for rule
//!   formulas. Only order fields and whitelisted functions are reachable.
//! - `metrics.rs`: traces and timings for verbose runs.
//!
//! ## Debugging
//!
//! Every decision is reported through `tracing` (`debug` for selection,
//! `warn` for formulas that fell back to a default). The `cutsheet` binary
//! reads its filter from `CUTSHEET_LOG`, e.g. `CUTSHEET_LOG=cutsheet=debug`.

#[path = "engine/calculator.rs"]
mod calculator;
#[path = "engine/condition.rs"]
mod condition;
#[path = "engine/formula.rs"]
mod formula;
#[path = "engine/metrics.rs"]
mod metrics;
#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;

pub use calculator::Calculator;
pub use condition::matches;
pub use formula::{Formula, evaluate_formula};
