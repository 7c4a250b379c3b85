//! Rule sets and where they come from.
//!
//! - `set.rs`: the rule-set document model (`RuleSet`, `Rule`, `Condition`,
//!   `Operator`) as read from `<key>.json`.
//! - `repository.rs`: the `RuleRepository` trait the engine consumes, plus an
//!   in-memory and a directory-backed implementation.
//!
//! The engine never mutates a rule set. Repositories hand out `Arc<RuleSet>`
//! so a calculation keeps a consistent view even if the repository reloads
//! underneath it.

#[path = "rules/repository.rs"]
mod repository;
#[path = "rules/set.rs"]
mod set;

pub use repository::{DirectoryRepository, LoadStrategy, MemoryRepository, RuleRepository, Snapshot};
pub use set::{Condition, Operator, Rule, RuleSet, RuleSetKey};
