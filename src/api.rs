use crate::engine;
use crate::rules::RuleRepository;
use crate::{CalculationResult, OrderRecord, Property};
use std::time::Duration;

/// Order field naming the door style; its normalized value picks the rule set.
pub const STYLE_FIELD: &str = "Select Door Style";
/// Order field that, when truthy, forces the [`OVERRIDE_KEY`] rule set.
pub const OVERRIDE_FIELD: &str = "Metal Framed Hinged Door?";
/// Rule set used for metal-framed hinged doors.
pub const OVERRIDE_KEY: &str = "hingedmetaldoors";
/// Product family appended to the normalized style.
pub const FAMILY_SUFFIX: &str = "doors";

/// Order fields consulted when choosing a rule set.
///
/// Each name is looked up as given first, then in its note-normalized form
/// (`"Select Door Style"` -> `"select_door_style"`), so records built by
/// [`parse_notes`](crate::parse_notes) select the same rule set as records
/// keyed by the original labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFields {
    pub style: String,
    pub override_flag: String,
}

impl Default for KeyFields {
    fn default() -> Self {
        KeyFields { style: STYLE_FIELD.to_string(), override_flag: OVERRIDE_FIELD.to_string() }
    }
}

/// Options that affect rule set selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub fields: KeyFields,
    /// Rule set key used when the override flag is set.
    pub override_key: String,
    /// Suffix appended to the normalized style to form the key.
    pub family_suffix: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            fields: KeyFields::default(),
            override_key: OVERRIDE_KEY.to_string(),
            family_suffix: FAMILY_SUFFIX.to_string(),
        }
    }
}

/// How a property's value was obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The selected rule's formula produced this value.
    Evaluated(f64),
    /// No rule matched; the default was used.
    NoMatch,
    /// The selected rule's formula failed to parse; the default was used.
    Failed(String),
    /// The formula evaluated to NaN or an infinity; the value is kept as-is.
    NonFinite(f64),
}

/// Per-property trace of a calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyTrace {
    pub property: Property,
    /// Rules listed for the property in the rule set.
    pub considered: usize,
    /// Indices of the rules whose conditions held, in list order.
    pub matched: Vec<usize>,
    /// Index of the rule that was evaluated (the last match).
    pub selected: Option<usize>,
    pub formula: Option<String>,
    pub outcome: Outcome,
    /// Final value stored in the result.
    pub value: f64,
}

/// Additional details returned by [`calculate_verbose_with`].
#[derive(Debug, Clone)]
pub struct CalculationDetails {
    /// Rule set key the order resolved to.
    pub rule_set_key: String,
    /// Whether the resolved rule set had no rules at all.
    pub rule_set_empty: bool,
    pub traces: Vec<PropertyTrace>,
    /// Total elapsed time.
    pub total: Duration,
    /// Time spent matching conditions and evaluating formulas.
    pub evaluate: Duration,
}

/// Result from [`calculate_verbose_with`].
#[derive(Debug, Clone)]
pub struct CalculationVerbose {
    pub result: CalculationResult,
    pub details: CalculationDetails,
}

/// Calculate every derived property for `order` using default [`Options`].
///
/// Never fails: a missing rule set, unmatched properties and broken formulas
/// all fall back to the property defaults. A formula that evaluates to NaN
/// (an unknown field, say) stores NaN.
///
/// # Example
/// ```
/// use cutsheet::{MemoryRepository, OrderRecord, Property, Rule, RuleSet, calculate_all};
///
/// let repo = MemoryRepository::new().with("provencedoors", RuleSet::empty().with_rule(Property::Width, Rule::always("5")));
/// let order = OrderRecord::new().with("Select Door Style", "Provence");
///
/// let result = calculate_all(&order, &repo);
/// assert_eq!(result.width, 5.0);
/// assert_eq!(result.length, 0.0);
/// ```
pub fn calculate_all<R: RuleRepository + ?Sized>(order: &OrderRecord, repo: &R) -> CalculationResult {
    calculate_all_with(order, repo, &Options::default())
}

/// Calculate every derived property for `order` with the provided `options`.
pub fn calculate_all_with<R: RuleRepository + ?Sized>(
    order: &OrderRecord,
    repo: &R,
    options: &Options,
) -> CalculationResult {
    engine::Calculator::new(order, repo, options).run()
}

/// Calculate with `options` and return per-property traces and timings.
///
/// This is useful for debugging rule sets. The default [`calculate_all_with`]
/// path produces the same result.
pub fn calculate_verbose_with<R: RuleRepository + ?Sized>(
    order: &OrderRecord,
    repo: &R,
    options: &Options,
) -> CalculationVerbose {
    let run = engine::Calculator::new(order, repo, options).run_with_metrics();

    CalculationVerbose {
        result: run.result,
        details: CalculationDetails {
            rule_set_key: run.key.to_string(),
            rule_set_empty: run.rule_set_empty,
            traces: run.traces,
            total: run.metrics.total,
            evaluate: run.metrics.evaluate,
        },
    }
}
