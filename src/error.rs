use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the parsers, the formula evaluator and the rule
/// repository.
///
/// Only the parsing-stage variants ever reach a caller of
/// [`calculate_all`](crate::calculate_all): formula failures are absorbed per
/// property and a missing rule set is not an error at all.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input type: expected {expected}, got {found}")]
    InvalidInputType { expected: &'static str, found: &'static str },

    #[error("empty measurement string")]
    EmptyMeasurement,

    #[error("unable to parse measurement from \"{0}\"")]
    UnparseableMeasurement(String),

    #[error("invalid fraction with zero denominator in \"{0}\"")]
    ZeroDenominator(String),

    #[error("failed to evaluate formula '{formula}': {source}")]
    FormulaEvaluation {
        formula: String,
        #[source]
        source: FormulaError,
    },

    #[error("failed to read rule set {}: {source}", path.display())]
    RuleSetIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed rule set {}: {source}", path.display())]
    RuleSetFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reasons a formula cannot be parsed or evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated field reference starting at offset {0}")]
    UnterminatedField(usize),

    #[error("unexpected {found} at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },

    #[error("unexpected end of formula")]
    UnexpectedEnd,

    #[error("empty formula")]
    Empty,

    #[error("function '{0}' is not available in formulas")]
    UnknownFunction(String),

    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    Arity { name: &'static str, expected: &'static str, found: usize },

    #[error("formula nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("formula has more than {0} tokens")]
    TooLong(usize),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Name a JSON value's type the way it shows up in
/// [`Error::InvalidInputType`].
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
