//! Measurement strings to decimal inches.
//!
//! A measurement is any mix of four optional components, summed:
//!
//! ```text
//! "7 ft 10 in 5/8 in"
//!  └─┬┘ └─┬─┘ └──┬─┘
//!  feet  whole  fraction(s)      -> 7*12 + 10 + 5/8 = 94.625
//!
//! "12" / "5.5"                   -> bare number, read as inches
//! ```
//!
//! Matching order matters: feet first (first token only), then every
//! fraction, then the first whole-inch token in what is left once feet and
//! fractions are cut out, and finally a bare number if nothing else remains.

use crate::error::{Error, Result, json_type_name};
use bitflags::bitflags;

bitflags! {
    /// Components that contributed to a parsed measurement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub(crate) struct Components: u8 {
        const FEET     = 1 << 0;
        const FRACTION = 1 << 1;
        const INCHES   = 1 << 2;
        const BARE     = 1 << 3;
    }
}

/// Parse a measurement such as `"2 ft 5 in 3/4 in"` into decimal inches.
///
/// Parsing is case-insensitive and whitespace-tolerant. Sign is not enforced.
///
/// # Example
/// ```
/// use cutsheet::parse_measurement;
///
/// assert_eq!(parse_measurement("7 ft 10 in 5/8 in").unwrap(), 94.625);
/// ```
pub fn parse_measurement(input: &str) -> Result<f64> {
    parse_components(input).map(|(total, _)| total)
}

/// Parse a measurement arriving as untyped JSON; only strings are accepted.
pub fn parse_measurement_value(input: &serde_json::Value) -> Result<f64> {
    match input {
        serde_json::Value::String(s) => parse_measurement(s),
        other => Err(Error::InvalidInputType { expected: "string", found: json_type_name(other) }),
    }
}

pub(crate) fn parse_components(input: &str) -> Result<(f64, Components)> {
    let s = input.trim().to_lowercase();
    if s.is_empty() {
        return Err(Error::EmptyMeasurement);
    }

    let feet_re = regex!(r#"([0-9]+)\s*(?:ft|feet|')"#);
    let fraction_re = regex!(r#"([0-9]+)\s*/\s*([0-9]+)\s*(?:in|inch|")"#);
    let inch_re = regex!(r#"([0-9]+)\s*(?:in|inch|")"#);
    let bare_re = regex!(r"^\s*([0-9]+(?:\.[0-9]+)?)\s*$");

    let mut total = 0.0;
    let mut found = Components::empty();

    if let Some(caps) = feet_re.captures(&s) {
        total += digits(&caps[1], input)? * 12.0;
        found |= Components::FEET;
    }

    for caps in fraction_re.captures_iter(&s) {
        let numerator = digits(&caps[1], input)?;
        let denominator = digits(&caps[2], input)?;
        if denominator == 0.0 {
            return Err(Error::ZeroDenominator(input.to_string()));
        }
        total += numerator / denominator;
        found |= Components::FRACTION;
    }

    // Cut out what was already counted so whole inches are not read twice.
    let without_feet = feet_re.replace_all(&s, "");
    let mut rest = fraction_re.replace_all(&without_feet, "").into_owned();

    if let Some(caps) = inch_re.captures(&rest) {
        total += digits(&caps[1], input)?;
        found |= Components::INCHES;
        rest = inch_re.replacen(&rest, 1, "").into_owned();
    }

    if let Some(caps) = bare_re.captures(&rest) {
        total += digits(&caps[1], input)?;
        found |= Components::BARE;
    }

    if found.is_empty() {
        return Err(Error::UnparseableMeasurement(input.to_string()));
    }

    Ok((total, found))
}

// ASCII digit runs; f64 keeps long runs from overflowing.
fn digits(s: &str, input: &str) -> Result<f64> {
    s.parse::<f64>().map_err(|_| Error::UnparseableMeasurement(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn feet_inches_and_fraction_add_up() {
        assert!(close(parse_measurement("7 ft 10 in 5/8 in").unwrap(), 94.625));
        assert!(close(parse_measurement("2 ft 5 in 3/4 in").unwrap(), 29.75));

        for (feet, inches, num, den) in [(0u32, 3u32, 1u32, 2u32), (3, 0, 7, 8), (10, 11, 15, 16)] {
            let text = format!("{feet} ft {inches} in {num}/{den} in");
            let expected = feet as f64 * 12.0 + inches as f64 + num as f64 / den as f64;
            assert!(close(parse_measurement(&text).unwrap(), expected), "{text}");
        }
    }

    #[test]
    fn single_components() {
        assert_eq!(parse_measurement("2 ft").unwrap(), 24.0);
        assert_eq!(parse_measurement("15 in").unwrap(), 15.0);
        assert!(close(parse_measurement("3/4 in").unwrap(), 0.75));
        assert_eq!(parse_measurement("4 feet").unwrap(), 48.0);
        assert_eq!(parse_measurement("9 inch").unwrap(), 9.0);
    }

    #[test]
    fn quote_marks_and_mixed_case() {
        assert!(close(parse_measurement("1' 2\"").unwrap(), 14.0));
        assert!(close(parse_measurement("  1 FT  2  IN 1/4 In ").unwrap(), 14.25));
        assert!(close(parse_measurement("1/2\"").unwrap(), 0.5));
    }

    #[test]
    fn bare_numbers_are_inches() {
        assert_eq!(parse_measurement("12").unwrap(), 12.0);
        assert_eq!(parse_measurement("  5.5  ").unwrap(), 5.5);
    }

    #[test]
    fn only_first_feet_token_counts() {
        assert_eq!(parse_measurement("2 ft 3 ft").unwrap(), 24.0);
    }

    #[test]
    fn every_fraction_counts() {
        assert!(close(parse_measurement("1/2 in 1/4 in").unwrap(), 0.75));
    }

    #[test]
    fn components_are_reported() {
        let (_, found) = parse_components("7 ft 10 in 5/8 in").unwrap();
        assert_eq!(found, Components::FEET | Components::INCHES | Components::FRACTION);

        let (_, found) = parse_components("12").unwrap();
        assert_eq!(found, Components::BARE);
    }

    #[test]
    fn failures() {
        assert!(matches!(parse_measurement(""), Err(Error::EmptyMeasurement)));
        assert!(matches!(parse_measurement("   "), Err(Error::EmptyMeasurement)));
        assert!(matches!(parse_measurement("foo bar"), Err(Error::UnparseableMeasurement(_))));
        assert!(matches!(parse_measurement("3/0 in"), Err(Error::ZeroDenominator(_))));
        assert!(matches!(parse_measurement("12/05/2024"), Err(Error::UnparseableMeasurement(_))));
    }

    #[test]
    fn only_ascii_digits_count() {
        assert!(matches!(parse_measurement("\u{0663} ft"), Err(Error::UnparseableMeasurement(_))));
        assert!(matches!(parse_measurement("\u{0661}\u{0662}"), Err(Error::UnparseableMeasurement(_))));
        assert!(matches!(parse_measurement("\u{0665}/\u{0668} in"), Err(Error::UnparseableMeasurement(_))));
        assert_eq!(parse_measurement("2 ft \u{0663} in").unwrap(), 24.0);
    }

    #[test]
    fn non_strings_are_rejected() {
        let err = parse_measurement_value(&serde_json::Value::Null).unwrap_err();
        assert!(matches!(err, Error::InvalidInputType { found: "null", .. }));

        let err = parse_measurement_value(&serde_json::json!(42)).unwrap_err();
        assert!(matches!(err, Error::InvalidInputType { found: "number", .. }));

        assert_eq!(parse_measurement_value(&serde_json::json!("2 ft")).unwrap(), 24.0);
    }
}
