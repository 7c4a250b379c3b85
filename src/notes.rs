//! Order note parsing.
//!
//! A note is loosely structured text pasted from a sales order. Only lines of
//! the form `Key: Value` become fields; URLs are collected from every line.
//!
//! ```text
//! "Select Door Height: 7 ft 10 in 5/8 in"
//!   └──── raw key ───┘  └──── raw value ──┘
//!          │                    │
//!   normalize_key          yes/no -> bool
//!          │               measurement-like -> inches (fallback: text)
//!          ▼               else -> text
//!   "select_door_height" = Number(94.625)
//! ```

use crate::error::{Error, Result, json_type_name};
use crate::measurement::parse_measurement;
use crate::{OrderRecord, Value};

/// Serialized key under which collected URLs are attached to an
/// [`OrderRecord`].
pub const URLS_KEY: &str = "_urls";

/// Parse a block of order note text into an [`OrderRecord`].
///
/// # Example
/// ```
/// use cutsheet::{Value, parse_notes};
///
/// let order = parse_notes("Select Door Height: 7 ft 10 in 5/8 in\nIs Wine Room Door?: No").unwrap();
/// assert_eq!(order.get("select_door_height"), Some(&Value::Number(94.625)));
/// assert_eq!(order.get("is_wine_room_door"), Some(&Value::Bool(false)));
/// ```
pub fn parse_notes(text: &str) -> Result<OrderRecord> {
    let mut record = OrderRecord::new();
    let mut urls = Vec::new();

    for line in regex!(r"\r\n|\n|\r").split(text) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        urls.extend(regex!(r"https?://\S+").find_iter(line).map(|m| m.as_str().to_string()));

        let Some((raw_key, raw_value)) = line.split_once(':') else {
            continue;
        };
        let key = normalize_key(raw_key.trim());
        let value = type_value(raw_value.trim());
        record.insert(key, value);
    }

    Ok(record.with_urls(urls))
}

/// Parse note text arriving as untyped JSON; only strings are accepted.
pub fn parse_notes_value(input: &serde_json::Value) -> Result<OrderRecord> {
    match input {
        serde_json::Value::String(s) => parse_notes(s),
        other => Err(Error::InvalidInputType { expected: "string", found: json_type_name(other) }),
    }
}

/// Normalize a note key: lower-case, separators to `_`, drop the rest.
///
/// ```
/// use cutsheet::normalize_key;
///
/// assert_eq!(normalize_key("Metal Framed Hinged Door?"), "metal_framed_hinged_door");
/// ```
pub fn normalize_key(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let underscored = regex!(r"[\s/\-]+").replace_all(&lower, "_");
    regex!(r"[^a-z0-9_]+").replace_all(&underscored, "").into_owned()
}

fn type_value(raw: &str) -> Value {
    if regex!(r"(?i)^(?:yes|y)$").is_match(raw) {
        return Value::Bool(true);
    }
    if regex!(r"(?i)^(?:no|n)$").is_match(raw) {
        return Value::Bool(false);
    }

    if regex!(r#"(?i)[0-9]+\s*(?:ft|feet|'|in|inch|"|/)"#).is_match(raw) {
        return match parse_measurement(raw) {
            Ok(inches) => Value::Number(inches),
            Err(err) => {
                tracing::debug!(value = raw, error = %err, "measurement-like value kept as text");
                Value::Text(raw.to_string())
            }
        };
    }

    Value::Text(raw.to_string())
}
