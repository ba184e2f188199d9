use std::collections::BTreeMap;

use serde_json::{Map as JsonMap, Number, Value as JsonValue};

/// Stored in place of an `undefined` value written through the any-type setter.
pub const UNDEFINED_MARKER: &str = "__HOOKBOX_UNDEFINED__";
/// Stored in place of a `null` value written through the any-type setter.
pub const NULL_MARKER: &str = "__HOOKBOX_NULL__";

/// A value after it crossed the guest/host boundary.
///
/// Crossing is a structural clone: identity, integrity flags, collection kinds,
/// dates and callability are gone. Whatever the host needs to know about those
/// travels in [`crate::PreCheckMetadata`] instead.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GuestValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    BigInt(String),
    Symbol(String),
    Function {
        name: Option<String>,
    },
    String(String),
    Array(Vec<GuestValue>),
    Object(BTreeMap<String, GuestValue>),
}

impl GuestValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Same answer `typeof` gives in the guest.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::Float(_) => "number",
            Self::BigInt(_) => "bigint",
            Self::Symbol(_) => "symbol",
            Self::Function { .. } => "function",
            Self::String(_) => "string",
            Self::Array(_) | Self::Object(_) => "object",
        }
    }

    /// Lowercase type tag with `null` and `array` split out of `object`.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Array(_) => "array",
            other => other.type_name(),
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
            Self::Float(value) => *value != 0.0 && !value.is_nan(),
            Self::BigInt(digits) => digits.trim_start_matches('-').trim_start_matches('0') != "",
            Self::String(value) => !value.is_empty(),
            Self::Symbol(_) | Self::Function { .. } | Self::Array(_) | Self::Object(_) => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Element count for strings (in chars) and arrays.
    pub fn length(&self) -> Option<usize> {
        match self {
            Self::String(value) => Some(value.chars().count()),
            Self::Array(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Converts a stored marker string back into the value it stands for.
    pub fn resolve_marker(self) -> Self {
        match &self {
            Self::String(value) if value == UNDEFINED_MARKER => Self::Undefined,
            Self::String(value) if value == NULL_MARKER => Self::Null,
            _ => self,
        }
    }

    /// Encodes `undefined`/`null` as marker strings for storage.
    pub fn into_marker(self) -> Self {
        match self {
            Self::Undefined => Self::String(UNDEFINED_MARKER.to_string()),
            Self::Null => Self::String(NULL_MARKER.to_string()),
            other => other,
        }
    }

    /// `String(value)` as the guest would compute it.
    pub fn to_js_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => js_number(*value),
            Self::BigInt(digits) => digits.clone(),
            Self::Symbol(description) => format!("Symbol({description})"),
            Self::Function { name } => {
                format!("function {}() {{ [native code] }}", name.as_deref().unwrap_or(""))
            }
            Self::String(value) => value.clone(),
            Self::Array(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) => "[object Object]".to_string(),
        }
    }

    /// Text form used when an environment value leaves the sandbox: markers
    /// become `undefined`/`null`, composite values become JSON.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::String(value) => display_marker(value).to_string(),
            Self::Array(_) | Self::Object(_) => self.to_json().to_string(),
            other => other.to_js_string(),
        }
    }

    /// JSON projection. Mirrors `JSON.stringify`: `undefined` members are
    /// skipped, non-finite numbers become `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Undefined | Self::Null | Self::Symbol(_) | Self::Function { .. } => {
                JsonValue::Null
            }
            Self::Bool(value) => JsonValue::Bool(*value),
            Self::Int(value) => JsonValue::Number(Number::from(*value)),
            Self::Float(value) => float_to_json(*value),
            Self::BigInt(digits) => JsonValue::String(digits.clone()),
            Self::String(value) => JsonValue::String(value.clone()),
            Self::Array(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(entries) => {
                let mut out = JsonMap::new();
                for (key, value) in entries {
                    if matches!(
                        value,
                        Self::Undefined | Self::Function { .. } | Self::Symbol(_)
                    ) {
                        continue;
                    }
                    out.insert(key.clone(), value.to_json());
                }
                JsonValue::Object(out)
            }
        }
    }

    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(value) => Self::Bool(*value),
            JsonValue::Number(number) => match number.as_i64() {
                Some(value) => Self::Int(value),
                None => Self::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(value) => Self::String(value.clone()),
            JsonValue::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            JsonValue::Object(entries) => Self::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), Self::from_json(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for GuestValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for GuestValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for GuestValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for GuestValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for GuestValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Maps a marker string to its display text. Non-marker input is returned
/// unchanged, so applying it twice is the same as applying it once.
pub fn display_marker(value: &str) -> &str {
    match value {
        UNDEFINED_MARKER => "undefined",
        NULL_MARKER => "null",
        other => other,
    }
}

/// Number formatting with the guest's conventions (`1` not `1.0`, `NaN`, `Infinity`).
pub fn js_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e21 {
        return format!("{value:.0}");
    }
    value.to_string()
}

fn float_to_json(value: f64) -> JsonValue {
    if !value.is_finite() {
        return JsonValue::Null;
    }
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        return JsonValue::Number(Number::from(value as i64));
    }
    Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

#[cfg(test)]
mod value_tests {
    use super::*;

    #[test]
    fn type_name_and_tag_follow_guest_conventions() {
        assert_eq!(GuestValue::Null.type_name(), "object");
        assert_eq!(GuestValue::Null.type_tag(), "null");
        assert_eq!(GuestValue::Array(vec![]).type_tag(), "array");
        assert_eq!(GuestValue::Float(1.5).type_name(), "number");
        assert_eq!(GuestValue::BigInt("1".into()).type_tag(), "bigint");
    }

    #[test]
    fn markers_resolve_once_and_idempotently() {
        assert_eq!(display_marker(UNDEFINED_MARKER), "undefined");
        assert_eq!(display_marker(NULL_MARKER), "null");
        assert_eq!(display_marker(display_marker(NULL_MARKER)), "null");
        assert_eq!(display_marker("plain"), "plain");

        let stored = GuestValue::Undefined.into_marker();
        assert_eq!(stored, GuestValue::string(UNDEFINED_MARKER));
        assert_eq!(stored.clone().resolve_marker(), GuestValue::Undefined);
        assert_eq!(
            stored.resolve_marker().resolve_marker(),
            GuestValue::Undefined
        );
        assert_eq!(
            GuestValue::string(NULL_MARKER).to_display_string(),
            "null"
        );
    }

    #[test]
    fn display_string_uses_json_for_composites() {
        let mut entries = BTreeMap::new();
        entries.insert("a".to_string(), GuestValue::Int(1));
        entries.insert("skip".to_string(), GuestValue::Undefined);
        assert_eq!(
            GuestValue::Object(entries).to_display_string(),
            r#"{"a":1}"#
        );
        assert_eq!(
            GuestValue::Array(vec![GuestValue::Float(2.0), GuestValue::Null]).to_display_string(),
            "[2,null]"
        );
        assert_eq!(GuestValue::Bool(true).to_display_string(), "true");
    }

    #[test]
    fn js_number_formats_like_the_guest() {
        assert_eq!(js_number(1.0), "1");
        assert_eq!(js_number(-0.0), "0");
        assert_eq!(js_number(2.5), "2.5");
        assert_eq!(js_number(f64::NAN), "NaN");
        assert_eq!(js_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn truthiness_matches_guest_rules() {
        assert!(!GuestValue::string("").is_truthy());
        assert!(!GuestValue::Float(f64::NAN).is_truthy());
        assert!(!GuestValue::BigInt("0".into()).is_truthy());
        assert!(GuestValue::Object(BTreeMap::new()).is_truthy());
        assert!(GuestValue::Int(-1).is_truthy());
    }

    #[test]
    fn json_round_trip_keeps_integers_integral() {
        let parsed = GuestValue::from_json(&serde_json::json!({"n": 3, "f": 1.5, "x": null}));
        let GuestValue::Object(entries) = &parsed else {
            panic!("object expected");
        };
        assert_eq!(entries.get("n"), Some(&GuestValue::Int(3)));
        assert_eq!(entries.get("f"), Some(&GuestValue::Float(1.5)));
        assert_eq!(entries.get("x"), Some(&GuestValue::Null));
        assert_eq!(parsed.to_json(), serde_json::json!({"n": 3, "f": 1.5, "x": null}));
    }

    #[test]
    fn js_string_of_array_blanks_nullish_items() {
        let value = GuestValue::Array(vec![
            GuestValue::Int(1),
            GuestValue::Null,
            GuestValue::string("a"),
        ]);
        assert_eq!(value.to_js_string(), "1,,a");
    }
}
