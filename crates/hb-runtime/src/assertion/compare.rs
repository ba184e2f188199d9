use hb_core::GuestValue;
use regex::{Regex, RegexBuilder};

/// `===` on cloned values. Composite values have no identity left, so they
/// never compare equal here; identity travels as pre-check metadata instead.
pub fn strict_equal(left: &GuestValue, right: &GuestValue) -> bool {
    match (left, right) {
        (GuestValue::Undefined, GuestValue::Undefined) | (GuestValue::Null, GuestValue::Null) => {
            true
        }
        (GuestValue::Bool(a), GuestValue::Bool(b)) => a == b,
        (GuestValue::String(a), GuestValue::String(b)) => a == b,
        (GuestValue::BigInt(a), GuestValue::BigInt(b)) => a == b,
        (left, right) if left.is_number() && right.is_number() => {
            match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Structural equality; `NaN` equals itself, integers equal matching floats.
pub fn deep_equal(left: &GuestValue, right: &GuestValue) -> bool {
    match (left, right) {
        (GuestValue::Array(a), GuestValue::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| deep_equal(x, y))
        }
        (GuestValue::Object(a), GuestValue::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| deep_equal(value, other)))
        }
        (GuestValue::Float(a), GuestValue::Float(b)) if a.is_nan() && b.is_nan() => true,
        (GuestValue::Symbol(a), GuestValue::Symbol(b)) => a == b,
        (GuestValue::Function { name: a }, GuestValue::Function { name: b }) => {
            a.is_some() && a == b
        }
        _ => strict_equal(left, right),
    }
}

pub fn values_equal(left: &GuestValue, right: &GuestValue, deep: bool) -> bool {
    if deep {
        deep_equal(left, right)
    } else {
        strict_equal(left, right)
    }
}

pub fn contains_value(haystack: &[GuestValue], needle: &GuestValue, deep: bool) -> bool {
    haystack.iter().any(|item| values_equal(item, needle, deep))
}

/// Walks a dotted/bracketed path (`a.b[0].c`) through objects and arrays.
pub fn get_path<'a>(value: &'a GuestValue, path: &str) -> Option<&'a GuestValue> {
    let mut current = value;
    for segment in split_path(path) {
        current = match current {
            GuestValue::Object(entries) => entries.get(&segment)?,
            GuestValue::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

pub fn split_path(path: &str) -> Vec<String> {
    path.replace('[', ".")
        .replace(']', "")
        .split('.')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.trim_matches(|ch| ch == '\'' || ch == '"').to_string())
        .collect()
}

/// Keys visible to key assertions: object keys or array indices.
pub fn own_keys(value: &GuestValue) -> Vec<GuestValue> {
    match value {
        GuestValue::Object(entries) => entries.keys().map(|key| GuestValue::string(key.as_str())).collect(),
        GuestValue::Array(items) => (0..items.len())
            .map(|index| GuestValue::String(index.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Key comparison is by string form, so `1` matches the key `"1"`.
pub fn key_matches(actual: &GuestValue, expected: &GuestValue) -> bool {
    match (actual, expected) {
        (GuestValue::String(_), _) | (_, GuestValue::String(_)) => {
            actual.to_js_string() == expected.to_js_string()
        }
        _ => deep_equal(actual, expected),
    }
}

/// Compiles a guest regex. Flags `i`, `m` and `s` map onto the matcher; the
/// stateful flags (`g`, `y`) and unicode flags have no effect on `test`.
pub fn build_regex(source: &str, flags: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
}
