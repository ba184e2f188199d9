use std::f64::consts::{E, PI};

use chrono::{DateTime, SecondsFormat, Utc};
use hb_core::{display_marker, js_number, GuestValue, SpecialValue, NULL_MARKER, UNDEFINED_MARKER};

const MAX_ARRAY_ITEMS: usize = 10;
const MAX_OBJECT_KEYS: usize = 5;

const KNOWN_CONSTRUCTORS: &[&str] = &[
    "Array",
    "Object",
    "String",
    "Number",
    "Boolean",
    "Date",
    "RegExp",
    "Error",
    "TypeError",
    "RangeError",
    "ReferenceError",
    "SyntaxError",
    "Set",
    "Map",
    "WeakSet",
    "WeakMap",
    "Promise",
    "Symbol",
    "Function",
];

const TYPE_NOUNS: &[&str] = &["array", "object", "number", "string", "boolean", "function"];

/// Renders a value for an assertion message.
pub fn format_value(value: &GuestValue) -> String {
    match value {
        GuestValue::Undefined => "undefined".to_string(),
        GuestValue::Null => "null".to_string(),
        GuestValue::Bool(value) => value.to_string(),
        GuestValue::Int(value) => value.to_string(),
        GuestValue::Float(value) => format_number(*value),
        GuestValue::BigInt(digits) => format!("{digits}n"),
        GuestValue::Symbol(description) => format!("Symbol({description})"),
        GuestValue::Function { name } => match name {
            Some(name) if name.starts_with(|ch: char| ch.is_ascii_uppercase()) => name.clone(),
            Some(name) => format!("[Function: {name}]"),
            None => "[Function]".to_string(),
        },
        GuestValue::String(text) => format_string(text),
        GuestValue::Array(items) => {
            if items.is_empty() {
                return "[]".to_string();
            }
            let shown = items
                .iter()
                .take(MAX_ARRAY_ITEMS)
                .map(format_value)
                .collect::<Vec<_>>();
            format!("[{}]", shown.join(", "))
        }
        GuestValue::Object(entries) => {
            if entries.is_empty() {
                return "{}".to_string();
            }
            let shown = entries
                .iter()
                .take(MAX_OBJECT_KEYS)
                .map(|(key, value)| format!("{}: {}", key, format_value(value)))
                .collect::<Vec<_>>();
            format!("{{{}}}", shown.join(", "))
        }
    }
}

fn format_number(value: f64) -> String {
    if value == PI {
        return "Math.PI".to_string();
    }
    if value == E {
        return "Math.E".to_string();
    }
    js_number(value)
}

fn format_string(text: &str) -> String {
    if text == UNDEFINED_MARKER || text == NULL_MARKER {
        return display_marker(text).to_string();
    }
    let trimmed = text.trim();
    if is_preformatted(trimmed) {
        return text.to_string();
    }
    if is_constructor_name(trimmed) || looks_like_function(trimmed) {
        return trimmed.to_string();
    }
    format!("'{text}'")
}

fn is_preformatted(trimmed: &str) -> bool {
    if trimmed.starts_with("new Set(") || trimmed.starts_with("new Map(") {
        return true;
    }
    is_regex_literal(trimmed)
}

/// `/source/flags` with only valid flag letters after the closing slash.
pub(crate) fn is_regex_literal(text: &str) -> bool {
    let Some(body) = text.strip_prefix('/') else {
        return false;
    };
    let Some(close) = body.rfind('/') else {
        return false;
    };
    body[close + 1..]
        .chars()
        .all(|flag| matches!(flag, 'g' | 'i' | 'm' | 's' | 'u' | 'v' | 'y'))
}

fn is_constructor_name(trimmed: &str) -> bool {
    let is_identifier = trimmed.starts_with(|ch: char| ch.is_ascii_uppercase())
        && trimmed.chars().all(|ch| ch.is_ascii_alphanumeric());
    is_identifier && (trimmed.ends_with("Error") || KNOWN_CONSTRUCTORS.contains(&trimmed))
}

fn looks_like_function(trimmed: &str) -> bool {
    if trimmed.starts_with("function") {
        return true;
    }
    if trimmed.starts_with('(') {
        if let Some(close) = trimmed.find(')') {
            if trimmed[close + 1..].trim_start().starts_with("=>") {
                return true;
            }
        }
    }
    let mut chars = trimmed.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    let rest = trimmed[first.len_utf8()..]
        .trim_start_matches(|ch: char| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$');
    rest.trim_start().starts_with('(')
}

/// `toISOString()` of a millisecond timestamp; out-of-range values print as
/// `Invalid Date`.
pub fn iso_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|date| date.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| "Invalid Date".to_string())
}

pub(crate) fn special_display(special: &SpecialValue) -> String {
    match special {
        SpecialValue::Date { millis } => iso_timestamp(*millis),
        SpecialValue::RegExp { source, flags } => format!("/{source}/{flags}"),
    }
}

/// Normalizes a modifier chain such as `" to not have which is"` into the
/// clause printed after the value.
pub fn clean_modifiers(modifiers: &str) -> String {
    let tokens = modifiers.split_whitespace().collect::<Vec<_>>();
    let has_type_prefix = tokens.windows(3).any(|window| {
        TYPE_NOUNS.contains(&window[0]) && window[1] == "that" && window[2] == "has"
    });

    let mut rewritten: Vec<&str> = Vec::with_capacity(tokens.len());
    let mut index = 0;
    while index < tokens.len() {
        let token = tokens[index];
        let next = tokens.get(index + 1).copied();
        if token == "that" && next == Some("does") {
            index += 2;
            continue;
        }
        if !has_type_prefix && token == "that" && next == Some("has") {
            rewritten.push("have");
            index += 2;
            continue;
        }
        if !has_type_prefix && token == "has" {
            rewritten.push("have");
        } else {
            rewritten.push(token);
        }
        index += 1;
    }

    let mut cleaned: Vec<&str> = Vec::with_capacity(rewritten.len());
    for token in rewritten {
        let token = if token == "is" { "be" } else { token };
        if matches!(token, "which" | "does" | "but") {
            continue;
        }
        if cleaned.last() == Some(&token) {
            continue;
        }
        cleaned.push(token);
    }

    let joined = cleaned.join(" ");
    if joined.is_empty() {
        "to".to_string()
    } else if joined.starts_with("to") {
        joined
    } else {
        format!("to {joined}")
    }
}

/// `Expected <value> <clause> <label> <args>`, identical for pass and fail.
pub fn build_message(
    value: &GuestValue,
    modifiers: &str,
    label: &str,
    args: &[GuestValue],
) -> String {
    let clause = clean_modifiers(modifiers);
    let mut message = format!("Expected {} {}", format_value(value), clause);

    let last_clause_word = clause.split_whitespace().last().unwrap_or_default();
    let first_label_word = label.split_whitespace().next().unwrap_or_default();
    if !first_label_word.is_empty() && last_clause_word == first_label_word {
        let rest = label[first_label_word.len()..].trim();
        if !rest.is_empty() {
            message.push(' ');
            message.push_str(rest);
        }
    } else if !label.is_empty() {
        message.push(' ');
        message.push_str(label);
    }

    if args.is_empty() {
        return message;
    }

    if label == "keys" {
        let keys = match args {
            [GuestValue::Array(items)] => items.as_slice(),
            other => other,
        };
        let rendered = keys
            .iter()
            .map(|key| match key {
                GuestValue::Int(_) | GuestValue::Float(_) => {
                    format!("'{}'", key.to_js_string())
                }
                other => format_value(other),
            })
            .collect::<Vec<_>>();
        message.push(' ');
        message.push_str(&rendered.join(", "));
    } else if label.ends_with("members") {
        let members = match args {
            [GuestValue::Array(items)] => items.as_slice(),
            other => other,
        };
        let rendered = members.iter().map(format_value).collect::<Vec<_>>();
        message.push_str(&format!(" [{}]", rendered.join(", ")));
    } else {
        let separator = if label.contains("property") { ", " } else { " " };
        let rendered = args.iter().map(format_value).collect::<Vec<_>>();
        message.push_str(separator);
        message.push_str(&rendered.join(", "));
    }
    message
}
