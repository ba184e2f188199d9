//! The Jest-flavoured `pw.expect(value).toBe(...)` family.

use hb_core::{ExpectResult, ExpectStatus, GuestValue};

const VALID_TYPES: &[&str] = &[
    "string",
    "boolean",
    "number",
    "object",
    "undefined",
    "bigint",
    "symbol",
    "function",
];

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyCall {
    pub value: GuestValue,
    pub negated: bool,
}

impl LegacyCall {
    pub fn new(value: GuestValue, negated: bool) -> Self {
        Self { value, negated }
    }

    fn not(&self) -> &'static str {
        if self.negated {
            " not"
        } else {
            ""
        }
    }

    fn outcome(&self, holds: bool) -> ExpectStatus {
        ExpectStatus::from_outcome(holds != self.negated)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LegacyAssertion {
    ToBe(GuestValue),
    /// Status class check; the payload is the class floor (200, 300, ...).
    ToBeLevel(u16),
    ToBeType(GuestValue),
    ToHaveLength(GuestValue),
    ToInclude(GuestValue),
}

pub fn evaluate_legacy(call: &LegacyCall, assertion: &LegacyAssertion) -> ExpectResult {
    let value = &call.value;
    match assertion {
        LegacyAssertion::ToBe(expected) => ExpectResult::new(
            call.outcome(super::strict_equal(value, expected)),
            format!(
                "Expected '{}' to{} be '{}'",
                value.to_display_string(),
                call.not(),
                expected.to_display_string()
            ),
        ),
        LegacyAssertion::ToBeLevel(level) => match parse_int_prefix(value) {
            None => ExpectResult::new(
                ExpectStatus::Error,
                format!(
                    "Expected {}-level status but could not parse value '{}'",
                    level,
                    value.to_display_string()
                ),
            ),
            Some(status) => {
                let floor = i64::from(*level);
                ExpectResult::new(
                    call.outcome(status >= floor && status < floor + 100),
                    format!(
                        "Expected '{}' to{} be {}-level status",
                        status,
                        call.not(),
                        level
                    ),
                )
            }
        },
        LegacyAssertion::ToBeType(expected) => {
            let Some(wanted) = expected.as_str().filter(|name| VALID_TYPES.contains(name)) else {
                return ExpectResult::new(
                    ExpectStatus::Error,
                    "Argument for toBeType should be \"string\", \"boolean\", \"number\", \"object\", \"undefined\", \"bigint\", \"symbol\" or \"function\"",
                );
            };
            ExpectResult::new(
                call.outcome(value.type_name() == wanted),
                format!(
                    "Expected '{}' to{} be type '{}'",
                    value.to_display_string(),
                    call.not(),
                    wanted
                ),
            )
        }
        LegacyAssertion::ToHaveLength(expected) => {
            let Some(actual) = (match value {
                GuestValue::String(_) | GuestValue::Array(_) => value.length(),
                _ => None,
            }) else {
                return ExpectResult::new(
                    ExpectStatus::Error,
                    "Expected toHaveLength to be called for an array or string",
                );
            };
            let Some(wanted) = expected.as_f64() else {
                return ExpectResult::new(
                    ExpectStatus::Error,
                    "Argument for toHaveLength should be a number",
                );
            };
            ExpectResult::new(
                call.outcome(actual as f64 == wanted),
                format!(
                    "Expected the array to{} be of length '{}'",
                    call.not(),
                    expected.to_js_string()
                ),
            )
        }
        LegacyAssertion::ToInclude(needle) => {
            let holds = match (value, needle) {
                (_, GuestValue::Null) => {
                    return ExpectResult::new(
                        ExpectStatus::Error,
                        "Argument for toInclude should not be null",
                    )
                }
                (_, GuestValue::Undefined) => {
                    return ExpectResult::new(
                        ExpectStatus::Error,
                        "Argument for toInclude should not be undefined",
                    )
                }
                (GuestValue::String(text), needle) => text.contains(&needle.to_js_string()),
                (GuestValue::Array(items), needle) => {
                    items.iter().any(|item| super::strict_equal(item, needle))
                }
                _ => {
                    return ExpectResult::new(
                        ExpectStatus::Error,
                        "Expected toInclude to be called for an array or string",
                    )
                }
            };
            ExpectResult::new(
                call.outcome(holds),
                format!(
                    "Expected {} to{} include {}",
                    value.to_json(),
                    call.not(),
                    needle.to_json()
                ),
            )
        }
    }
}

/// `parseInt` semantics: leading whitespace, optional sign, then digits.
fn parse_int_prefix(value: &GuestValue) -> Option<i64> {
    match value {
        GuestValue::Int(number) => Some(*number),
        GuestValue::Float(number) if number.is_finite() => Some(number.trunc() as i64),
        GuestValue::String(text) => {
            let trimmed = text.trim_start();
            let (sign, digits) = match trimmed.strip_prefix('-') {
                Some(rest) => (-1, rest),
                None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
            };
            let end = digits
                .find(|ch: char| !ch.is_ascii_digit())
                .unwrap_or(digits.len());
            digits[..end].parse::<i64>().ok().map(|number| sign * number)
        }
        _ => None,
    }
}

#[cfg(test)]
mod legacy_tests {
    use super::*;

    fn run(value: GuestValue, negated: bool, assertion: LegacyAssertion) -> ExpectResult {
        evaluate_legacy(&LegacyCall::new(value, negated), &assertion)
    }

    #[test]
    fn to_be_uses_strict_equality_and_quotes_both_sides() {
        let result = run(GuestValue::Int(200), false, LegacyAssertion::ToBe(GuestValue::Int(200)));
        assert_eq!(result.status, ExpectStatus::Pass);
        assert_eq!(result.message, "Expected '200' to be '200'");

        let result = run(
            GuestValue::string("1"),
            true,
            LegacyAssertion::ToBe(GuestValue::Int(1)),
        );
        assert_eq!(result.status, ExpectStatus::Pass);
        assert_eq!(result.message, "Expected '1' to not be '1'");
    }

    #[test]
    fn level_checks_parse_integer_prefixes() {
        let result = run(GuestValue::string("404 Not Found"), false, LegacyAssertion::ToBeLevel(400));
        assert_eq!(result.status, ExpectStatus::Pass);
        assert_eq!(result.message, "Expected '404' to be 400-level status");

        let result = run(GuestValue::Int(201), false, LegacyAssertion::ToBeLevel(500));
        assert_eq!(result.status, ExpectStatus::Fail);

        let result = run(GuestValue::string("abc"), false, LegacyAssertion::ToBeLevel(200));
        assert_eq!(result.status, ExpectStatus::Error);
        assert_eq!(
            result.message,
            "Expected 200-level status but could not parse value 'abc'"
        );
    }

    #[test]
    fn to_be_type_rejects_unknown_type_names() {
        let result = run(
            GuestValue::string("x"),
            false,
            LegacyAssertion::ToBeType(GuestValue::string("string")),
        );
        assert_eq!(result.status, ExpectStatus::Pass);
        assert_eq!(result.message, "Expected 'x' to be type 'string'");

        let result = run(
            GuestValue::string("x"),
            false,
            LegacyAssertion::ToBeType(GuestValue::string("text")),
        );
        assert_eq!(result.status, ExpectStatus::Error);
        assert!(result.message.starts_with("Argument for toBeType should be"));
    }

    #[test]
    fn to_have_length_requires_array_or_string() {
        let array = GuestValue::Array(vec![GuestValue::Int(1), GuestValue::Int(2)]);
        let result = run(array, false, LegacyAssertion::ToHaveLength(GuestValue::Int(2)));
        assert_eq!(result.status, ExpectStatus::Pass);
        assert_eq!(result.message, "Expected the array to be of length '2'");

        let result = run(GuestValue::Int(5), false, LegacyAssertion::ToHaveLength(GuestValue::Int(1)));
        assert_eq!(result.status, ExpectStatus::Error);

        let result = run(
            GuestValue::string("ab"),
            false,
            LegacyAssertion::ToHaveLength(GuestValue::string("2")),
        );
        assert_eq!(result.message, "Argument for toHaveLength should be a number");
    }

    #[test]
    fn to_include_serializes_both_sides_as_json() {
        let array = GuestValue::Array(vec![GuestValue::Int(1), GuestValue::Int(2)]);
        let result = run(array, false, LegacyAssertion::ToInclude(GuestValue::Int(2)));
        assert_eq!(result.status, ExpectStatus::Pass);
        assert_eq!(result.message, "Expected [1,2] to include 2");

        let result = run(
            GuestValue::string("hello"),
            true,
            LegacyAssertion::ToInclude(GuestValue::string("xyz")),
        );
        assert_eq!(result.status, ExpectStatus::Pass);
        assert_eq!(result.message, "Expected \"hello\" to not include \"xyz\"");

        let result = run(
            GuestValue::string("hello"),
            false,
            LegacyAssertion::ToInclude(GuestValue::Null),
        );
        assert_eq!(result.status, ExpectStatus::Error);
    }
}
