use hb_core::{ExpectResult, ExpectStatus, GuestValue, SpecialValue};

use super::compare::{
    build_regex, contains_value, deep_equal, get_path, key_matches, own_keys, strict_equal,
    values_equal,
};
use super::format::{build_message, format_value, special_display};
use super::schema::{matches_schema, resolve_json_path};
use super::{Assertion, AssertionCall, ChangeKind, MessageMatcher, Verdict};

const DELTA_TOLERANCE: f64 = 0.0001;

/// Result of a single check before negation is applied.
struct Check {
    holds: bool,
    label: String,
    args: Vec<GuestValue>,
    subject: Option<GuestValue>,
}

impl Check {
    fn new(holds: bool, label: impl Into<String>) -> Self {
        Self {
            holds,
            label: label.into(),
            args: Vec::new(),
            subject: None,
        }
    }

    fn args(mut self, args: Vec<GuestValue>) -> Self {
        self.args = args;
        self
    }

    fn subject(mut self, subject: GuestValue) -> Self {
        self.subject = Some(subject);
        self
    }
}

/// Evaluates one flattened assertion. Never fails: a broken assertion is a
/// `fail` result, not an error.
pub fn evaluate(call: &AssertionCall, assertion: &Assertion) -> Verdict {
    match assertion {
        Assertion::Match { source, flags } => Verdict::Record(match_pattern(call, source, flags)),
        Assertion::Throw {
            error_type,
            message,
        } => Verdict::Record(throws(call, error_type.as_deref(), message.as_ref())),
        Assertion::ChangeBy { kind, amount } => Verdict::AmendLast(change_by(call, *kind, amount)),
        Assertion::Fail {
            actual,
            expected,
            message,
            operator,
        } => Verdict::Record(ExpectResult::new(
            ExpectStatus::Fail,
            fail_message(
                actual.as_ref(),
                expected.as_ref(),
                message.as_ref(),
                operator.as_deref(),
            ),
        )),
        other => {
            let check = check(call, other);
            let passed = check.holds != call.negated();
            let subject = check.subject.unwrap_or_else(|| subject(call));
            Verdict::Record(ExpectResult::new(
                ExpectStatus::from_outcome(passed),
                build_message(&subject, &call.modifiers, &check.label, &check.args),
            ))
        }
    }
}

/// The value as it should appear in messages: pre-formatted display literal
/// when the guest sent one.
fn subject(call: &AssertionCall) -> GuestValue {
    match &call.meta.display {
        Some(display) => GuestValue::string(display.as_str()),
        None => call.value.clone(),
    }
}

fn is_composite(value: &GuestValue) -> bool {
    matches!(value, GuestValue::Array(_) | GuestValue::Object(_))
}

fn check(call: &AssertionCall, assertion: &Assertion) -> Check {
    let value = &call.value;
    let meta = &call.meta;
    let deep = call.has("deep");
    match assertion {
        Assertion::Equal { expected, method } => {
            let by_reference = !deep
                && meta.same_reference.is_some()
                && (meta.special.is_some() || (is_composite(value) && is_composite(expected)));
            let holds = match meta.same_reference {
                Some(same) if by_reference => same,
                _ if deep => deep_equal(value, expected),
                _ => strict_equal(value, expected),
            };
            let shown_expected = match (&meta.expected_special, &meta.expected_display) {
                (Some(special), _) => GuestValue::String(special_display(special)),
                (None, Some(display)) => GuestValue::string(display.as_str()),
                (None, None) => expected.clone(),
            };
            let mut check = Check::new(holds, *method).args(vec![shown_expected]);
            if let Some(special) = &meta.special {
                check = check.subject(GuestValue::String(special_display(special)));
            }
            check
        }
        Assertion::Eql { expected } => match (&meta.special, &meta.expected_special) {
            (Some(actual), Some(wanted)) => {
                let holds = match (actual, wanted) {
                    (
                        SpecialValue::RegExp { source, flags },
                        SpecialValue::RegExp {
                            source: wanted_source,
                            flags: wanted_flags,
                        },
                    ) => source == wanted_source && flags == wanted_flags,
                    (SpecialValue::Date { millis }, SpecialValue::Date { millis: wanted }) => {
                        millis == wanted
                    }
                    _ => false,
                };
                Check::new(holds, "eql")
                    .args(vec![GuestValue::String(special_display(wanted))])
                    .subject(GuestValue::String(special_display(actual)))
            }
            _ => Check::new(deep_equal(value, expected), "eql").args(vec![expected.clone()]),
        },
        Assertion::TypeOf { expected } => {
            let actual = meta
                .type_tag
                .clone()
                .unwrap_or_else(|| value.type_tag().to_string());
            let wanted = expected.to_ascii_lowercase();
            let holds = actual == wanted
                || (wanted == "object"
                    && matches!(actual.as_str(), "array" | "set" | "map" | "date" | "regexp"));
            let article = if wanted.starts_with(['a', 'e', 'i', 'o', 'u']) {
                "an"
            } else {
                "a"
            };
            Check::new(holds, format!("{article} {expected}"))
        }
        Assertion::InstanceOf { constructor } => {
            let holds = match constructor.as_str() {
                "Object" => {
                    is_composite(value)
                        || matches!(value, GuestValue::Function { .. })
                        || meta.collection.is_some()
                        || meta.special.is_some()
                }
                name => match builtin_object_tag(name) {
                    Some(tag) => {
                        let actual = meta
                            .object_tag
                            .clone()
                            .unwrap_or_else(|| fallback_object_tag(value).to_string());
                        actual == tag
                            && (tag != "[object Error]" || meta.instance_of.unwrap_or(true))
                    }
                    None => meta.instance_of.unwrap_or(false),
                },
            };
            Check::new(holds, "be an instanceof")
                .args(vec![GuestValue::string(constructor.as_str())])
        }
        Assertion::Ok => Check::new(value.is_truthy(), "ok"),
        Assertion::True => Check::new(matches!(value, GuestValue::Bool(true)), "true"),
        Assertion::False => Check::new(matches!(value, GuestValue::Bool(false)), "false"),
        Assertion::Null => Check::new(matches!(value, GuestValue::Null), "null"),
        Assertion::Undefined => Check::new(matches!(value, GuestValue::Undefined), "undefined"),
        Assertion::NaN => Check::new(
            matches!(value, GuestValue::Float(number) if number.is_nan()),
            "NaN",
        ),
        Assertion::Exist => Check::new(!value.is_nullish(), "exist"),
        Assertion::Finite => Check::new(
            value.as_f64().is_some_and(f64::is_finite),
            "finite",
        ),
        Assertion::Empty => {
            let holds = match meta.size {
                Some(size) => size == 0,
                None => match value {
                    GuestValue::String(text) => text.is_empty(),
                    GuestValue::Array(items) => items.is_empty(),
                    GuestValue::Object(entries) => entries.is_empty(),
                    _ => false,
                },
            };
            Check::new(holds, "empty")
        }
        Assertion::Arguments => Check::new(meta.is_arguments.unwrap_or(false), "arguments"),
        Assertion::Extensible => Check::new(
            meta.extensible
                .unwrap_or_else(|| is_composite(value) || meta.collection.is_some()),
            "extensible",
        ),
        Assertion::Sealed => Check::new(
            meta.sealed.unwrap_or_else(|| !is_composite(value)),
            "sealed",
        ),
        Assertion::Frozen => Check::new(
            meta.frozen.unwrap_or_else(|| !is_composite(value)),
            "frozen",
        ),
        Assertion::Include { needle } => {
            let nested = call.has("nested");
            let holds = match (&meta.members, value) {
                (Some(members), _) => contains_value(members, needle, deep),
                (None, GuestValue::String(text)) => {
                    needle.as_str().is_some_and(|part| text.contains(part))
                }
                (None, GuestValue::Array(items)) => contains_value(items, needle, deep),
                (None, GuestValue::Object(entries)) => match needle {
                    GuestValue::Object(wanted) => wanted.iter().all(|(key, expected)| {
                        let found = if nested {
                            get_path(value, key)
                        } else {
                            entries.get(key)
                        };
                        found.is_some_and(|actual| values_equal(actual, expected, deep))
                    }),
                    _ => false,
                },
                _ => false,
            };
            let label = if nested { "nested include" } else { "include" };
            Check::new(holds, label).args(vec![needle.clone()])
        }
        Assertion::Keys { keys } => {
            let expected = match keys.as_slice() {
                [GuestValue::Array(items)] => items.clone(),
                other => other.to_vec(),
            };
            let actual = meta.keys.clone().unwrap_or_else(|| own_keys(value));
            let present =
                |key: &GuestValue| actual.iter().any(|candidate| key_matches(candidate, key));
            let including = call.has("include");
            let holds = !expected.is_empty()
                && if call.has("any") {
                    expected.iter().any(present)
                } else if including {
                    expected.iter().all(present)
                } else {
                    expected.iter().all(present) && actual.len() == expected.len()
                };
            let label = if including { "include keys" } else { "keys" };
            Check::new(holds, label).args(expected)
        }
        Assertion::Members { members } => {
            let actual = match (&meta.members, value) {
                (Some(members), _) => Some(members.clone()),
                (None, GuestValue::Array(items)) => Some(items.clone()),
                _ => None,
            };
            let including = call.has("include");
            let ordered = call.has("ordered");
            let holds = actual.is_some_and(|actual| {
                let same = |left: &GuestValue, right: &GuestValue| values_equal(left, right, deep);
                match (including, ordered) {
                    (true, true) => {
                        members.len() <= actual.len()
                            && members.iter().zip(actual.iter()).all(|(a, b)| same(a, b))
                    }
                    (true, false) => members
                        .iter()
                        .all(|member| contains_value(&actual, member, deep)),
                    (false, true) => {
                        members.len() == actual.len()
                            && members.iter().zip(actual.iter()).all(|(a, b)| same(a, b))
                    }
                    (false, false) => {
                        members.len() == actual.len()
                            && members
                                .iter()
                                .all(|member| contains_value(&actual, member, deep))
                            && actual
                                .iter()
                                .all(|member| contains_value(members, member, deep))
                    }
                }
            });
            let label = if including && !ordered {
                "include members"
            } else {
                "members"
            };
            Check::new(holds, label).args(vec![GuestValue::Array(members.clone())])
        }
        Assertion::OneOf { list } => {
            let including = call.has("include");
            let holds = if including {
                list.iter().any(|candidate| match (value, candidate) {
                    (GuestValue::String(text), GuestValue::String(part)) => text.contains(part.as_str()),
                    (GuestValue::Array(items), _) => contains_value(items, candidate, deep),
                    _ => false,
                })
            } else {
                contains_value(list, value, deep)
            };
            let label = if including { "include oneOf" } else { "oneOf" };
            Check::new(holds, label).args(vec![GuestValue::Array(list.clone())])
        }
        Assertion::LengthOf { expected, method } => {
            let actual = meta.length.or_else(|| value.length());
            let holds = match (actual, expected.as_f64()) {
                (Some(actual), Some(expected)) => actual as f64 == expected,
                _ => false,
            };
            Check::new(holds, format!("have {method}")).args(vec![expected.clone()])
        }
        Assertion::Property { name, value: wanted } => {
            let own = call.has("own");
            let nested = call.has("nested");
            let label = if nested {
                format!("nested property '{name}'")
            } else if own && !deep {
                format!("own property '{name}'")
            } else {
                format!("property '{name}'")
            };
            property_check(call, name, wanted.as_ref(), own, nested, label)
        }
        Assertion::OwnProperty { name, value: wanted } => property_check(
            call,
            name,
            wanted.as_ref(),
            true,
            false,
            format!("own property '{name}'"),
        ),
        Assertion::OwnPropertyDescriptor { name } => {
            let holds = meta
                .descriptor
                .is_some_and(|descriptor| descriptor.has_descriptor && descriptor.matches_expected);
            Check::new(holds, format!("ownPropertyDescriptor '{name}'"))
        }
        Assertion::Compare { comparison, bound } => {
            let holds = match (numeric_subject(call), numeric_bound(bound, meta)) {
                (Some(actual), Some(bound)) => comparison.holds(actual, bound),
                _ => false,
            };
            Check::new(holds, comparison.label()).args(vec![bound.clone()])
        }
        Assertion::Within { low, high } => {
            let holds = match (numeric_subject(call), low.as_f64(), high.as_f64()) {
                (Some(actual), Some(low), Some(high)) => actual >= low && actual <= high,
                _ => false,
            };
            Check::new(holds, "within").args(vec![low.clone(), high.clone()])
        }
        Assertion::CloseTo {
            expected,
            delta,
            method,
        } => {
            let holds = match (value.as_f64(), expected.as_f64(), delta.as_f64()) {
                (Some(actual), Some(expected), Some(delta)) => (actual - expected).abs() <= delta,
                _ => false,
            };
            Check::new(holds, *method).args(vec![expected.clone(), delta.clone()])
        }
        Assertion::Substring { needle } => Check::new(
            value
                .as_str()
                .is_some_and(|text| text.contains(needle.as_str())),
            "have string",
        )
        .args(vec![GuestValue::string(needle.as_str())]),
        Assertion::RespondTo { method } => Check::new(
            meta.responds_to.unwrap_or(false),
            format!("respondTo '{method}'"),
        ),
        Assertion::Satisfy { matcher } => {
            Check::new(meta.satisfied.unwrap_or(false), "satisfy").args(vec![matcher.clone()])
        }
        Assertion::Change { kind } => {
            let holds = meta.change.as_ref().is_some_and(|observed| match kind {
                ChangeKind::Change => observed.changed(),
                ChangeKind::Increase => observed.delta().is_some_and(|delta| delta > 0.0),
                ChangeKind::Decrease => observed.delta().is_some_and(|delta| delta < 0.0),
            });
            Check::new(holds, change_label(call, *kind))
        }
        Assertion::JsonSchema { schema } => {
            Check::new(matches_schema(value, schema), "match jsonSchema")
        }
        Assertion::JsonPath { path, expected } => {
            let found = resolve_json_path(value, path);
            let holds = match expected {
                Some(expected) => found.iter().any(|item| deep_equal(item, expected)),
                None => found
                    .iter()
                    .any(|item| !matches!(item, GuestValue::Undefined)),
            };
            Check::new(holds, format!("have jsonPath '{path}'"))
                .args(expected.iter().cloned().collect())
        }
        Assertion::Charset { expected } => {
            let wanted = format!("charset={}", expected.to_ascii_lowercase());
            let holds = value
                .as_str()
                .is_some_and(|text| text.to_ascii_lowercase().replace(' ', "").contains(&wanted));
            Check::new(holds, "have charset").args(vec![GuestValue::string(expected.as_str())])
        }
        Assertion::Cookie {
            name,
            value: wanted,
        } => {
            let found = match value {
                GuestValue::Object(entries) => entries.get(name),
                _ => None,
            };
            let holds = match (found, wanted) {
                (Some(actual), Some(wanted)) => actual.to_js_string() == wanted.to_js_string(),
                (Some(_), None) => true,
                (None, _) => false,
            };
            Check::new(holds, format!("have cookie '{name}'"))
                .args(wanted.iter().cloned().collect())
        }
        Assertion::Match { .. }
        | Assertion::Throw { .. }
        | Assertion::ChangeBy { .. }
        | Assertion::Fail { .. } => Check::new(false, "unsupported"),
    }
}

fn property_check(
    call: &AssertionCall,
    name: &str,
    wanted: Option<&GuestValue>,
    own: bool,
    nested: bool,
    label: String,
) -> Check {
    let value = &call.value;
    let found = if nested {
        get_path(value, name).cloned()
    } else {
        direct_property(value, name)
    };
    let exists = if nested {
        found.is_some()
    } else if own {
        call.meta.own_property.unwrap_or(found.is_some())
    } else {
        call.meta.has_property.unwrap_or(found.is_some())
    };
    let holds = match wanted {
        None => exists,
        Some(wanted) => {
            exists
                && found
                    .as_ref()
                    .is_some_and(|actual| values_equal(actual, wanted, call.has("deep")))
        }
    };
    Check::new(holds, label).args(wanted.into_iter().cloned().collect())
}

fn direct_property(value: &GuestValue, name: &str) -> Option<GuestValue> {
    match value {
        GuestValue::Object(entries) => entries.get(name).cloned(),
        GuestValue::Array(items) if name == "length" => Some(GuestValue::Int(items.len() as i64)),
        GuestValue::Array(items) => name
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index).cloned()),
        GuestValue::String(text) if name == "length" => {
            Some(GuestValue::Int(text.chars().count() as i64))
        }
        _ => None,
    }
}

/// Number under test: the pre-checked length after a `lengthOf` chain, a
/// date's timestamp, or the value itself.
fn numeric_subject(call: &AssertionCall) -> Option<f64> {
    if call.has("length") {
        return call
            .meta
            .length
            .or_else(|| call.value.length())
            .map(|length| length as f64);
    }
    if let Some(SpecialValue::Date { millis }) = &call.meta.special {
        return Some(*millis as f64);
    }
    call.value.as_f64()
}

fn numeric_bound(bound: &GuestValue, meta: &hb_core::PreCheckMetadata) -> Option<f64> {
    if let Some(SpecialValue::Date { millis }) = &meta.expected_special {
        return Some(*millis as f64);
    }
    bound.as_f64()
}

fn builtin_object_tag(name: &str) -> Option<&'static str> {
    match name {
        "Array" => Some("[object Array]"),
        "Date" => Some("[object Date]"),
        "RegExp" => Some("[object RegExp]"),
        "Set" => Some("[object Set]"),
        "Map" => Some("[object Map]"),
        "Error" | "TypeError" | "RangeError" | "ReferenceError" | "SyntaxError" => {
            Some("[object Error]")
        }
        _ => None,
    }
}

fn fallback_object_tag(value: &GuestValue) -> &'static str {
    match value {
        GuestValue::Undefined => "[object Undefined]",
        GuestValue::Null => "[object Null]",
        GuestValue::Bool(_) => "[object Boolean]",
        GuestValue::Int(_) | GuestValue::Float(_) => "[object Number]",
        GuestValue::BigInt(_) => "[object BigInt]",
        GuestValue::Symbol(_) => "[object Symbol]",
        GuestValue::Function { .. } => "[object Function]",
        GuestValue::String(_) => "[object String]",
        GuestValue::Array(_) => "[object Array]",
        GuestValue::Object(_) => "[object Object]",
    }
}

fn change_label(call: &AssertionCall, kind: ChangeKind) -> String {
    let property = call
        .meta
        .change
        .as_ref()
        .map(|observed| observed.property.as_str())
        .unwrap_or("value");
    format!("{} {{}}.'{}'", kind.label(), property)
}

fn match_pattern(call: &AssertionCall, source: &str, flags: &str) -> ExpectResult {
    let negated = call.negated();
    let holds = match (&call.value, build_regex(source, flags)) {
        (GuestValue::String(text), Ok(pattern)) => pattern.is_match(text),
        _ => false,
    };
    let message = format!(
        "Expected '{}' to{} match /{}/{}",
        call.value.to_js_string(),
        if negated { " not" } else { "" },
        source,
        flags
    );
    ExpectResult::new(ExpectStatus::from_outcome(holds != negated), message)
}

fn throws(
    call: &AssertionCall,
    error_type: Option<&str>,
    matcher: Option<&MessageMatcher>,
) -> ExpectResult {
    let observed = call.meta.throw_observation.clone().unwrap_or_default();
    let type_matches = error_type.map(|wanted| {
        observed.error_type.as_deref().is_some_and(|actual| {
            actual == wanted || (wanted == "Error" && actual.ends_with("Error"))
        })
    });
    let message_matches = matcher.map(|matcher| {
        let thrown = observed.message.as_deref().unwrap_or_default();
        match matcher {
            MessageMatcher::Text(text) => thrown.contains(text.as_str()),
            MessageMatcher::Pattern { source, flags } => {
                build_regex(source, flags).is_ok_and(|pattern| pattern.is_match(thrown))
            }
        }
    });

    let passed = if call.negated() {
        !observed.threw
            || type_matches == Some(false)
            || message_matches == Some(false)
    } else {
        observed.threw && type_matches != Some(false) && message_matches != Some(false)
    };

    let mut args = Vec::new();
    if let Some(error_type) = error_type {
        args.push(GuestValue::string(error_type));
    }
    match matcher {
        Some(MessageMatcher::Text(text)) => args.push(GuestValue::string(text.as_str())),
        Some(MessageMatcher::Pattern { source, flags }) => {
            args.push(GuestValue::String(format!("/{source}/{flags}")))
        }
        None => {}
    }
    ExpectResult::new(
        ExpectStatus::from_outcome(passed),
        build_message(&subject(call), &call.modifiers, "throw", &args),
    )
}

fn change_by(call: &AssertionCall, kind: ChangeKind, amount: &GuestValue) -> ExpectResult {
    let delta = call.meta.change.as_ref().and_then(|observed| observed.delta());
    let holds = match (delta, amount.as_f64()) {
        (Some(delta), Some(expected)) => match kind {
            ChangeKind::Change => (delta.abs() - expected.abs()).abs() < DELTA_TOLERANCE,
            ChangeKind::Increase => (delta - expected).abs() < DELTA_TOLERANCE,
            ChangeKind::Decrease => (delta.abs() - expected).abs() < DELTA_TOLERANCE,
        },
        _ => false,
    };
    let base = build_message(
        &subject(call),
        &call.modifiers,
        &change_label(call, kind),
        &[],
    );
    ExpectResult::new(
        ExpectStatus::from_outcome(holds != call.negated()),
        format!("{} by {}", base, format_value(amount)),
    )
}

fn fail_message(
    actual: Option<&GuestValue>,
    expected: Option<&GuestValue>,
    message: Option<&GuestValue>,
    operator: Option<&str>,
) -> String {
    if let Some(GuestValue::String(text)) = message {
        return text.clone();
    }
    match (actual, expected) {
        (None, None) => match message {
            Some(other) => other.to_js_string(),
            None => "expect.fail()".to_string(),
        },
        (actual, expected) => format!(
            "expected {} to {} {}",
            format_value(actual.unwrap_or(&GuestValue::Undefined)),
            operator.unwrap_or("equal"),
            format_value(expected.unwrap_or(&GuestValue::Undefined))
        ),
    }
}
