use std::collections::BTreeMap;

use hb_core::{ChangeObservation, CollectionKind, ExpectStatus, ThrowObservation};

use super::*;

fn object(entries: &[(&str, GuestValue)]) -> GuestValue {
    GuestValue::Object(
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn tree_with(name: &str) -> TestTreeBuilder {
    let mut tests = TestTreeBuilder::new();
    tests.declare_test(name);
    assert!(tests.set_current_test(name));
    tests
}

fn equal(expected: GuestValue) -> Assertion {
    Assertion::Equal {
        expected,
        method: "equal",
    }
}

#[test]
fn pass_and_fail_share_one_message_shape() {
    let passing = evaluate(&AssertionCall::new(GuestValue::Int(5), " to"), &equal(GuestValue::Int(5)));
    let failing = evaluate(&AssertionCall::new(GuestValue::Int(5), " to"), &equal(GuestValue::Int(6)));
    assert_eq!(passing.result().status, ExpectStatus::Pass);
    assert_eq!(passing.result().message, "Expected 5 to equal 5");
    assert_eq!(failing.result().status, ExpectStatus::Fail);
    assert_eq!(failing.result().message, "Expected 5 to equal 6");
}

#[test]
fn negation_flips_outcome_but_keeps_message() {
    let verdict = evaluate(
        &AssertionCall::new(GuestValue::Int(5), " to not"),
        &equal(GuestValue::Int(6)),
    );
    assert_eq!(verdict.result().status, ExpectStatus::Pass);
    assert_eq!(verdict.result().message, "Expected 5 to not equal 6");
}

#[test]
fn collection_size_comes_from_pre_check() {
    let meta = PreCheckMetadata {
        collection: Some(CollectionKind::Set),
        size: Some(2),
        display: Some("new Set([1, 2])".to_string()),
        ..PreCheckMetadata::default()
    };
    let call = AssertionCall::new(object(&[]), " to not be").with_meta(meta);
    let verdict = evaluate(&call, &Assertion::Empty);
    assert_eq!(verdict.result().status, ExpectStatus::Pass);
    assert_eq!(
        verdict.result().message,
        "Expected new Set([1, 2]) to not be empty"
    );
}

#[test]
fn reference_equality_uses_identity_fact() {
    let meta = PreCheckMetadata {
        same_reference: Some(false),
        ..PreCheckMetadata::default()
    };
    let call = AssertionCall::new(object(&[]), " to").with_meta(meta.clone());
    let verdict = evaluate(&call, &equal(object(&[])));
    assert_eq!(verdict.result().status, ExpectStatus::Fail);
    assert_eq!(verdict.result().message, "Expected {} to equal {}");

    let deep = AssertionCall::new(object(&[]), " to deep").with_meta(meta);
    let verdict = evaluate(&deep, &equal(object(&[])));
    assert_eq!(verdict.result().status, ExpectStatus::Pass);

    let eql = evaluate(
        &AssertionCall::new(object(&[("a", GuestValue::Int(1))]), " to"),
        &Assertion::Eql {
            expected: object(&[("a", GuestValue::Float(1.0))]),
        },
    );
    assert_eq!(eql.result().status, ExpectStatus::Pass);
}

#[test]
fn change_by_amends_the_preceding_change_result() {
    let mut tests = tree_with("counter");
    let meta = PreCheckMetadata {
        change: Some(ChangeObservation {
            property: "count".to_string(),
            initial: GuestValue::Int(1),
            final_value: GuestValue::Int(3),
        }),
        ..PreCheckMetadata::default()
    };
    let call = AssertionCall::new(
        GuestValue::Function {
            name: Some("bump".to_string()),
        },
        " to",
    )
    .with_meta(meta);

    let first = AssertionBridge::run(
        &mut tests,
        &call,
        &Assertion::Change {
            kind: ChangeKind::Increase,
        },
    );
    assert_eq!(
        first.result().message,
        "Expected [Function: bump] to increase {}.'count'"
    );
    let amended = AssertionBridge::run(
        &mut tests,
        &call,
        &Assertion::ChangeBy {
            kind: ChangeKind::Increase,
            amount: GuestValue::Int(2),
        },
    );
    assert!(matches!(amended, Verdict::AmendLast(_)));

    let test = tests.root().child("counter").expect("test should exist");
    assert_eq!(test.results.len(), 1);
    assert_eq!(test.results[0].status, ExpectStatus::Pass);
    assert_eq!(
        test.results[0].message,
        "Expected [Function: bump] to increase {}.'count' by 2"
    );

    AssertionBridge::run(
        &mut tests,
        &call,
        &Assertion::ChangeBy {
            kind: ChangeKind::Increase,
            amount: GuestValue::Int(5),
        },
    );
    let test = tests.root().child("counter").expect("test should exist");
    assert_eq!(test.results.len(), 1);
    assert_eq!(test.results[0].status, ExpectStatus::Fail);
}

#[test]
fn throw_checks_type_and_message_with_negation() {
    let meta = PreCheckMetadata {
        throw_observation: Some(ThrowObservation {
            threw: true,
            error_type: Some("TypeError".to_string()),
            message: Some("bad input".to_string()),
        }),
        ..PreCheckMetadata::default()
    };
    let thrower = GuestValue::Function {
        name: Some("parse".to_string()),
    };

    let positive = evaluate(
        &AssertionCall::new(thrower.clone(), " to").with_meta(meta.clone()),
        &Assertion::Throw {
            error_type: Some("Error".to_string()),
            message: Some(MessageMatcher::Text("bad".to_string())),
        },
    );
    assert_eq!(positive.result().status, ExpectStatus::Pass);
    assert_eq!(
        positive.result().message,
        "Expected [Function: parse] to throw Error, 'bad'"
    );

    let negated_other_type = evaluate(
        &AssertionCall::new(thrower.clone(), " to not").with_meta(meta.clone()),
        &Assertion::Throw {
            error_type: Some("RangeError".to_string()),
            message: None,
        },
    );
    assert_eq!(negated_other_type.result().status, ExpectStatus::Pass);

    let negated_plain = evaluate(
        &AssertionCall::new(thrower, " to not").with_meta(meta),
        &Assertion::Throw {
            error_type: None,
            message: None,
        },
    );
    assert_eq!(negated_plain.result().status, ExpectStatus::Fail);
}

#[test]
fn nothing_is_recorded_without_a_current_test() {
    let mut tests = TestTreeBuilder::new();
    tests.declare_test("idle");
    let verdict = evaluate(&AssertionCall::new(GuestValue::Bool(true), " to be"), &Assertion::True);
    assert!(!AssertionBridge::apply(&mut tests, verdict));
    assert_eq!(tests.root().count(ExpectStatus::Pass), 0);
}

#[test]
fn messages_for_common_assertions() {
    let cases = [
        (
            AssertionCall::new(GuestValue::string("abc"), " to"),
            Assertion::Match {
                source: "b".to_string(),
                flags: String::new(),
            },
            "Expected 'abc' to match /b/",
        ),
        (
            AssertionCall::new(
                object(&[("a", GuestValue::Int(1)), ("b", GuestValue::Int(2))]),
                " to have all",
            ),
            Assertion::Keys {
                keys: vec![GuestValue::string("a"), GuestValue::string("b")],
            },
            "Expected {a: 1, b: 2} to have all keys 'a', 'b'",
        ),
        (
            AssertionCall::new(GuestValue::string("x"), " to be"),
            Assertion::TypeOf {
                expected: "string".to_string(),
            },
            "Expected 'x' to be a string",
        ),
        (
            AssertionCall::new(object(&[("name", GuestValue::string("Alice"))]), " to have"),
            Assertion::Property {
                name: "name".to_string(),
                value: Some(GuestValue::string("Alice")),
            },
            "Expected {name: 'Alice'} to have property 'name', 'Alice'",
        ),
        (
            AssertionCall::new(GuestValue::Array(vec![GuestValue::Int(1)]), " to be"),
            Assertion::InstanceOf {
                constructor: "Array".to_string(),
            },
            "Expected [1] to be an instanceof Array",
        ),
        (
            AssertionCall::new(GuestValue::Int(7), " to be"),
            Assertion::Within {
                low: GuestValue::Int(1),
                high: GuestValue::Int(10),
            },
            "Expected 7 to be within 1, 10",
        ),
    ];
    for (call, assertion, message) in cases {
        let verdict = evaluate(&call, &assertion);
        assert_eq!(verdict.result().status, ExpectStatus::Pass, "{message}");
        assert_eq!(verdict.result().message, message);
    }
}

#[test]
fn explicit_fail_records_failure() {
    let bare = evaluate(
        &AssertionCall::new(GuestValue::Undefined, ""),
        &Assertion::Fail {
            actual: None,
            expected: None,
            message: None,
            operator: None,
        },
    );
    assert_eq!(bare.result().status, ExpectStatus::Fail);
    assert_eq!(bare.result().message, "expect.fail()");

    let compared = evaluate(
        &AssertionCall::new(GuestValue::Undefined, ""),
        &Assertion::Fail {
            actual: Some(GuestValue::Int(1)),
            expected: Some(GuestValue::Int(2)),
            message: None,
            operator: Some(">".to_string()),
        },
    );
    assert_eq!(compared.result().message, "expected 1 to > 2");
}

#[test]
fn response_helpers_check_schema_and_json_path() {
    let body = object(&[("id", GuestValue::Int(3))]);
    let schema = object(&[
        ("type", GuestValue::string("object")),
        (
            "required",
            GuestValue::Array(vec![GuestValue::string("id")]),
        ),
    ]);
    let verdict = evaluate(
        &AssertionCall::new(body.clone(), " to"),
        &Assertion::JsonSchema { schema },
    );
    assert_eq!(verdict.result().status, ExpectStatus::Pass);

    let verdict = evaluate(
        &AssertionCall::new(body, " to"),
        &Assertion::JsonPath {
            path: "$.id".to_string(),
            expected: Some(GuestValue::Int(4)),
        },
    );
    assert_eq!(verdict.result().status, ExpectStatus::Fail);
    assert_eq!(verdict.result().message, "Expected {id: 3} to have jsonPath '$.id' 4");
}
