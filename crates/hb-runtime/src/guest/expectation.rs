//! The fluent `expect(..)` chain as guest types.
//!
//! A chain is a value plus the modifier words seen so far. Each terminal step
//! computes its pre-check facts here, while identity still exists, and hands
//! the flattened call to the assertion bridge.

use hb_core::{ChangeObservation, DescriptorCheck, GuestValue, PreCheckMetadata, ThrowObservation};
use rhai::{Dynamic, Engine, FnPtr, Map, NativeCallContext};
use tracing::trace;

use super::crossing::to_guest_value;
use super::reflect::{
    constructor_name, has_property, instance_of, integrity, metadata, own_property,
    read_property, responds_to, same_value, special, with_expected,
};
use super::types::GuestRegExp;
use crate::assertion::{
    Assertion, AssertionBridge, AssertionCall, ChangeKind, Comparison, MessageMatcher,
};
use crate::context::SharedContext;
use crate::errors::{is_fatal, thrown_error_parts, GuestResult};

/// Words that only extend the modifier clause.
const CHAIN_WORDS: &[&str] = &[
    "be", "been", "that", "which", "and", "has", "have", "at", "of", "same", "but", "does",
    "itself", "deep", "own", "nested", "ordered", "any", "all", "include",
];

#[derive(Debug, Clone)]
pub(crate) struct Expectation {
    value: Dynamic,
    modifiers: String,
}

impl Expectation {
    pub(crate) fn new(value: Dynamic) -> Self {
        Self {
            value,
            modifiers: String::new(),
        }
    }

    fn with_modifiers(&self, modifiers: impl Into<String>) -> Self {
        Self {
            value: self.value.clone(),
            modifiers: modifiers.into(),
        }
    }

    fn chained(&self, word: &str) -> Self {
        self.with_modifiers(format!("{} {}", self.modifiers, word))
    }

    fn meta(&self) -> PreCheckMetadata {
        metadata(&self.value)
    }

    fn call(&self, meta: PreCheckMetadata) -> AssertionCall {
        AssertionCall::new(to_guest_value(&self.value), self.modifiers.as_str()).with_meta(meta)
    }
}

/// Result of `change`/`increase`/`decrease`, waiting for an optional `.by(n)`.
#[derive(Debug, Clone)]
pub(crate) struct ChangeAssertion {
    call: AssertionCall,
    kind: ChangeKind,
}

pub(crate) fn record(ctx: &SharedContext, call: &AssertionCall, assertion: &Assertion) {
    let mut context = ctx.borrow_mut();
    let verdict = AssertionBridge::run(&mut context.tests, call, assertion);
    trace!(
        test = context.tests.get_current_test().unwrap_or("-"),
        status = ?verdict.result().status,
        message = %verdict.result().message,
        "assertion evaluated"
    );
}

fn guest_list(value: &Dynamic) -> Vec<GuestValue> {
    match to_guest_value(value) {
        GuestValue::Array(items) => items,
        other => vec![other],
    }
}

fn text_of(value: &Dynamic) -> String {
    to_guest_value(value).to_js_string()
}

fn message_matcher(value: &Dynamic) -> MessageMatcher {
    let value = value.flatten_clone();
    let matcher = match value.read_lock::<GuestRegExp>() {
        Some(pattern) => MessageMatcher::Pattern {
            source: pattern.source().to_string(),
            flags: pattern.flags().to_string(),
        },
        None => MessageMatcher::Text(value.to_string()),
    };
    matcher
}

/// A lone `throws` argument: constructors name the error type, everything
/// else matches the message.
fn classify_throw_argument(value: &Dynamic) -> (Option<String>, Option<MessageMatcher>) {
    let value = value.flatten_clone();
    if value.is::<FnPtr>() {
        return (Some(constructor_name(&value)), None);
    }
    if let Some(name) = super::reflect::error_name(&value) {
        let message = read_property(&value, "message").to_string();
        let matcher = (!message.is_empty()).then_some(MessageMatcher::Text(message));
        return (Some(name), matcher);
    }
    if value.is_string() {
        let text = value.to_string();
        let looks_like_type = text.ends_with("Error")
            && text.starts_with(|ch: char| ch.is_ascii_uppercase())
            && text.chars().all(|ch| ch.is_ascii_alphanumeric());
        if looks_like_type {
            return (Some(text), None);
        }
    }
    (None, Some(message_matcher(&value)))
}

fn observe_throw(context: &NativeCallContext, value: &Dynamic) -> GuestResult<ThrowObservation> {
    let value = value.flatten_clone();
    let Some(pointer) = value.read_lock::<FnPtr>().map(|pointer| pointer.clone()) else {
        return Ok(ThrowObservation::default());
    };
    match pointer.call_within_context::<Dynamic>(context, ()) {
        Ok(_) => Ok(ThrowObservation::default()),
        Err(error) if is_fatal(&error) => Err(error),
        Err(error) => {
            let (error_type, message) = thrown_error_parts(&error);
            Ok(ThrowObservation {
                threw: true,
                error_type: Some(error_type),
                message: Some(message),
            })
        }
    }
}

/// Runs the function under test between two reads of the observed value.
fn observe_change(
    context: &NativeCallContext,
    value: &Dynamic,
    property: &str,
    read: impl Fn() -> GuestResult<Dynamic>,
) -> GuestResult<ChangeObservation> {
    let initial = read()?;
    let value = value.flatten_clone();
    if let Some(pointer) = value.read_lock::<FnPtr>().map(|pointer| pointer.clone()) {
        pointer.call_within_context::<Dynamic>(context, ())?;
    }
    let final_value = read()?;
    Ok(ChangeObservation {
        property: property.to_string(),
        initial: to_guest_value(&initial),
        final_value: to_guest_value(&final_value),
    })
}

fn descriptor_check(value: &Dynamic, name: &str, expected: Option<&Map>) -> DescriptorCheck {
    let has_descriptor = own_property(value, name);
    let matches_expected = match expected {
        None => true,
        Some(descriptor) => {
            let (_, _, frozen) = integrity(value);
            let value_matches = descriptor
                .get("value")
                .map_or(true, |wanted| same_value(&read_property(value, name), wanted));
            let writable_matches = descriptor
                .get("writable")
                .and_then(|flag| flag.as_bool().ok())
                .map_or(true, |writable| writable != frozen);
            value_matches && writable_matches
        }
    };
    DescriptorCheck {
        has_descriptor,
        matches_expected,
    }
}

fn property_meta(expectation: &Expectation, name: &str) -> PreCheckMetadata {
    let mut meta = expectation.meta();
    meta.has_property = Some(has_property(&expectation.value, name));
    meta.own_property = Some(own_property(&expectation.value, name));
    meta
}

fn register_unary<F>(engine: &mut Engine, ctx: &SharedContext, names: &[&'static str], build: F)
where
    F: Fn(&Expectation, &'static str, &Dynamic) -> (AssertionCall, Assertion) + Clone + 'static,
{
    for &name in names {
        let ctx = ctx.clone();
        let build = build.clone();
        engine.register_fn(name, move |expectation: &mut Expectation, argument: Dynamic| {
            let (call, assertion) = build(expectation, name, &argument);
            record(&ctx, &call, &assertion);
            expectation.clone()
        });
    }
}

fn register_binary<F>(engine: &mut Engine, ctx: &SharedContext, names: &[&'static str], build: F)
where
    F: Fn(&Expectation, &'static str, &Dynamic, &Dynamic) -> (AssertionCall, Assertion)
        + Clone
        + 'static,
{
    for &name in names {
        let ctx = ctx.clone();
        let build = build.clone();
        engine.register_fn(
            name,
            move |expectation: &mut Expectation, first: Dynamic, second: Dynamic| {
                let (call, assertion) = build(expectation, name, &first, &second);
                record(&ctx, &call, &assertion);
                expectation.clone()
            },
        );
    }
}

pub(crate) fn register_expectation(engine: &mut Engine, ctx: &SharedContext) {
    engine.register_type_with_name::<Expectation>("Expectation");
    engine.register_type_with_name::<ChangeAssertion>("ChangeAssertion");

    engine.register_get("to", |expectation: &mut Expectation| {
        expectation.with_modifiers(" to")
    });
    engine.register_get("not", |expectation: &mut Expectation| {
        expectation.with_modifiers(" to not")
    });
    engine.register_get("contain", |expectation: &mut Expectation| {
        expectation.chained("include")
    });
    for &word in CHAIN_WORDS {
        engine.register_get(word, move |expectation: &mut Expectation| {
            expectation.chained(word)
        });
    }
    for word in ["length", "lengthOf"] {
        engine.register_get(word, |expectation: &mut Expectation| {
            expectation.chained("length")
        });
    }

    let flags = [
        ("ok", Assertion::Ok),
        ("true_", Assertion::True),
        ("false_", Assertion::False),
        ("null_", Assertion::Null),
        ("undefined_", Assertion::Undefined),
        ("NaN", Assertion::NaN),
        ("exist", Assertion::Exist),
        ("finite", Assertion::Finite),
        ("empty", Assertion::Empty),
        ("arguments", Assertion::Arguments),
        ("extensible", Assertion::Extensible),
        ("sealed", Assertion::Sealed),
        ("frozen", Assertion::Frozen),
    ];
    for (name, assertion) in flags {
        let ctx = ctx.clone();
        engine.register_get(name, move |expectation: &mut Expectation| {
            record(&ctx, &expectation.call(expectation.meta()), &assertion);
            expectation.clone()
        });
    }

    register_unary(engine, ctx, &["equal", "equals", "eq"], |exp, name, expected| {
        let meta = with_expected(exp.meta(), &exp.value, expected);
        (
            exp.call(meta),
            Assertion::Equal {
                expected: to_guest_value(expected),
                method: name,
            },
        )
    });
    register_unary(engine, ctx, &["eql", "eqls"], |exp, _, expected| {
        let meta = with_expected(exp.meta(), &exp.value, expected);
        (
            exp.call(meta),
            Assertion::Eql {
                expected: to_guest_value(expected),
            },
        )
    });
    register_unary(engine, ctx, &["a", "an"], |exp, _, expected| {
        (
            exp.call(exp.meta()),
            Assertion::TypeOf {
                expected: text_of(expected),
            },
        )
    });
    register_unary(engine, ctx, &["instanceOf", "instanceof"], |exp, _, constructor| {
        let constructor = constructor_name(constructor);
        let mut meta = exp.meta();
        meta.instance_of = Some(instance_of(&exp.value, &constructor));
        (exp.call(meta), Assertion::InstanceOf { constructor })
    });
    register_unary(
        engine,
        ctx,
        &["include", "includes", "contain", "contains"],
        |exp, _, needle| {
            (
                exp.call(exp.meta()),
                Assertion::Include {
                    needle: to_guest_value(needle),
                },
            )
        },
    );
    register_unary(engine, ctx, &["keys", "key"], |exp, _, keys| {
        (
            exp.call(exp.meta()),
            Assertion::Keys {
                keys: guest_list(keys),
            },
        )
    });
    register_binary(engine, ctx, &["keys"], |exp, _, first, second| {
        (
            exp.call(exp.meta()),
            Assertion::Keys {
                keys: vec![to_guest_value(first), to_guest_value(second)],
            },
        )
    });
    {
        let ctx = ctx.clone();
        engine.register_fn(
            "keys",
            move |expectation: &mut Expectation, first: Dynamic, second: Dynamic, third: Dynamic| {
                let keys = [first, second, third].iter().map(to_guest_value).collect();
                record(
                    &ctx,
                    &expectation.call(expectation.meta()),
                    &Assertion::Keys { keys },
                );
                expectation.clone()
            },
        );
    }
    register_unary(engine, ctx, &["members"], |exp, _, members| {
        (
            exp.call(exp.meta()),
            Assertion::Members {
                members: guest_list(members),
            },
        )
    });
    register_unary(engine, ctx, &["oneOf"], |exp, _, list| {
        (
            exp.call(exp.meta()),
            Assertion::OneOf {
                list: guest_list(list),
            },
        )
    });
    register_unary(engine, ctx, &["lengthOf", "length"], |exp, name, expected| {
        (
            exp.call(exp.meta()),
            Assertion::LengthOf {
                expected: to_guest_value(expected),
                method: name,
            },
        )
    });
    register_unary(engine, ctx, &["property"], |exp, _, name| {
        let name = text_of(name);
        (
            exp.call(property_meta(exp, &name)),
            Assertion::Property { name, value: None },
        )
    });
    register_binary(engine, ctx, &["property"], |exp, _, name, value| {
        let name = text_of(name);
        (
            exp.call(property_meta(exp, &name)),
            Assertion::Property {
                name,
                value: Some(to_guest_value(value)),
            },
        )
    });
    register_unary(
        engine,
        ctx,
        &["ownProperty", "haveOwnProperty"],
        |exp, _, name| {
            let name = text_of(name);
            (
                exp.call(property_meta(exp, &name)),
                Assertion::OwnProperty { name, value: None },
            )
        },
    );
    register_binary(
        engine,
        ctx,
        &["ownProperty", "haveOwnProperty"],
        |exp, _, name, value| {
            let name = text_of(name);
            (
                exp.call(property_meta(exp, &name)),
                Assertion::OwnProperty {
                    name,
                    value: Some(to_guest_value(value)),
                },
            )
        },
    );
    register_unary(engine, ctx, &["ownPropertyDescriptor"], |exp, _, name| {
        let name = text_of(name);
        let mut meta = exp.meta();
        meta.descriptor = Some(descriptor_check(&exp.value, &name, None));
        (exp.call(meta), Assertion::OwnPropertyDescriptor { name })
    });
    register_binary(
        engine,
        ctx,
        &["ownPropertyDescriptor"],
        |exp, _, name, descriptor| {
            let name = text_of(name);
            let descriptor = descriptor.flatten_clone();
            let mut meta = exp.meta();
            meta.descriptor = Some(descriptor_check(
                &exp.value,
                &name,
                descriptor.read_lock::<Map>().as_deref(),
            ));
            (exp.call(meta), Assertion::OwnPropertyDescriptor { name })
        },
    );

    let comparisons = [
        (&["above", "gt", "greaterThan"][..], Comparison::Above),
        (&["below", "lt", "lessThan"][..], Comparison::Below),
        (&["least", "gte"][..], Comparison::AtLeast),
        (&["most", "lte"][..], Comparison::AtMost),
    ];
    for (names, comparison) in comparisons {
        register_unary(engine, ctx, names, move |exp, _, bound| {
            let mut meta = exp.meta();
            meta.expected_special = special(bound);
            (
                exp.call(meta),
                Assertion::Compare {
                    comparison,
                    bound: to_guest_value(bound),
                },
            )
        });
    }
    register_binary(engine, ctx, &["within"], |exp, _, low, high| {
        (
            exp.call(exp.meta()),
            Assertion::Within {
                low: to_guest_value(low),
                high: to_guest_value(high),
            },
        )
    });
    register_binary(
        engine,
        ctx,
        &["closeTo", "approximately"],
        |exp, name, expected, delta| {
            (
                exp.call(exp.meta()),
                Assertion::CloseTo {
                    expected: to_guest_value(expected),
                    delta: to_guest_value(delta),
                    method: name,
                },
            )
        },
    );
    register_unary(engine, ctx, &["matches"], |exp, _, pattern| {
        let (source, flags) = match message_matcher(pattern) {
            MessageMatcher::Pattern { source, flags } => (source, flags),
            MessageMatcher::Text(source) => (source, String::new()),
        };
        (exp.call(exp.meta()), Assertion::Match { source, flags })
    });
    register_unary(engine, ctx, &["string"], |exp, _, needle| {
        (
            exp.call(exp.meta()),
            Assertion::Substring {
                needle: text_of(needle),
            },
        )
    });
    register_unary(engine, ctx, &["respondTo", "respondsTo"], |exp, _, method| {
        let method = text_of(method);
        let mut meta = exp.meta();
        meta.responds_to = Some(responds_to(&exp.value, &method));
        (exp.call(meta), Assertion::RespondTo { method })
    });
    register_unary(engine, ctx, &["jsonSchema"], |exp, _, schema| {
        (
            exp.call(exp.meta()),
            Assertion::JsonSchema {
                schema: to_guest_value(schema),
            },
        )
    });
    register_unary(engine, ctx, &["jsonPath"], |exp, _, path| {
        (
            exp.call(exp.meta()),
            Assertion::JsonPath {
                path: text_of(path),
                expected: None,
            },
        )
    });
    register_binary(engine, ctx, &["jsonPath"], |exp, _, path, expected| {
        (
            exp.call(exp.meta()),
            Assertion::JsonPath {
                path: text_of(path),
                expected: Some(to_guest_value(expected)),
            },
        )
    });
    register_unary(engine, ctx, &["charset"], |exp, _, expected| {
        (
            exp.call(exp.meta()),
            Assertion::Charset {
                expected: text_of(expected),
            },
        )
    });
    register_unary(engine, ctx, &["cookie"], |exp, _, name| {
        (
            exp.call(exp.meta()),
            Assertion::Cookie {
                name: text_of(name),
                value: None,
            },
        )
    });
    register_binary(engine, ctx, &["cookie"], |exp, _, name, value| {
        (
            exp.call(exp.meta()),
            Assertion::Cookie {
                name: text_of(name),
                value: Some(to_guest_value(value)),
            },
        )
    });

    register_probing(engine, ctx);
}

/// Assertions that call back into the guest before recording.
fn register_probing(engine: &mut Engine, ctx: &SharedContext) {
    for name in ["throws", "Throw"] {
        let on_bare = ctx.clone();
        engine.register_fn(
            name,
            move |context: NativeCallContext, expectation: Expectation| {
                record_throw(&on_bare, &context, &expectation, None, None)
            },
        );
        let on_single = ctx.clone();
        engine.register_fn(
            name,
            move |context: NativeCallContext, expectation: Expectation, argument: Dynamic| {
                let (error_type, message) = classify_throw_argument(&argument);
                record_throw(&on_single, &context, &expectation, error_type, message)
            },
        );
        let on_pair = ctx.clone();
        engine.register_fn(
            name,
            move |context: NativeCallContext,
                  expectation: Expectation,
                  error_type: Dynamic,
                  message: Dynamic| {
                record_throw(
                    &on_pair,
                    &context,
                    &expectation,
                    Some(constructor_name(&error_type)),
                    Some(message_matcher(&message)),
                )
            },
        );
    }

    for name in ["satisfy", "satisfies"] {
        let ctx = ctx.clone();
        engine.register_fn(
            name,
            move |context: NativeCallContext,
                  expectation: Expectation,
                  matcher: FnPtr|
                  -> GuestResult<Expectation> {
                let outcome = matcher
                    .call_within_context::<Dynamic>(&context, (expectation.value.clone(),))?;
                let mut meta = expectation.meta();
                meta.satisfied = Some(to_guest_value(&outcome).is_truthy());
                record(
                    &ctx,
                    &expectation.call(meta),
                    &Assertion::Satisfy {
                        matcher: to_guest_value(&Dynamic::from(matcher)),
                    },
                );
                Ok(expectation)
            },
        );
    }

    let kinds = [
        ("change", ChangeKind::Change),
        ("increase", ChangeKind::Increase),
        ("decrease", ChangeKind::Decrease),
    ];
    for (name, kind) in kinds {
        let on_target = ctx.clone();
        engine.register_fn(
            name,
            move |context: NativeCallContext,
                  expectation: Expectation,
                  target: Dynamic,
                  property: Dynamic|
                  -> GuestResult<ChangeAssertion> {
                let property = text_of(&property);
                let observed = observe_change(&context, &expectation.value, &property, || {
                    Ok(read_property(&target, &property))
                })?;
                Ok(record_change(&on_target, &expectation, observed, kind))
            },
        );
        let on_getter = ctx.clone();
        engine.register_fn(
            name,
            move |context: NativeCallContext,
                  expectation: Expectation,
                  getter: FnPtr|
                  -> GuestResult<ChangeAssertion> {
                let observed = observe_change(&context, &expectation.value, "value", || {
                    getter.call_within_context::<Dynamic>(&context, ())
                })?;
                Ok(record_change(&on_getter, &expectation, observed, kind))
            },
        );
    }

    let ctx = ctx.clone();
    engine.register_fn(
        "by",
        move |change: &mut ChangeAssertion, amount: Dynamic| {
            record(
                &ctx,
                &change.call,
                &Assertion::ChangeBy {
                    kind: change.kind,
                    amount: to_guest_value(&amount),
                },
            );
            change.clone()
        },
    );
}

fn record_throw(
    ctx: &SharedContext,
    context: &NativeCallContext,
    expectation: &Expectation,
    error_type: Option<String>,
    message: Option<MessageMatcher>,
) -> GuestResult<Expectation> {
    let mut meta = expectation.meta();
    meta.throw_observation = Some(observe_throw(context, &expectation.value)?);
    record(
        ctx,
        &expectation.call(meta),
        &Assertion::Throw {
            error_type,
            message,
        },
    );
    Ok(expectation.clone())
}

fn record_change(
    ctx: &SharedContext,
    expectation: &Expectation,
    observed: ChangeObservation,
    kind: ChangeKind,
) -> ChangeAssertion {
    let mut meta = expectation.meta();
    meta.change = Some(observed);
    let call = expectation.call(meta);
    record(ctx, &call, &Assertion::Change { kind });
    ChangeAssertion { call, kind }
}
