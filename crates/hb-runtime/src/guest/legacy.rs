//! `pw.expect(value)`: the older matcher surface kept for existing scripts.

use rhai::{Dynamic, Engine};

use super::crossing::to_guest_value;
use crate::assertion::{evaluate_legacy, AssertionBridge, LegacyAssertion, LegacyCall, Verdict};
use crate::context::SharedContext;

#[derive(Debug, Clone)]
pub(crate) struct LegacyExpectation {
    value: Dynamic,
    negated: bool,
}

impl LegacyExpectation {
    pub(crate) fn new(value: Dynamic) -> Self {
        Self {
            value,
            negated: false,
        }
    }

    fn record(&self, ctx: &SharedContext, assertion: LegacyAssertion) {
        let call = LegacyCall::new(to_guest_value(&self.value), self.negated);
        let verdict = Verdict::Record(evaluate_legacy(&call, &assertion));
        AssertionBridge::apply(&mut ctx.borrow_mut().tests, verdict);
    }
}

fn register_matcher(
    engine: &mut Engine,
    ctx: &SharedContext,
    name: &str,
    build: fn(Dynamic) -> LegacyAssertion,
) {
    let ctx = ctx.clone();
    engine.register_fn(
        name,
        move |expectation: &mut LegacyExpectation, argument: Dynamic| {
            expectation.record(&ctx, build(argument));
        },
    );
}

pub(crate) fn register_legacy(engine: &mut Engine, ctx: &SharedContext) {
    engine.register_type_with_name::<LegacyExpectation>("LegacyExpectation");
    engine.register_get("not", |expectation: &mut LegacyExpectation| {
        LegacyExpectation {
            value: expectation.value.clone(),
            negated: !expectation.negated,
        }
    });

    register_matcher(engine, ctx, "toBe", |value| {
        LegacyAssertion::ToBe(to_guest_value(&value))
    });
    register_matcher(engine, ctx, "toBeType", |value| {
        LegacyAssertion::ToBeType(to_guest_value(&value))
    });
    register_matcher(engine, ctx, "toHaveLength", |value| {
        LegacyAssertion::ToHaveLength(to_guest_value(&value))
    });
    register_matcher(engine, ctx, "toInclude", |value| {
        LegacyAssertion::ToInclude(to_guest_value(&value))
    });

    for (name, floor) in [
        ("toBeLevel2xx", 200),
        ("toBeLevel3xx", 300),
        ("toBeLevel4xx", 400),
        ("toBeLevel5xx", 500),
    ] {
        let ctx = ctx.clone();
        engine.register_fn(name, move |expectation: &mut LegacyExpectation| {
            expectation.record(&ctx, LegacyAssertion::ToBeLevel(floor));
        });
    }
}
