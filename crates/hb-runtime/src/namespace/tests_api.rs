//! `expect`, `test`, `fail` and the timer helpers exposed in post-request
//! scripts.

use rhai::{Dynamic, FnPtr, ImmutableString, Module, INT};

use crate::assertion::{Assertion, AssertionCall};
use crate::context::SharedContext;
use crate::errors::GuestResult;
use crate::gate::SharedGate;
use crate::guest::{record, to_guest_value, Expectation, LegacyExpectation};
use hb_core::GuestValue;

fn declare(ctx: &SharedContext, gate: &SharedGate, name: &str, body: FnPtr) {
    ctx.borrow_mut().tests.declare_test(name);
    gate.borrow_mut().enqueue_test(name, body);
}

fn schedule(ctx: &SharedContext, gate: &SharedGate, delay: INT, callback: FnPtr, awaited: bool) {
    let test = ctx.borrow().tests.get_current_test().map(str::to_string);
    let delay = u64::try_from(delay).unwrap_or(0);
    gate.borrow_mut().schedule(delay, callback, awaited, test);
}

fn add_test_fn(module: &mut Module, ctx: &SharedContext, gate: &SharedGate) {
    let ctx = ctx.clone();
    let gate = gate.clone();
    module.set_native_fn(
        "test",
        move |name: ImmutableString, body: FnPtr| -> GuestResult<()> {
            declare(&ctx, &gate, &name, body);
            Ok(())
        },
    );
}

fn fail(ctx: &SharedContext, arguments: [Option<&Dynamic>; 4]) {
    let [first, second, third, fourth] = arguments.map(|argument| argument.map(to_guest_value));
    let assertion = match (first, second) {
        (message, None) => Assertion::Fail {
            actual: None,
            expected: None,
            message,
            operator: None,
        },
        (actual, expected) => Assertion::Fail {
            actual,
            expected,
            message: third,
            operator: fourth.map(|operator| operator.to_js_string()),
        },
    };
    record(
        ctx,
        &AssertionCall::new(GuestValue::Undefined, ""),
        &assertion,
    );
}

/// Adds `expect`, `test`, `fail`, `after` and `defer` to a namespace.
pub(crate) fn add_test_api(module: &mut Module, ctx: &SharedContext, gate: &SharedGate) {
    module.set_native_fn("expect", |value: Dynamic| -> GuestResult<Expectation> {
        Ok(Expectation::new(value))
    });
    add_test_fn(module, ctx, gate);

    let on_fail = ctx.clone();
    module.set_native_fn("fail", move || -> GuestResult<()> {
        fail(&on_fail, [None, None, None, None]);
        Ok(())
    });
    let on_fail = ctx.clone();
    module.set_native_fn("fail", move |message: Dynamic| -> GuestResult<()> {
        fail(&on_fail, [Some(&message), None, None, None]);
        Ok(())
    });
    let on_fail = ctx.clone();
    module.set_native_fn(
        "fail",
        move |actual: Dynamic, expected: Dynamic| -> GuestResult<()> {
            fail(&on_fail, [Some(&actual), Some(&expected), None, None]);
            Ok(())
        },
    );
    let on_fail = ctx.clone();
    module.set_native_fn(
        "fail",
        move |actual: Dynamic, expected: Dynamic, message: Dynamic| -> GuestResult<()> {
            fail(&on_fail, [Some(&actual), Some(&expected), Some(&message), None]);
            Ok(())
        },
    );
    let on_fail = ctx.clone();
    module.set_native_fn(
        "fail",
        move |actual: Dynamic,
              expected: Dynamic,
              message: Dynamic,
              operator: Dynamic|
              -> GuestResult<()> {
            fail(
                &on_fail,
                [Some(&actual), Some(&expected), Some(&message), Some(&operator)],
            );
            Ok(())
        },
    );

    for (name, awaited) in [("after", true), ("defer", false)] {
        let on_ctx = ctx.clone();
        let on_gate = gate.clone();
        module.set_native_fn(
            name,
            move |delay: INT, callback: FnPtr| -> GuestResult<()> {
                schedule(&on_ctx, &on_gate, delay, callback, awaited);
                Ok(())
            },
        );
    }
}

/// `pw::expect` returns the legacy matcher object; `pw::test` is shared.
pub(crate) fn add_legacy_test_api(module: &mut Module, ctx: &SharedContext, gate: &SharedGate) {
    module.set_native_fn("expect", |value: Dynamic| -> GuestResult<LegacyExpectation> {
        Ok(LegacyExpectation::new(value))
    });
    add_test_fn(module, ctx, gate);
}

#[cfg(test)]
mod tests_api_tests {
    use super::*;
    use crate::context::ScriptExecutionContext;
    use crate::gate::CompletionGate;
    use hb_core::{EnvironmentSnapshot, ExpectStatus, HookMode, RequestSnapshot};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn context() -> SharedContext {
        ScriptExecutionContext::new(
            HookMode::Post,
            &EnvironmentSnapshot::default(),
            RequestSnapshot::default(),
            None,
            None,
            10,
        )
        .into_shared()
    }

    #[test]
    fn declaring_a_test_queues_its_body() {
        let ctx = context();
        let gate = Rc::new(RefCell::new(CompletionGate::new(10)));
        let body = FnPtr::new("body").expect("name should be a valid function pointer");
        declare(&ctx, &gate, "status", body);

        assert_eq!(ctx.borrow().tests.root().children[0].name, "status");
        let job = gate
            .borrow_mut()
            .next_job()
            .expect("budget should not be exceeded")
            .expect("body should be queued");
        assert_eq!(job.test(), Some("status"));
    }

    #[test]
    fn explicit_fail_records_into_the_current_test() {
        let ctx = context();
        {
            let mut context = ctx.borrow_mut();
            context.tests.declare_test("t");
            context.tests.set_current_test("t");
        }
        fail(&ctx, [Some(&Dynamic::from("nope".to_string())), None, None, None]);
        fail(
            &ctx,
            [
                Some(&Dynamic::from_int(1)),
                Some(&Dynamic::from_int(2)),
                None,
                None,
            ],
        );

        let context = ctx.borrow();
        let results = &context.tests.root().children[0].results;
        assert_eq!(results[0].status, ExpectStatus::Fail);
        assert_eq!(results[0].message, "nope");
        assert_eq!(results[1].message, "expected 1 to equal 2");
    }
}
