//! Host side of the fluent assertion DSL.
//!
//! Every guest assertion arrives flattened: the cloned value, the modifier
//! chain as a string, the assertion with its arguments, and whatever the guest
//! pre-computed before cloning. Evaluation is pure; recording goes through
//! [`AssertionBridge`].

mod compare;
mod evaluate;
mod format;
mod legacy;
mod schema;

pub use compare::{deep_equal, strict_equal};
pub use evaluate::evaluate;
pub use format::{build_message, clean_modifiers, format_value};
pub use legacy::{evaluate_legacy, LegacyAssertion, LegacyCall};

pub(crate) use compare::build_regex;
pub(crate) use format::iso_timestamp;

use hb_core::{ExpectResult, GuestValue, PreCheckMetadata};

use crate::test_tree::TestTreeBuilder;

/// One flattened assertion step.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionCall {
    pub value: GuestValue,
    pub modifiers: String,
    pub meta: PreCheckMetadata,
}

impl AssertionCall {
    pub fn new(value: GuestValue, modifiers: impl Into<String>) -> Self {
        Self {
            value,
            modifiers: modifiers.into(),
            meta: PreCheckMetadata::default(),
        }
    }

    pub fn with_meta(mut self, meta: PreCheckMetadata) -> Self {
        self.meta = meta;
        self
    }

    pub(crate) fn negated(&self) -> bool {
        self.modifiers.contains("not")
    }

    pub(crate) fn has(&self, modifier: &str) -> bool {
        self.modifiers.contains(modifier)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Above,
    Below,
    AtLeast,
    AtMost,
}

impl Comparison {
    pub fn label(self) -> &'static str {
        match self {
            Self::Above => "above",
            Self::Below => "below",
            Self::AtLeast => "at least",
            Self::AtMost => "at most",
        }
    }

    fn holds(self, actual: f64, bound: f64) -> bool {
        match self {
            Self::Above => actual > bound,
            Self::Below => actual < bound,
            Self::AtLeast => actual >= bound,
            Self::AtMost => actual <= bound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Change,
    Increase,
    Decrease,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Change => "change",
            Self::Increase => "increase",
            Self::Decrease => "decrease",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageMatcher {
    Text(String),
    Pattern { source: String, flags: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Assertion {
    Equal {
        expected: GuestValue,
        method: &'static str,
    },
    Eql {
        expected: GuestValue,
    },
    TypeOf {
        expected: String,
    },
    InstanceOf {
        constructor: String,
    },
    Ok,
    True,
    False,
    Null,
    Undefined,
    NaN,
    Exist,
    Finite,
    Empty,
    Arguments,
    Extensible,
    Sealed,
    Frozen,
    Include {
        needle: GuestValue,
    },
    Keys {
        keys: Vec<GuestValue>,
    },
    Members {
        members: Vec<GuestValue>,
    },
    OneOf {
        list: Vec<GuestValue>,
    },
    LengthOf {
        expected: GuestValue,
        method: &'static str,
    },
    Property {
        name: String,
        value: Option<GuestValue>,
    },
    OwnProperty {
        name: String,
        value: Option<GuestValue>,
    },
    OwnPropertyDescriptor {
        name: String,
    },
    Compare {
        comparison: Comparison,
        bound: GuestValue,
    },
    Within {
        low: GuestValue,
        high: GuestValue,
    },
    CloseTo {
        expected: GuestValue,
        delta: GuestValue,
        method: &'static str,
    },
    Match {
        source: String,
        flags: String,
    },
    Substring {
        needle: String,
    },
    RespondTo {
        method: String,
    },
    Throw {
        error_type: Option<String>,
        message: Option<MessageMatcher>,
    },
    Satisfy {
        matcher: GuestValue,
    },
    Change {
        kind: ChangeKind,
    },
    ChangeBy {
        kind: ChangeKind,
        amount: GuestValue,
    },
    JsonSchema {
        schema: GuestValue,
    },
    JsonPath {
        path: String,
        expected: Option<GuestValue>,
    },
    Charset {
        expected: String,
    },
    Cookie {
        name: String,
        value: Option<GuestValue>,
    },
    Fail {
        actual: Option<GuestValue>,
        expected: Option<GuestValue>,
        message: Option<GuestValue>,
        operator: Option<String>,
    },
}

/// What an evaluated assertion does to the test tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Record(ExpectResult),
    /// Rewrites the last result of the current test (multi-call assertions).
    AmendLast(ExpectResult),
}

impl Verdict {
    pub fn result(&self) -> &ExpectResult {
        match self {
            Self::Record(result) | Self::AmendLast(result) => result,
        }
    }
}

pub struct AssertionBridge;

impl AssertionBridge {
    /// Applies a verdict to the current test. Returns false when nothing was
    /// recorded (no current test, or nothing to amend).
    pub fn apply(tests: &mut TestTreeBuilder, verdict: Verdict) -> bool {
        match verdict {
            Verdict::Record(result) => tests.push_result(result.status, result.message),
            Verdict::AmendLast(result) => tests.update_last_result(result.status, result.message),
        }
    }

    pub fn run(tests: &mut TestTreeBuilder, call: &AssertionCall, assertion: &Assertion) -> Verdict {
        let verdict = evaluate(call, assertion);
        Self::apply(tests, verdict.clone());
        verdict
    }
}

#[cfg(test)]
mod bridge_tests;
