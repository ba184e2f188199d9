pub mod assertion;
mod context;
mod driver;
mod env_state;
mod errors;
mod gate;
mod guest;
mod namespace;
pub mod options;
pub mod template;
pub mod test_tree;

pub use assertion::{
    Assertion, AssertionBridge, AssertionCall, ChangeKind, Comparison, MessageMatcher, Verdict,
};
pub use driver::{HookInvocation, SandboxHost};
pub use options::SandboxOptions;
pub use template::{expand_template, Expansion};
pub use test_tree::TestTreeBuilder;
