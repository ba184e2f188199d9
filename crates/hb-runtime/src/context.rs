use std::cell::RefCell;
use std::rc::Rc;

use hb_core::{
    CookieJar, EnvironmentSnapshot, HookMode, PostRequestCapture, PreRequestCapture,
    RequestSnapshot, ResponseSnapshot,
};

use crate::env_state::EnvironmentState;
use crate::test_tree::TestTreeBuilder;

/// Everything one invocation may read or mutate. Owned by a single
/// invocation and dropped after capture.
#[derive(Debug)]
pub(crate) struct ScriptExecutionContext {
    pub(crate) mode: HookMode,
    pub(crate) env: EnvironmentState,
    pub(crate) request: RequestSnapshot,
    pub(crate) response: Option<ResponseSnapshot>,
    /// `None` when the embedding platform has no cookie support.
    pub(crate) cookies: Option<CookieJar>,
    pub(crate) tests: TestTreeBuilder,
}

pub(crate) type SharedContext = Rc<RefCell<ScriptExecutionContext>>;

impl ScriptExecutionContext {
    pub(crate) fn new(
        mode: HookMode,
        env: &EnvironmentSnapshot,
        request: RequestSnapshot,
        response: Option<ResponseSnapshot>,
        cookies: Option<CookieJar>,
        max_expansions: usize,
    ) -> Self {
        Self {
            mode,
            env: EnvironmentState::from_snapshot(env, max_expansions),
            request,
            response,
            cookies,
            tests: TestTreeBuilder::new(),
        }
    }

    pub(crate) fn into_shared(self) -> SharedContext {
        Rc::new(RefCell::new(self))
    }

    pub(crate) fn capture_pre(&self) -> PreRequestCapture {
        PreRequestCapture {
            request: self.request.clone(),
            env: self.env.to_snapshot(),
            cookies: self.cookies.clone(),
        }
    }

    pub(crate) fn capture_post(&self) -> PostRequestCapture {
        PostRequestCapture {
            env: self.env.to_snapshot(),
            cookies: self.cookies.clone(),
            test_tree: self.tests.snapshot(),
        }
    }
}
