use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use hb_core::{
    CapturedResult, CookieJar, EnvironmentSnapshot, HookMode, PostRequestCapture,
    PreRequestCapture, RequestSnapshot, ResponseSnapshot, ScriptDiagnostic, ScriptExecutionError,
    SANDBOX_INVOCATION_INVALID, SCRIPT_SYNTAX_ERROR,
};
use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Dynamic, Engine, EvalAltResult, ParseError, Scope, AST};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::context::{ScriptExecutionContext, SharedContext};
use crate::errors::{is_fatal, root_cause, to_execution_error};
use crate::gate::{CompletionGate, SharedGate};
use crate::guest::{
    register_expectation, register_legacy, register_types, GuestNull, HandleArena, ReleaseHandles,
};
use crate::namespace::register_namespaces;
use crate::options::SandboxOptions;

/// One hook run: the script plus the snapshots it may read or mutate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookInvocation {
    #[serde(default)]
    pub script: String,
    pub mode: HookMode,
    #[serde(default)]
    pub request: RequestSnapshot,
    #[serde(default)]
    pub env: EnvironmentSnapshot,
    /// `None` when the embedding platform has no cookie support.
    #[serde(default)]
    pub cookies: Option<CookieJar>,
    /// Required for post-request hooks.
    #[serde(default)]
    pub response: Option<ResponseSnapshot>,
}

impl HookInvocation {
    pub fn pre_request(script: impl Into<String>, request: RequestSnapshot) -> Self {
        Self {
            script: script.into(),
            mode: HookMode::Pre,
            request,
            env: EnvironmentSnapshot::default(),
            cookies: None,
            response: None,
        }
    }

    pub fn post_request(
        script: impl Into<String>,
        request: RequestSnapshot,
        response: ResponseSnapshot,
    ) -> Self {
        Self {
            script: script.into(),
            mode: HookMode::Post,
            request,
            env: EnvironmentSnapshot::default(),
            cookies: None,
            response: Some(response),
        }
    }

    pub fn with_env(mut self, env: EnvironmentSnapshot) -> Self {
        self.env = env;
        self
    }

    pub fn with_cookies(mut self, cookies: CookieJar) -> Self {
        self.cookies = Some(cookies);
        self
    }
}

/// Runs hooks. Holds only configuration: every invocation builds and drops
/// its own engine, context and gate, so one host may serve many threads.
#[derive(Debug, Clone, Default)]
pub struct SandboxHost {
    options: SandboxOptions,
}

impl SandboxHost {
    pub fn new(options: SandboxOptions) -> Result<Self, ScriptExecutionError> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &SandboxOptions {
        &self.options
    }

    pub fn run_pre_request(
        &self,
        script: &str,
        request: RequestSnapshot,
        env: EnvironmentSnapshot,
        cookies: Option<CookieJar>,
    ) -> Result<PreRequestCapture, ScriptExecutionError> {
        let invocation = HookInvocation {
            script: script.to_string(),
            mode: HookMode::Pre,
            request,
            env,
            cookies,
            response: None,
        };
        match self.run(&invocation)? {
            CapturedResult::Pre(capture) => Ok(capture),
            CapturedResult::Post(_) => Err(mode_mismatch()),
        }
    }

    pub fn run_post_request(
        &self,
        script: &str,
        request: RequestSnapshot,
        env: EnvironmentSnapshot,
        cookies: Option<CookieJar>,
        response: ResponseSnapshot,
    ) -> Result<PostRequestCapture, ScriptExecutionError> {
        let invocation = HookInvocation {
            script: script.to_string(),
            mode: HookMode::Post,
            request,
            env,
            cookies,
            response: Some(response),
        };
        match self.run(&invocation)? {
            CapturedResult::Post(capture) => Ok(capture),
            CapturedResult::Pre(_) => Err(mode_mismatch()),
        }
    }

    /// Evaluates the script, drains the completion gate and captures. Exactly
    /// one of a capture or an error comes back; a failed run captures nothing.
    pub fn run(&self, invocation: &HookInvocation) -> Result<CapturedResult, ScriptExecutionError> {
        let span = info_span!(
            "hook",
            mode = invocation.mode.as_str(),
            script_len = invocation.script.len()
        );
        let _entered = span.enter();

        if invocation.mode == HookMode::Post && invocation.response.is_none() {
            return Err(ScriptExecutionError::new(
                SANDBOX_INVOCATION_INVALID,
                "Post-request hooks need a response snapshot",
            ));
        }

        let ctx = ScriptExecutionContext::new(
            invocation.mode,
            &invocation.env,
            invocation.request.clone(),
            invocation.response.clone(),
            invocation.cookies.clone(),
            self.options.max_template_expansions,
        )
        .into_shared();
        let gate: SharedGate = Rc::new(RefCell::new(CompletionGate::new(
            self.options.max_gate_jobs,
        )));
        let arena = HandleArena::default();
        let _release = ReleaseHandles(arena.clone());
        let engine = self.build_engine(&ctx, &gate, &arena);

        let mut scope = Scope::new();
        scope.push_constant("NULL", GuestNull);
        let ast = engine
            .compile_with_scope(&scope, &invocation.script)
            .map_err(syntax_error)?;

        if let Err(error) = engine.run_ast_with_scope(&mut scope, &ast) {
            if !is_exit(&error) {
                debug!(error = %error, "script failed");
                return Err(to_execution_error(&error, None));
            }
        }
        if invocation.mode == HookMode::Post {
            pump(&engine, &ast, &ctx, &gate)?;
        }

        let context = ctx.borrow();
        let captured = match invocation.mode {
            HookMode::Pre => CapturedResult::Pre(context.capture_pre()),
            HookMode::Post => CapturedResult::Post(context.capture_post()),
        };
        debug!(tests = context.tests.root().children.len(), "hook captured");
        Ok(captured)
    }

    fn build_engine(
        &self,
        ctx: &SharedContext,
        gate: &SharedGate,
        arena: &HandleArena,
    ) -> Engine {
        let options = &self.options;
        let mut engine = Engine::new();
        engine.set_strict_variables(true);
        engine.set_max_operations(options.max_operations);
        engine.set_max_call_levels(options.max_call_levels);
        engine.set_max_string_size(options.max_string_size);
        engine.set_max_array_size(options.max_collection_size);
        engine.set_max_map_size(options.max_collection_size);
        engine.set_module_resolver(DummyModuleResolver::new());
        engine.disable_symbol("eval");

        let deadline = Instant::now() + Duration::from_millis(options.timeout_ms);
        engine.on_progress(move |_| {
            (Instant::now() >= deadline).then_some(Dynamic::UNIT)
        });
        engine.on_print(|text| info!(target: "hookbox::guest", "{text}"));
        engine.on_debug(|text, source, position| {
            debug!(
                target: "hookbox::guest",
                source = source.unwrap_or("script"),
                line = position.line(),
                "{text}"
            )
        });

        register_types(&mut engine, arena);
        register_expectation(&mut engine, ctx);
        register_legacy(&mut engine, ctx);
        register_namespaces(&mut engine, ctx, gate);
        engine
    }
}

fn mode_mismatch() -> ScriptExecutionError {
    ScriptExecutionError::new(
        SANDBOX_INVOCATION_INVALID,
        "Hook produced a capture for the wrong mode",
    )
}

fn syntax_error(error: ParseError) -> ScriptExecutionError {
    let position = error.position();
    ScriptExecutionError::with_diagnostic(
        SCRIPT_SYNTAX_ERROR,
        error.err_type().to_string(),
        ScriptDiagnostic {
            line: position.line(),
            column: position.position(),
            test: None,
        },
    )
}

/// `exit` ends the script early without failing it.
fn is_exit(error: &EvalAltResult) -> bool {
    matches!(root_cause(error), EvalAltResult::Exit(..))
}

/// Runs test bodies and continuations until the gate drains. Each job runs
/// with the current-test pointer set to the test it belongs to.
fn pump(
    engine: &Engine,
    ast: &AST,
    ctx: &SharedContext,
    gate: &SharedGate,
) -> Result<(), ScriptExecutionError> {
    loop {
        let next = gate.borrow_mut().next_job()?;
        let Some(job) = next else {
            return Ok(());
        };

        {
            let mut context = ctx.borrow_mut();
            match job.test() {
                Some(test) => {
                    context.tests.set_current_test(test);
                }
                None => context.tests.clear_current_test(),
            }
        }
        let outcome = job.callback().call::<Dynamic>(engine, ast, ());
        ctx.borrow_mut().tests.clear_current_test();

        let Err(error) = outcome else {
            continue;
        };
        if is_exit(&error) {
            continue;
        }
        if job.is_detached() && !is_fatal(&error) {
            warn!(
                test = job.test().unwrap_or("-"),
                error = %error,
                "detached continuation failed"
            );
            continue;
        }
        return Err(to_execution_error(&error, job.test()));
    }
}
