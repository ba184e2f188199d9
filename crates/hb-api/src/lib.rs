pub mod logging;

pub use hb_core::{
    CapturedResult, Cookie, CookieJar, EnvironmentSnapshot, EnvironmentVariable, ExpectResult,
    ExpectStatus, HookMode, KeyValuePair, PostRequestCapture, PreRequestCapture, RequestAuth,
    RequestBody, RequestSnapshot, ResponseHeader, ResponseSnapshot, ScriptDiagnostic,
    ScriptExecutionError, TestDescriptor,
};
pub use hb_runtime::{HookInvocation, SandboxHost, SandboxOptions};

use hb_core::SANDBOX_INVOCATION_INVALID;

#[derive(Debug, Clone, Default)]
pub struct PreRequestOptions {
    pub script: String,
    pub request: RequestSnapshot,
    pub env: EnvironmentSnapshot,
    pub cookies: Option<CookieJar>,
    pub sandbox: Option<SandboxOptions>,
}

#[derive(Debug, Clone, Default)]
pub struct PostRequestOptions {
    pub script: String,
    pub request: RequestSnapshot,
    pub env: EnvironmentSnapshot,
    pub cookies: Option<CookieJar>,
    pub response: ResponseSnapshot,
    pub sandbox: Option<SandboxOptions>,
}

pub fn run_pre_request(
    options: PreRequestOptions,
) -> Result<PreRequestCapture, ScriptExecutionError> {
    let host = host_for(options.sandbox)?;
    host.run_pre_request(
        &options.script,
        options.request,
        options.env,
        options.cookies,
    )
}

pub fn run_post_request(
    options: PostRequestOptions,
) -> Result<PostRequestCapture, ScriptExecutionError> {
    let host = host_for(options.sandbox)?;
    host.run_post_request(
        &options.script,
        options.request,
        options.env,
        options.cookies,
        options.response,
    )
}

pub fn run_hook(
    invocation: &HookInvocation,
    sandbox: Option<SandboxOptions>,
) -> Result<CapturedResult, ScriptExecutionError> {
    host_for(sandbox)?.run(invocation)
}

/// Runs a hook described as a camelCase JSON invocation.
pub fn run_hook_json(
    raw: &str,
    sandbox: Option<SandboxOptions>,
) -> Result<CapturedResult, ScriptExecutionError> {
    let invocation: HookInvocation = serde_json::from_str(raw).map_err(|error| {
        ScriptExecutionError::new(
            SANDBOX_INVOCATION_INVALID,
            format!("Hook invocation is not valid JSON: {}", error),
        )
    })?;
    run_hook(&invocation, sandbox)
}

fn host_for(sandbox: Option<SandboxOptions>) -> Result<SandboxHost, ScriptExecutionError> {
    match sandbox {
        Some(options) => SandboxHost::new(options),
        None => Ok(SandboxHost::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_core::{SANDBOX_OPTIONS_INVALID, SCRIPT_RUNTIME_ERROR};

    #[test]
    fn run_pre_request_returns_mutated_request() {
        let capture = run_pre_request(PreRequestOptions {
            script: r#"hopp::request::setMethod("post");"#.to_string(),
            request: RequestSnapshot {
                method: "GET".to_string(),
                ..RequestSnapshot::default()
            },
            ..PreRequestOptions::default()
        })
        .expect("pre-request hook should pass");
        assert_eq!(capture.request.method, "POST");
    }

    #[test]
    fn run_post_request_builds_test_tree() {
        let capture = run_post_request(PostRequestOptions {
            script: r#"
                pm::test("ok", || {
                    pm::expect(pm::response::code).to.equal(201);
                });
            "#
            .to_string(),
            response: ResponseSnapshot {
                status: 201,
                status_text: "Created".to_string(),
                ..ResponseSnapshot::default()
            },
            ..PostRequestOptions::default()
        })
        .expect("post-request hook should pass");
        let test = capture.test_tree.child("ok").expect("test should be recorded");
        assert_eq!(test.count(ExpectStatus::Pass), 1);
    }

    #[test]
    fn run_hook_rejects_invalid_sandbox_options() {
        let invocation = HookInvocation::pre_request("", RequestSnapshot::default());
        let error = run_hook(
            &invocation,
            Some(SandboxOptions {
                timeout_ms: 0,
                ..SandboxOptions::default()
            }),
        )
        .expect_err("zero timeout should be rejected");
        assert_eq!(error.code, SANDBOX_OPTIONS_INVALID);
    }

    #[test]
    fn run_hook_json_reads_camel_case_invocations() {
        let raw = r#"{
            "script": "pw::env::set(\"seen\", pw::env::get(\"base\"));",
            "mode": "pre",
            "env": {
                "global": [],
                "selected": [{"key": "base", "currentValue": "x", "initialValue": "x", "secret": false}]
            }
        }"#;
        let captured = run_hook_json(raw, None).expect("json hook should pass");
        assert_eq!(captured.mode(), HookMode::Pre);
        let seen = captured
            .env()
            .selected
            .iter()
            .find(|entry| entry.key == "seen")
            .expect("seen should be set");
        assert_eq!(seen.current_value, "x");
    }

    #[test]
    fn run_hook_json_reports_malformed_input() {
        let error = run_hook_json("{", None).expect_err("malformed json should fail");
        assert_eq!(error.code, SANDBOX_INVOCATION_INVALID);
    }

    #[test]
    fn runtime_errors_surface_through_the_facade() {
        let error = run_pre_request(PreRequestOptions {
            script: "throw \"nope\";".to_string(),
            ..PreRequestOptions::default()
        })
        .expect_err("throw should fail");
        assert_eq!(error.code, SCRIPT_RUNTIME_ERROR);
    }
}
