use hb_api::{
    CookieJar, EnvironmentSnapshot, HookInvocation, HookMode, RequestSnapshot, ResponseSnapshot,
    SandboxOptions, TestDescriptor,
};
use serde::{Deserialize, Serialize};

pub const TESTCASE_SCHEMA_V1: &str = "hb-tool-case.v1";

/// One fixture case: the snapshots handed to the hook and the outcome it must
/// produce. Capture fields left out of `expected` are not compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub schema_version: String,
    #[serde(default = "default_entry_hook")]
    pub entry_hook: String,
    pub mode: HookMode,
    #[serde(default)]
    pub request: RequestSnapshot,
    #[serde(default)]
    pub env: EnvironmentSnapshot,
    #[serde(default)]
    pub cookies: Option<CookieJar>,
    #[serde(default)]
    pub response: Option<ResponseSnapshot>,
    #[serde(default)]
    pub sandbox: Option<SandboxOptions>,
    pub expected: ExpectedOutcome,
}

fn default_entry_hook() -> String {
    "hook.rhai".to_string()
}

impl TestCase {
    pub fn invocation(&self, script: String) -> HookInvocation {
        HookInvocation {
            script,
            mode: self.mode,
            request: self.request.clone(),
            env: self.env.clone(),
            cookies: self.cookies.clone(),
            response: self.response.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExpectedOutcome {
    Capture {
        #[serde(default)]
        request: Option<RequestSnapshot>,
        #[serde(default)]
        env: Option<EnvironmentSnapshot>,
        #[serde(default)]
        cookies: Option<CookieJar>,
        #[serde(default, rename = "testTree")]
        test_tree: Option<TestDescriptor>,
    },
    Error {
        code: String,
        #[serde(default)]
        message: Option<String>,
    },
}

impl ExpectedOutcome {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Capture { .. } => "capture",
            Self::Error { .. } => "error",
        }
    }
}
