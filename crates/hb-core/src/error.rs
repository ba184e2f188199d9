use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SCRIPT_SYNTAX_ERROR: &str = "SCRIPT_SYNTAX_ERROR";
pub const SCRIPT_RUNTIME_ERROR: &str = "SCRIPT_RUNTIME_ERROR";
pub const SCRIPT_TIMEOUT: &str = "SCRIPT_TIMEOUT";
pub const SCRIPT_BUDGET_EXCEEDED: &str = "SCRIPT_BUDGET_EXCEEDED";
pub const SANDBOX_OPTIONS_INVALID: &str = "SANDBOX_OPTIONS_INVALID";
pub const SANDBOX_INVOCATION_INVALID: &str = "SANDBOX_INVOCATION_INVALID";

/// Where in the guest script a fatal error surfaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDiagnostic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    /// Name of the test whose body (or awaited continuation) raised the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
}

impl ScriptDiagnostic {
    pub fn is_empty(&self) -> bool {
        self.line.is_none() && self.column.is_none() && self.test.is_none()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ScriptExecutionError {
    pub code: String,
    pub message: String,
    pub diagnostic: Option<ScriptDiagnostic>,
}

impl ScriptExecutionError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(
        code: impl Into<String>,
        message: impl Into<String>,
        diagnostic: ScriptDiagnostic,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            diagnostic: (!diagnostic.is_empty()).then_some(diagnostic),
        }
    }
}
