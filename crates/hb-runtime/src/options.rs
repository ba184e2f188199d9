use serde::{Deserialize, Serialize};

use hb_core::{ScriptExecutionError, SANDBOX_OPTIONS_INVALID};

/// Resource limits applied to every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SandboxOptions {
    /// Operation budget per guest call (top-level script, each test body, each timer).
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_string_size: usize,
    /// Upper bound for both array and map sizes.
    pub max_collection_size: usize,
    /// Number of test bodies plus timers the completion gate may run.
    pub max_gate_jobs: usize,
    /// Wall-clock limit for the whole invocation.
    pub timeout_ms: u64,
    pub max_template_expansions: usize,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            max_operations: 5_000_000,
            max_call_levels: 64,
            max_string_size: 1024 * 1024,
            max_collection_size: 100_000,
            max_gate_jobs: 10_000,
            timeout_ms: 5_000,
            max_template_expansions: 10,
        }
    }
}

impl SandboxOptions {
    pub fn from_json_str(raw: &str) -> Result<Self, ScriptExecutionError> {
        let options: Self = serde_json::from_str(raw).map_err(|error| {
            ScriptExecutionError::new(
                SANDBOX_OPTIONS_INVALID,
                format!("Sandbox options are not valid JSON: {}", error),
            )
        })?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ScriptExecutionError> {
        let limits = [
            ("maxOperations", self.max_operations == 0),
            ("maxCallLevels", self.max_call_levels == 0),
            ("maxStringSize", self.max_string_size == 0),
            ("maxCollectionSize", self.max_collection_size == 0),
            ("maxGateJobs", self.max_gate_jobs == 0),
            ("timeoutMs", self.timeout_ms == 0),
            ("maxTemplateExpansions", self.max_template_expansions == 0),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, is_zero)| *is_zero) {
            return Err(ScriptExecutionError::new(
                SANDBOX_OPTIONS_INVALID,
                format!("Sandbox option \"{}\" must be greater than zero.", name),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod options_tests {
    use super::*;

    #[test]
    fn from_json_str_fills_defaults() {
        let options =
            SandboxOptions::from_json_str(r#"{"timeoutMs": 250}"#).expect("options should parse");
        assert_eq!(options.timeout_ms, 250);
        assert_eq!(options.max_operations, 5_000_000);
        assert_eq!(options.max_template_expansions, 10);
    }

    #[test]
    fn from_json_str_rejects_zero_limits() {
        let error = SandboxOptions::from_json_str(r#"{"maxGateJobs": 0}"#)
            .expect_err("zero limit should fail");
        assert_eq!(error.code, SANDBOX_OPTIONS_INVALID);
        assert!(error.message.contains("maxGateJobs"));
    }

    #[test]
    fn from_json_str_rejects_malformed_json() {
        let error = SandboxOptions::from_json_str("{").expect_err("bad json should fail");
        assert_eq!(error.code, SANDBOX_OPTIONS_INVALID);
    }
}
