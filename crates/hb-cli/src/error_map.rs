use hb_api::ScriptExecutionError;
use std::fmt::Display;

fn map_error(code: &'static str, error: impl Display) -> ScriptExecutionError {
    ScriptExecutionError::new(code, error.to_string())
}

pub(crate) fn emit_error(error: ScriptExecutionError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error.code);
    println!(
        "ERROR_MSG_JSON:{}",
        serde_json::to_string(&error.message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
    );
    if let Some(diagnostic) = error.diagnostic {
        if let Some(line) = diagnostic.line {
            println!("ERROR_LINE:{}", line);
        }
        if let Some(test) = diagnostic.test {
            println!(
                "ERROR_TEST_JSON:{}",
                serde_json::to_string(&test).unwrap_or_else(|_| "\"\"".to_string())
            );
        }
    }
    1
}

pub(crate) fn map_cli_read(error: std::io::Error) -> ScriptExecutionError {
    map_error("CLI_READ", error)
}

pub(crate) fn map_cli_invocation_invalid(error: serde_json::Error) -> ScriptExecutionError {
    map_error("CLI_INVOCATION_INVALID", error)
}

pub(crate) fn map_cli_capture_write(error: serde_json::Error) -> ScriptExecutionError {
    map_error("CLI_CAPTURE_WRITE", error)
}

pub(crate) fn map_cli_case(error: hb_tool::HbToolError) -> ScriptExecutionError {
    map_error("CLI_CASE_FAILED", error)
}

pub(crate) fn map_cli_logging(error: hb_api::logging::LogError) -> ScriptExecutionError {
    map_error("CLI_LOGGING", error)
}

#[cfg(test)]
mod error_map_tests {
    use super::*;

    #[test]
    fn emit_error_returns_non_zero_exit_code() {
        let code = emit_error(ScriptExecutionError::new("ERR", "failed"));
        assert_eq!(code, 1);
    }

    #[test]
    fn mapping_helpers_keep_error_codes() {
        assert_eq!(map_cli_read(std::io::Error::other("io")).code, "CLI_READ");
        let json_error = serde_json::from_str::<u8>("x").expect_err("json should fail");
        assert_eq!(
            map_cli_invocation_invalid(json_error).code,
            "CLI_INVOCATION_INVALID"
        );
        assert_eq!(
            map_cli_logging(hb_api::logging::LogError::AlreadyInitialized).code,
            "CLI_LOGGING"
        );
    }
}
