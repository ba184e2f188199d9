use std::path::Path;

use hb_api::{run_hook, CapturedResult, ScriptExecutionError};
use serde::Serialize;

use crate::source::{read_hook_sources, read_test_case};
use crate::{ExpectedOutcome, HbToolError, TestCase};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Capture(CapturedResult),
    Error(ScriptExecutionError),
}

impl Observed {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Capture(_) => "capture",
            Self::Error(_) => "error",
        }
    }

    fn to_json(&self) -> Result<String, HbToolError> {
        let value = match self {
            Self::Capture(captured) => {
                serde_json::to_value(captured).map_err(HbToolError::OutcomeSerialize)?
            }
            Self::Error(error) => serde_json::json!({
                "code": error.code,
                "message": error.message,
            }),
        };
        serde_json::to_string_pretty(&value).map_err(HbToolError::OutcomeSerialize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub entry_hook: String,
    pub outcome: Observed,
}

pub fn run_case(case_dir: &Path, case: &TestCase) -> Result<RunReport, HbToolError> {
    let mut hooks = read_hook_sources(case_dir)?;
    let script = hooks
        .remove(&case.entry_hook)
        .ok_or_else(|| HbToolError::MissingHook {
            path: case_dir.to_path_buf(),
            entry: case.entry_hook.clone(),
        })?;
    if let Some(options) = &case.sandbox {
        options.validate().map_err(HbToolError::Sandbox)?;
    }

    let outcome = match run_hook(&case.invocation(script), case.sandbox.clone()) {
        Ok(captured) => Observed::Capture(captured),
        Err(error) => Observed::Error(error),
    };
    Ok(RunReport {
        entry_hook: case.entry_hook.clone(),
        outcome,
    })
}

pub fn assert_case(case_dir: &Path, case_path: &Path) -> Result<(), HbToolError> {
    let case = read_test_case(case_path)?;
    let report = run_case(case_dir, &case)?;

    match (&case.expected, &report.outcome) {
        (
            ExpectedOutcome::Capture {
                request,
                env,
                cookies,
                test_tree,
            },
            Observed::Capture(captured),
        ) => {
            compare("request", request.as_ref(), captured.request())?;
            compare("env", env.as_ref(), Some(captured.env()))?;
            compare("cookies", cookies.as_ref(), captured.cookies())?;
            compare("testTree", test_tree.as_ref(), captured.test_tree())?;
            Ok(())
        }
        (ExpectedOutcome::Error { code, message }, Observed::Error(error)) => {
            compare("error.code", Some(code), Some(&error.code))?;
            compare("error.message", message.as_ref(), Some(&error.message))?;
            Ok(())
        }
        (expected, observed) => Err(HbToolError::OutcomeKindMismatch {
            expected: expected.kind_name().to_string(),
            actual: observed.kind_name().to_string(),
            observed: observed.to_json()?,
        }),
    }
}

/// Compares one capture field; an expectation of `None` skips the field.
fn compare<T: Serialize + PartialEq>(
    field: &str,
    expected: Option<&T>,
    actual: Option<&T>,
) -> Result<(), HbToolError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    if actual == Some(expected) {
        return Ok(());
    }
    Err(HbToolError::FieldMismatch {
        field: field.to_string(),
        expected: serde_json::to_string(expected).map_err(HbToolError::OutcomeSerialize)?,
        actual: serde_json::to_string(&actual).map_err(HbToolError::OutcomeSerialize)?,
    })
}

#[cfg(test)]
mod runner_tests {
    use super::*;

    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    use hb_api::{HookMode, SandboxOptions};

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should move forward")
            .as_nanos();
        std::env::temp_dir().join(format!("hb-tool-runner-{}-{}", name, nanos))
    }

    fn write_file(path: &Path, content: &str) {
        let parent = path.parent().expect("path should have parent");
        fs::create_dir_all(parent).expect("parent dir should be created");
        fs::write(path, content).expect("file should be written");
    }

    fn pre_case(expected: ExpectedOutcome) -> TestCase {
        TestCase {
            schema_version: crate::TESTCASE_SCHEMA_V1.to_string(),
            entry_hook: "hook.rhai".to_string(),
            mode: HookMode::Pre,
            request: Default::default(),
            env: Default::default(),
            cookies: None,
            response: None,
            sandbox: None,
            expected,
        }
    }

    fn any_capture() -> ExpectedOutcome {
        ExpectedOutcome::Capture {
            request: None,
            env: None,
            cookies: None,
            test_tree: None,
        }
    }

    #[test]
    fn run_case_captures_successful_hooks() {
        let root = temp_dir("capture");
        write_file(&root.join("hook.rhai"), r#"pw::env::set("a", "1");"#);

        let report = run_case(&root, &pre_case(any_capture())).expect("run should pass");
        assert_eq!(report.entry_hook, "hook.rhai");
        let Observed::Capture(captured) = report.outcome else {
            panic!("hook should capture");
        };
        assert_eq!(captured.env().selected[0].current_value, "1");
    }

    #[test]
    fn run_case_reports_script_errors_as_outcomes() {
        let root = temp_dir("error");
        write_file(&root.join("hook.rhai"), "throw \"nope\";");

        let report = run_case(&root, &pre_case(any_capture())).expect("run should pass");
        assert_eq!(report.outcome.kind_name(), "error");
    }

    #[test]
    fn run_case_reports_missing_entry_and_bad_sandbox() {
        let root = temp_dir("missing-entry");
        write_file(&root.join("other.rhai"), "1;");
        let error = run_case(&root, &pre_case(any_capture())).expect_err("entry should be missing");
        assert!(matches!(error, HbToolError::MissingHook { .. }));

        let sandbox_root = temp_dir("bad-sandbox");
        write_file(&sandbox_root.join("hook.rhai"), "1;");
        let mut case = pre_case(any_capture());
        case.sandbox = Some(SandboxOptions {
            max_gate_jobs: 0,
            ..SandboxOptions::default()
        });
        let error = run_case(&sandbox_root, &case).expect_err("sandbox should be rejected");
        assert!(matches!(error, HbToolError::Sandbox(_)));
    }

    #[test]
    fn assert_case_reports_kind_and_field_mismatches() {
        let root = temp_dir("assert");
        write_file(&root.join("hook.rhai"), r#"pw::env::set("a", "1");"#);

        let kind_case = root.join("kind.json");
        write_file(
            &kind_case,
            r#"{
  "schemaVersion":"hb-tool-case.v1",
  "mode":"pre",
  "expected":{"kind":"error","code":"SCRIPT_RUNTIME_ERROR"}
}"#,
        );
        let kind_error = assert_case(&root, &kind_case).expect_err("kind mismatch should fail");
        assert!(matches!(kind_error, HbToolError::OutcomeKindMismatch { .. }));

        let field_case = root.join("field.json");
        write_file(
            &field_case,
            r#"{
  "schemaVersion":"hb-tool-case.v1",
  "mode":"pre",
  "expected":{"kind":"capture","env":{"global":[],"selected":[{"key":"a","currentValue":"2","initialValue":"2"}]}}
}"#,
        );
        let field_error = assert_case(&root, &field_case).expect_err("env mismatch should fail");
        assert!(matches!(
            field_error,
            HbToolError::FieldMismatch { ref field, .. } if field == "env"
        ));
    }

    #[test]
    fn assert_case_passes_with_matching_error() {
        let root = temp_dir("assert-error");
        write_file(&root.join("hook.rhai"), "throw \"nope\";");
        let case_path = root.join("testcase.json");
        write_file(
            &case_path,
            r#"{
  "schemaVersion":"hb-tool-case.v1",
  "mode":"pre",
  "expected":{"kind":"error","code":"SCRIPT_RUNTIME_ERROR","message":"nope"}
}"#,
        );

        assert_case(&root, &case_path).expect("assert should pass");
    }
}
