use super::*;

use std::time::{SystemTime, UNIX_EPOCH};

use hb_test_fixtures::fixture_dir;

fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be monotonic")
        .as_nanos();
    std::env::temp_dir().join(format!("hb-cli-{}-{}", name, nanos))
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent should be created");
    }
    fs::write(path, content).expect("file should be written");
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[test]
fn run_command_executes_hook_with_invocation_file() {
    let root = temp_path("run");
    let hook = root.join("hook.rhai");
    let invocation = root.join("invocation.json");
    write_file(&hook, r#"pw::env::set("seen", "yes");"#);
    write_file(&invocation, r#"{"mode":"pre"}"#);

    let code = run_hook_command(RunArgs {
        hook: path_arg(&hook),
        invocation: path_arg(&invocation),
        sandbox: None,
    })
    .expect("run should pass");
    assert_eq!(code, 0);
}

#[test]
fn run_command_reports_missing_files_and_bad_json() {
    let root = temp_path("run-errors");
    let hook = root.join("hook.rhai");
    write_file(&hook, "1;");

    let missing = run_hook_command(RunArgs {
        hook: path_arg(&hook),
        invocation: path_arg(&root.join("missing.json")),
        sandbox: None,
    })
    .expect_err("missing invocation should fail");
    assert_eq!(missing.code, "CLI_READ");

    let invocation = root.join("invocation.json");
    write_file(&invocation, "{");
    let invalid = run_hook_command(RunArgs {
        hook: path_arg(&hook),
        invocation: path_arg(&invocation),
        sandbox: None,
    })
    .expect_err("bad invocation should fail");
    assert_eq!(invalid.code, "CLI_INVOCATION_INVALID");
}

#[test]
fn run_command_applies_sandbox_options() {
    let root = temp_path("run-sandbox");
    let hook = root.join("hook.rhai");
    let invocation = root.join("invocation.json");
    let sandbox = root.join("sandbox.json");
    write_file(&hook, "loop {}");
    write_file(&invocation, r#"{"mode":"pre"}"#);
    write_file(&sandbox, r#"{"maxOperations": 500}"#);

    let error = run_hook_command(RunArgs {
        hook: path_arg(&hook),
        invocation: path_arg(&invocation),
        sandbox: Some(path_arg(&sandbox)),
    })
    .expect_err("budget should be exceeded");
    assert_eq!(error.code, "SCRIPT_BUDGET_EXCEEDED");
}

#[test]
fn check_command_accepts_fixture_case() {
    let code = run_check_command(CheckArgs {
        case_dir: path_arg(&fixture_dir("02-pass-and-fail")),
        case_file: None,
    })
    .expect("fixture should pass");
    assert_eq!(code, 0);
}

#[test]
fn check_command_reports_case_failures() {
    let root = temp_path("check");
    write_file(&root.join("hook.rhai"), "1;");
    write_file(
        &root.join("testcase.json"),
        r#"{"schemaVersion":"hb-tool-case.v1","mode":"pre","expected":{"kind":"error","code":"SCRIPT_RUNTIME_ERROR"}}"#,
    );
    let error = run_check_command(CheckArgs {
        case_dir: path_arg(&root),
        case_file: None,
    })
    .expect_err("case should fail");
    assert_eq!(error.code, "CLI_CASE_FAILED");
}

#[test]
fn logging_flags_are_validated() {
    assert!(init_cli_logging(Some("json"), None).is_ok());
    let error = init_cli_logging(Some("xml"), Some("info")).expect_err("format should fail");
    assert_eq!(error.code, "CLI_LOGGING");
}

#[test]
fn run_cli_from_args_returns_parse_exit_code() {
    assert_eq!(run_cli_from_args(["hb-cli", "unknown"]), 2);
}
