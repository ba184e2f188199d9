use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use hb_api::logging::{init_logging, LogConfig, LogFormat};
use hb_api::{
    run_hook, CapturedResult, ExpectStatus, HookInvocation, SandboxOptions, ScriptExecutionError,
};

mod cli_args;
mod error_map;

pub(crate) use cli_args::{CheckArgs, Cli, Mode, RunArgs};
pub(crate) use error_map::{
    emit_error, map_cli_capture_write, map_cli_case, map_cli_invocation_invalid, map_cli_logging,
    map_cli_read,
};

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, ScriptExecutionError> {
    init_cli_logging(cli.log_format.as_deref(), cli.log_level.as_deref())?;
    match cli.command {
        Mode::Run(args) => run_hook_command(args),
        Mode::Check(args) => run_check_command(args),
    }
}

fn init_cli_logging(
    format: Option<&str>,
    level: Option<&str>,
) -> Result<(), ScriptExecutionError> {
    let Some(level) = level else {
        return Ok(());
    };
    let format = match format {
        None => LogFormat::default(),
        Some(raw) => LogFormat::parse(raw).ok_or_else(|| {
            ScriptExecutionError::new("CLI_LOGGING", format!("Unknown log format: {}", raw))
        })?,
    };
    init_logging(&LogConfig {
        format,
        level: level.to_string(),
    })
    .map_err(map_cli_logging)
}

fn read_text(path: &str) -> Result<String, ScriptExecutionError> {
    fs::read_to_string(path).map_err(map_cli_read)
}

fn run_hook_command(args: RunArgs) -> Result<i32, ScriptExecutionError> {
    let script = read_text(&args.hook)?;
    let mut invocation: HookInvocation =
        serde_json::from_str(&read_text(&args.invocation)?).map_err(map_cli_invocation_invalid)?;
    invocation.script = script;
    let sandbox = match &args.sandbox {
        Some(path) => Some(SandboxOptions::from_json_str(&read_text(path)?)?),
        None => None,
    };

    let captured = run_hook(&invocation, sandbox)?;
    emit_capture(&captured)?;
    Ok(0)
}

fn run_check_command(args: CheckArgs) -> Result<i32, ScriptExecutionError> {
    let case_dir = PathBuf::from(&args.case_dir);
    let case_path = args
        .case_file
        .map(PathBuf::from)
        .unwrap_or_else(|| case_dir.join("testcase.json"));
    check_case(&case_dir, &case_path)?;
    println!("RESULT:OK");
    println!("CASE:{}", case_dir.display());
    Ok(0)
}

fn check_case(case_dir: &Path, case_path: &Path) -> Result<(), ScriptExecutionError> {
    hb_tool::assert_case(case_dir, case_path).map_err(map_cli_case)
}

fn emit_capture(captured: &CapturedResult) -> Result<(), ScriptExecutionError> {
    let payload = serde_json::to_string(captured).map_err(map_cli_capture_write)?;
    println!("RESULT:OK");
    println!("MODE:{}", captured.mode().as_str());
    if let Some(tree) = captured.test_tree() {
        println!(
            "TESTS:{} PASS:{} FAIL:{} ERROR:{}",
            tree.children.len(),
            tree.count(ExpectStatus::Pass),
            tree.count(ExpectStatus::Fail),
            tree.count(ExpectStatus::Error)
        );
    }
    println!("CAPTURE_JSON:{}", payload);
    Ok(())
}

#[cfg(test)]
mod tests;
