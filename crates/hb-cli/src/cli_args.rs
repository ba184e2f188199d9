use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "hb-cli")]
#[command(about = "Runs pre-request and post-request hooks in the sandbox")]
pub(crate) struct Cli {
    /// `text` or `json`; logging stays off unless `--log-level` is given.
    #[arg(long = "log-format", global = true)]
    pub(crate) log_format: Option<String>,
    #[arg(long = "log-level", global = true)]
    pub(crate) log_level: Option<String>,
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    Run(RunArgs),
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    #[arg(long = "hook")]
    pub(crate) hook: String,
    /// JSON invocation (mode, request, env, cookies, response).
    #[arg(long = "invocation")]
    pub(crate) invocation: String,
    #[arg(long = "sandbox")]
    pub(crate) sandbox: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct CheckArgs {
    #[arg(long = "case-dir")]
    pub(crate) case_dir: String,
    #[arg(long = "case-file")]
    pub(crate) case_file: Option<String>,
}
