mod case;
mod runner;
mod source;

pub use case::{ExpectedOutcome, TestCase, TESTCASE_SCHEMA_V1};
pub use runner::{assert_case, run_case, Observed, RunReport};
pub use source::{read_hook_sources, read_test_case};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HbToolError {
    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse testcase {path}: {source}")]
    ParseCase {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid testcase schema version \"{found}\", expected \"{expected}\".")]
    InvalidSchemaVersion { expected: String, found: String },
    #[error("No .rhai files under {path}.")]
    SourceEmpty { path: PathBuf },
    #[error("Entry hook \"{entry}\" not found under {path}.")]
    MissingHook { path: PathBuf, entry: String },
    #[error("Invalid sandbox options: {0}")]
    Sandbox(#[source] hb_core::ScriptExecutionError),
    #[error("Expected outcome {expected}, actual {actual}. observed={observed}")]
    OutcomeKindMismatch {
        expected: String,
        actual: String,
        observed: String,
    },
    #[error("Mismatch in {field}. expected={expected} actual={actual}")]
    FieldMismatch {
        field: String,
        expected: String,
        actual: String,
    },
    #[error("Failed to serialize outcome for diff: {0}")]
    OutcomeSerialize(serde_json::Error),
}
