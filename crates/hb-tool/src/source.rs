use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::{HbToolError, TestCase, TESTCASE_SCHEMA_V1};

/// Collects every `.rhai` file under `case_dir`, keyed by its `/`-separated
/// relative path.
pub fn read_hook_sources(case_dir: &Path) -> Result<BTreeMap<String, String>, HbToolError> {
    let mut hooks = BTreeMap::new();

    for entry in WalkDir::new(case_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("rhai") {
            continue;
        }
        let Ok(relative) = path.strip_prefix(case_dir) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");

        let content = fs::read_to_string(path).map_err(|source| HbToolError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        hooks.insert(relative, content);
    }

    if hooks.is_empty() {
        return Err(HbToolError::SourceEmpty {
            path: case_dir.to_path_buf(),
        });
    }

    Ok(hooks)
}

pub fn read_test_case(case_path: &Path) -> Result<TestCase, HbToolError> {
    let raw = fs::read_to_string(case_path).map_err(|source| HbToolError::ReadFile {
        path: case_path.to_path_buf(),
        source,
    })?;
    let parsed: TestCase = serde_json::from_str(&raw).map_err(|source| HbToolError::ParseCase {
        path: case_path.to_path_buf(),
        source,
    })?;

    if parsed.schema_version != TESTCASE_SCHEMA_V1 {
        return Err(HbToolError::InvalidSchemaVersion {
            expected: TESTCASE_SCHEMA_V1.to_string(),
            found: parsed.schema_version,
        });
    }

    Ok(parsed)
}
