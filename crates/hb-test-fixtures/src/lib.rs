use std::path::PathBuf;

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

pub fn fixtures_root() -> PathBuf {
    workspace_root().join("fixtures").join("hooks")
}

pub fn fixture_dir(name: &str) -> PathBuf {
    fixtures_root().join(name)
}

pub fn hook_path(name: &str) -> PathBuf {
    fixture_dir(name).join("hook.rhai")
}

pub fn testcase_path(name: &str) -> PathBuf {
    fixture_dir(name).join("testcase.json")
}
