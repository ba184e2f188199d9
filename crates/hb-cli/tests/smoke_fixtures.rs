use std::fs;
use std::process::Command;

use hb_test_fixtures::fixtures_root;

#[test]
fn check_passes_every_fixture_case() {
    let bin = env!("CARGO_BIN_EXE_hb-cli");

    let mut directories = fs::read_dir(fixtures_root())
        .expect("fixtures root must exist")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect::<Vec<_>>();
    directories.sort();

    assert!(!directories.is_empty(), "expected hook fixture cases");

    for directory in directories {
        let output = Command::new(bin)
            .arg("check")
            .arg("--case-dir")
            .arg(&directory)
            .output()
            .expect("cli should execute");

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            panic!(
                "case {} failed\nstdout:\n{}\nstderr:\n{}",
                directory.display(),
                stdout,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        assert!(
            stdout.contains("RESULT:OK"),
            "stdout missing RESULT:OK for {}",
            directory.display()
        );
    }
}

#[test]
fn run_prints_capture_and_error_lines() {
    let bin = env!("CARGO_BIN_EXE_hb-cli");
    let root = std::env::temp_dir().join(format!("hb-cli-smoke-{}", std::process::id()));
    fs::create_dir_all(&root).expect("root should be created");
    let invocation = root.join("invocation.json");
    fs::write(
        &invocation,
        r#"{"mode":"post","response":{"status":200,"statusText":"OK"}}"#,
    )
    .expect("invocation should be written");

    let passing = root.join("pass.rhai");
    fs::write(
        &passing,
        r#"hopp::test("ok", || { hopp::expect(hopp::response::statusCode).to.equal(200); });"#,
    )
    .expect("hook should be written");
    let output = Command::new(bin)
        .args(["run", "--hook"])
        .arg(&passing)
        .arg("--invocation")
        .arg(&invocation)
        .output()
        .expect("cli should execute");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("MODE:post"));
    assert!(stdout.contains("TESTS:1 PASS:1 FAIL:0 ERROR:0"));
    assert!(stdout.contains("CAPTURE_JSON:"));

    let failing = root.join("fail.rhai");
    fs::write(&failing, "let x = 1;\nthrow \"boom\";").expect("hook should be written");
    let output = Command::new(bin)
        .args(["run", "--hook"])
        .arg(&failing)
        .arg("--invocation")
        .arg(&invocation)
        .output()
        .expect("cli should execute");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!output.status.success());
    assert!(stdout.contains("RESULT:ERROR"));
    assert!(stdout.contains("ERROR_CODE:SCRIPT_RUNTIME_ERROR"));
    assert!(stdout.contains("ERROR_LINE:2"));
}
