use std::io::Write;
use std::process::Command;

fn vbajs_bin() -> &'static str {
    env!("CARGO_BIN_EXE_vbajs")
}

#[test]
fn translates_a_file_to_stdout() {
    let mut src = tempfile::NamedTempFile::new().unwrap();
    writeln!(src, "Dim x As Integer").unwrap();

    let output = Command::new(vbajs_bin())
        .arg(src.path())
        .output()
        .expect("vbajs should run");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("var x; // Integer"));
}

#[test]
fn writes_to_the_requested_output_file() {
    let mut src = tempfile::NamedTempFile::new().unwrap();
    writeln!(src, "Dim x As Integer").unwrap();
    let dest = tempfile::NamedTempFile::new().unwrap();

    let status = Command::new(vbajs_bin())
        .arg(src.path())
        .arg("--output")
        .arg(dest.path())
        .status()
        .expect("vbajs should run");

    assert!(status.success());
    let written = std::fs::read_to_string(dest.path()).unwrap();
    assert!(written.contains("var x; // Integer"));
}

#[test]
fn reports_parse_errors_on_stderr() {
    let mut src = tempfile::NamedTempFile::new().unwrap();
    writeln!(src, "If x Then").unwrap();
    writeln!(src, "y = 1").unwrap();

    let output = Command::new(vbajs_bin())
        .arg(src.path())
        .output()
        .expect("vbajs should run");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("error"));
}
