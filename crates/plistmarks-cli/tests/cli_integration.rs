// CLI integration tests: drive the built binary end to end.
use std::io::Write as _;
use std::process::{Command, Stdio};

use serde_json::Value;

fn cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_plistmarks"))
}

fn parse_json(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("valid json")
}

fn write_sample(dir: &std::path::Path, xml: bool) -> std::path::PathBuf {
    let path = dir.join(if xml { "sample.xml.plist" } else { "sample.plist" });
    let mut c = cmd();
    c.args(["sample", "--out", path.to_str().unwrap()]);
    if xml {
        c.arg("--xml");
    }
    let status = c.status().expect("sample");
    assert!(status.success());
    path
}

#[test]
fn convert_file_to_stdout() {
    let temp = tempfile::tempdir().expect("tempdir");
    let input = write_sample(temp.path(), false);
    let out = cmd()
        .args(["convert", "--input", input.to_str().unwrap()])
        .output()
        .expect("convert");
    assert!(out.status.success());
    let json = parse_json(&out.stdout);
    assert_eq!(json["Children"][0]["Title"], "BookmarksBar");
    assert_eq!(
        json["Children"][0]["Children"][0]["URLString"],
        "https://www.rust-lang.org/"
    );
    assert!(std::str::from_utf8(&out.stdout).unwrap().contains("\n  \"Children\": [\n"));
}

#[test]
fn convert_stdin_to_file_matches_file_mode() {
    let temp = tempfile::tempdir().expect("tempdir");
    let input = write_sample(temp.path(), true);
    let dest = temp.path().join("out.json");

    let mut child = cmd()
        .args(["convert", "--stdin", "--out", dest.to_str().unwrap()])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn");
    let data = std::fs::read(&input).unwrap();
    child.stdin.take().unwrap().write_all(&data).unwrap();
    let out = child.wait_with_output().expect("wait");
    assert!(out.status.success());
    assert!(out.stdout.is_empty());

    let by_file = cmd()
        .args(["convert", "--input", input.to_str().unwrap()])
        .output()
        .expect("convert");
    assert_eq!(std::fs::read(&dest).unwrap(), by_file.stdout);
}

#[test]
fn malformed_input_exits_nonzero_without_output() {
    let temp = tempfile::tempdir().expect("tempdir");
    let input = temp.path().join("bad.plist");
    std::fs::write(&input, b"bplist00 but not really").unwrap();
    let dest = temp.path().join("out.json");
    let out = cmd()
        .args([
            "convert",
            "--input",
            input.to_str().unwrap(),
            "--out",
            dest.to_str().unwrap(),
        ])
        .output()
        .expect("convert");
    assert_eq!(out.status.code(), Some(3));
    assert!(out.stdout.is_empty());
    assert!(!dest.exists());
    assert!(String::from_utf8_lossy(&out.stderr).contains("error: decode failed"));
}

#[test]
fn missing_input_file_exits_with_read_error() {
    let out = cmd()
        .args(["convert", "--input", "/nonexistent/bookmarks.plist"])
        .output()
        .expect("convert");
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn input_and_stdin_are_exclusive() {
    let out = cmd()
        .args(["convert", "--input", "x.plist", "--stdin"])
        .output()
        .expect("convert");
    assert!(!out.status.success());
}

#[test]
fn stats_counts_folders_and_leaves() {
    let temp = tempfile::tempdir().expect("tempdir");
    let input = write_sample(temp.path(), false);
    let out = cmd()
        .args(["stats", "--input", input.to_str().unwrap()])
        .output()
        .expect("stats");
    assert!(out.status.success());
    let json = parse_json(&out.stdout);
    assert_eq!(json["folders"], 3);
    assert_eq!(json["leaves"], 2);
    assert_eq!(json["max_depth"], 3);
}

#[test]
fn dump_and_batch() {
    let temp = tempfile::tempdir().expect("tempdir");
    let input = write_sample(temp.path(), false);
    write_sample(temp.path(), true);

    let dump = cmd()
        .args(["dump", "--input", input.to_str().unwrap()])
        .output()
        .expect("dump");
    assert!(dump.status.success());
    assert_eq!(parse_json(&dump.stdout)["WebBookmarkFileVersion"], 1);

    let batch = cmd()
        .args(["batch", temp.path().to_str().unwrap()])
        .output()
        .expect("batch");
    assert!(batch.status.success());
    let json = parse_json(&batch.stdout);
    assert_eq!(json["sample.plist"], json["sample.xml.plist"]);
}
