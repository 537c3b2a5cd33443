//! CLI test cases.
//!
//! None of these talk to Azure. Tests that would need real credentials or
//! poppler are marked as ignored.

use assert_cmd::Command;
use predicates::prelude::*;

/// Fake key, so we get past configuration checks.
static FAKE_KEY: &str = "0123456789abcdef";
/// Fake endpoint. Nothing should ever connect to it.
static FAKE_ENDPOINT: &str = "http://127.0.0.1:9/";

/// Create a new `Command` with our binary and a clean Azure environment.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("azure-ocr").unwrap();
    cmd.env_remove("AZURE_VISION_KEY")
        .env_remove("AZURE_VISION_ENDPOINT")
        .env("RUST_LOG", "warn");
    cmd
}

/// Create a command with fake credentials.
fn cmd_with_credentials() -> Command {
    let mut cmd = cmd();
    cmd.env("AZURE_VISION_KEY", FAKE_KEY)
        .env("AZURE_VISION_ENDPOINT", FAKE_ENDPOINT);
    cmd
}

/// Frame a JSON-RPC message for `serve`.
fn frame(body: &str) -> String {
    format!("Content-Length: {}\r\n\r\n{body}", body.len())
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_ocr_requires_key() {
    cmd()
        .env("AZURE_VISION_ENDPOINT", FAKE_ENDPOINT)
        .arg("ocr")
        .arg("Cargo.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("AZURE_VISION_KEY"));
}

#[test]
fn test_ocr_requires_endpoint() {
    cmd()
        .env("AZURE_VISION_KEY", FAKE_KEY)
        .arg("ocr")
        .arg("scan.pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("AZURE_VISION_ENDPOINT"));
}

#[test]
fn test_ocr_missing_file() {
    cmd_with_credentials()
        .arg("ocr")
        .arg("tests/fixtures/no-such-scan.pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn test_ocr_unsupported_extension() {
    cmd_with_credentials()
        .arg("ocr")
        .arg("Cargo.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported file type: .toml"));
}

#[test]
fn test_ocr_base64_requires_type() {
    cmd_with_credentials()
        .arg("ocr")
        .arg("--base64")
        .arg("aGVsbG8=")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_ocr_requires_input() {
    cmd_with_credentials().arg("ocr").assert().failure().code(2);
}

#[test]
fn test_serve_requires_key() {
    cmd()
        .arg("serve")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("AZURE_VISION_KEY"));
}

#[test]
fn test_serve_exits_cleanly_at_end_of_input() {
    cmd()
        .env("AZURE_VISION_KEY", FAKE_KEY)
        .arg("serve")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_serve_handshake_and_tools() {
    let mut input = frame(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#);
    input.push_str(&frame(
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
    ));
    input.push_str(&frame(r#"{"jsonrpc":"2.0","id":9,"method":"initialized"}"#));
    input.push_str(&frame(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#));
    input.push_str(&frame(r#"{"jsonrpc":"2.0","id":3,"method":"foo/bar"}"#));
    input.push_str(&frame(
        r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"ocr_file","arguments":{"file_path":"/missing.pdf"}}}"#,
    ));

    // Use the default endpoint. Nothing here should reach Azure.
    cmd()
        .env("AZURE_VISION_KEY", FAKE_KEY)
        .arg("serve")
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""protocolVersion":"2024-11-05""#))
        .stdout(predicate::str::contains(r#""name":"ocr_file""#))
        .stdout(predicate::str::contains(r#""name":"ocr_base64""#))
        .stdout(predicate::str::contains("-32601"))
        .stdout(predicate::str::contains(r#""isError":true"#))
        .stdout(predicate::str::contains("file not found: /missing.pdf"))
        .stdout(predicate::str::contains(r#""id":9"#).not());
}

#[test]
#[ignore = "Needs Azure credentials, poppler-utils and a scanned PDF"]
fn test_ocr_real_pdf() {
    Command::cargo_bin("azure-ocr")
        .unwrap()
        .arg("ocr")
        .arg("tests/fixtures/scan.pdf")
        .assert()
        .success()
        .stdout(predicate::str::contains("--- Page 1 ---"));
}
