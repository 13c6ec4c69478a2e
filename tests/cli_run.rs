// End-to-end tests for the binary itself. Most run offline: either the
// command is purely local, or it fails before any network use. The
// log-and-continue tests at the bottom run against a local mock server.
// The environment is cleared so ambient DOARAMA_* variables cannot leak
// into the assertions.

use assert_cmd::Command;
use serde_json::json;
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Unroutable; nothing in these tests should ever connect to it.
const API_URL: &str = "http://127.0.0.1:9";

fn doarama() -> Command {
    let mut cmd = Command::cargo_bin("doarama").unwrap();
    cmd.env_clear();
    cmd
}

#[test]
fn no_subcommand_prints_usage_and_fails() {
    let output = doarama().output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "unexpected stderr: {stderr}");
}

#[test]
fn ambiguous_credentials_fail_before_any_network_use() {
    let output = doarama()
        .args([
            "--api-url", API_URL,
            "--user-id", "pilot-1",
            "--user-key", "caller-key",
            "activity", "delete", "1",
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("exactly one of user id and user key"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn missing_credentials_fail_the_same_way() {
    let output = doarama()
        .args(["--api-url", API_URL, "activity", "delete", "1"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("exactly one of user id and user key"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn visualisation_url_renders_offline() {
    let output = doarama()
        .args([
            "--api-url", API_URL,
            "visualisation", "url",
            "--fixed-aspect",
            "Dls5Rkv",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout,
        "VisualisationURL: http://127.0.0.1:9/visualisation/Dls5Rkv?fixedAspect=true\n"
    );
}

#[test]
fn visualisation_url_handles_multiple_keys_in_order() {
    let output = doarama()
        .args(["--api-url", API_URL, "visualisation", "url", "aaa", "bbb"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout,
        "VisualisationURL: http://127.0.0.1:9/visualisation/aaa\n\
         VisualisationURL: http://127.0.0.1:9/visualisation/bbb\n"
    );
}

#[test]
fn combined_create_with_zero_tracks_reports_nothing_to_visualise() {
    let output = doarama()
        .args(["--api-url", API_URL, "--user-id", "pilot-1", "create"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("no activities to visualise"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn activity_delete_skips_failed_ids_and_exits_non_zero() {
    let rt = Runtime::new().unwrap();
    let server = rt.block_on(MockServer::start());
    // The first id fails remotely; the second must still be deleted.
    rt.block_on(
        server.register(
            Mock::given(method("DELETE"))
                .and(path("/activity/111"))
                .respond_with(ResponseTemplate::new(404).set_body_string("no such activity"))
                .expect(1),
        ),
    );
    rt.block_on(
        server.register(
            Mock::given(method("DELETE"))
                .and(path("/activity/222"))
                .respond_with(ResponseTemplate::new(200))
                .expect(1),
        ),
    );

    let api_url = server.uri();
    let output = doarama()
        .args([
            "--api-url", api_url.as_str(),
            "--user-id", "pilot-1",
            "activity", "delete", "111", "222",
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("1 of 2 items failed"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn activity_create_continues_past_an_unreadable_track() {
    let rt = Runtime::new().unwrap();
    let server = rt.block_on(MockServer::start());
    // Exactly one upload: the unreadable first track is skipped, the
    // second still goes through.
    rt.block_on(
        server.register(
            Mock::given(method("POST"))
                .and(path("/activity"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 7 })))
                .expect(1),
        ),
    );

    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.gpx");
    std::fs::write(&good, "<gpx></gpx>").unwrap();

    let api_url = server.uri();
    let output = doarama()
        .args([
            "--api-url", api_url.as_str(),
            "--user-id", "pilot-1",
            "activity", "create",
            "/nonexistent/missing.gpx",
        ])
        .arg(&good)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ActivityId: 7"), "unexpected stdout: {stdout}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("1 of 2 items failed"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn malformed_activity_id_is_rejected_by_the_parser() {
    let output = doarama()
        .args(["--api-url", API_URL, "--user-id", "pilot-1", "activity", "delete", "abc"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid value"), "unexpected stderr: {stderr}");
}
