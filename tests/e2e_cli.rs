//! CLI end-to-end tests
//!
//! Tests for the segline command-line interface.

mod common;

use assert_cmd::prelude::*;
use common::{segline_cmd, sidx_box, webm_cues, webm_init, write_file};
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = segline_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = segline_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("segline"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = segline_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_sidx_text_output() {
    let dir = tempdir().unwrap();
    let file = write_file(
        dir.path(),
        "index.sidx",
        sidx_box(1_000, &[(1_000, 2_000), (1_500, 2_000), (900, 1_000)]),
    );

    let mut cmd = segline_cmd();
    cmd.arg("sidx")
        .arg(&file)
        .args(["--media-uri", "https://cdn.example.com/movie.mp4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Segments: 3"))
        .stdout(predicate::str::contains("Total duration: 5.000s"))
        .stdout(predicate::str::contains("https://cdn.example.com/movie.mp4"));
}

#[test]
fn test_cli_sidx_json_output() {
    let dir = tempdir().unwrap();
    let data = sidx_box(1_000, &[(1_000, 2_000), (1_500, 2_000)]);
    let box_size = data.len() as u64;
    let file = write_file(dir.path(), "index.sidx", data);

    let output = segline_cmd()
        .arg("sidx")
        .arg(&file)
        .args(["--index-offset", "100", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["num_references"], 2);
    assert_eq!(json["references"][0]["start_byte"], 100 + box_size);
    assert_eq!(json["references"][0]["end_byte"], 100 + box_size + 999);
    assert_eq!(json["references"][1]["start"], 2.0);
    assert_eq!(json["references"][1]["position"], 1);
}

#[test]
fn test_cli_sidx_timestamp_offset() {
    let dir = tempdir().unwrap();
    let file = write_file(dir.path(), "index.sidx", sidx_box(1_000, &[(1_000, 2_000)]));

    let output = segline_cmd()
        .arg("sidx")
        .arg(&file)
        .args(["--timestamp-offset", "-1.5", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["references"][0]["start"], -1.5);
}

#[test]
fn test_cli_sidx_rejects_garbage() {
    let dir = tempdir().unwrap();
    let file = write_file(dir.path(), "junk.bin", b"definitely not an mp4 box");

    let mut cmd = segline_cmd();
    cmd.arg("sidx")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("SIDX"));
}

#[test]
fn test_cli_sidx_missing_file() {
    let mut cmd = segline_cmd();
    cmd.args(["sidx", "/nonexistent/index.sidx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_cues() {
    let dir = tempdir().unwrap();
    let init = write_file(dir.path(), "init.webm", webm_init(10_000.0));
    let cues = write_file(dir.path(), "cues.bin", webm_cues(&[(0, 0), (5_000, 1_000)]));

    let output = segline_cmd()
        .arg("cues")
        .arg(&cues)
        .arg(&init)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["num_references"], 2);
    assert_eq!(json["last_end"], 10.0);
    assert_eq!(json["references"][0]["uris"][0], "media");
}

#[test]
fn test_cli_timeline_template() {
    let dir = tempdir().unwrap();
    let file = write_file(
        dir.path(),
        "rep.toml",
        r#"
id = "video-720"
base_uris = ["https://cdn.example.com/live/"]
period_duration = 20.0
codecs = "hvc1.2.4.L123.B0"

[template]
media = "$RepresentationID$/seg-$Number$.m4s"
timescale = 90000

[[template.timeline]]
start = 0
duration = 360000
repeat = 4
"#,
    );

    let output = segline_cmd()
        .arg("timeline")
        .arg(&file)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["num_references"], 5);
    assert_eq!(
        json["references"][4]["uris"][0],
        "https://cdn.example.com/live/video-720/seg-5.m4s"
    );
    assert_eq!(json["codec_families"][0], "hevc");
}

#[test]
fn test_cli_timeline_missing_template_fails() {
    let dir = tempdir().unwrap();
    let file = write_file(
        dir.path(),
        "rep.toml",
        r#"
id = "audio"

[template]
timescale = 1000
"#,
    );

    let mut cmd = segline_cmd();
    cmd.arg("timeline").arg(&file).assert().failure();
}

#[test]
fn test_cli_window() {
    let output = segline_cmd()
        .args([
            "window",
            "--start-time",
            "1000",
            "--now",
            "1100",
            "--availability",
            "30",
            "--segment-duration",
            "4",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["kind"], "Live");
    assert_eq!(json["live_edge"], 96.0);
    assert_eq!(json["availability_start"], 66.0);
    assert_eq!(json["availability_end"], 96.0);
}

#[test]
fn test_cli_window_in_progress() {
    let mut cmd = segline_cmd();
    cmd.args([
        "window",
        "--start-time",
        "1000",
        "--now",
        "1100",
        "--duration",
        "50",
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("Kind: InProgress"))
    .stdout(predicate::str::contains("Availability: 0.000s - 50.000s"));
}

#[test]
fn test_cli_window_uses_config_delay() {
    let dir = tempdir().unwrap();
    let config = write_file(
        dir.path(),
        "segline.toml",
        "[timeline]\npresentation_delay = 10.0\n",
    );

    let output = segline_cmd()
        .arg("--config")
        .arg(&config)
        .args(["window", "--start-time", "0", "--now", "100", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["live_edge"], 99.0);
    assert_eq!(json["seek_range_end"], 89.0);
}

#[test]
fn test_cli_validate_valid_config() {
    let dir = tempdir().unwrap();
    let config = write_file(
        dir.path(),
        "segline.toml",
        "[index]\nlow_latency_update_interval = 0.25\n",
    );

    let mut cmd = segline_cmd();
    cmd.arg("validate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("0.25s"));
}

#[test]
fn test_cli_validate_invalid_config() {
    let dir = tempdir().unwrap();
    let config = write_file(
        dir.path(),
        "segline.toml",
        "[timeline]\npresentation_delay = -3.0\n",
    );

    let mut cmd = segline_cmd();
    cmd.arg("validate")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Presentation delay"));
}

#[test]
fn test_cli_validate_defaults() {
    let mut cmd = segline_cmd();
    cmd.arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("using defaults"));
}
