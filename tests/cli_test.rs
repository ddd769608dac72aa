//! CLI and shutdown integration tests.
//!
//! Runs the built `afkbot` binary: help and version output, a clean error on
//! a missing settings file, and graceful exit on SIGTERM.

mod common;

use common::TestFixture;
use std::process::Command;
use std::time::Duration;

const BIN: &str = env!("CARGO_BIN_EXE_afkbot");

fn write_settings(fixture: &TestFixture) -> std::path::PathBuf {
    let settings = fixture.temp_dir.path().join("settings.json");
    std::fs::write(
        &settings,
        r#"{
            "bot-account": { "username": "AFKBot", "type": "offline" },
            "server": { "ip": "play.example.net", "port": 19132 },
            "utils": { "anti-afk": { "enabled": true } }
        }"#,
    )
    .expect("failed to write settings");
    settings
}

/// CLI --help output should show expected options.
#[test]
fn test_cli_help_output() {
    let output = Command::new(BIN).arg("--help").output().expect("failed to run");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--settings"), "help should mention --settings option");
    assert!(stdout.contains("--web-addr"), "help should mention --web-addr option");
    assert!(stdout.contains("--log-level"), "help should mention --log-level option");
    assert!(stdout.contains("--no-web"), "help should mention --no-web option");
}

/// CLI --version should show version.
#[test]
fn test_cli_version_output() {
    let output = Command::new(BIN).arg("--version").output().expect("failed to run");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "version output should contain version number: {}",
        stdout
    );
}

#[test]
fn test_missing_settings_file_fails() {
    let fixture = TestFixture::new();
    let output = Command::new(BIN)
        .arg("--settings")
        .arg(fixture.temp_dir.path().join("absent.json"))
        .arg("--no-web")
        .output()
        .expect("failed to run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("absent.json"), "error should name the file: {stderr}");
}

/// A status page address that is already taken stops the bot at startup.
#[test]
fn test_status_port_in_use_fails_startup() {
    let fixture = TestFixture::new();
    let settings = write_settings(&fixture);
    let taken = std::net::TcpListener::bind("127.0.0.1:0").expect("failed to bind");
    let addr = taken.local_addr().expect("no local addr");

    let mut child = Command::new(BIN)
        .arg("--settings")
        .arg(&settings)
        .arg("--web-addr")
        .arg(addr.to_string())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .expect("failed to run");

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().expect("failed to poll child") {
            break status;
        }
        if std::time::Instant::now() > deadline {
            let _ = child.kill();
            panic!("bot kept running without its status page");
        }
        std::thread::sleep(Duration::from_millis(50));
    };
    assert!(!status.success());

    let output = child.wait_with_output().expect("failed to collect output");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to bind status page"), "stderr: {stderr}");
}

/// The bot shuts down cleanly on SIGTERM.
#[cfg(unix)]
#[tokio::test]
async fn test_graceful_shutdown_on_sigterm() {
    use std::process::Stdio;
    use tokio::process::Command as TokioCommand;
    use tokio::time::timeout;

    let fixture = TestFixture::new();
    let settings = write_settings(&fixture);

    let mut child = TokioCommand::new(BIN)
        .arg("--settings")
        .arg(&settings)
        .arg("--no-web")
        .arg("--dry-run-handshake-ms")
        .arg("50")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn bot");

    // Let it connect and start its drivers.
    tokio::time::sleep(Duration::from_secs(1)).await;

    let pid = child.id().expect("no pid");
    let _ = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status();

    match timeout(Duration::from_secs(10), child.wait()).await {
        Ok(Ok(status)) => assert!(status.success(), "bot should exit cleanly: {status}"),
        Ok(Err(e)) => panic!("failed to wait for child: {}", e),
        Err(_) => {
            child.kill().await.expect("failed to kill");
            panic!("bot did not respond to SIGTERM within timeout");
        }
    }
}
