//! Integration tests for yago
//!
//! These tests drive the CLI end to end: configuration, offline replay, and a
//! live watch against the scripted mock backend over loopback.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const HAPPY_PATH: &str = r#"{"type":"progress","percent":10,"status":"executing","message":"starting"}
{"type":"log","message":"Installing deps","level":"info"}
not even json
{"type":"progress","percent":60,"status":"executing","message":"midway"}
{"type":"completion","success":true,"data":{"files":12}}
{"type":"log","message":"after the end","level":"info"}
"#;

const FAILING: &str = r#"{"type":"progress","percent":40,"status":"executing","message":"tests"}
{"type":"error","message":"3 tests failed"}
{"type":"completion","success":false,"data":{"error":"tests failed"}}
"#;

/// Helper to create a yago Command with environment overrides cleared
fn yago() -> Command {
    let mut cmd = cargo_bin_cmd!("yago");
    cmd.env_remove("YAGO_BACKEND_URL")
        .env_remove("YAGO_CONNECT_TIMEOUT_SECS")
        .env_remove("YAGO_MAX_RECONNECTS")
        .env_remove("RUST_LOG");
    cmd
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

fn write_config(dir: &TempDir, content: &str) {
    let yago_dir = dir.path().join(".yago");
    fs::create_dir_all(&yago_dir).unwrap();
    fs::write(yago_dir.join("yago.toml"), content).unwrap();
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_yago_help() {
        yago()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("watch"))
            .stdout(predicate::str::contains("mock-backend"));
    }

    #[test]
    fn test_yago_version() {
        yago().arg("--version").assert().success();
    }

    #[test]
    fn test_watch_requires_session_id() {
        yago().arg("watch").assert().failure();
    }

    #[test]
    fn test_watch_rejects_blank_session_id() {
        let dir = create_temp_project();
        yago()
            .current_dir(dir.path())
            .args(["watch", "   "])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid session id"));
    }
}

// =============================================================================
// Configuration Tests
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();
        yago()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No yago.toml found"))
            .stdout(predicate::str::contains("ws://127.0.0.1:8000/ws/{session}"));
    }

    #[test]
    fn test_config_init_creates_toml() {
        let dir = create_temp_project();
        yago()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created yago.toml"));

        let content = fs::read_to_string(dir.path().join(".yago/yago.toml")).unwrap();
        assert!(content.contains("[backend]"));
        assert!(content.contains("[reconnect]"));

        yago()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_validate_no_config() {
        let dir = create_temp_project();
        yago()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using defaults (valid)"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        write_config(
            &dir,
            r#"
[backend]
url = "http://localhost:8000/ws/{session}"

[session]
ui = "fancy"
"#,
        );
        yago()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings"))
            .stdout(predicate::str::contains("ws://"))
            .stdout(predicate::str::contains("session.ui"));
    }

    #[test]
    fn test_config_show_reads_file_and_env() {
        let dir = create_temp_project();
        write_config(&dir, "[reconnect]\nmax_attempts = 9\n");
        yago()
            .current_dir(dir.path())
            .env("YAGO_BACKEND_URL", "wss://env.example/ws/{session}")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("max_attempts = 9"))
            .stdout(predicate::str::contains("wss://env.example/ws/{session}"));
    }
}

// =============================================================================
// Replay Tests
// =============================================================================

mod replay {
    use super::*;

    #[test]
    fn test_replay_successful_session() {
        let dir = create_temp_project();
        let frames = dir.path().join("proj-42.jsonl");
        fs::write(&frames, HAPPY_PATH).unwrap();

        yago()
            .current_dir(dir.path())
            .args(["replay", "proj-42.jsonl", "--ui", "minimal"])
            .assert()
            .success()
            .stdout(predicate::str::contains("info: Installing deps"))
            .stdout(predicate::str::contains("100% executing midway"))
            .stdout(predicate::str::contains("completion: ok"))
            .stdout(predicate::str::contains("after the end").not())
            .stdout(predicate::str::contains(
                "Replayed 6 frames (1 malformed, 1 ignored after completion)",
            ));
    }

    #[test]
    fn test_replay_failed_session_exits_nonzero() {
        let dir = create_temp_project();
        let frames = dir.path().join("failing.jsonl");
        fs::write(&frames, FAILING).unwrap();

        yago()
            .current_dir(dir.path())
            .args(["replay", "failing.jsonl", "--ui", "minimal"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("error 3 tests failed"))
            .stdout(predicate::str::contains("Done: failed"));
    }

    #[test]
    fn test_replay_json_mode_emits_json_lines() {
        let dir = create_temp_project();
        let frames = dir.path().join("proj-42.jsonl");
        fs::write(&frames, HAPPY_PATH).unwrap();

        let output = yago()
            .current_dir(dir.path())
            .args(["replay", "proj-42.jsonl", "--ui", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8(output.stdout).unwrap();
        let events: Vec<serde_json::Value> = stdout
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert!(events.iter().any(|e| e["type"] == "log" && e["text"] == "Installing deps"));
        assert!(events
            .iter()
            .any(|e| e["type"] == "completion" && e["result"]["files"] == 12));
    }

    #[test]
    fn test_replay_missing_file() {
        let dir = create_temp_project();
        yago()
            .current_dir(dir.path())
            .args(["replay", "missing.jsonl"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read frame file"));
    }
}

// =============================================================================
// Live Watch Tests
// =============================================================================

mod live {
    use super::*;
    use std::net::{TcpListener, TcpStream};
    use std::process::{Child, Stdio};
    use std::time::{Duration, Instant};

    struct KillOnDrop(Child);

    impl Drop for KillOnDrop {
        fn drop(&mut self) {
            let _ = self.0.kill();
            let _ = self.0.wait();
        }
    }

    fn free_port() -> Option<u16> {
        let listener = TcpListener::bind("127.0.0.1:0").ok()?;
        Some(listener.local_addr().ok()?.port())
    }

    fn wait_for_port(port: u16, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if TcpStream::connect(("127.0.0.1", port)).is_ok() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        false
    }

    #[test]
    fn test_watch_unreachable_backend_gives_up() {
        let dir = create_temp_project();
        write_config(
            &dir,
            r#"
[connection]
connect_timeout_secs = 2

[reconnect]
enabled = false
"#,
        );

        yago()
            .current_dir(dir.path())
            .args([
                "watch",
                "proj-42",
                "--url",
                "ws://127.0.0.1:9/ws/{session}",
                "--ui",
                "minimal",
            ])
            .timeout(Duration::from_secs(30))
            .assert()
            .code(1)
            .stdout(predicate::str::contains("transport:"))
            .stdout(predicate::str::contains("Done: disconnected"));
    }

    #[test]
    fn test_watch_against_mock_backend() {
        let Some(port) = free_port() else {
            eprintln!("Skipping test_watch_against_mock_backend (sandbox): cannot bind");
            return;
        };
        let dir = create_temp_project();
        let script = dir.path().join("script.jsonl");
        fs::write(&script, HAPPY_PATH).unwrap();

        let child = std::process::Command::new(env!("CARGO_BIN_EXE_yago"))
            .current_dir(dir.path())
            .args([
                "mock-backend",
                "--port",
                &port.to_string(),
                "--script",
                "script.jsonl",
                "--delay-ms",
                "20",
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let _backend = KillOnDrop(child);

        if !wait_for_port(port, Duration::from_secs(10)) {
            eprintln!("Skipping test_watch_against_mock_backend (sandbox): backend never listened");
            return;
        }

        let url = format!("ws://127.0.0.1:{}/ws/{{session}}", port);
        yago()
            .current_dir(dir.path())
            .args(["watch", "proj-42", "--url", &url, "--ui", "minimal"])
            .timeout(Duration::from_secs(30))
            .assert()
            .success()
            .stdout(predicate::str::contains("[connected]"))
            .stdout(predicate::str::contains("info: Installing deps"))
            .stdout(predicate::str::contains("100% executing midway"))
            .stdout(predicate::str::contains("Done: success"));
    }
}
