#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/serialrw-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn serialrw() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_serialrw"));
    cmd.arg("--log-level").arg("error");
    cmd
}

fn spawn_simulator(sock_path: &Path, extra: &[&str]) -> Child {
    let child = serialrw()
        .arg("simulate")
        .arg(sock_path)
        .args(extra)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("simulate command should start");

    let start = Instant::now();
    while !sock_path.exists() {
        assert!(
            start.elapsed() < Duration::from_secs(3),
            "simulator socket never appeared"
        );
        thread::sleep(Duration::from_millis(25));
    }
    child
}

fn wait_with_deadline(mut child: Child, timeout: Duration) -> Output {
    let start = Instant::now();
    loop {
        if child.try_wait().expect("child status").is_some() {
            return child.wait_with_output().expect("child output");
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            panic!("child did not exit in time");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout line should be JSON"))
        .collect()
}

#[test]
fn version_prints_package_version() {
    let output = serialrw().arg("version").output().expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("serialrw {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn extended_version_reports_toolchain() {
    let output = serialrw()
        .args(["version", "--extended"])
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let rustc = stdout
        .lines()
        .find_map(|line| line.strip_prefix("rustc: "))
        .expect("rustc line should be printed");
    assert!(rustc.starts_with("rustc "), "unexpected rustc line: {rustc}");
    assert!(stdout.lines().any(|line| line.starts_with("git_hash: ")));
}

#[test]
fn demo_reports_scripted_outcomes() {
    let output = serialrw()
        .args(["--format", "json", "demo", "--settle", "300ms"])
        .output()
        .expect("demo should run");

    assert!(output.status.success());
    let packets = json_lines(&output);
    assert_eq!(packets.len(), 3);

    assert_eq!(packets[0]["id"], 0);
    assert_eq!(packets[0]["state"], "RESPONSE_RECEIVED");
    assert_eq!(packets[0]["response"]["payload"], "hello2");
    assert_eq!(packets[1]["state"], "RESPONSE_RECEIVED");
    assert_eq!(packets[1]["response"]["payload"], "hello4");
    assert_eq!(packets[2]["payload"], "hello world3");
    assert_eq!(packets[2]["state"], "AWAITING_ACKNOWLEDGEMENT");
    assert!(packets[2]["response"].is_null());
}

#[test]
fn send_against_simulator_gets_echo() {
    let dir = unique_temp_dir("echo");
    let sock_path = dir.join("device.sock");
    let simulator = spawn_simulator(&sock_path, &["--count", "1"]);

    let output = serialrw()
        .args(["--format", "json", "send"])
        .arg(&sock_path)
        .args(["--data", "where are you", "--wait-timeout", "3s"])
        .output()
        .expect("send should run");

    assert!(
        output.status.success(),
        "send failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let packets = json_lines(&output);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0]["kind"], "REQUEST_POSITION");
    assert_eq!(packets[0]["state"], "RESPONSE_RECEIVED");
    assert!(packets[0]["acknowledged_after_ms"].is_u64());
    assert_eq!(packets[0]["response"]["payload"], "where are you");

    let simulator = wait_with_deadline(simulator, Duration::from_secs(3));
    assert!(simulator.status.success());
    assert!(!sock_path.exists(), "simulator should remove its socket");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unanswered_send_times_out_with_124() {
    let dir = unique_temp_dir("timeout");
    let sock_path = dir.join("device.sock");
    let mut simulator = spawn_simulator(&sock_path, &["--ack-only"]);

    let output = serialrw()
        .args(["--format", "json", "send"])
        .arg(&sock_path)
        .args(["--data", "anyone", "--response-timeout", "200ms"])
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(124));
    let packets = json_lines(&output);
    assert_eq!(packets[0]["state"], "TIMED_OUT");
    assert!(packets[0]["acknowledged_after_ms"].is_u64());
    assert!(packets[0]["response"].is_null());

    let _ = simulator.kill();
    let _ = simulator.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_to_missing_socket_fails() {
    let dir = unique_temp_dir("missing");
    let output = serialrw()
        .arg("send")
        .arg(dir.join("nobody.sock"))
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
    let _ = std::fs::remove_dir_all(&dir);
}
