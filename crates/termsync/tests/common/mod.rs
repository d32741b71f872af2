#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub const EXIT_USAGE: i32 = 64;
pub const EXIT_CANTCREAT: i32 = 73;
pub const EXIT_IOERR: i32 = 74;

pub fn termsync_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("termsync"))
}

/// A private socket directory so tests never meet a real hub.
pub struct TestEnv {
    _temp_dir: TempDir,
    pub socket_path: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new_in("/tmp").expect("Failed to create temp dir");
        let socket_path = temp_dir.path().join("hub.sock");
        Self {
            _temp_dir: temp_dir,
            socket_path,
        }
    }

    pub fn cli(&self) -> Command {
        let mut cmd = termsync_cmd();
        cmd.env("TERMSYNC_SOCKET", &self.socket_path)
            .env("TERMSYNC_TMUX_SOCKET", tmux_socket_name(&self.socket_path))
            .env("TERMSYNC_BACKEND_URL", "http://127.0.0.1:9")
            .env("NO_COLOR", "1")
            .env_remove("TERMSYNC_WINDOW_ID")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Starts `termsync hub` and waits for its socket.
    pub fn start_hub(&self) -> HubProcess {
        let child = std::process::Command::new(assert_cmd::cargo::cargo_bin!("termsync"))
            .arg("hub")
            .env("TERMSYNC_SOCKET", &self.socket_path)
            .env("NO_COLOR", "1")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to start hub");
        let hub = HubProcess { child };
        wait_for_path(&self.socket_path, Duration::from_secs(5));
        hub
    }
}

pub struct HubProcess {
    child: Child,
}

impl Drop for HubProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn tmux_socket_name(socket_path: &Path) -> String {
    let tag = socket_path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "termsync-test".to_string());
    format!("termsync-test-{}", tag)
}

pub fn wait_for_path(path: &Path, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while !path.exists() {
        assert!(
            Instant::now() < deadline,
            "{} did not appear within {:?}",
            path.display(),
            timeout
        );
        thread::sleep(Duration::from_millis(20));
    }
}
