//! System operations: shell execution and host information.

use famulus_types::OpOutcome;
use serde_json::json;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Default)]
pub struct SystemOps;

impl SystemOps {
    /// Run a shell command with a hard timeout. A timed-out command is
    /// killed and reported as a failure envelope; there is no early
    /// cancellation short of the deadline.
    pub fn run_command(&self, command: &str, timeout_secs: u64) -> OpOutcome {
        debug!(target: "famulus::ops", op = "run_command", command);

        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        };

        let mut child = match cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return OpOutcome::fail(format!("Error spawning command: {e}")),
        };

        // Drain the pipes off-thread so a chatty child cannot deadlock on
        // a full pipe buffer while we poll for exit.
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let deadline = Instant::now() + Duration::from_secs(timeout_secs);
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        join_reader(stdout);
                        join_reader(stderr);
                        return OpOutcome::fail(format!(
                            "Command timed out after {timeout_secs}s: {command}"
                        ));
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
                Err(e) => {
                    join_reader(stdout);
                    join_reader(stderr);
                    return OpOutcome::fail(format!("Error waiting for command: {e}"));
                }
            }
        };

        let stdout = join_reader(stdout);
        let stderr = join_reader(stderr);
        let code = status.code().unwrap_or(-1);

        if status.success() {
            OpOutcome::ok_with(
                format!("Command executed successfully:\n{stdout}"),
                json!({"exit_code": code, "stdout": stdout, "stderr": stderr}),
            )
        } else {
            OpOutcome::fail(format!(
                "Command failed with exit code {code}:\n{stderr}"
            ))
        }
    }

    /// Host description: OS, architecture, CPU count, working directory.
    pub fn system_info(&self) -> OpOutcome {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let cwd = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let summary = format!(
            "os={} arch={} family={} cpus={} cwd={}",
            std::env::consts::OS,
            std::env::consts::ARCH,
            std::env::consts::FAMILY,
            cpus,
            cwd,
        );
        OpOutcome::ok_with(
            summary,
            json!({
                "os": std::env::consts::OS,
                "arch": std::env::consts::ARCH,
                "family": std::env::consts::FAMILY,
                "cpus": cpus,
                "cwd": cwd,
            }),
        )
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = pipe.read_to_string(&mut buf);
        buf
    })
}

fn join_reader(handle: Option<std::thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
