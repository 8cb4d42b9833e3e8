//! Subprocess supervision for backend MCP servers the gateway launches
//! directly: stdio backends, and SSE backends that request a local launch.
//!
//! Mirrors a narrow contract: spawn with an overlaid environment, stream
//! stdout/stderr into the log at `info` until EOF, and terminate with a
//! SIGTERM-then-SIGKILL sequence bounded by a grace period.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[cfg(unix)]
use std::os::unix::process::CommandExt;

/// How long [`SupervisedProcess::terminate`] waits for a graceful exit
/// after SIGTERM before escalating to SIGKILL.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(3);

/// A child process the gateway owns: a stdio backend itself, or the
/// locally-launched process fronting an SSE backend.
pub struct SupervisedProcess {
    name: String,
    child: Child,
    stdout_task: Option<JoinHandle<()>>,
    stderr_task: Option<JoinHandle<()>>,
}

impl SupervisedProcess {
    /// Spawn `command args…` with `env` overlaid on the gateway's own
    /// environment, piping stdout/stderr into line-logged background tasks.
    /// Returns the child with stdin/stdout left for the caller to claim,
    /// e.g. to hand to an MCP transport.
    pub fn spawn(
        name: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> anyhow::Result<Self> {
        let resolved = resolve_interpreter(command);

        let mut cmd = Command::new(&resolved);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        info!(server = name, command = %resolved, ?args, "spawning backend process");
        let mut child = cmd.spawn()?;
        let pid = child.id();
        info!(server = name, pid, "backend process spawned");

        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| spawn_log_reader(name.to_string(), "stderr", stderr));

        Ok(Self {
            name: name.to_string(),
            child,
            stdout_task: None,
            stderr_task,
        })
    }

    /// Take ownership of the child's stdin/stdout for use by a transport,
    /// leaving this struct free to only supervise the process lifecycle.
    pub fn take_stdio(&mut self) -> Option<(tokio::process::ChildStdin, tokio::process::ChildStdout)> {
        match (self.child.stdin.take(), self.child.stdout.take()) {
            (Some(stdin), Some(stdout)) => Some((stdin, stdout)),
            _ => None,
        }
    }

    /// Start logging stdout as well; call only if the transport did not
    /// claim it via [`Self::take_stdio`].
    pub fn log_stdout(&mut self) {
        if let Some(stdout) = self.child.stdout.take() {
            self.stdout_task = Some(spawn_log_reader(self.name.clone(), "stdout", stdout));
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// SIGTERM, wait up to [`TERMINATE_GRACE`], then SIGKILL on timeout.
    /// A process that has already exited is not an error.
    pub async fn terminate(&mut self) -> anyhow::Result<()> {
        let name = self.name.clone();

        if let Ok(Some(status)) = self.child.try_wait() {
            debug!(server = %name, %status, "process already exited before terminate");
            self.join_log_tasks().await;
            return Ok(());
        }

        let Some(pid) = self.child.id() else {
            debug!(server = %name, "no pid available, assuming process already gone");
            self.join_log_tasks().await;
            return Ok(());
        };

        info!(server = %name, pid, "terminating backend process");
        send_signal(pid, libc::SIGTERM);

        match tokio::time::timeout(TERMINATE_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(server = %name, %status, "backend process terminated");
            }
            Ok(Err(err)) => {
                warn!(server = %name, error = %err, "error waiting on backend process");
            }
            Err(_) => {
                warn!(server = %name, pid, "terminate grace period elapsed, sending SIGKILL");
                if let Err(err) = self.child.kill().await {
                    warn!(server = %name, error = %err, "failed to kill backend process");
                }
                let _ = self.child.wait().await;
            }
        }

        self.join_log_tasks().await;
        Ok(())
    }

    async fn join_log_tasks(&mut self) {
        if let Some(task) = self.stdout_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.stderr_task.take() {
            let _ = task.await;
        }
    }
}

fn send_signal(pid: u32, signal: i32) {
    // SAFETY: sending a signal to a pid we own is always safe; a missing
    // process (ESRCH) is a benign race with the process exiting on its own.
    unsafe {
        libc::kill(pid as libc::pid_t, signal);
    }
}

/// The original gateway resolved a bare `"python"` command against the
/// interpreter actually on PATH rather than relying on whatever `python`
/// happens to mean in the spawning shell; `python3` is the closest
/// equivalent available without inspecting `sys.executable` equivalents.
fn resolve_interpreter(command: &str) -> String {
    if command.eq_ignore_ascii_case("python") {
        "python3".to_string()
    } else {
        command.to_string()
    }
}

fn spawn_log_reader(
    name: String,
    stream_name: &'static str,
    stream: impl tokio::io::AsyncRead + Unpin + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        info!(server = %name, stream = stream_name, "{line}");
                    }
                }
                Ok(None) => {
                    debug!(server = %name, stream = stream_name, "stream closed");
                    break;
                }
                Err(err) => {
                    warn!(server = %name, stream = stream_name, error = %err, "error reading stream");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_bare_python_to_python3() {
        assert_eq!(resolve_interpreter("python"), "python3");
        assert_eq!(resolve_interpreter("Python"), "python3");
    }

    #[test]
    fn leaves_other_commands_untouched() {
        assert_eq!(resolve_interpreter("node"), "node");
        assert_eq!(resolve_interpreter("/usr/bin/python3"), "/usr/bin/python3");
    }

    #[tokio::test]
    async fn spawn_and_terminate_a_real_process() {
        let mut proc = SupervisedProcess::spawn(
            "sleeper",
            "sleep",
            &["5".to_string()],
            &HashMap::new(),
        )
        .unwrap();
        assert!(proc.pid().is_some());
        proc.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn terminate_after_natural_exit_is_not_an_error() {
        let mut proc =
            SupervisedProcess::spawn("true-runner", "true", &[], &HashMap::new()).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        proc.terminate().await.unwrap();
    }
}
