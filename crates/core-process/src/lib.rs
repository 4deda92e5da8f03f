//! Shell command execution with out-of-band cancellation.
//!
//! [`ProcessRunner::run`] spawns one command through the configured shell,
//! reads stdout and stderr concurrently in chunks, and resolves once both
//! pipes close and the child is reaped. A [`CancelHandle`] obtained before
//! awaiting the run can stop it from elsewhere: the child is killed, the pipes
//! get a short grace period to flush, and whatever was captured up to that
//! point is returned with `cancelled = true`.
//!
//! Launch failures never surface as errors. They come back as a normal
//! [`RunOutput`] with exit code `-1` and the failure text on stderr.

use core_config::ShellCommand;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Grace period for pipe readers after a cancelled child is killed.
pub const CANCEL_DRAIN: Duration = Duration::from_millis(200);

const READ_CHUNK: usize = 4_096;

/// Exit code reported when the shell itself could not be launched.
pub const SPAWN_FAILED_EXIT: i32 = -1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    /// `None` when the child was cancelled or terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub cancelled: bool,
}

impl RunOutput {
    pub fn spawn_failed(program: &str, err: &std::io::Error) -> Self {
        Self {
            exit_code: Some(SPAWN_FAILED_EXIT),
            stdout: String::new(),
            stderr: format!("Failed to spawn process {program}: {err}\n"),
            cancelled: false,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Text shown to the user: stdout alone on success, otherwise stdout followed by stderr.
    pub fn combined(&self) -> String {
        if self.succeeded() {
            self.stdout.clone()
        } else {
            let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
            out.push_str(&self.stdout);
            out.push_str(&self.stderr);
            out
        }
    }
}

type ActiveSlot = Arc<Mutex<Option<Arc<Notify>>>>;

/// Cloneable handle that stops the runner's in-flight process, if any.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    active: ActiveSlot,
}

impl CancelHandle {
    /// Request termination of the active process. Returns false when nothing was running.
    /// Calling it repeatedly is harmless.
    pub fn cancel(&self) -> bool {
        let signal = match self.active.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        match signal {
            Some(notify) => {
                notify.notify_one();
                core_events::COMMANDS_CANCELLED.fetch_add(1, Ordering::Relaxed);
                info!(target: "process", "cancel_requested");
                true
            }
            None => {
                debug!(target: "process", "cancel_ignored_idle");
                false
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }
}

/// Clears the active slot when a run ends, whichever way it ends.
struct ActiveGuard {
    active: ActiveSlot,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.active.lock() {
            slot.take();
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    shell: ShellCommand,
    active: ActiveSlot,
}

impl ProcessRunner {
    pub fn new(shell: ShellCommand) -> Self {
        Self {
            shell,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn shell(&self) -> &ShellCommand {
        &self.shell
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            active: self.active.clone(),
        }
    }

    pub fn cancel(&self) -> bool {
        self.cancel_handle().cancel()
    }

    pub fn is_active(&self) -> bool {
        self.cancel_handle().is_active()
    }

    /// Run `command` through the shell inside `cwd` and collect its output.
    ///
    /// Only one run per runner is expected at a time; the command loop enforces that.
    pub async fn run(&self, command: &str, cwd: &Path) -> RunOutput {
        self.start(command, cwd).await
    }

    /// Arm the cancel slot now and return the run as a future.
    ///
    /// A cancel issued after `start` returns is honored even if the future has
    /// not been polled yet: the child is killed as soon as it is spawned.
    pub fn start(
        &self,
        command: &str,
        cwd: &Path,
    ) -> impl Future<Output = RunOutput> + Send + 'static {
        let signal = Arc::new(Notify::new());
        if let Ok(mut slot) = self.active.lock() {
            *slot = Some(signal.clone());
        }
        let guard = ActiveGuard {
            active: self.active.clone(),
        };
        let shell = self.shell.clone();
        let command = command.to_string();
        let cwd = cwd.to_path_buf();
        async move {
            let _guard = guard;
            execute(&shell, &command, &cwd, signal).await
        }
    }
}

async fn execute(
    shell: &ShellCommand,
    command: &str,
    cwd: &Path,
    signal: Arc<Notify>,
) -> RunOutput {
    let mut cmd = Command::new(&shell.program);
    cmd.args(&shell.args)
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so a cancel reaches everything the shell started.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(target: "process", program = %shell.program, error = %e, "process_spawn_failed");
            return RunOutput::spawn_failed(&shell.program, &e);
        }
    };
    debug!(target: "process", pid = ?child.id(), cmd_len = command.len(), "process_spawned");

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();

    let mut cancelled = {
        let drain = async {
            tokio::join!(
                read_chunks(stdout, &mut out_buf),
                read_chunks(stderr, &mut err_buf)
            )
        };
        tokio::pin!(drain);
        let cancelled = tokio::select! {
            _ = &mut drain => false,
            _ = signal.notified() => true,
        };
        if cancelled {
            kill_tree(&mut child);
            // Descendants may still hold the pipes open; bound the flush.
            if tokio::time::timeout(CANCEL_DRAIN, &mut drain).await.is_err() {
                debug!(target: "process", "cancel_drain_timeout");
            }
        }
        cancelled
    };

    let exit_code = if cancelled {
        let _ = child.wait().await;
        None
    } else {
        tokio::select! {
            status = child.wait() => match status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(target: "process", error = %e, "process_wait_failed");
                    None
                }
            },
            _ = signal.notified() => {
                cancelled = true;
                kill_tree(&mut child);
                let _ = child.wait().await;
                None
            }
        }
    };

    let output = RunOutput {
        exit_code: if cancelled { None } else { exit_code },
        stdout: String::from_utf8_lossy(&out_buf).into_owned(),
        stderr: String::from_utf8_lossy(&err_buf).into_owned(),
        cancelled,
    };
    info!(
        target: "process",
        exit_code = ?output.exit_code,
        cancelled,
        stdout_bytes = out_buf.len(),
        stderr_bytes = err_buf.len(),
        "process_finished"
    );
    output
}

/// Kill the child and, on unix, every process in its group.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;
        if let Some(pid) = child.id() {
            match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                Ok(()) => return,
                Err(e) => debug!(target: "process", pid, error = %e, "killpg_failed"),
            }
        }
    }
    if let Err(e) = child.start_kill() {
        debug!(target: "process", error = %e, "kill_failed");
    }
}

async fn read_chunks<R>(reader: Option<R>, sink: &mut Vec<u8>)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return;
    };
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => sink.extend_from_slice(&chunk[..n]),
            Err(e) => {
                debug!(target: "process", error = %e, "pipe_read_failed");
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sh() -> ProcessRunner {
        ProcessRunner::new(ShellCommand {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string()],
        })
    }

    #[tokio::test]
    async fn echo_succeeds_with_stdout_only() {
        let dir = tempfile::tempdir().unwrap();
        let out = sh().run("echo hi", dir.path()).await;
        assert_eq!(out.exit_code, Some(0));
        assert_eq!(out.combined(), "hi\n");
        assert!(!out.cancelled);
    }

    #[tokio::test]
    async fn success_hides_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let out = sh().run("echo out; echo warn >&2", dir.path()).await;
        assert_eq!(out.stderr, "warn\n");
        assert_eq!(out.combined(), "out\n");
    }

    #[tokio::test]
    async fn failure_shows_stdout_then_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let out = sh()
            .run("echo err >&2; echo out; exit 3", dir.path())
            .await;
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.combined(), "out\nerr\n");
    }

    #[tokio::test]
    async fn runs_inside_given_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let out = sh().run("ls", dir.path()).await;
        assert!(out.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn unknown_command_is_shell_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = sh()
            .run("definitely_not_a_command_4242", dir.path())
            .await;
        assert_eq!(out.exit_code, Some(127));
        assert!(!out.combined().is_empty());
    }

    #[tokio::test]
    async fn missing_shell_reports_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(ShellCommand {
            program: "/nonexistent/shell-4242".to_string(),
            args: vec![],
        });
        let out = runner.run("echo hi", dir.path()).await;
        assert_eq!(out.exit_code, Some(SPAWN_FAILED_EXIT));
        assert!(out.combined().starts_with("Failed to spawn process"));
        assert!(!runner.is_active());
    }

    #[tokio::test]
    async fn cancel_keeps_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = sh();
        let handle = runner.cancel_handle();
        let path = dir.path().to_path_buf();
        let task =
            tokio::spawn(async move { runner.run("echo partial; exec sleep 30", &path).await });
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(handle.is_active());
        assert!(handle.cancel());
        let out = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(out.cancelled);
        assert_eq!(out.exit_code, None);
        assert_eq!(out.combined(), "partial\n");
        assert!(!handle.is_active());
    }

    #[tokio::test]
    async fn cancel_before_first_poll_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let runner = sh();
        let run = runner.start("sleep 30", dir.path());
        assert!(runner.is_active());
        assert!(runner.cancel());
        let out = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap();
        assert!(out.cancelled);
        assert_eq!(out.exit_code, None);
        assert!(!runner.is_active());
    }

    fn is_running(pid: i32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            // reaped-pending zombies are already dead
            Ok(stat) => !stat.contains(") Z"),
            Err(_) => nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok(),
        }
    }

    #[tokio::test]
    async fn cancel_kills_the_whole_command_tree() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("sleep.pid");
        let runner = sh();
        let handle = runner.cancel_handle();
        let run = runner.start("sleep 4242 & echo $! > sleep.pid; wait; echo done", dir.path());
        let task = tokio::spawn(run);

        let mut pid = None;
        for _ in 0..100 {
            if let Ok(text) = std::fs::read_to_string(&pid_file)
                && let Ok(p) = text.trim().parse::<i32>()
            {
                pid = Some(p);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let pid = pid.expect("background sleep started");
        assert!(is_running(pid));

        assert!(handle.cancel());
        let out = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(out.cancelled);
        assert!(!out.stdout.contains("done"));

        let mut gone = false;
        for _ in 0..150 {
            if !is_running(pid) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(gone, "sleep {pid} outlived the cancelled command");
    }

    #[tokio::test]
    async fn cancel_when_idle_is_noop() {
        let runner = sh();
        assert!(!runner.cancel());
        assert!(!runner.cancel());
    }
}
