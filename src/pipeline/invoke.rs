//! Bounded subprocess execution.
//!
//! [`ToolCommand`] is a small builder over `tokio::process::Command` that
//! always captures both output streams and always enforces a timeout. One
//! deadline covers the wait *and* draining the pipes, so a background job
//! that inherits them cannot hold the request open. On Unix the tool runs
//! in its own process group and the whole group is killed when the
//! deadline passes, when the child exits but leaves the pipes open, or when
//! the calling task is cancelled.

use scopeguard::ScopeGuard;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Why a [`ToolCommand`] did not produce a [`ToolOutput`].
#[derive(Debug)]
pub enum RunError {
    /// The program could not be started (missing, not executable, ...).
    Spawn(std::io::Error),
    /// Waiting on the child failed.
    Wait(std::io::Error),
    /// The child ran past the timeout and was killed.
    TimedOut,
}

/// Exit status and captured output of a finished subprocess.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// stderr if it has anything to say, otherwise stdout.
    pub fn diagnostics(&self) -> String {
        let err = self.stderr.trim();
        if err.is_empty() {
            self.stdout.trim().to_string()
        } else {
            err.to_string()
        }
    }
}

/// Builder for one external-tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Spawn, wait up to the timeout, and collect output.
    pub async fn run(self) -> Result<ToolOutput, RunError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(RunError::Spawn)?;
        let pid = child.id();
        debug!(program = %self.program.display(), ?pid, "spawned");

        // Dropped before `child`, so a cancelled run takes the group down too.
        let group = scopeguard::guard(pid, kill_group);

        let deadline = Instant::now() + self.timeout;
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit = None;

        // Drain both pipes alongside the wait so a chatty child cannot fill
        // one and block forever.
        let finished = tokio::time::timeout_at(deadline, async {
            tokio::join!(
                async { exit = Some(child.wait().await) },
                drain(stdout_pipe, &mut stdout, "stdout"),
                drain(stderr_pipe, &mut stderr, "stderr"),
            )
        })
        .await
        .is_ok();

        match exit {
            Some(Ok(status)) => {
                if finished {
                    ScopeGuard::into_inner(group);
                } else {
                    warn!(
                        program = %self.program.display(),
                        ?pid,
                        timeout_secs = self.timeout.as_secs(),
                        "exited but left its output pipes open, killing what remains"
                    );
                    kill_group(ScopeGuard::into_inner(group));
                }
                Ok(ToolOutput {
                    status,
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                })
            }
            Some(Err(e)) => Err(RunError::Wait(e)),
            None => {
                warn!(
                    program = %self.program.display(),
                    ?pid,
                    timeout_secs = self.timeout.as_secs(),
                    "timed out, killing"
                );
                kill_group(ScopeGuard::into_inner(group));
                if let Err(e) = child.kill().await {
                    warn!(?pid, "failed to kill timed-out child: {e}");
                }
                Err(RunError::TimedOut)
            }
        }
    }
}

/// Append everything `pipe` yields to `buf`. Bytes read before the future is
/// dropped stay in `buf`.
async fn drain<R>(pipe: Option<R>, buf: &mut Vec<u8>, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else { return };
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) => {
                debug!(stream, "failed to read tool output: {e}");
                return;
            }
        }
    }
}

/// SIGKILL the process group led by `pid`. A group that is already gone is
/// not an error.
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => debug!(pgid, "killed process group"),
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid, "failed to kill process group: {e}"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}
