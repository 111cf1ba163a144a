//! External command execution.
//!
//! Every toolchain call goes through a [`CommandRunner`]. The production
//! implementation, [`SystemRunner`], forwards the tool's output to the
//! terminal and reports only success or failure; retry policy belongs to
//! callers.

use std::fmt;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Interval between exit checks while a timeout is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One external command: program, arguments and optional working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Exempt from the runner's timeout, for foreground servers that run until interrupted.
    pub unbounded: bool,
}

impl ProcessInvocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            unbounded: false,
        }
    }

    /// Runs the command inside `dir`.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.unbounded = true;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for ProcessInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Failure of a single external command.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The program is not installed or not on PATH.
    #[error("`{program}` not found. Ensure it is installed and available on PATH")]
    NotFound { program: String },

    /// The program exists but could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("`{command}` exited with {}", describe_code(*.code))]
    Failed { command: String, code: Option<i32> },

    /// The program did not exit within the configured timeout and was killed.
    #[error("`{command}` timed out after {}s", .after.as_secs())]
    TimedOut { command: String, after: Duration },
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl ProcessError {
    fn from_spawn(invocation: &ProcessInvocation, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            ProcessError::NotFound {
                program: invocation.program.clone(),
            }
        } else {
            ProcessError::Spawn {
                command: invocation.to_string(),
                source,
            }
        }
    }
}

/// Executes external commands.
///
/// Implementations must not retry.
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion, forwarding its output.
    fn run(&self, invocation: &ProcessInvocation) -> Result<(), ProcessError>;

    /// Runs the command quietly and reports whether it succeeded.
    fn probe(&self, invocation: &ProcessInvocation) -> bool;

    /// Starts the command in the background and hands back ownership of it.
    fn spawn(&self, invocation: &ProcessInvocation) -> Result<ProcessHandle, ProcessError>;
}

/// [`CommandRunner`] backed by [`std::process::Command`].
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kills blocking commands that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn wait(
        &self,
        invocation: &ProcessInvocation,
        mut child: Child,
    ) -> Result<ExitStatus, ProcessError> {
        let wait_error = |source| ProcessError::Spawn {
            command: invocation.to_string(),
            source,
        };

        let Some(limit) = self.timeout.filter(|_| !invocation.unbounded) else {
            return child.wait().map_err(wait_error);
        };

        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = child.try_wait().map_err(wait_error)? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                warn!(command = %invocation, "timed out, killing");
                // The child may have exited between the check and the kill.
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::TimedOut {
                    command: invocation.to_string(),
                    after: limit,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &ProcessInvocation) -> Result<(), ProcessError> {
        debug!(command = %invocation, cwd = ?invocation.cwd, "running");
        let child = invocation
            .command()
            .spawn()
            .map_err(|e| ProcessError::from_spawn(invocation, e))?;
        let status = self.wait(invocation, child)?;
        if status.success() {
            Ok(())
        } else {
            Err(ProcessError::Failed {
                command: invocation.to_string(),
                code: status.code(),
            })
        }
    }

    fn probe(&self, invocation: &ProcessInvocation) -> bool {
        debug!(command = %invocation, "probing");
        let mut cmd = invocation.command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        match cmd.spawn() {
            Ok(child) => self
                .wait(invocation, child)
                .map(|status| status.success())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn spawn(&self, invocation: &ProcessInvocation) -> Result<ProcessHandle, ProcessError> {
        debug!(command = %invocation, cwd = ?invocation.cwd, "spawning in background");
        let mut cmd = invocation.command();
        cmd.stdin(Stdio::null());
        // Own process group, so stopping the handle also reaches whatever
        // the command forks (npm -> sh -> node).
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut cmd, 0);
        let child = cmd
            .spawn()
            .map_err(|e| ProcessError::from_spawn(invocation, e))?;
        Ok(ProcessHandle {
            description: invocation.to_string(),
            child: Some(child),
        })
    }
}

/// Owned background process. The child is killed when the handle is dropped.
#[derive(Debug)]
pub struct ProcessHandle {
    description: String,
    child: Option<Child>,
}

impl ProcessHandle {
    /// A handle that owns no OS process, for runners that do not spawn anything.
    pub fn inert(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            child: None,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Returns `false` once the process has exited.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Exit status if the process has already exited.
    pub fn try_status(&mut self) -> Option<ExitStatus> {
        self.child.as_mut().and_then(|child| child.try_wait().ok().flatten())
    }

    /// Kills the process and everything in its process group, then reaps it.
    ///
    /// The group is signalled even when the direct child already exited:
    /// its descendants may still hold ports.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            debug!(command = %self.description, "stopping background process");
            kill_group(&mut child);
            let _ = child.wait();
        }
    }
}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    // The child leads its group (see `SystemRunner::spawn`); ESRCH means
    // the whole group is already gone.
    if let Err(errno) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
        debug!(pid = child.id(), %errno, "killpg failed, killing child only");
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
