//! Single-shot command execution without a PTY
//!
//! Runs a process to completion with separate stdout/stderr pipes and an
//! optional deadline. The deadline covers both the exit and draining the
//! pipes, which background grandchildren can hold open. On expiry the child's
//! process group is killed and the child reaped before the timeout error is
//! returned.

use crate::error::{Error, Result};
#[cfg(unix)]
use crate::pty::signals;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Options for [`run_to_completion`]
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Working directory; inherited when unset
    pub cwd: Option<PathBuf>,
    /// Deadline for the whole run; none means wait indefinitely
    pub timeout: Option<Duration>,
    /// Variables set on top of the inherited environment
    pub env: HashMap<String, String>,
}

impl RunOptions {
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Buffered result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was ended by a signal
    pub exit_code: Option<i32>,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run `executable` with `args`, buffering all output.
///
/// A non-zero exit is returned as data. Fails with [`Error::CommandNotFound`]
/// when the executable does not exist and [`Error::CommandTimeout`] when the
/// deadline passes first.
pub async fn run_to_completion(
    executable: &str,
    args: &[String],
    options: RunOptions,
) -> Result<RunOutput> {
    if executable.trim().is_empty() {
        return Err(Error::EmptyCommand);
    }

    let mut command = Command::new(executable);
    command
        .args(args)
        .envs(&options.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &options.cwd {
        command.current_dir(cwd);
    }
    // Own group, so a timeout can reach whatever the child spawned
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::CommandNotFound {
            command: executable.to_string(),
        },
        _ => Error::CommandSpawnFailed {
            command: executable.to_string(),
            reason: e.to_string(),
        },
    })?;
    let pid = child.id();
    debug!(executable, ?pid, "Single-shot command started");

    let mut stdout = collect(child.stdout.take());
    let mut stderr = collect(child.stderr.take());

    let finished = finish(&mut child, &mut stdout, &mut stderr);
    let outcome = match options.timeout {
        Some(limit) => timeout(limit, finished).await.map_err(|_| limit),
        None => Ok(finished.await),
    };

    match outcome {
        Ok(result) => result,
        Err(limit) => {
            warn!(executable, ?limit, "Command timed out, killing it");
            kill_tree(executable, &mut child, pid).await;
            stdout.abort();
            stderr.abort();
            Err(Error::CommandTimeout {
                command: executable.to_string(),
                duration: limit,
            })
        }
    }
}

/// Wait for exit, then for both pipes to reach EOF
async fn finish(
    child: &mut Child,
    stdout: &mut JoinHandle<Vec<u8>>,
    stderr: &mut JoinHandle<Vec<u8>>,
) -> Result<RunOutput> {
    let status = child.wait().await?;
    let stdout = stdout.await.unwrap_or_default();
    let stderr = stderr.await.unwrap_or_default();

    Ok(RunOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code: status.code(),
    })
}

async fn kill_tree(executable: &str, child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        if let Err(e) = signals::kill_process_group(pid) {
            debug!(executable, pid, "Process group not killed: {}", e);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    // Already reaped when only a grandchild held the pipes
    if let Err(e) = child.kill().await {
        debug!(executable, "Kill after timeout: {}", e);
    }
}

fn collect<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                debug!("Pipe read ended early: {}", e);
            }
        }
        buf
    })
}

/// Executor with a fixed working directory, environment and default timeout
pub struct DirectExecutor {
    working_dir: PathBuf,
    env_vars: HashMap<String, String>,
    default_timeout: Duration,
}

impl DirectExecutor {
    pub fn new() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            env_vars: HashMap::new(),
            default_timeout: Duration::from_secs(30),
        }
    }

    /// Run with this executor's directory, environment and timeout
    pub async fn run(&self, executable: &str, args: &[String]) -> Result<RunOutput> {
        let options = RunOptions {
            cwd: Some(self.working_dir.clone()),
            timeout: Some(self.default_timeout),
            env: self.env_vars.clone(),
        };
        run_to_completion(executable, args, options).await
    }

    /// Split a command line on whitespace and run it
    pub async fn run_line(&self, line: &str) -> Result<RunOutput> {
        let mut parts = line.split_whitespace();
        let executable = parts.next().ok_or(Error::EmptyCommand)?;
        let args: Vec<String> = parts.map(str::to_string).collect();
        self.run(executable, &args).await
    }

    pub fn working_dir(&self) -> &PathBuf {
        &self.working_dir
    }

    pub fn set_working_dir(&mut self, dir: PathBuf) {
        self.working_dir = dir;
    }

    pub fn set_env(&mut self, key: String, value: String) {
        self.env_vars.insert(key, value);
    }

    pub fn set_default_timeout(&mut self, timeout: Duration) {
        self.default_timeout = timeout;
    }
}

impl Default for DirectExecutor {
    fn default() -> Self {
        Self::new()
    }
}
