//! PTY Signal Handling
//!
//! Signals delivered to PTY children by pid. Graceful stop mirrors a closed
//! terminal (SIGHUP) followed by SIGTERM; force stop is SIGKILL.

use crate::error::Result;
use crate::platform::Platform;

/// Signal types that can be sent to PTY processes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Hangup signal
    Hangup,
    /// Termination signal (graceful shutdown)
    Terminate,
    /// Kill signal (forceful termination)
    Kill,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Hangup => "SIGHUP",
            Signal::Terminate => "SIGTERM",
            Signal::Kill => "SIGKILL",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Send `signal` to `pid` through the platform signal layer
pub async fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    let signals = Platform::signals();
    let result = match signal {
        Signal::Hangup => signals.send_hangup(pid).await,
        Signal::Terminate => signals.send_terminate(pid).await,
        Signal::Kill => signals.send_kill(pid),
    };

    match &result {
        Ok(()) => debug!(pid, %signal, "Sent signal"),
        Err(e) => debug!(pid, %signal, "Signal not delivered: {}", e),
    }
    result
}

/// Ask `pid` to exit: SIGHUP, then SIGTERM.
///
/// Returns the first delivery error; a child that exits on SIGHUP makes the
/// SIGTERM fail with ESRCH, which is not reported.
pub async fn request_termination(pid: u32) -> Result<()> {
    send_signal(pid, Signal::Hangup).await?;
    if let Err(e) = send_signal(pid, Signal::Terminate).await {
        if is_process_running(pid) {
            return Err(e);
        }
    }
    Ok(())
}

/// SIGKILL `pid` without awaiting, for teardown paths
pub fn kill_now(pid: u32) -> Result<()> {
    let result = Platform::signals().send_kill(pid);
    if let Err(e) = &result {
        debug!(pid, "SIGKILL not delivered: {}", e);
    }
    result
}

/// SIGKILL the whole process group led by `pgid`
pub fn kill_process_group(pgid: u32) -> Result<()> {
    Platform::signals().kill_group(pgid)
}

/// Check whether `pid` still exists
pub fn is_process_running(pid: u32) -> bool {
    Platform::signals().is_process_running(pid)
}
