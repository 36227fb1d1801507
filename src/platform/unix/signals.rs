//! Unix signal operations

use crate::error::{Error, Result};
use crate::platform::traits::SignalOps;
use nix::sys::signal::{kill, killpg, Signal as NixSignal};
use nix::unistd::Pid;

pub struct UnixSignals;

impl UnixSignals {
    pub fn new() -> Self {
        Self
    }

    fn deliver(pid: u32, signal: NixSignal) -> Result<()> {
        kill(Pid::from_raw(pid as i32), signal).map_err(|e| Error::SignalSendFailed {
            signal: signal.as_str().to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl SignalOps for UnixSignals {
    async fn send_hangup(&self, pid: u32) -> Result<()> {
        Self::deliver(pid, NixSignal::SIGHUP)
    }

    async fn send_terminate(&self, pid: u32) -> Result<()> {
        Self::deliver(pid, NixSignal::SIGTERM)
    }

    fn send_kill(&self, pid: u32) -> Result<()> {
        Self::deliver(pid, NixSignal::SIGKILL)
    }

    fn kill_group(&self, pgid: u32) -> Result<()> {
        killpg(Pid::from_raw(pgid as i32), NixSignal::SIGKILL).map_err(|e| {
            Error::SignalSendFailed {
                signal: "SIGKILL".to_string(),
                reason: format!("process group {}: {}", pgid, e),
            }
        })
    }

    fn is_process_running(&self, pid: u32) -> bool {
        // Null signal: permission and existence check only
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }
}
