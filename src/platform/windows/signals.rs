//! Windows signal operations
//!
//! There are no Unix-style signals for PTY children on Windows; sessions fall
//! back to the ConPTY child killer instead.

use crate::error::{Error, Result};
use crate::platform::traits::SignalOps;

pub struct WindowsSignals;

impl WindowsSignals {
    pub fn new() -> Self {
        Self
    }

    fn unsupported(signal: &str) -> Result<()> {
        Err(Error::SignalNotSupported {
            signal: signal.to_string(),
            platform: "windows".to_string(),
        })
    }
}

#[async_trait::async_trait]
impl SignalOps for WindowsSignals {
    async fn send_hangup(&self, _pid: u32) -> Result<()> {
        Self::unsupported("SIGHUP")
    }

    async fn send_terminate(&self, _pid: u32) -> Result<()> {
        Self::unsupported("SIGTERM")
    }

    fn send_kill(&self, _pid: u32) -> Result<()> {
        Self::unsupported("SIGKILL")
    }

    fn kill_group(&self, _pgid: u32) -> Result<()> {
        Self::unsupported("SIGKILL")
    }

    fn is_process_running(&self, _pid: u32) -> bool {
        // Unknown without a process handle; liveness comes from the child waiter
        false
    }
}
