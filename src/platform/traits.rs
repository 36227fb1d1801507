//! Platform-specific operation traits

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Platform-specific signal operations
#[async_trait::async_trait]
pub trait SignalOps: Send + Sync {
    /// Send a hangup signal (controlling terminal went away)
    async fn send_hangup(&self, pid: u32) -> Result<()>;

    /// Send a termination signal (graceful shutdown)
    async fn send_terminate(&self, pid: u32) -> Result<()>;

    /// Send a kill signal (forceful termination). Synchronous so that
    /// teardown paths without a runtime can use it.
    fn send_kill(&self, pid: u32) -> Result<()>;

    /// Kill every process in process group `pgid`
    fn kill_group(&self, pgid: u32) -> Result<()>;

    /// Check if a process is still running
    fn is_process_running(&self, pid: u32) -> bool;
}

/// Platform-specific filesystem operations
pub trait FilesystemOps: Send + Sync {
    /// Check if a file is executable
    fn is_executable(&self, path: &Path) -> bool;

    /// Find a command on `search_path`, or on the process `PATH` when `None`
    fn find_command(&self, command: &str, search_path: Option<&str>) -> Result<Option<PathBuf>>;
}

/// Platform-specific path operations
pub trait PathOps: Send + Sync {
    /// Get configuration directory
    fn config_dir(&self) -> Result<PathBuf>;
}

/// Platform-specific shell operations
pub trait ShellOps: Send + Sync {
    /// Get default shell path
    fn default_shell(&self) -> PathBuf;
}
