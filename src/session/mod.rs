//! PTY-backed sessions
//!
//! A [`Session`] is one child process on a pseudoterminal, either a plain
//! shell or an AI command-line tool. The [`SessionManager`] owns the live
//! sessions, keeps at most one per [`Slot`] and republishes their events.

pub mod config;
pub mod handle;
pub mod manager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub use config::{
    AiTool, DefaultConfigFactory, SessionConfig, SessionConfigFactory, SessionKind,
    SettingsConfigFactory,
};
pub use handle::{Session, SessionSubscription};
pub use manager::{ManagerEvent, ManagerOptions, SessionManager, Slot};

/// Opaque session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| crate::error::Error::UnknownSession {
                session_id: s.to_string(),
            })
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// PTY allocated, spawn not yet acknowledged
    Starting,
    /// Child is running
    Running,
    /// Child exited on its own
    Exited,
    /// Child was stopped by request
    Killed,
}

impl SessionState {
    /// Whether the process handle is still held in this state
    pub fn holds_process(&self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Running)
    }

    pub fn is_terminal(&self) -> bool {
        !self.holds_process()
    }
}

/// Terminal dimensions in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl TerminalSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// Which stream an output chunk came from.
///
/// A PTY merges stdout and stderr, so PTY sessions always report `Stdout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Events emitted by a single session, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The child was spawned
    Started { pid: Option<u32> },
    /// A chunk of output
    Output { stream: OutputStream, data: Vec<u8> },
    /// Terminal notification, emitted exactly once
    Exited { exit_code: Option<i32> },
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub kind: SessionKind,
    pub executable: String,
    pub state: SessionState,
    pub size: TerminalSize,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
}
