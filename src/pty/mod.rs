//! Pseudoterminal (PTY) plumbing
//!
//! Spawning children on a PTY, bridging the blocking master side to async
//! code, delivering signals and broadcasting typed events. Session lifecycle
//! policy lives in [`crate::session`]; this module only moves bytes and pids.

pub mod events;
pub mod process;
pub mod signals;
pub mod streams;

pub use events::{EventBus, EventSubscription};
pub use process::{
    effective_environment, get_user_shell, spawn_pty_process, validate_command, SpawnedPty,
};
pub use signals::{send_signal, Signal};
pub use streams::{PtyStreams, Utf8ChunkDecoder};
