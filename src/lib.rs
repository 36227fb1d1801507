//! KotoTerm - natural-language command front-end for shells and AI CLIs
//!
//! KotoTerm turns Japanese shorthand such as `projectに移動` or `状態` into
//! real shell commands and runs them, alongside the `claude`, `codex` and
//! `gemini` command-line tools, in pseudoterminal-backed sessions.
//!
//! ## Module Organization
//!
//! - [`translate`] - Alias table, pattern rules and the translation engine
//! - [`session`] - PTY sessions and the slot-keeping session manager
//! - [`pty`] - PTY spawning, I/O threads, signals and event broadcasting
//! - [`bus`] - Typed request/response/event surface and the core service
//! - [`execution`] - Single-shot command execution with timeouts
//! - [`history`] - Command history port and in-memory store
//! - [`config`] - Configuration loading and the settings port
//! - [`platform`] - Platform-specific signals, paths and shell lookup
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```no_run
//! use kototerm::bus::{CoreService, Request};
//!
//! # async fn run() -> kototerm::Result<()> {
//! let config = kototerm::init(None)?;
//! let core = CoreService::new(config)?;
//! let mut events = core.subscribe();
//!
//! let preview = core.preview("状態");
//! core.handle(Request::TerminalExecute {
//!     command: preview.command,
//!     cwd: None,
//!     original: Some(preview.original),
//! })
//! .await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! core.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **PTY Reader Threads:** Read output from PTY processes (blocking I/O)
//! - **PTY Writer Threads:** Write input to PTY processes (blocking I/O)
//! - **Session Pumps:** One task per session turns output and exit into ordered events
//! - **Forwarders:** One task per live session republishes onto the manager bus
//!
//! Communication between threads and tasks happens over tokio channels.

#[macro_use]
extern crate tracing;

pub mod bus;
pub mod config;
pub mod error;
pub mod execution;
pub mod history;
pub mod platform;
pub mod pty;
pub mod session;
pub mod translate;

pub use config::Config;
pub use error::{Error, Result};
pub use session::{SessionId, SessionManager};
pub use translate::{CommandPreview, TranslationEngine};

use std::path::Path;

use config::loader::ConfigLoader;

/// The current version of KotoTerm from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The application name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// The application description from Cargo.toml
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Load the configuration.
///
/// An explicit `config_path` must load and validate; otherwise the default
/// search locations are tried and defaults are used when nothing is found.
pub fn init(config_path: Option<&Path>) -> Result<Config> {
    info!("Initializing {} v{}", NAME, VERSION);

    let config = match config_path {
        Some(path) => {
            let config = ConfigLoader::load_from_path(path)?;
            info!("Configuration loaded from {}", path.display());
            config
        }
        None => ConfigLoader::new().load()?,
    };

    debug!(
        aliases = config.aliases.len(),
        patterns = config.patterns.len(),
        "Configuration ready"
    );
    Ok(config)
}
