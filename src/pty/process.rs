//! PTY Process Spawning
//!
//! Opens a pseudoterminal, launches the configured executable on its slave
//! side and hands back the master plus async-bridged I/O.

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::streams::PtyStreams;
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::session::{SessionConfig, TerminalSize};

/// Terminal type advertised to children unless the caller overrides `TERM`
pub const DEFAULT_TERM: &str = "xterm-256color";

/// A freshly spawned PTY child and the handles needed to drive it
pub struct SpawnedPty {
    /// OS process id, when the platform reports one
    pub pid: Option<u32>,
    /// Child handle used for waiting and killing
    pub child: Box<dyn Child + Send + Sync>,
    /// Master side, kept for resizing
    pub master: Box<dyn MasterPty + Send>,
    /// Output/input channels backed by I/O threads
    pub streams: PtyStreams,
}

impl std::fmt::Debug for SpawnedPty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedPty").field("pid", &self.pid).finish()
    }
}

/// Spawn `config` on a new PTY of the given size.
///
/// Fails synchronously with a launch error when the executable cannot be
/// resolved on the effective `PATH`, the PTY cannot be opened, or the spawn
/// itself fails.
pub fn spawn_pty_process(config: &SessionConfig, size: TerminalSize) -> Result<SpawnedPty> {
    let command = config.executable.as_str();

    let mut overrides = HashMap::with_capacity(config.env_overrides.len() + 1);
    overrides.insert("TERM".to_string(), DEFAULT_TERM.to_string());
    overrides.extend(
        config
            .env_overrides
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    let env = effective_environment(&overrides, true);

    let resolved = validate_command(command, lookup_var(&env, "PATH"))?;

    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows: size.rows,
            cols: size.cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| Error::PtyCreationFailed {
            command: command.to_string(),
            reason: e.to_string(),
        })?;

    let mut cmd_builder = CommandBuilder::new(&resolved);
    cmd_builder.args(&config.args);
    cmd_builder.env_clear();
    for (key, value) in &env {
        cmd_builder.env(key, value);
    }

    // portable-pty would otherwise start children in the home directory
    let cwd = match &config.working_directory {
        Some(dir) => Some(dir.clone()),
        None => std::env::current_dir().ok(),
    };
    if let Some(dir) = &cwd {
        cmd_builder.cwd(dir);
    }

    let child = pair
        .slave
        .spawn_command(cmd_builder)
        .map_err(|e| Error::CommandSpawnFailed {
            command: command.to_string(),
            reason: e.to_string(),
        })?;

    // The child holds its own slave fd; keeping ours would block EOF on exit
    drop(pair.slave);

    let pid = child.process_id();

    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| Error::PtyReaderCloneFailed {
            reason: e.to_string(),
        })?;
    let writer = pair
        .master
        .take_writer()
        .map_err(|e| Error::PtyWriterTakeFailed {
            reason: e.to_string(),
        })?;

    debug!(
        command,
        pid = ?pid,
        cols = size.cols,
        rows = size.rows,
        cwd = ?cwd,
        "Spawned PTY process"
    );

    Ok(SpawnedPty {
        pid,
        child,
        master: pair.master,
        streams: PtyStreams::spawn(reader, writer),
    })
}

/// Resolve `command` against `search_path` (or the process `PATH`).
pub fn validate_command(command: &str, search_path: Option<&str>) -> Result<PathBuf> {
    if command.trim().is_empty() {
        return Err(Error::EmptyCommand);
    }

    let fs_ops = Platform::filesystem();
    match fs_ops.find_command(command, search_path)? {
        Some(path) => Ok(path),
        None => Err(Error::CommandNotFound {
            command: command.to_string(),
        }),
    }
}

/// Get the current user's shell: `$SHELL`, else the platform default
pub fn get_user_shell() -> String {
    Platform::shell().default_shell().to_string_lossy().to_string()
}

/// Build the environment for a child process.
///
/// Starts from the inherited environment when `inherit` is set, then applies
/// `overrides` key by key; an override always wins on collision. Keys compare
/// case-insensitively on Windows and exactly elsewhere.
pub fn effective_environment(
    overrides: &HashMap<String, String>,
    inherit: bool,
) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = if inherit {
        std::env::vars().collect()
    } else {
        HashMap::new()
    };

    for (key, value) in overrides {
        if cfg!(windows) {
            env.retain(|existing, _| !existing.eq_ignore_ascii_case(key));
        }
        env.insert(key.clone(), value.clone());
    }

    env
}

fn lookup_var<'a>(env: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    if cfg!(windows) {
        env.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    } else {
        env.get(key).map(String::as_str)
    }
}
