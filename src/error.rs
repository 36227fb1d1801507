//! Error types and Result aliases for KotoTerm

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for KotoTerm operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for KotoTerm
#[derive(Debug)]
pub enum Error {
    // === Launch errors ===
    /// Executable could not be resolved on the effective PATH
    CommandNotFound {
        command: String,
    },

    /// Failed to open a PTY for the command
    PtyCreationFailed {
        command: String,
        reason: String,
    },

    /// Failed to spawn command in PTY
    CommandSpawnFailed {
        command: String,
        reason: String,
    },

    /// Failed to clone PTY reader
    PtyReaderCloneFailed {
        reason: String,
    },

    /// Failed to take PTY writer
    PtyWriterTakeFailed {
        reason: String,
    },

    // === Session errors ===
    /// Session id does not reference a live session
    UnknownSession {
        session_id: String,
    },

    /// Failed to resize the PTY
    ResizeFailed {
        reason: String,
    },

    /// AI tool is disabled in settings
    ToolDisabled {
        tool: String,
    },

    /// AI tool identifier is not one of the known tools
    UnknownTool {
        tool: String,
    },

    /// The session manager has been shut down
    ManagerShutDown,

    // === Signal errors ===
    /// Failed to send signal to process
    SignalSendFailed {
        signal: String,
        reason: String,
    },

    /// Signal handling not supported on platform
    SignalNotSupported {
        signal: String,
        platform: String,
    },

    // === Command errors ===
    /// Single-shot command exceeded its timeout and was killed
    CommandTimeout {
        command: String,
        duration: Duration,
    },

    /// Empty command
    EmptyCommand,

    /// Pattern rule could not be compiled
    InvalidPattern {
        pattern: String,
        reason: String,
    },

    // === Configuration errors ===
    /// Failed to load configuration file
    ConfigLoadFailed {
        path: PathBuf,
        reason: String,
    },

    /// Failed to save configuration file
    ConfigSaveFailed {
        path: PathBuf,
        reason: String,
    },

    /// Configuration file not found
    ConfigNotFound,

    /// Configuration validation failed
    ConfigValidationFailed {
        field: String,
        reason: String,
    },

    /// Failed to serialize configuration
    ConfigSerializationFailed {
        format: String,
        reason: String,
    },

    /// Failed to parse configuration
    ConfigParseFailed {
        format: String,
        reason: String,
    },

    // === I/O and serialization errors ===
    /// I/O errors
    Io(std::io::Error),

    /// Serialization errors
    Serde(serde_json::Error),

    /// Regex compilation errors
    Regex(regex::Error),

    // === Generic fallback (use sparingly) ===
    /// Generic errors (for cases not yet categorized)
    Other(String),
}

impl Error {
    /// Whether this error means a session could not be launched.
    pub fn is_launch_error(&self) -> bool {
        matches!(
            self,
            Error::CommandNotFound { .. }
                | Error::PtyCreationFailed { .. }
                | Error::CommandSpawnFailed { .. }
                | Error::PtyReaderCloneFailed { .. }
                | Error::PtyWriterTakeFailed { .. }
        )
    }

    /// Whether this error is a stale or invalid session id.
    pub fn is_unknown_session(&self) -> bool {
        matches!(self, Error::UnknownSession { .. })
    }

    /// Whether this error is a single-shot timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::CommandTimeout { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Launch errors
            Error::CommandNotFound { command } => {
                write!(f, "Command '{}' not found in PATH", command)
            }
            Error::PtyCreationFailed { command, reason } => {
                write!(f, "Failed to create PTY for command '{}': {}", command, reason)
            }
            Error::CommandSpawnFailed { command, reason } => {
                write!(f, "Failed to spawn command '{}': {}", command, reason)
            }
            Error::PtyReaderCloneFailed { reason } => {
                write!(f, "Failed to clone PTY reader: {}", reason)
            }
            Error::PtyWriterTakeFailed { reason } => {
                write!(f, "Failed to take PTY writer: {}", reason)
            }

            // Session errors
            Error::UnknownSession { session_id } => {
                write!(f, "Session '{}' is not live", session_id)
            }
            Error::ResizeFailed { reason } => {
                write!(f, "Failed to resize PTY: {}", reason)
            }
            Error::ToolDisabled { tool } => {
                write!(f, "AI tool '{}' is disabled", tool)
            }
            Error::UnknownTool { tool } => {
                write!(f, "Unknown AI tool '{}'", tool)
            }
            Error::ManagerShutDown => {
                write!(f, "Session manager has been shut down")
            }

            // Signal errors
            Error::SignalSendFailed { signal, reason } => {
                write!(f, "Failed to send signal '{}': {}", signal, reason)
            }
            Error::SignalNotSupported { signal, platform } => {
                write!(f, "Signal '{}' not supported on {}", signal, platform)
            }

            // Command errors
            Error::CommandTimeout { command, duration } => {
                write!(f, "Command '{}' timed out after {:?}", command, duration)
            }
            Error::EmptyCommand => {
                write!(f, "Command cannot be empty")
            }
            Error::InvalidPattern { pattern, reason } => {
                write!(f, "Invalid pattern '{}': {}", pattern, reason)
            }

            // Configuration errors
            Error::ConfigLoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path.display(), reason)
            }
            Error::ConfigSaveFailed { path, reason } => {
                write!(f, "Failed to save config to '{}': {}", path.display(), reason)
            }
            Error::ConfigNotFound => {
                write!(f, "Configuration file not found")
            }
            Error::ConfigValidationFailed { field, reason } => {
                write!(f, "Configuration validation failed for '{}': {}", field, reason)
            }
            Error::ConfigSerializationFailed { format, reason } => {
                write!(f, "Failed to serialize config as {}: {}", format, reason)
            }
            Error::ConfigParseFailed { format, reason } => {
                write!(f, "Failed to parse {} config: {}", format, reason)
            }

            // I/O and serialization errors
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Serde(err) => write!(f, "Serialization error: {}", err),
            Error::Regex(err) => write!(f, "Regex compilation error: {}", err),

            // Generic fallback
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Serde(err) => Some(err),
            Error::Regex(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParseFailed {
            format: "TOML".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::ConfigSerializationFailed {
            format: "TOML".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Regex(err)
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::Other(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Error::Other(err.to_string())
    }
}
