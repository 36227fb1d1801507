//! Launch configuration for sessions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::settings::SettingsStore;
use crate::error::{Error, Result};
use crate::pty::process::get_user_shell;

/// The AI command-line tools a session can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiTool {
    Claude,
    Codex,
    Gemini,
}

impl AiTool {
    pub fn all() -> [AiTool; 3] {
        [AiTool::Claude, AiTool::Codex, AiTool::Gemini]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AiTool::Claude => "claude",
            AiTool::Codex => "codex",
            AiTool::Gemini => "gemini",
        }
    }
}

impl fmt::Display for AiTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiTool {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" => Ok(AiTool::Claude),
            "codex" => Ok(AiTool::Codex),
            "gemini" => Ok(AiTool::Gemini),
            _ => Err(Error::UnknownTool {
                tool: s.to_string(),
            }),
        }
    }
}

/// What a session hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "tool")]
pub enum SessionKind {
    Shell,
    AiTool(AiTool),
}

/// Everything needed to launch a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub kind: SessionKind,
    pub executable: String,
    pub args: Vec<String>,
    /// Defaults to the caller's current directory
    pub working_directory: Option<PathBuf>,
    /// Merged over the inherited environment; overrides win
    pub env_overrides: HashMap<String, String>,
}

impl SessionConfig {
    pub fn shell(executable: impl Into<String>) -> Self {
        Self {
            kind: SessionKind::Shell,
            executable: executable.into(),
            args: Vec::new(),
            working_directory: None,
            env_overrides: HashMap::new(),
        }
    }

    /// Shell from `$SHELL`, falling back to the platform default
    pub fn default_shell() -> Self {
        Self::shell(get_user_shell())
    }

    pub fn ai_tool(tool: AiTool, executable: impl Into<String>) -> Self {
        Self {
            kind: SessionKind::AiTool(tool),
            ..Self::shell(executable)
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_overrides.insert(key.into(), value.into());
        self
    }
}

/// Supplies launch configurations per session kind
pub trait SessionConfigFactory: Send + Sync {
    fn shell_config(&self) -> Result<SessionConfig>;

    fn ai_tool_config(&self, tool: AiTool) -> Result<SessionConfig>;
}

/// `$SHELL` for shells, the tool's own name for AI tools
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConfigFactory;

impl SessionConfigFactory for DefaultConfigFactory {
    fn shell_config(&self) -> Result<SessionConfig> {
        Ok(SessionConfig::default_shell())
    }

    fn ai_tool_config(&self, tool: AiTool) -> Result<SessionConfig> {
        Ok(SessionConfig::ai_tool(tool, tool.as_str()))
    }
}

/// Builds configurations from the user's settings
pub struct SettingsConfigFactory {
    settings: Arc<dyn SettingsStore>,
}

impl SettingsConfigFactory {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }
}

impl SessionConfigFactory for SettingsConfigFactory {
    fn shell_config(&self) -> Result<SessionConfig> {
        let terminal = self.settings.terminal();
        let executable = terminal.shell.clone().unwrap_or_else(get_user_shell);

        let mut config = SessionConfig::shell(executable).with_args(terminal.shell_args);
        config.working_directory = terminal.working_directory;
        config.env_overrides = terminal.environment;
        Ok(config)
    }

    fn ai_tool_config(&self, tool: AiTool) -> Result<SessionConfig> {
        let tool_config = self.settings.ai_tool(tool);
        if !tool_config.enabled {
            return Err(Error::ToolDisabled {
                tool: tool.to_string(),
            });
        }

        let terminal = self.settings.terminal();
        let mut config = SessionConfig::ai_tool(tool, tool_config.executable(tool))
            .with_args(tool_config.args);
        config.working_directory = terminal.working_directory;
        config.env_overrides = terminal.environment;
        Ok(config)
    }
}
