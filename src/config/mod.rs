//! Configuration management for KotoTerm
//!
//! Holds the on-disk configuration shape (terminal, session policy, AI tool
//! launchers, user aliases and pattern rules, history limits), its validation,
//! and the loader/settings ports built on top of it.

pub mod loader;
pub mod settings;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use crate::session::config::AiTool;

/// Main configuration structure for KotoTerm
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell slot configuration
    pub terminal: TerminalConfig,

    /// Session lifecycle policy
    pub sessions: SessionsConfig,

    /// AI tool launchers
    pub ai_tools: AiToolsConfig,

    /// User alias overlay (phrase -> command)
    pub aliases: BTreeMap<String, String>,

    /// User pattern rules, evaluated after the built-in rules
    pub patterns: Vec<PatternRuleConfig>,

    /// History store limits
    pub history: HistoryConfig,
}

/// Terminal-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Shell executable; falls back to `$SHELL` when unset
    pub shell: Option<String>,

    /// Shell arguments
    pub shell_args: Vec<String>,

    /// Working directory for new shells
    pub working_directory: Option<PathBuf>,

    /// Initial PTY columns
    pub cols: u16,

    /// Initial PTY rows
    pub rows: u16,

    /// Environment overrides applied on top of the inherited environment
    pub environment: HashMap<String, String>,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            shell: None,
            shell_args: Vec::new(),
            working_directory: None,
            cols: 80,
            rows: 24,
            environment: HashMap::new(),
        }
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Grace period before a stopping session is force-killed
    pub grace_period_ms: u64,

    /// Capacity of the manager event broadcast
    pub event_capacity: usize,
}

impl SessionsConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 2000,
            event_capacity: 1024,
        }
    }
}

/// Per-tool launcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiToolConfig {
    /// Executable name or path
    pub command: String,

    /// Extra arguments
    pub args: Vec<String>,

    /// Whether the tool may be started
    pub enabled: bool,
}

impl AiToolConfig {
    pub fn for_tool(tool: AiTool) -> Self {
        Self {
            command: tool.as_str().to_string(),
            args: Vec::new(),
            enabled: true,
        }
    }

    /// Executable to launch; a partially written table leaves `command`
    /// empty, in which case the tool's own name is used.
    pub fn executable(&self, tool: AiTool) -> String {
        if self.command.trim().is_empty() {
            tool.as_str().to_string()
        } else {
            self.command.clone()
        }
    }
}

impl Default for AiToolConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            enabled: true,
        }
    }
}

/// Launchers for the known AI tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiToolsConfig {
    pub claude: AiToolConfig,
    pub codex: AiToolConfig,
    pub gemini: AiToolConfig,
}

impl AiToolsConfig {
    pub fn get(&self, tool: AiTool) -> &AiToolConfig {
        match tool {
            AiTool::Claude => &self.claude,
            AiTool::Codex => &self.codex,
            AiTool::Gemini => &self.gemini,
        }
    }

    pub fn get_mut(&mut self, tool: AiTool) -> &mut AiToolConfig {
        match tool {
            AiTool::Claude => &mut self.claude,
            AiTool::Codex => &mut self.codex,
            AiTool::Gemini => &mut self.gemini,
        }
    }
}

impl Default for AiToolsConfig {
    fn default() -> Self {
        Self {
            claude: AiToolConfig::for_tool(AiTool::Claude),
            codex: AiToolConfig::for_tool(AiTool::Codex),
            gemini: AiToolConfig::for_tool(AiTool::Gemini),
        }
    }
}

/// A user-supplied pattern rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRuleConfig {
    /// One of `file`, `git`, `ai`, `system`
    pub category: String,

    /// Regex patterns tried in order
    pub patterns: Vec<String>,

    /// Template with `{name}` placeholders
    pub template: String,

    #[serde(default)]
    pub description: String,
}

/// History configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1000,
        }
    }
}

/// Validation failures for a loaded configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("terminal size must be non-zero, got {cols}x{rows}")]
    ZeroTerminalSize { cols: u16, rows: u16 },

    #[error("shell path cannot be empty")]
    EmptyShell,

    #[error("alias phrase cannot be empty")]
    EmptyAliasPhrase,

    #[error("alias '{0}' maps to an empty command")]
    EmptyAliasCommand(String),

    #[error("pattern rule {index} has no patterns")]
    RuleWithoutPatterns { index: usize },

    #[error("pattern rule {index} has unknown category '{category}'")]
    UnknownCategory { index: usize, category: String },

    #[error("event capacity must be greater than 0")]
    ZeroEventCapacity,

    #[error("history max_entries must be greater than 0")]
    ZeroHistoryLimit,
}

impl ConfigError {
    /// Dotted path of the offending field
    pub fn field(&self) -> String {
        match self {
            ConfigError::ZeroTerminalSize { .. } => "terminal.cols/rows".to_string(),
            ConfigError::EmptyShell => "terminal.shell".to_string(),
            ConfigError::EmptyAliasPhrase | ConfigError::EmptyAliasCommand(_) => {
                "aliases".to_string()
            }
            ConfigError::RuleWithoutPatterns { index }
            | ConfigError::UnknownCategory { index, .. } => format!("patterns[{}]", index),
            ConfigError::ZeroEventCapacity => "sessions.event_capacity".to_string(),
            ConfigError::ZeroHistoryLimit => "history.max_entries".to_string(),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(err: ConfigError) -> Self {
        crate::error::Error::ConfigValidationFailed {
            field: err.field(),
            reason: err.to_string(),
        }
    }
}

impl Config {
    /// Check the configuration for values the core cannot run with
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let terminal = &self.terminal;
        if terminal.cols == 0 || terminal.rows == 0 {
            return Err(ConfigError::ZeroTerminalSize {
                cols: terminal.cols,
                rows: terminal.rows,
            });
        }
        if matches!(&terminal.shell, Some(shell) if shell.trim().is_empty()) {
            return Err(ConfigError::EmptyShell);
        }

        for (phrase, command) in &self.aliases {
            if phrase.trim().is_empty() {
                return Err(ConfigError::EmptyAliasPhrase);
            }
            if command.trim().is_empty() {
                return Err(ConfigError::EmptyAliasCommand(phrase.clone()));
            }
        }

        for (index, rule) in self.patterns.iter().enumerate() {
            if rule.patterns.is_empty() {
                return Err(ConfigError::RuleWithoutPatterns { index });
            }
            if rule.category.parse::<crate::translate::CommandCategory>().is_err() {
                return Err(ConfigError::UnknownCategory {
                    index,
                    category: rule.category.clone(),
                });
            }
        }

        if self.sessions.event_capacity == 0 {
            return Err(ConfigError::ZeroEventCapacity);
        }
        if self.history.max_entries == 0 {
            return Err(ConfigError::ZeroHistoryLimit);
        }

        Ok(())
    }
}
