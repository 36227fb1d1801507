//! Settings port
//!
//! The core reads user settings (alias overlay, AI tool launchers, terminal
//! and history sections) through [`SettingsStore`] and never assumes how they
//! are persisted.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::{AiToolConfig, AiToolsConfig, Config, HistoryConfig, PatternRuleConfig, TerminalConfig};
use crate::error::{Error, Result};
use crate::session::config::AiTool;

/// The settings a front-end can read and edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub aliases: BTreeMap<String, String>,
    pub history: HistoryConfig,
    pub ai_tools: AiToolsConfig,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            aliases: config.aliases.clone(),
            history: config.history.clone(),
            ai_tools: config.ai_tools.clone(),
        }
    }
}

/// Partial settings change; absent fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsUpdate {
    /// Replaces the whole alias overlay
    pub aliases: Option<BTreeMap<String, String>>,
    pub history: Option<HistoryUpdate>,
    pub ai_tools: Option<AiToolsUpdate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryUpdate {
    pub enabled: Option<bool>,
    pub max_entries: Option<usize>,
}

/// Per-tool replacement sections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiToolsUpdate {
    pub claude: Option<AiToolConfig>,
    pub codex: Option<AiToolConfig>,
    pub gemini: Option<AiToolConfig>,
}

impl SettingsUpdate {
    pub fn history_enabled(enabled: bool) -> Self {
        Self {
            history: Some(HistoryUpdate {
                enabled: Some(enabled),
                max_entries: None,
            }),
            ..Self::default()
        }
    }

    fn apply_to(self, config: &mut Config) {
        if let Some(aliases) = self.aliases {
            config.aliases = aliases;
        }
        if let Some(history) = self.history {
            if let Some(enabled) = history.enabled {
                config.history.enabled = enabled;
            }
            if let Some(max_entries) = history.max_entries {
                config.history.max_entries = max_entries;
            }
        }
        if let Some(tools) = self.ai_tools {
            for (tool, section) in [
                (AiTool::Claude, tools.claude),
                (AiTool::Codex, tools.codex),
                (AiTool::Gemini, tools.gemini),
            ] {
                if let Some(section) = section {
                    *config.ai_tools.get_mut(tool) = section;
                }
            }
        }
    }
}

/// Read/write access to user settings
pub trait SettingsStore: Send + Sync {
    /// User alias overlay
    fn aliases(&self) -> BTreeMap<String, String>;

    fn set_alias(&self, phrase: &str, command: &str) -> Result<()>;

    /// Returns whether an alias was removed
    fn delete_alias(&self, phrase: &str) -> Result<bool>;

    /// User pattern rules
    fn patterns(&self) -> Vec<PatternRuleConfig>;

    fn ai_tool(&self, tool: AiTool) -> AiToolConfig;

    fn terminal(&self) -> TerminalConfig;

    fn history(&self) -> HistoryConfig;

    /// Front-end view of the current settings
    fn settings(&self) -> Settings;

    /// Apply `update` as a whole, or not at all when the result is invalid
    fn apply(&self, update: SettingsUpdate) -> Result<Settings>;
}

/// In-process settings held in a [`Config`]
#[derive(Debug, Default)]
pub struct MemorySettings {
    config: RwLock<Config>,
}

impl MemorySettings {
    pub fn new(config: Config) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Copy of the current settings, e.g. for saving
    pub fn snapshot(&self) -> Config {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Config> {
        self.config.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Config> {
        self.config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SettingsStore for MemorySettings {
    fn aliases(&self) -> BTreeMap<String, String> {
        self.read().aliases.clone()
    }

    fn set_alias(&self, phrase: &str, command: &str) -> Result<()> {
        let phrase = phrase.trim();
        let command = command.trim();
        if phrase.is_empty() || command.is_empty() {
            return Err(Error::ConfigValidationFailed {
                field: "aliases".to_string(),
                reason: "alias phrase and command cannot be empty".to_string(),
            });
        }

        self.write()
            .aliases
            .insert(phrase.to_string(), command.to_string());
        debug!(phrase, command, "Alias set");
        Ok(())
    }

    fn delete_alias(&self, phrase: &str) -> Result<bool> {
        let removed = self.write().aliases.remove(phrase.trim()).is_some();
        if removed {
            debug!(phrase, "Alias deleted");
        }
        Ok(removed)
    }

    fn patterns(&self) -> Vec<PatternRuleConfig> {
        self.read().patterns.clone()
    }

    fn ai_tool(&self, tool: AiTool) -> AiToolConfig {
        self.read().ai_tools.get(tool).clone()
    }

    fn terminal(&self) -> TerminalConfig {
        self.read().terminal.clone()
    }

    fn history(&self) -> HistoryConfig {
        self.read().history.clone()
    }

    fn settings(&self) -> Settings {
        Settings::from(&*self.read())
    }

    fn apply(&self, update: SettingsUpdate) -> Result<Settings> {
        let mut config = self.write();
        let mut candidate = config.clone();
        update.apply_to(&mut candidate);
        candidate.validate()?;

        *config = candidate;
        debug!("Settings updated");
        Ok(Settings::from(&*config))
    }
}
