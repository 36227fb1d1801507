//! Natural-language command translation
//!
//! Turns Japanese shorthand into a shell command. An exact alias match wins
//! outright; otherwise the pattern rules are tried in order; otherwise the
//! input is passed through untouched. Translation never fails.

pub mod aliases;
pub mod patterns;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use aliases::{AliasEntry, AliasTable, CommandCategory};
pub use patterns::{PatternRule, PatternRuleSet};

use crate::config::PatternRuleConfig;
use crate::error::Result;

/// An alias that contributed to a translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasUse {
    pub key: String,
    pub value: String,
}

/// Result of translating one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPreview {
    /// Input exactly as given
    pub original: String,
    /// Human-readable converted form
    pub converted: String,
    /// Command to execute
    pub command: String,
    pub aliases_used: Vec<AliasUse>,
}

impl CommandPreview {
    fn passthrough(input: &str) -> Self {
        Self {
            original: input.to_string(),
            converted: input.to_string(),
            command: input.to_string(),
            aliases_used: Vec::new(),
        }
    }

    /// Whether nothing was translated
    pub fn is_passthrough(&self) -> bool {
        self.aliases_used.is_empty() && self.command == self.original
    }
}

/// Alias table plus pattern rules
#[derive(Debug, Clone, Default)]
pub struct TranslationEngine {
    aliases: AliasTable,
    rules: PatternRuleSet,
}

impl TranslationEngine {
    pub fn new(aliases: AliasTable, rules: PatternRuleSet) -> Self {
        Self { aliases, rules }
    }

    /// Engine over the built-in aliases and rules
    pub fn with_presets() -> Result<Self> {
        Ok(Self::new(AliasTable::presets(), PatternRuleSet::presets()?))
    }

    /// Merge a user alias overlay: existing phrases are overridden in place,
    /// new ones are appended with an inferred category.
    pub fn with_overlay(mut self, overlay: &BTreeMap<String, String>) -> Self {
        for (phrase, command) in overlay {
            let category = self
                .aliases
                .get(phrase)
                .map(|entry| entry.category)
                .unwrap_or_else(|| CommandCategory::infer(command));
            self.aliases.insert(AliasEntry::new(
                phrase.clone(),
                command.clone(),
                category,
                String::new(),
            ));
        }
        self
    }

    /// Append user pattern rules after the built-in ones
    pub fn with_rules(mut self, rules: &[PatternRuleConfig]) -> Result<Self> {
        self.rules.extend(rules)?;
        Ok(self)
    }

    /// Translate `input` into a command preview
    pub fn translate(&self, input: &str) -> CommandPreview {
        let trimmed = input.trim();

        if let Some(entry) = self.aliases.get(trimmed) {
            trace!(input = trimmed, command = %entry.command, "Alias hit");
            return CommandPreview {
                original: input.to_string(),
                converted: entry.command.clone(),
                command: entry.command.clone(),
                aliases_used: vec![AliasUse {
                    key: entry.phrase.clone(),
                    value: entry.command.clone(),
                }],
            };
        }

        if let Some((rule, command)) = self.rules.find(trimmed) {
            trace!(input = trimmed, template = rule.template(), %command, "Pattern hit");
            return CommandPreview {
                original: input.to_string(),
                converted: command.clone(),
                command,
                aliases_used: Vec::new(),
            };
        }

        CommandPreview::passthrough(input)
    }

    /// Aliases whose phrase starts with `prefix`, in table order
    pub fn suggest(&self, prefix: &str) -> Vec<&AliasEntry> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Vec::new();
        }
        self.aliases
            .iter()
            .filter(|entry| entry.phrase.starts_with(prefix))
            .collect()
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn rules(&self) -> &PatternRuleSet {
        &self.rules
    }
}
