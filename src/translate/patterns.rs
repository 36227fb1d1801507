//! Pattern rules
//!
//! A rule is an ordered list of regexes sharing one command template. The
//! template's `{name}` placeholders are filled positionally: the first
//! distinct placeholder takes capture group 1, the second group 2, and so on.
//! Extra capture groups are ignored. A placeholder with no capture group
//! behind it stays in the output literally, braces included.

use regex::{Captures, Regex};

use super::aliases::CommandCategory;
use crate::config::PatternRuleConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    Literal(String),
    /// Index into the rule's distinct placeholder names
    Placeholder(usize),
}

/// One translation rule
#[derive(Debug, Clone)]
pub struct PatternRule {
    category: CommandCategory,
    patterns: Vec<Regex>,
    template: String,
    parts: Vec<TemplatePart>,
    placeholders: Vec<String>,
    description: String,
}

impl PatternRule {
    pub fn new(
        category: CommandCategory,
        patterns: &[&str],
        template: &str,
        description: &str,
    ) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| Error::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let (parts, placeholders) = parse_template(template);

        for regex in &patterns {
            let groups = regex.captures_len() - 1;
            if groups < placeholders.len() {
                warn!(
                    pattern = regex.as_str(),
                    template,
                    groups,
                    placeholders = placeholders.len(),
                    "Template has more placeholders than capture groups; the rest stay literal"
                );
            }
        }

        Ok(Self {
            category,
            patterns,
            template: template.to_string(),
            parts,
            placeholders,
            description: description.to_string(),
        })
    }

    /// Build a rule from user configuration
    pub fn from_config(config: &PatternRuleConfig) -> Result<Self> {
        let category = config.category.parse()?;
        let patterns: Vec<&str> = config.patterns.iter().map(String::as_str).collect();
        Self::new(category, &patterns, &config.template, &config.description)
    }

    pub fn category(&self) -> CommandCategory {
        self.category
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Distinct placeholder names in order of first appearance
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    /// Substituted template for the first pattern that matches `input`
    pub fn apply(&self, input: &str) -> Option<String> {
        self.patterns
            .iter()
            .find_map(|regex| regex.captures(input))
            .map(|caps| self.render(&caps))
    }

    fn render(&self, caps: &Captures<'_>) -> String {
        let mut out = String::with_capacity(self.template.len());
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => out.push_str(text),
                TemplatePart::Placeholder(idx) => {
                    let group = idx + 1;
                    if group < caps.len() {
                        // A group that exists but did not participate is empty
                        out.push_str(caps.get(group).map_or("", |m| m.as_str()));
                    } else {
                        out.push('{');
                        out.push_str(&self.placeholders[*idx]);
                        out.push('}');
                    }
                }
            }
        }
        out
    }
}

/// Split a template into literal text and `{identifier}` placeholders
fn parse_template(template: &str) -> (Vec<TemplatePart>, Vec<String>) {
    let mut parts = Vec::new();
    let mut names: Vec<String> = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let is_placeholder = name_len > 0 && after[name_len..].starts_with('}');

        if !is_placeholder {
            literal.push_str(&rest[..=open]);
            rest = after;
            continue;
        }

        literal.push_str(&rest[..open]);
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
        }

        let name = &after[..name_len];
        let idx = match names.iter().position(|n| n == name) {
            Some(idx) => idx,
            None => {
                names.push(name.to_string());
                names.len() - 1
            }
        };
        parts.push(TemplatePart::Placeholder(idx));
        rest = &after[name_len + 1..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(literal));
    }

    (parts, names)
}

/// Ordered rule list; the first matching rule wins
#[derive(Debug, Clone, Default)]
pub struct PatternRuleSet {
    rules: Vec<PatternRule>,
}

impl PatternRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in rules: move, mkdir, touch, rm, cat
    pub fn presets() -> Result<Self> {
        use CommandCategory::File;

        let mut set = Self::new();
        set.push(PatternRule::new(
            File,
            &[
                "^(.+?)に移動$",
                "^(.+?)へ移動$",
                "^(.+?)フォルダに移動$",
                "^(.+?)ディレクトリに移動$",
            ],
            "cd {path}",
            "指定した場所に移動します",
        )?);
        set.push(PatternRule::new(
            File,
            &[
                "^(.+?)を作成$",
                "^(.+?)フォルダを作成$",
                "^(.+?)ディレクトリを作成$",
            ],
            "mkdir {name}",
            "ディレクトリを作成します",
        )?);
        set.push(PatternRule::new(
            File,
            &["^(.+?)ファイルを作成$"],
            "touch {name}",
            "ファイルを作成します",
        )?);
        set.push(PatternRule::new(
            File,
            &["^(.+?)を削除$"],
            "rm {target}",
            "ファイルを削除します",
        )?);
        set.push(PatternRule::new(
            File,
            &["^(.+?)の中身$", "^(.+?)を表示$"],
            "cat {file}",
            "ファイルの内容を表示します",
        )?);
        Ok(set)
    }

    pub fn push(&mut self, rule: PatternRule) {
        self.rules.push(rule);
    }

    /// Append user rules after the existing ones
    pub fn extend(&mut self, configs: &[PatternRuleConfig]) -> Result<()> {
        for config in configs {
            self.push(PatternRule::from_config(config)?);
        }
        Ok(())
    }

    /// First rule (in order) with a matching pattern, and its output
    pub fn find(&self, input: &str) -> Option<(&PatternRule, String)> {
        self.rules
            .iter()
            .find_map(|rule| rule.apply(input).map(|command| (rule, command)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatternRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
