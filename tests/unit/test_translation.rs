//! Unit tests for natural-language command translation

use std::collections::BTreeMap;

use kototerm::config::PatternRuleConfig;
use kototerm::translate::{
    AliasEntry, AliasTable, CommandCategory, PatternRule, PatternRuleSet, TranslationEngine,
};

fn engine() -> TranslationEngine {
    TranslationEngine::with_presets().expect("presets compile")
}

#[test]
fn test_delete_alias() {
    let preview = engine().translate("削除");

    assert_eq!(preview.original, "削除");
    assert_eq!(preview.command, "rm");
    assert_eq!(preview.converted, "rm");
    assert_eq!(preview.aliases_used.len(), 1);
    assert_eq!(preview.aliases_used[0].key, "削除");
    assert_eq!(preview.aliases_used[0].value, "rm");
}

#[test]
fn test_move_pattern() {
    let preview = engine().translate("projectに移動");

    assert_eq!(preview.command, "cd project");
    assert_eq!(preview.converted, "cd project");
    assert!(preview.aliases_used.is_empty());
}

#[test]
fn test_alias_lookup_trims_once() {
    let preview = engine().translate("  状態\n");
    assert_eq!(preview.command, "git status");
    assert_eq!(preview.original, "  状態\n");
}

#[test]
fn test_alias_lookup_is_exact() {
    // Inner whitespace and different casing do not match
    assert!(engine().translate("状 態").is_passthrough());

    let mut aliases = AliasTable::new();
    aliases.insert(AliasEntry::new("Build", "make", CommandCategory::System, ""));
    let engine = TranslationEngine::new(aliases, PatternRuleSet::new());
    assert_eq!(engine.translate("Build").command, "make");
    assert!(engine.translate("build").is_passthrough());
}

#[test]
fn test_unknown_input_passes_through() {
    for input in ["echo hello", "こんにちは", "", "   "] {
        let preview = engine().translate(input);
        assert_eq!(preview.original, input);
        assert_eq!(preview.converted, input);
        assert_eq!(preview.command, input);
        assert!(preview.aliases_used.is_empty());
    }
}

#[test]
fn test_earlier_rule_wins() {
    let mut rules = PatternRuleSet::new();
    rules.push(PatternRule::new(CommandCategory::File, &["^(.+)を開く$"], "open {target}", "A").unwrap());
    rules.push(PatternRule::new(CommandCategory::File, &["^(.+)を開く$"], "xdg-open {target}", "B").unwrap());
    let engine = TranslationEngine::new(AliasTable::new(), rules);

    for _ in 0..10 {
        assert_eq!(engine.translate("a.pdfを開く").command, "open a.pdf");
    }
}

#[test]
fn test_patterns_within_rule_in_order() {
    let rule = PatternRule::new(
        CommandCategory::File,
        &["^(.+)/(.+)に移動$", "^(.+)に移動$"],
        "cd {path}",
        "",
    )
    .unwrap();
    // The first pattern matches and takes group 1 only
    assert_eq!(rule.apply("a/bに移動").as_deref(), Some("cd a"));
    assert_eq!(rule.apply("srcに移動").as_deref(), Some("cd src"));
}

#[test]
fn test_placeholder_without_group_stays_literal() {
    let mut rules = PatternRuleSet::new();
    rules.push(
        PatternRule::new(CommandCategory::File, &["^(.+)をコピー$"], "cp {src} {dest}", "").unwrap(),
    );
    let engine = TranslationEngine::new(AliasTable::new(), rules);

    assert_eq!(engine.translate("a.txtをコピー").command, "cp a.txt {dest}");
}

#[test]
fn test_preset_rules() {
    let engine = engine();
    assert_eq!(engine.translate("srcフォルダに移動").command, "cd srcフォルダ");
    assert_eq!(engine.translate("logsを作成").command, "mkdir logs");
    assert_eq!(engine.translate("tmpを削除").command, "rm tmp");
    assert_eq!(engine.translate("README.mdの中身").command, "cat README.md");
    assert_eq!(engine.translate("Cargo.tomlを表示").command, "cat Cargo.toml");
}

#[test]
fn test_user_overlay_and_rules() {
    let mut overlay = BTreeMap::new();
    overlay.insert("削除".to_string(), "rm -i".to_string());
    overlay.insert("テスト".to_string(), "cargo test".to_string());

    let engine = engine()
        .with_overlay(&overlay)
        .with_rules(&[PatternRuleConfig {
            category: "git".to_string(),
            patterns: vec!["^(.+)をプッシュ$".to_string()],
            template: "git push origin {branch}".to_string(),
            description: "ブランチをプッシュします".to_string(),
        }])
        .unwrap();

    assert_eq!(engine.translate("削除").command, "rm -i");
    assert_eq!(engine.translate("テスト").command, "cargo test");
    assert_eq!(engine.translate("mainをプッシュ").command, "git push origin main");
    assert_eq!(engine.aliases().len(), 27);
}

#[test]
fn test_invalid_user_rule_is_rejected() {
    let result = engine().with_rules(&[PatternRuleConfig {
        category: "file".to_string(),
        patterns: vec!["([".to_string()],
        template: "x".to_string(),
        description: String::new(),
    }]);
    assert!(result.is_err());
}

#[test]
fn test_preset_categories() {
    let table = AliasTable::presets();
    assert_eq!(table.by_category(CommandCategory::File).count(), 13);
    assert_eq!(table.by_category(CommandCategory::Git).count(), 8);
    assert_eq!(table.by_category(CommandCategory::Ai).count(), 3);
    assert_eq!(table.by_category(CommandCategory::System).count(), 2);
    assert!(table.iter().all(|entry| !entry.description.is_empty()));
}
