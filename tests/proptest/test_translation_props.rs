//! Property-based tests for the translation engine
//!
//! Random phrases must never panic the engine, plain shell text must pass
//! through untouched, and matched rules must carry their capture verbatim.

use std::collections::BTreeMap;

use kototerm::translate::{
    AliasTable, CommandCategory, PatternRule, PatternRuleSet, TranslationEngine,
};
use proptest::prelude::*;

fn engine() -> TranslationEngine {
    TranslationEngine::with_presets().unwrap()
}

proptest! {
    #[test]
    fn test_translate_doesnt_panic_on_random_input(s in "\\PC*") {
        let preview = engine().translate(&s);
        prop_assert_eq!(preview.original, s);
    }

    #[test]
    fn test_ascii_commands_pass_through(s in "[a-zA-Z0-9 ./_|-]{0,64}") {
        let preview = engine().translate(&s);
        prop_assert!(preview.is_passthrough());
        prop_assert_eq!(&preview.command, &s);
        prop_assert_eq!(&preview.converted, &s);
    }

    #[test]
    fn test_move_phrase_keeps_target(
        target in "[a-zA-Z0-9_./~]{1,24}",
        pad in " {0,3}",
    ) {
        let input = format!("{}{}に移動{}", pad, target, pad);
        let preview = engine().translate(&input);
        prop_assert_eq!(preview.command, format!("cd {}", target));
        prop_assert_eq!(preview.original, input);
        prop_assert!(preview.aliases_used.is_empty());
    }

    #[test]
    fn test_user_alias_is_exact(
        phrase in "[ぁ-ん]{1,8}",
        command in "[a-z]{1,10}( -[a-z]{1,3})?",
    ) {
        let mut overlay = BTreeMap::new();
        overlay.insert(phrase.clone(), command.clone());
        let engine = engine().with_overlay(&overlay);

        let preview = engine.translate(&phrase);
        prop_assert_eq!(&preview.command, &command);
        prop_assert_eq!(preview.aliases_used.len(), 1);
        prop_assert_eq!(&preview.aliases_used[0].key, &phrase);

        // Extra text around the phrase is not an alias hit
        let longer = format!("{}です", phrase);
        prop_assert!(engine.translate(&longer).aliases_used.is_empty());
    }

    #[test]
    fn test_capture_is_substituted_verbatim(arg in "[a-z0-9][a-z0-9 ]{0,20}[a-z0-9]") {
        let mut rules = PatternRuleSet::new();
        rules.push(
            PatternRule::new(CommandCategory::System, &["^実行 (.+)$"], "sh -c '{arg}'", "")
                .unwrap(),
        );
        let engine = TranslationEngine::new(AliasTable::new(), rules);

        let preview = engine.translate(&format!("実行 {}", arg));
        prop_assert_eq!(preview.command, format!("sh -c '{}'", arg));
    }
}
