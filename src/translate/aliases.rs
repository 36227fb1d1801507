//! Alias table
//!
//! Exact phrase to command mappings. Lookup is plain string equality, so it
//! is case- and whitespace-sensitive; callers trim once before looking up.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Command category, used for grouping help output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandCategory {
    File,
    Git,
    Ai,
    System,
}

impl CommandCategory {
    pub fn all() -> [CommandCategory; 4] {
        [
            CommandCategory::File,
            CommandCategory::Git,
            CommandCategory::Ai,
            CommandCategory::System,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandCategory::File => "file",
            CommandCategory::Git => "git",
            CommandCategory::Ai => "ai",
            CommandCategory::System => "system",
        }
    }

    /// Best guess for a user alias, from the command's first word
    pub fn infer(command: &str) -> Self {
        match command.split_whitespace().next().unwrap_or_default() {
            "git" => CommandCategory::Git,
            "claude" | "codex" | "gemini" => CommandCategory::Ai,
            "ls" | "pwd" | "cd" | "mkdir" | "touch" | "rm" | "cp" | "mv" | "cat" | "find" => {
                CommandCategory::File
            }
            _ => CommandCategory::System,
        }
    }
}

impl fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(CommandCategory::File),
            "git" => Ok(CommandCategory::Git),
            "ai" => Ok(CommandCategory::Ai),
            "system" => Ok(CommandCategory::System),
            other => Err(Error::Other(format!("unknown command category '{}'", other))),
        }
    }
}

/// One phrase → command mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub phrase: String,
    pub command: String,
    pub category: CommandCategory,
    pub description: String,
}

impl AliasEntry {
    pub fn new(
        phrase: impl Into<String>,
        command: impl Into<String>,
        category: CommandCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            phrase: phrase.into(),
            command: command.into(),
            category,
            description: description.into(),
        }
    }
}

/// Insertion-ordered alias table with exact lookup
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: Vec<AliasEntry>,
    index: HashMap<String, usize>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in Japanese aliases
    pub fn presets() -> Self {
        use CommandCategory::*;

        const PRESETS: &[(&str, &str, CommandCategory, &str)] = &[
            ("ファイル一覧", "ls -la", File, "カレントディレクトリのファイル一覧を表示します（隠しファイル含む）"),
            ("隠しファイル含む一覧", "ls -la", File, "カレントディレクトリのファイル一覧を表示します（隠しファイル含む）"),
            ("今いる場所", "pwd", File, "現在の作業ディレクトリのパスを表示します"),
            ("移動", "cd", File, "指定したディレクトリに移動します（例: 移動 /path/to/dir）"),
            ("戻る", "cd ..", File, "親ディレクトリに移動します"),
            ("ホームに戻る", "cd ~", File, "ホームディレクトリに移動します"),
            ("作成", "mkdir", File, "ディレクトリを作成します（例: 作成 dirname）"),
            ("ファイル作成", "touch", File, "空のファイルを作成します（例: ファイル作成 filename.txt）"),
            ("削除", "rm", File, "ファイルまたはディレクトリを削除します"),
            ("コピー", "cp", File, "ファイルをコピーします"),
            ("名前変更", "mv", File, "ファイル名を変更します"),
            ("中身を見る", "cat", File, "ファイルの内容を表示します"),
            ("検索", "find . -name", File, "ファイルを検索します（例: 検索 filename）"),
            ("状態", "git status", Git, "Gitリポジトリの状態を表示します"),
            ("差分", "git diff", Git, "変更点の差分を表示します"),
            ("履歴", "git log --oneline -20", Git, "コミット履歴を表示します"),
            ("保存", "git add . && git commit -m", Git, "変更をステージしてコミットします（例: 保存 \"メッセージ\"）"),
            ("送信", "git push", Git, "変更をリモートリポジトリにプッシュします"),
            ("取得", "git pull", Git, "リモートリポジトリから変更をプルします"),
            ("ブランチ一覧", "git branch -a", Git, "全てのブランチを表示します"),
            ("切替", "git checkout", Git, "指定したブランチに切り替えます"),
            ("クロード", "claude", Ai, "Claude Code CLIを起動します"),
            ("コーデックス", "codex", Ai, "Codex CLIを起動します"),
            ("ジェミニ", "gemini", Ai, "Gemini CLIを起動します"),
            ("クリア", "clear", System, "画面をクリアします"),
            ("終了", "exit", System, "アプリケーションを終了します"),
        ];

        let mut table = Self::new();
        for (phrase, command, category, description) in PRESETS {
            table.insert(AliasEntry::new(*phrase, *command, *category, *description));
        }
        table
    }

    /// Add an entry; an existing phrase is replaced in place
    pub fn insert(&mut self, entry: AliasEntry) {
        match self.index.get(&entry.phrase) {
            Some(&pos) => self.entries[pos] = entry,
            None => {
                self.index.insert(entry.phrase.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Exact lookup
    pub fn get(&self, phrase: &str) -> Option<&AliasEntry> {
        self.index.get(phrase).map(|&pos| &self.entries[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &AliasEntry> {
        self.entries.iter()
    }

    pub fn by_category(&self, category: CommandCategory) -> impl Iterator<Item = &AliasEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
