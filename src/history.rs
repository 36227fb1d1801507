//! Command history port
//!
//! The core records what was run through [`HistoryStore`]. Persistence is the
//! caller's concern; [`MemoryHistory`] is the bounded in-process store.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::HistoryConfig;
use crate::error::Result;
use crate::session::config::AiTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Command,
    Ai,
}

/// What gets recorded for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub kind: HistoryKind,
    /// Text the user typed
    pub input: String,
    /// Translated command, when translation changed the input
    pub converted: Option<String>,
    pub tool: Option<AiTool>,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

impl HistoryRecord {
    pub fn command(input: impl Into<String>, converted: Option<String>) -> Self {
        Self {
            kind: HistoryKind::Command,
            input: input.into(),
            converted,
            tool: None,
            exit_code: None,
            duration_ms: 0,
        }
    }

    pub fn ai(tool: AiTool, prompt: impl Into<String>, exit_code: Option<i32>, duration_ms: u64) -> Self {
        Self {
            kind: HistoryKind::Ai,
            input: prompt.into(),
            converted: None,
            tool: Some(tool),
            exit_code,
            duration_ms,
        }
    }
}

/// A stored record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub record: HistoryRecord,
}

/// History storage port
pub trait HistoryStore: Send + Sync {
    /// Store a record; returns the new entry, or `None` if recording is off
    fn add(&self, record: HistoryRecord) -> Result<Option<HistoryEntry>>;

    /// Newest first, at most `limit`
    fn recent(&self, limit: usize) -> Vec<HistoryEntry>;

    /// Fuzzy match on input and converted text, best first
    fn search(&self, query: &str) -> Vec<HistoryEntry>;

    fn delete(&self, id: Uuid) -> Result<bool>;

    fn clear(&self) -> Result<()>;

    /// Apply changed history settings
    fn configure(&self, config: HistoryConfig);
}

/// Bounded in-memory history
#[derive(Debug)]
pub struct MemoryHistory {
    entries: Mutex<VecDeque<HistoryEntry>>,
    config: Mutex<HistoryConfig>,
}

impl MemoryHistory {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            config: Mutex::new(config),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn config(&self) -> HistoryConfig {
        self.config
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<HistoryEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl HistoryStore for MemoryHistory {
    fn add(&self, record: HistoryRecord) -> Result<Option<HistoryEntry>> {
        let config = self.config();
        if !config.enabled || record.input.trim().is_empty() {
            return Ok(None);
        }

        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            record,
        };

        let mut entries = self.lock();
        entries.push_back(entry.clone());
        while entries.len() > config.max_entries {
            entries.pop_front();
        }
        trace!(id = %entry.id, size = entries.len(), "History entry added");
        Ok(Some(entry))
    }

    fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        self.lock().iter().rev().take(limit).cloned().collect()
    }

    fn search(&self, query: &str) -> Vec<HistoryEntry> {
        let entries = self.lock();
        if query.is_empty() {
            return entries.iter().rev().cloned().collect();
        }

        let query = query.to_lowercase();
        let mut scored: Vec<(usize, usize, &HistoryEntry)> = entries
            .iter()
            .enumerate()
            .filter_map(|(pos, entry)| {
                let input = fuzzy_score(&query, &entry.record.input.to_lowercase());
                let converted = entry
                    .record
                    .converted
                    .as_deref()
                    .map_or(0, |c| fuzzy_score(&query, &c.to_lowercase()));
                let score = input.max(converted);
                (score > 0).then_some((score, pos, entry))
            })
            .collect();

        // Higher score first, newer first on ties
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        scored.into_iter().map(|(_, _, e)| e.clone()).collect()
    }

    fn delete(&self, id: Uuid) -> Result<bool> {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        Ok(entries.len() != before)
    }

    fn clear(&self) -> Result<()> {
        self.lock().clear();
        debug!("History cleared");
        Ok(())
    }

    fn configure(&self, config: HistoryConfig) {
        let mut entries = self.lock();
        while entries.len() > config.max_entries {
            entries.pop_front();
        }
        debug!(enabled = config.enabled, max_entries = config.max_entries, "History reconfigured");
        *self
            .config
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = config;
    }
}

/// Subsequence score; consecutive hits weigh more. Zero means no match.
fn fuzzy_score(query: &str, target: &str) -> usize {
    let mut target_chars = target.chars();
    let mut score = 0;
    let mut consecutive = 0;

    for q in query.chars() {
        loop {
            match target_chars.next() {
                Some(t) if t == q => {
                    score += 1 + consecutive * 5;
                    consecutive += 1;
                    break;
                }
                Some(_) => consecutive = 0,
                None => return 0,
            }
        }
    }

    score
}
