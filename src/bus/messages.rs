//! Bus message types
//!
//! Requests and events are tagged with their channel name (`terminal:execute`,
//! `ai:output`, ...) and carry a camelCase payload, so they serialize to the
//! shape a front-end expects on the wire.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::settings::{Settings, SettingsUpdate};
use crate::history::{HistoryEntry, HistoryRecord};
use crate::session::config::AiTool;
use crate::session::{OutputStream, SessionId};
use crate::translate::CommandPreview;

/// Requests a front-end can send to the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload")]
pub enum Request {
    /// Run `command` in the shell slot, starting a shell if none is live
    #[serde(rename = "terminal:execute", rename_all = "camelCase")]
    TerminalExecute {
        command: String,
        /// Only applies when a new shell has to be started
        #[serde(default)]
        cwd: Option<PathBuf>,
        /// What the user typed, if `command` came from a translation
        #[serde(default)]
        original: Option<String>,
    },

    /// Raw keystrokes for the shell
    #[serde(rename = "terminal:input")]
    TerminalInput { data: String },

    #[serde(rename = "terminal:resize")]
    TerminalResize { cols: u16, rows: u16 },

    /// Reset the shell output log
    #[serde(rename = "terminal:clear")]
    TerminalClear,

    #[serde(rename = "command:preview")]
    CommandPreview { input: String },

    #[serde(rename = "ai:execute")]
    AiExecute { prompt: String, tool: AiTool },

    #[serde(rename = "ai:input")]
    AiInput { tool: AiTool, data: String },

    #[serde(rename = "ai:resize")]
    AiResize { tool: AiTool, cols: u16, rows: u16 },

    #[serde(rename = "ai:stop")]
    AiStop { tool: AiTool },

    #[serde(rename = "settings:get")]
    SettingsGet,

    /// Partial update; published back as `settings:changed`
    #[serde(rename = "settings:set")]
    SettingsSet { settings: SettingsUpdate },

    #[serde(rename = "settings:get-aliases")]
    SettingsGetAliases,

    #[serde(rename = "settings:set-alias")]
    SettingsSetAlias { key: String, value: String },

    #[serde(rename = "settings:delete-alias")]
    SettingsDeleteAlias { key: String },

    /// Recent entries, or fuzzy matches when `query` is set
    #[serde(rename = "history:get")]
    HistoryGet {
        #[serde(default)]
        limit: Option<usize>,
        #[serde(default)]
        query: Option<String>,
    },

    #[serde(rename = "history:add")]
    HistoryAdd { entry: HistoryRecord },

    #[serde(rename = "history:delete")]
    HistoryDelete { id: Uuid },

    #[serde(rename = "history:clear")]
    HistoryClear,
}

impl Request {
    /// Channel name the request travels on
    pub fn channel(&self) -> &'static str {
        match self {
            Request::TerminalExecute { .. } => "terminal:execute",
            Request::TerminalInput { .. } => "terminal:input",
            Request::TerminalResize { .. } => "terminal:resize",
            Request::TerminalClear => "terminal:clear",
            Request::CommandPreview { .. } => "command:preview",
            Request::AiExecute { .. } => "ai:execute",
            Request::AiInput { .. } => "ai:input",
            Request::AiResize { .. } => "ai:resize",
            Request::AiStop { .. } => "ai:stop",
            Request::SettingsGet => "settings:get",
            Request::SettingsSet { .. } => "settings:set",
            Request::SettingsGetAliases => "settings:get-aliases",
            Request::SettingsSetAlias { .. } => "settings:set-alias",
            Request::SettingsDeleteAlias { .. } => "settings:delete-alias",
            Request::HistoryGet { .. } => "history:get",
            Request::HistoryAdd { .. } => "history:add",
            Request::HistoryDelete { .. } => "history:delete",
            Request::HistoryClear => "history:clear",
        }
    }
}

/// Replies to [`Request`]s
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Response {
    Ack,
    Preview(CommandPreview),
    Settings(Settings),
    /// The user alias overlay
    Aliases(BTreeMap<String, String>),
    History(Vec<HistoryEntry>),
    #[serde(rename_all = "camelCase")]
    Started { session_id: SessionId },
}

/// How an output payload should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Stdout,
    Stderr,
    /// Launch failures reported in-band
    Error,
}

impl From<OutputStream> for OutputKind {
    fn from(stream: OutputStream) -> Self {
        match stream {
            OutputStream::Stdout => OutputKind::Stdout,
            OutputStream::Stderr => OutputKind::Stderr,
        }
    }
}

/// Events pushed from the core to front-ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload")]
pub enum BusEvent {
    #[serde(rename = "terminal:output")]
    TerminalOutput {
        data: String,
        #[serde(rename = "type")]
        kind: OutputKind,
    },

    #[serde(rename = "ai:output")]
    AiOutput {
        data: String,
        #[serde(rename = "type")]
        kind: OutputKind,
    },

    #[serde(rename = "ai:started")]
    AiStarted { tool: AiTool },

    #[serde(rename = "ai:finished", rename_all = "camelCase")]
    AiFinished { tool: AiTool, exit_code: Option<i32> },

    /// Full settings after any change
    #[serde(rename = "settings:changed")]
    SettingsChanged(Settings),

    #[serde(rename = "history:toggled")]
    HistoryToggled { enabled: bool },
}

impl BusEvent {
    pub fn channel(&self) -> &'static str {
        match self {
            BusEvent::TerminalOutput { .. } => "terminal:output",
            BusEvent::AiOutput { .. } => "ai:output",
            BusEvent::AiStarted { .. } => "ai:started",
            BusEvent::AiFinished { .. } => "ai:finished",
            BusEvent::SettingsChanged(_) => "settings:changed",
            BusEvent::HistoryToggled { .. } => "history:toggled",
        }
    }
}
