//! Integration tests for the core service: requests in, bus events out

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use kototerm::bus::{BusEvent, CoreService, OutputKind, Request, Response};
use kototerm::config::settings::{HistoryUpdate, MemorySettings, SettingsUpdate};
use kototerm::config::{Config, HistoryConfig};
use kototerm::error::{Error, Result};
use kototerm::history::{HistoryKind, HistoryRecord, HistoryStore, MemoryHistory};
use kototerm::pty::EventSubscription;
use kototerm::session::{AiTool, ManagerOptions, SessionConfig, SessionConfigFactory, TerminalSize};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

struct TestFactory;

impl SessionConfigFactory for TestFactory {
    fn shell_config(&self) -> Result<SessionConfig> {
        Ok(SessionConfig::shell("/bin/sh"))
    }

    fn ai_tool_config(&self, tool: AiTool) -> Result<SessionConfig> {
        Ok(SessionConfig::ai_tool(tool, "/bin/cat"))
    }
}

fn service() -> (CoreService, Arc<MemoryHistory>) {
    let history = Arc::new(MemoryHistory::new(HistoryConfig::default()));
    let options = ManagerOptions {
        grace_period: Duration::from_millis(500),
        size: TerminalSize::default(),
        event_capacity: 1024,
    };
    let service = CoreService::with_parts(
        Arc::new(MemorySettings::default()),
        history.clone(),
        Arc::new(TestFactory),
        options,
    )
    .unwrap();
    (service, history)
}

/// Wait for an event matching `pred`, skipping everything else
async fn wait_for<F>(events: &mut EventSubscription<BusEvent>, mut pred: F) -> BusEvent
where
    F: FnMut(&BusEvent) -> bool,
{
    loop {
        let event = timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for a bus event")
            .expect("bus closed");
        if pred(&event) {
            return event;
        }
    }
}

/// Accumulate terminal output until it contains `needle`
async fn wait_for_terminal_text(events: &mut EventSubscription<BusEvent>, needle: &str) -> String {
    let mut text = String::new();
    while !text.contains(needle) {
        if let BusEvent::TerminalOutput { data, kind } =
            wait_for(events, |e| matches!(e, BusEvent::TerminalOutput { .. })).await
        {
            assert_eq!(kind, OutputKind::Stdout);
            text.push_str(&data);
        }
    }
    text
}

#[tokio::test]
async fn test_execute_reuses_shell_and_logs_output() {
    let (service, history) = service();
    let mut events = service.subscribe();

    let first = service
        .handle(Request::TerminalExecute {
            command: "echo $((20+22))".to_string(),
            cwd: None,
            original: None,
        })
        .await
        .unwrap();
    wait_for_terminal_text(&mut events, "42").await;

    let second = service
        .handle(Request::TerminalExecute {
            command: "echo done-$((1+1))".to_string(),
            cwd: None,
            original: None,
        })
        .await
        .unwrap();
    wait_for_terminal_text(&mut events, "done-2").await;
    assert_eq!(first, second);

    assert!(service.terminal_log().contains("42"));
    service.handle(Request::TerminalClear).await.unwrap();
    // A trailing prompt may still arrive after the clear
    assert!(!service.terminal_log().contains("done-2"));

    let recent = history.recent(10);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].record.input, "echo done-$((1+1))");
    assert_eq!(recent[0].record.converted, None);

    service.shutdown().await;
}

#[tokio::test]
async fn test_translated_input_runs_and_is_recorded() {
    let (service, history) = service();
    let mut events = service.subscribe();

    service
        .handle(Request::SettingsSetAlias {
            key: "答え".to_string(),
            value: "echo $((40+2))".to_string(),
        })
        .await
        .unwrap();

    service.run_input("答え").await.unwrap();
    wait_for_terminal_text(&mut events, "42").await;

    let entry = &history.recent(1)[0];
    assert_eq!(entry.record.kind, HistoryKind::Command);
    assert_eq!(entry.record.input, "答え");
    assert_eq!(entry.record.converted.as_deref(), Some("echo $((40+2))"));

    match service.handle(Request::SettingsGetAliases).await.unwrap() {
        Response::Aliases(aliases) => assert_eq!(aliases.len(), 1),
        other => panic!("unexpected response: {:?}", other),
    }

    service.shutdown().await;
}

#[tokio::test]
async fn test_ai_run_lifecycle() {
    let (service, history) = service();
    let mut events = service.subscribe();

    let response = service
        .handle(Request::AiExecute {
            prompt: "やあ".to_string(),
            tool: AiTool::Codex,
        })
        .await
        .unwrap();
    assert!(matches!(response, Response::Started { .. }));

    assert_eq!(
        wait_for(&mut events, |e| matches!(e, BusEvent::AiStarted { .. })).await,
        BusEvent::AiStarted { tool: AiTool::Codex }
    );

    let mut text = String::new();
    while !text.contains("やあ") {
        if let BusEvent::AiOutput { data, .. } =
            wait_for(&mut events, |e| matches!(e, BusEvent::AiOutput { .. })).await
        {
            text.push_str(&data);
        }
    }

    service
        .handle(Request::AiStop { tool: AiTool::Codex })
        .await
        .unwrap();
    assert_eq!(
        wait_for(&mut events, |e| matches!(e, BusEvent::AiFinished { .. })).await,
        BusEvent::AiFinished {
            tool: AiTool::Codex,
            exit_code: None
        }
    );

    // Stopping again is harmless
    service
        .handle(Request::AiStop { tool: AiTool::Codex })
        .await
        .unwrap();

    service.shutdown().await;

    let entry = &history.recent(1)[0];
    assert_eq!(entry.record.kind, HistoryKind::Ai);
    assert_eq!(entry.record.tool, Some(AiTool::Codex));
    assert_eq!(entry.record.input, "やあ");
    assert_eq!(entry.record.exit_code, None);
}

#[tokio::test]
async fn test_disabled_tool_reports_error_event() {
    let mut config = Config::default();
    config.ai_tools.gemini.enabled = false;
    let service = CoreService::new(config).unwrap();
    let mut events = service.subscribe();

    let err = service
        .handle(Request::AiExecute {
            prompt: "hello".to_string(),
            tool: AiTool::Gemini,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ToolDisabled { .. }));

    match wait_for(&mut events, |_| true).await {
        BusEvent::AiOutput { kind, data } => {
            assert_eq!(kind, OutputKind::Error);
            assert!(data.starts_with("gemini"));
        }
        other => panic!("unexpected event: {:?}", other),
    }

    service.shutdown().await;
}

#[tokio::test]
async fn test_history_requests() {
    let (service, _) = service();

    for input in ["git status", "ls -la", "git log"] {
        let request: Request = serde_json::from_value(serde_json::json!({
            "channel": "history:add",
            "payload": {
                "entry": {
                    "kind": "command",
                    "input": input,
                    "converted": null,
                    "tool": null,
                    "exitCode": 0,
                    "durationMs": 12
                }
            }
        }))
        .unwrap();
        service.handle(request).await.unwrap();
    }

    let Response::History(all) = service
        .handle(Request::HistoryGet {
            limit: Some(2),
            query: None,
        })
        .await
        .unwrap()
    else {
        panic!("expected history");
    };
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].record.input, "git log");

    let Response::History(matches) = service
        .handle(Request::HistoryGet {
            limit: None,
            query: Some("gst".to_string()),
        })
        .await
        .unwrap()
    else {
        panic!("expected history");
    };
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].record.input, "git status");

    service
        .handle(Request::HistoryDelete { id: matches[0].id })
        .await
        .unwrap();
    service.handle(Request::HistoryClear).await.unwrap();

    let Response::History(rest) = service
        .handle(Request::HistoryGet {
            limit: None,
            query: None,
        })
        .await
        .unwrap()
    else {
        panic!("expected history");
    };
    assert!(rest.is_empty());

    service.shutdown().await;
}

#[tokio::test]
async fn test_settings_changes_are_published() {
    let (service, history) = service();
    let mut events = service.subscribe();

    let Response::Settings(before) = service.handle(Request::SettingsGet).await.unwrap() else {
        panic!("expected settings");
    };
    assert!(before.history.enabled);
    assert!(before.aliases.is_empty());

    service
        .handle(Request::SettingsSetAlias {
            key: "ビルド".to_string(),
            value: "cargo build".to_string(),
        })
        .await
        .unwrap();
    match wait_for(&mut events, |_| true).await {
        BusEvent::SettingsChanged(settings) => {
            assert_eq!(
                settings.aliases.get("ビルド").map(String::as_str),
                Some("cargo build")
            );
        }
        other => panic!("unexpected event: {:?}", other),
    }

    let request: Request = serde_json::from_value(serde_json::json!({
        "channel": "settings:set",
        "payload": { "settings": { "history": { "enabled": false } } }
    }))
    .unwrap();
    service.handle(request).await.unwrap();
    match wait_for(&mut events, |_| true).await {
        BusEvent::SettingsChanged(settings) => {
            assert!(!settings.history.enabled);
            assert_eq!(settings.aliases.len(), 1);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(
        wait_for(&mut events, |_| true).await,
        BusEvent::HistoryToggled { enabled: false }
    );

    // Recording is off
    service
        .handle(Request::HistoryAdd {
            entry: HistoryRecord::command("ls", None),
        })
        .await
        .unwrap();
    assert!(history.recent(10).is_empty());

    // Unchanged flag: settings:changed only
    service
        .handle(Request::SettingsSet {
            settings: SettingsUpdate::history_enabled(false),
        })
        .await
        .unwrap();
    assert!(matches!(
        wait_for(&mut events, |_| true).await,
        BusEvent::SettingsChanged(_)
    ));
    service
        .handle(Request::SettingsSet {
            settings: SettingsUpdate::history_enabled(true),
        })
        .await
        .unwrap();
    assert!(matches!(
        wait_for(&mut events, |_| true).await,
        BusEvent::SettingsChanged(_)
    ));
    assert_eq!(
        wait_for(&mut events, |_| true).await,
        BusEvent::HistoryToggled { enabled: true }
    );

    let err = service
        .handle(Request::SettingsSet {
            settings: SettingsUpdate {
                history: Some(HistoryUpdate {
                    enabled: Some(false),
                    max_entries: Some(0),
                }),
                ..SettingsUpdate::default()
            },
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConfigValidationFailed { .. }));
    let Response::Settings(after) = service.handle(Request::SettingsGet).await.unwrap() else {
        panic!("expected settings");
    };
    assert!(after.history.enabled);

    service.shutdown().await;
}
