//! Contract Tests for the Session Manager
//!
//! At most one live session per slot, routing by session id, republishing
//! of session events and teardown without orphans.

#![cfg(unix)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use kototerm::error::{Error, Result};
use kototerm::pty::signals::is_process_running;
use kototerm::pty::EventSubscription;
use kototerm::session::{
    AiTool, ManagerEvent, ManagerOptions, SessionConfig, SessionConfigFactory, SessionId,
    SessionManager, Slot, TerminalSize,
};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

/// Shells are `/bin/sh`; every AI tool is `cat`, which echoes its prompt
struct TestFactory {
    tool_executable: &'static str,
}

impl SessionConfigFactory for TestFactory {
    fn shell_config(&self) -> Result<SessionConfig> {
        Ok(SessionConfig::shell("/bin/sh"))
    }

    fn ai_tool_config(&self, tool: AiTool) -> Result<SessionConfig> {
        Ok(SessionConfig::ai_tool(tool, self.tool_executable))
    }
}

fn manager_with_grace(tool_executable: &'static str, grace_period: Duration) -> SessionManager {
    let options = ManagerOptions {
        grace_period,
        size: TerminalSize::default(),
        event_capacity: 1024,
    };
    SessionManager::new(Arc::new(TestFactory { tool_executable }), options)
}

fn manager_with(tool_executable: &'static str) -> SessionManager {
    manager_with_grace(tool_executable, Duration::from_millis(500))
}

fn sh(script: &str) -> SessionConfig {
    SessionConfig::shell("/bin/sh").with_args(["-c", script])
}

fn manager() -> SessionManager {
    manager_with("/bin/cat")
}

async fn next_event(events: &mut EventSubscription<ManagerEvent>) -> ManagerEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for a manager event")
        .expect("manager event bus closed")
}

/// Wait for `Exited` of `session_id`, skipping everything else
async fn wait_exited(events: &mut EventSubscription<ManagerEvent>, session_id: SessionId) -> Option<i32> {
    loop {
        if let ManagerEvent::Exited {
            session_id: id,
            exit_code,
            ..
        } = next_event(events).await
        {
            if id == session_id {
                return exit_code;
            }
        }
    }
}

#[tokio::test]
async fn test_starting_second_shell_replaces_first() {
    let manager = manager();
    let mut events = manager.subscribe();

    let first = manager.start_shell(None).await.unwrap();
    let first_pid = manager.session_in(Slot::Shell).unwrap().pid().unwrap();

    let second = manager.start_shell(None).await.unwrap();
    assert_ne!(first, second);

    assert_eq!(manager.live_sessions(), vec![(Slot::Shell, second)]);
    assert!(!is_process_running(first_pid));

    // The replaced session is reported as ended without a code
    assert_eq!(wait_exited(&mut events, first).await, None);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_replacement_escalates_to_force_kill() {
    let grace = Duration::from_millis(200);
    let manager = manager_with_grace("/bin/cat", grace);
    let mut events = manager.subscribe();

    let old = manager
        .start_shell(Some(sh("trap '' HUP TERM; echo ready; while :; do sleep 0.05; done")))
        .await
        .unwrap();
    let old_pid = manager.session_in(Slot::Shell).unwrap().pid().unwrap();

    // Signals are ignored only once the trap is installed
    let mut output = Vec::new();
    while !String::from_utf8_lossy(&output).contains("ready") {
        if let ManagerEvent::Output { data, .. } = next_event(&mut events).await {
            output.extend(data);
        }
    }

    let started = Instant::now();
    let new = manager.start_shell(None).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= grace, "replaced after {:?}, before the grace period", elapsed);
    assert!(!is_process_running(old_pid), "pid {} survived replacement", old_pid);
    assert_eq!(wait_exited(&mut events, old).await, None);
    assert_eq!(manager.live_sessions(), vec![(Slot::Shell, new)]);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_replaced_session_output_stops_routing() {
    let manager = manager();
    let mut events = manager.subscribe();

    let old = manager
        .start_shell(Some(sh("while :; do echo old; sleep 0.01; done")))
        .await
        .unwrap();
    loop {
        if let ManagerEvent::Output { session_id, .. } = next_event(&mut events).await {
            if session_id == old {
                break;
            }
        }
    }

    let new = manager
        .start_shell(Some(sh("sleep 0.5; echo new")))
        .await
        .unwrap();

    let mut old_exited = false;
    let mut new_started = false;
    let mut new_output = Vec::new();
    loop {
        match next_event(&mut events).await {
            ManagerEvent::Exited { session_id, .. } if session_id == old => {
                assert!(!new_started, "old Exited after the new Started");
                old_exited = true;
            }
            ManagerEvent::Started { session_id, .. } => {
                assert_eq!(session_id, new);
                new_started = true;
            }
            ManagerEvent::Output { session_id, data, .. } => {
                if new_started {
                    assert_ne!(session_id, old, "old output routed after replacement");
                    new_output.extend(data);
                }
            }
            ManagerEvent::Exited { session_id, exit_code, .. } => {
                assert_eq!(session_id, new);
                assert_eq!(exit_code, Some(0));
                break;
            }
        }
    }

    assert!(old_exited);
    assert!(String::from_utf8_lossy(&new_output).contains("new"));
}

#[tokio::test]
async fn test_shell_output_is_republished() {
    let manager = manager();
    let mut events = manager.subscribe();

    let id = manager.start_shell(None).await.unwrap();
    manager.write(id, b"echo $((6*7))\n").await.unwrap();
    manager.write(id, b"exit 5\n").await.unwrap();

    let mut saw_started = false;
    let mut output = Vec::new();
    let exit_code = loop {
        match next_event(&mut events).await {
            ManagerEvent::Started { session_id, slot, pid } => {
                assert_eq!((session_id, slot), (id, Slot::Shell));
                assert!(pid.is_some());
                saw_started = true;
            }
            ManagerEvent::Output { session_id, data, .. } => {
                assert_eq!(session_id, id);
                assert!(saw_started, "output before Started");
                output.extend(data);
            }
            ManagerEvent::Exited { session_id, exit_code, .. } => {
                assert_eq!(session_id, id);
                break exit_code;
            }
        }
    };

    assert!(String::from_utf8_lossy(&output).contains("42"));
    assert_eq!(exit_code, Some(5));

    // A session that exited on its own leaves its slot
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(manager.session_in(Slot::Shell).is_none());
    assert!(matches!(
        manager.write(id, b"ls\n").await,
        Err(Error::UnknownSession { .. })
    ));
}

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let manager = manager();
    let stale = SessionId::new();

    assert!(manager.write(stale, b"x").await.unwrap_err().is_unknown_session());
    assert!(manager.resize(stale, 80, 24).await.unwrap_err().is_unknown_session());
    assert!(manager.stop(stale).await.unwrap_err().is_unknown_session());
}

#[tokio::test]
async fn test_ai_tool_receives_prompt() {
    let manager = manager();
    let mut events = manager.subscribe();

    let id = manager
        .start_ai_tool(AiTool::Claude, "konnichiwa")
        .await
        .unwrap();

    let mut output = Vec::new();
    while !String::from_utf8_lossy(&output).contains("konnichiwa") {
        if let ManagerEvent::Output {
            session_id, slot, data, ..
        } = next_event(&mut events).await
        {
            assert_eq!(session_id, id);
            assert_eq!(slot, Slot::Ai(AiTool::Claude));
            output.extend(data);
        }
    }

    // Each tool has its own slot
    let shell = manager.start_shell(None).await.unwrap();
    assert_eq!(
        manager.live_sessions(),
        vec![(Slot::Shell, shell), (Slot::Ai(AiTool::Claude), id)]
    );

    manager.stop(id).await.unwrap();
    assert_eq!(wait_exited(&mut events, id).await, None);
    assert_eq!(manager.live_sessions(), vec![(Slot::Shell, shell)]);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_missing_tool_is_launch_error() {
    let manager = manager_with("/nonexistent/claude");

    let err = manager
        .start_ai_tool(AiTool::Claude, "hello")
        .await
        .unwrap_err();
    assert!(err.is_launch_error(), "unexpected error: {}", err);
    assert!(manager.live_sessions().is_empty());
}

#[tokio::test]
async fn test_shutdown_leaves_no_processes() {
    let manager = manager();
    manager.start_shell(None).await.unwrap();
    manager.start_ai_tool(AiTool::Gemini, "").await.unwrap();

    let pids: Vec<u32> = Slot::all()
        .iter()
        .filter_map(|slot| manager.session_in(*slot))
        .filter_map(|session| session.pid())
        .collect();
    assert_eq!(pids.len(), 2);

    manager.shutdown().await;
    manager.shutdown().await;

    assert!(manager.live_sessions().is_empty());
    for pid in pids {
        assert!(!is_process_running(pid), "pid {} survived shutdown", pid);
    }
    assert!(matches!(
        manager.start_shell(None).await,
        Err(Error::ManagerShutDown)
    ));
}
