//! Contract Tests for Session Lifecycle
//!
//! A session is one child on a PTY: it starts `Running`, forwards output in
//! order, ends in `Exited` or `Killed`, and reports its end exactly once.

#![cfg(unix)]

use std::time::Duration;

use kototerm::session::{
    OutputStream, Session, SessionConfig, SessionEvent, SessionState, SessionSubscription,
    TerminalSize,
};
use tempfile::TempDir;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

fn sh(script: &str) -> SessionConfig {
    SessionConfig::shell("/bin/sh").with_args(["-c", script])
}

/// Collect output until `Exited`; returns the text and the exit code
async fn collect_until_exit(sub: &mut SessionSubscription) -> (String, Option<i32>) {
    let mut output = Vec::new();
    loop {
        match timeout(WAIT, sub.recv()).await {
            Ok(Some(SessionEvent::Output { stream, data })) => {
                assert_eq!(stream, OutputStream::Stdout);
                output.extend_from_slice(&data);
            }
            Ok(Some(SessionEvent::Exited { exit_code })) => {
                return (String::from_utf8_lossy(&output).into_owned(), exit_code);
            }
            Ok(Some(SessionEvent::Started { .. })) => panic!("Started delivered twice"),
            Ok(None) => panic!("subscription closed without Exited"),
            Err(_) => panic!("timed out waiting for Exited"),
        }
    }
}

async fn expect_started(sub: &mut SessionSubscription) {
    match timeout(WAIT, sub.recv()).await {
        Ok(Some(SessionEvent::Started { pid })) => assert!(pid.is_some()),
        other => panic!("expected Started first, got {:?}", other),
    }
}

#[tokio::test]
async fn test_output_arrives_before_exit() {
    let session = Session::start(SessionConfig::shell("/bin/sh"), TerminalSize::default())
        .await
        .unwrap();
    let mut sub = session.subscribe_output();
    expect_started(&mut sub).await;
    assert_eq!(session.state().await, SessionState::Running);

    session.write(b"echo $((40+2))\n").await.unwrap();
    session.write(b"exit\n").await.unwrap();

    let (output, exit_code) = collect_until_exit(&mut sub).await;
    assert!(output.contains("42"), "output was {:?}", output);
    assert_eq!(exit_code, Some(0));
    assert_eq!(session.state().await, SessionState::Exited);
    assert!(sub.recv().await.is_none());
}

#[tokio::test]
async fn test_natural_exit_code() {
    let session = Session::start(sh("exit 3"), TerminalSize::default())
        .await
        .unwrap();
    let mut sub = session.subscribe_output();
    expect_started(&mut sub).await;

    let (_, exit_code) = collect_until_exit(&mut sub).await;
    assert_eq!(exit_code, Some(3));
    assert!(session.wait_for_exit(WAIT).await);
    assert_eq!(session.exit_code().await, Some(3));
    assert_eq!(session.info().await.state, SessionState::Exited);
}

#[tokio::test]
async fn test_signal_death_has_no_exit_code() {
    let session = Session::start(sh("kill -9 $$"), TerminalSize::default())
        .await
        .unwrap();
    let mut sub = session.subscribe_output();
    expect_started(&mut sub).await;

    let (_, exit_code) = collect_until_exit(&mut sub).await;
    assert_eq!(exit_code, None);
    assert_eq!(session.state().await, SessionState::Exited);
    assert_eq!(session.exit_code().await, None);
}

#[tokio::test]
async fn test_stop_twice_transitions_once() {
    let session = Session::start(sh("sleep 30"), TerminalSize::default())
        .await
        .unwrap();
    let mut sub = session.subscribe_output();
    expect_started(&mut sub).await;

    assert!(session.stop().await.unwrap());
    assert!(!session.stop().await.unwrap());
    assert_eq!(session.state().await, SessionState::Killed);

    let (_, exit_code) = collect_until_exit(&mut sub).await;
    assert_eq!(exit_code, None);
    assert!(session.wait_for_exit(WAIT).await);

    // Nothing after the single Exited
    assert!(sub.recv().await.is_none());
    assert!(!session.stop().await.unwrap());
    assert_eq!(session.state().await, SessionState::Killed);
}

#[tokio::test]
async fn test_resize_and_write_after_exit_are_noops() {
    let session = Session::start(sh("true"), TerminalSize::new(100, 30))
        .await
        .unwrap();
    assert!(session.wait_for_exit(WAIT).await);

    session.resize(200, 50).await.unwrap();
    session.write(b"ignored\n").await.unwrap();
    assert_eq!(session.size().await, TerminalSize::new(100, 30));
}

#[tokio::test]
async fn test_resize_while_running() {
    let session = Session::start(SessionConfig::shell("/bin/sh"), TerminalSize::default())
        .await
        .unwrap();
    let mut sub = session.subscribe_output();
    expect_started(&mut sub).await;

    session.resize(132, 43).await.unwrap();
    assert_eq!(session.size().await, TerminalSize::new(132, 43));

    session.write(b"stty size\n").await.unwrap();
    session.write(b"exit\n").await.unwrap();
    let (output, _) = collect_until_exit(&mut sub).await;
    assert!(output.contains("43 132"), "output was {:?}", output);
}

#[tokio::test]
async fn test_missing_executable_is_launch_error() {
    let err = Session::start(
        SessionConfig::shell("/nonexistent/kototerm-shell"),
        TerminalSize::default(),
    )
    .await
    .unwrap_err();
    assert!(err.is_launch_error(), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_working_directory_and_env_overrides() {
    let dir = TempDir::new().unwrap();
    let marker = dir
        .path()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();

    let config = sh("pwd; echo \"$KOTOTERM_MARK\"")
        .with_working_directory(dir.path())
        .with_env("KOTOTERM_MARK", "mark-7")
        .with_env("HOME", "/nonexistent-home");
    let session = Session::start(config, TerminalSize::default()).await.unwrap();
    let mut sub = session.subscribe_output();
    expect_started(&mut sub).await;

    let (output, exit_code) = collect_until_exit(&mut sub).await;
    assert_eq!(exit_code, Some(0));
    assert!(output.contains(&marker), "output was {:?}", output);
    assert!(output.contains("mark-7"), "output was {:?}", output);
}

#[tokio::test]
async fn test_late_subscriber_still_sees_exit() {
    let session = Session::start(sh("echo early"), TerminalSize::default())
        .await
        .unwrap();
    assert!(session.wait_for_exit(WAIT).await);

    // First subscriber gets the backlog, including Started
    let mut sub = session.subscribe_output();
    expect_started(&mut sub).await;
    let (output, exit_code) = collect_until_exit(&mut sub).await;
    assert!(output.contains("early"));
    assert_eq!(exit_code, Some(0));
}
