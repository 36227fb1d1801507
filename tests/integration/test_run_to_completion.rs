//! Integration tests for single-shot command execution

#![cfg(unix)]

use std::time::{Duration, Instant};

use kototerm::error::Error;
use kototerm::execution::{run_to_completion, DirectExecutor, RunOptions};
use kototerm::pty::signals::is_process_running;
use tempfile::TempDir;

fn sh(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}

#[tokio::test]
async fn test_timeout_kills_process() {
    let dir = TempDir::new().unwrap();
    let pid_file = dir.path().join("pid");
    let script = format!("echo $$ > {}; exec sleep 5", pid_file.display());

    let started = Instant::now();
    let err = run_to_completion(
        "/bin/sh",
        &sh(&script),
        RunOptions::default().with_timeout(Duration::from_millis(300)),
    )
    .await
    .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(err.is_timeout());
    match err {
        Error::CommandTimeout { command, duration } => {
            assert_eq!(command, "/bin/sh");
            assert_eq!(duration, Duration::from_millis(300));
        }
        other => panic!("expected timeout, got {}", other),
    }

    let pid: u32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!(!is_process_running(pid), "pid {} still running", pid);
}

/// Gone, or a zombie waiting for its new parent to reap it
fn is_dead(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .is_some_and(|rest| rest.trim_start().starts_with('Z')),
        Err(_) => !is_process_running(pid),
    }
}

#[tokio::test]
async fn test_timeout_covers_background_grandchild() {
    let dir = TempDir::new().unwrap();
    let pid_file = dir.path().join("pid");
    // The shell exits at once; the background sleep keeps stdout open
    let script = format!("sleep 5 & echo $! > {}; echo hi", pid_file.display());

    let started = Instant::now();
    let err = run_to_completion(
        "/bin/sh",
        &sh(&script),
        RunOptions::default().with_timeout(Duration::from_millis(500)),
    )
    .await
    .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {}", err);
    assert!(started.elapsed() < Duration::from_secs(3));

    let pid: u32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while !is_dead(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(is_dead(pid), "background pid {} still running", pid);
}

#[tokio::test]
async fn test_completes_within_timeout() {
    let output = run_to_completion(
        "/bin/sh",
        &sh("printf 'a\\nb\\n'; printf oops >&2"),
        RunOptions::default().with_timeout(Duration::from_secs(5)),
    )
    .await
    .unwrap();

    assert_eq!(output.stdout, "a\nb\n");
    assert_eq!(output.stderr, "oops");
    assert!(output.success());
}

#[tokio::test]
async fn test_non_zero_exit_is_data() {
    let output = run_to_completion("/bin/sh", &sh("exit 7"), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(output.exit_code, Some(7));
}

#[tokio::test]
async fn test_cwd_and_env_options() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("memo.txt"), "メモ").unwrap();

    let options = RunOptions::default()
        .with_cwd(dir.path())
        .with_env("KOTOTERM_FILE", "memo.txt");
    let output = run_to_completion("/bin/sh", &sh("cat \"$KOTOTERM_FILE\""), options)
        .await
        .unwrap();
    assert_eq!(output.stdout, "メモ");
}

#[tokio::test]
async fn test_executor_run_line() {
    let mut executor = DirectExecutor::new();
    executor.set_default_timeout(Duration::from_secs(5));

    let output = executor.run_line("echo hello world").await.unwrap();
    assert_eq!(output.stdout.trim(), "hello world");

    let err = executor
        .run_line("kototerm-definitely-missing --flag")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CommandNotFound { .. }));
}
