//! A single PTY-backed child process
//!
//! `Session::start` spawns the child and two background activities: a waiter
//! thread that blocks on the child's exit, and a pump task that turns PTY
//! output into [`SessionEvent`]s. The pump is the only producer of events, so
//! a session's events are delivered in order on one logical stream.

use chrono::{DateTime, Utc};
use portable_pty::{Child, ChildKiller, MasterPty, PtySize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender as StdSender;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, watch, Mutex};

use super::{
    OutputStream, SessionConfig, SessionEvent, SessionId, SessionInfo, SessionState, TerminalSize,
};
use crate::error::{Error, Result};
use crate::pty::process::spawn_pty_process;
use crate::pty::signals;

/// Quiet period after the child is reaped before `Exited` is emitted
const OUTPUT_DRAIN_IDLE: Duration = Duration::from_millis(100);

/// Events held for the first subscriber
const BACKLOG_LIMIT: usize = 1024;

/// What the session exclusively owns while the child is alive
struct ProcessHandle {
    master: Box<dyn MasterPty + Send>,
    input_tx: StdSender<Vec<u8>>,
}

struct Control {
    state: SessionState,
    size: TerminalSize,
    exit_code: Option<i32>,
    handle: Option<ProcessHandle>,
}

#[derive(Default)]
struct Subscribers {
    senders: Vec<UnboundedSender<SessionEvent>>,
    backlog: VecDeque<SessionEvent>,
    ever_subscribed: bool,
    closed: bool,
}

struct Shared {
    id: SessionId,
    pid: Option<u32>,
    control: Mutex<Control>,
    killer: StdMutex<Option<Box<dyn ChildKiller + Send + Sync>>>,
    subscribers: StdMutex<Subscribers>,
    /// Set by the waiter as soon as `wait()` returns; the pid may be reused after
    waited: AtomicBool,
    reaped: watch::Sender<bool>,
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    fn emit(&self, event: SessionEvent) {
        let mut subs = lock(&self.subscribers);
        if subs.closed {
            return;
        }
        if !subs.ever_subscribed {
            if subs.backlog.len() >= BACKLOG_LIMIT {
                // Keep Started at the front
                let drop_at = usize::from(matches!(
                    subs.backlog.front(),
                    Some(SessionEvent::Started { .. })
                ));
                let _ = subs.backlog.remove(drop_at);
            }
            subs.backlog.push_back(event);
            return;
        }
        subs.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn close_subscribers(&self) {
        let mut subs = lock(&self.subscribers);
        subs.closed = true;
        subs.senders.clear();
    }

    /// Terminal transition on child exit. Runs once, from the pump.
    async fn finalize(&self, exit_code: Option<i32>) {
        let mut control = self.control.lock().await;
        let reported = match control.state {
            SessionState::Starting | SessionState::Running => {
                control.state = SessionState::Exited;
                control.exit_code = exit_code;
                exit_code
            }
            SessionState::Killed => None,
            SessionState::Exited => return,
        };
        let handle = control.handle.take();
        drop(control);
        drop(handle);
        lock(&self.killer).take();

        info!(session_id = %self.id, pid = ?self.pid, exit_code = ?reported, "Session exited");
        self.emit(SessionEvent::Exited {
            exit_code: reported,
        });
        self.close_subscribers();
        let _ = self.reaped.send(true);
    }

    fn child_waited(&self) -> bool {
        self.waited.load(Ordering::SeqCst)
    }

    fn kill_now(&self) {
        if self.child_waited() {
            return;
        }

        #[cfg(unix)]
        if let Some(pid) = self.pid {
            let _ = signals::kill_now(pid);
            return;
        }

        if let Some(killer) = lock(&self.killer).as_mut() {
            if let Err(e) = killer.kill() {
                warn!(session_id = %self.id, "Failed to kill child: {}", e);
            }
        }
    }
}

/// Receives one session's events in order
pub struct SessionSubscription {
    rx: UnboundedReceiver<SessionEvent>,
}

impl SessionSubscription {
    /// Next event; `None` after `Exited` has been delivered
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }
}

/// One child process attached to a pseudoterminal
pub struct Session {
    config: SessionConfig,
    started_at: DateTime<Utc>,
    shared: Arc<Shared>,
    reaped: watch::Receiver<bool>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.shared.id)
            .field("executable", &self.config.executable)
            .field("pid", &self.shared.pid)
            .finish()
    }
}

impl Session {
    /// Spawn `config` on a new PTY.
    ///
    /// Launch failures are returned here and leave nothing behind. On success
    /// the session is `Running` and a `Started` event is queued for the first
    /// subscriber.
    pub async fn start(config: SessionConfig, size: TerminalSize) -> Result<Self> {
        let id = SessionId::new();
        let spawned = spawn_pty_process(&config, size).map_err(|e| {
            warn!(session_id = %id, executable = %config.executable, "Launch failed: {}", e);
            e
        })?;

        let pid = spawned.pid;
        let killer = spawned.child.clone_killer();
        let (output_rx, input_tx) = spawned.streams.into_parts();
        let (reaped_tx, reaped_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            id,
            pid,
            control: Mutex::new(Control {
                state: SessionState::Starting,
                size,
                exit_code: None,
                handle: Some(ProcessHandle {
                    master: spawned.master,
                    input_tx,
                }),
            }),
            killer: StdMutex::new(Some(killer)),
            subscribers: StdMutex::new(Subscribers::default()),
            waited: AtomicBool::new(false),
            reaped: reaped_tx,
        });

        let exit_rx = spawn_waiter(shared.clone(), spawned.child);

        // Running before the pump exists, so finalize always sees a live state
        shared.control.lock().await.state = SessionState::Running;
        shared.emit(SessionEvent::Started { pid });
        tokio::spawn(pump(shared.clone(), output_rx, exit_rx));

        info!(
            session_id = %id,
            kind = ?config.kind,
            executable = %config.executable,
            pid = ?pid,
            "Session started"
        );

        Ok(Self {
            config,
            started_at: Utc::now(),
            shared,
            reaped: reaped_rx,
        })
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.shared.pid
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub async fn state(&self) -> SessionState {
        self.shared.control.lock().await.state
    }

    pub async fn size(&self) -> TerminalSize {
        self.shared.control.lock().await.size
    }

    /// Exit code once the child exited on its own; `None` otherwise
    pub async fn exit_code(&self) -> Option<i32> {
        self.shared.control.lock().await.exit_code
    }

    pub async fn info(&self) -> SessionInfo {
        let control = self.shared.control.lock().await;
        SessionInfo {
            id: self.shared.id,
            kind: self.config.kind,
            executable: self.config.executable.clone(),
            state: control.state,
            size: control.size,
            pid: self.shared.pid,
            exit_code: control.exit_code,
            started_at: self.started_at,
        }
    }

    /// Forward raw bytes to the child's input. No-op unless `Running`.
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        let control = self.shared.control.lock().await;
        if control.state != SessionState::Running {
            trace!(session_id = %self.shared.id, state = ?control.state, "Write ignored");
            return Ok(());
        }
        if let Some(handle) = &control.handle {
            if handle.input_tx.send(data.to_vec()).is_err() {
                // Writer thread is gone; the child is on its way out
                debug!(session_id = %self.shared.id, "Write after PTY writer closed");
            }
        }
        Ok(())
    }

    /// Resize the PTY. No-op unless `Running`.
    pub async fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        let mut control = self.shared.control.lock().await;
        if control.state != SessionState::Running {
            trace!(session_id = %self.shared.id, state = ?control.state, "Resize ignored");
            return Ok(());
        }
        if let Some(handle) = &control.handle {
            handle
                .master
                .resize(PtySize {
                    rows,
                    cols,
                    pixel_width: 0,
                    pixel_height: 0,
                })
                .map_err(|e| Error::ResizeFailed {
                    reason: e.to_string(),
                })?;
        }
        control.size = TerminalSize::new(cols, rows);
        debug!(session_id = %self.shared.id, cols, rows, "Session resized");
        Ok(())
    }

    /// Subscribe to this session's events.
    ///
    /// The first subscriber also receives everything emitted before it
    /// subscribed. Dropping the subscription does not affect the session.
    pub fn subscribe_output(&self) -> SessionSubscription {
        let (tx, rx) = unbounded_channel();
        let mut subs = lock(&self.shared.subscribers);
        if !subs.ever_subscribed {
            subs.ever_subscribed = true;
            for event in subs.backlog.drain(..) {
                let _ = tx.send(event);
            }
        }
        if !subs.closed {
            subs.senders.push(tx);
        }
        SessionSubscription { rx }
    }

    /// Request termination.
    ///
    /// Moves to `Killed` immediately and releases the process handle. Returns
    /// `false` when the session was already terminal, in which case nothing
    /// happens.
    pub async fn stop(&self) -> Result<bool> {
        let mut control = self.shared.control.lock().await;
        if control.state.is_terminal() {
            return Ok(false);
        }
        control.state = SessionState::Killed;
        control.exit_code = None;
        let handle = control.handle.take();
        drop(control);
        drop(handle);

        info!(session_id = %self.shared.id, pid = ?self.shared.pid, "Stopping session");
        self.request_termination().await;
        Ok(true)
    }

    /// Kill the child without a grace period
    pub async fn force_kill(&self) {
        {
            let mut control = self.shared.control.lock().await;
            if control.state.holds_process() {
                control.state = SessionState::Killed;
                control.exit_code = None;
                drop(control.handle.take());
            }
        }
        warn!(session_id = %self.shared.id, pid = ?self.shared.pid, "Force killing session");
        self.shared.kill_now();
    }

    /// Wait until the child has been reaped and `Exited` emitted
    pub async fn wait_for_exit(&self, timeout: Duration) -> bool {
        let mut reaped = self.reaped.clone();
        let done = matches!(
            tokio::time::timeout(timeout, reaped.wait_for(|done| *done)).await,
            Ok(Ok(_))
        );
        done
    }

    pub fn is_reaped(&self) -> bool {
        *self.reaped.borrow()
    }

    /// Synchronous last-resort kill, for teardown paths that cannot await
    pub fn kill_now(&self) {
        self.shared.kill_now();
    }

    async fn request_termination(&self) {
        if self.shared.child_waited() {
            return;
        }

        #[cfg(unix)]
        if let Some(pid) = self.shared.pid {
            if let Err(e) = signals::request_termination(pid).await {
                debug!(session_id = %self.shared.id, pid, "Graceful signal failed: {}", e);
            }
            return;
        }

        // No signals to send; the PTY child killer is all there is
        if let Some(killer) = lock(&self.shared.killer).as_mut() {
            if let Err(e) = killer.kill() {
                warn!(session_id = %self.shared.id, "Failed to kill child: {}", e);
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.is_reaped() {
            debug!(session_id = %self.shared.id, "Session dropped while running, killing");
            self.shared.kill_now();
        }
    }
}

fn spawn_waiter(
    shared: Arc<Shared>,
    mut child: Box<dyn Child + Send + Sync>,
) -> oneshot::Receiver<Option<i32>> {
    let (exit_tx, exit_rx) = oneshot::channel();
    std::thread::spawn(move || {
        let status = child.wait();
        shared.waited.store(true, Ordering::SeqCst);

        let code = match status {
            // portable-pty reports signal deaths as code 1
            Ok(status) if status.signal().is_some() => {
                debug!(session_id = %shared.id, signal = ?status.signal(), "Child ended by signal");
                None
            }
            Ok(status) => Some(status.exit_code() as i32),
            Err(e) => {
                warn!(session_id = %shared.id, "Failed to wait for child: {}", e);
                None
            }
        };
        let _ = exit_tx.send(code);
    });
    exit_rx
}

async fn pump(
    shared: Arc<Shared>,
    mut output_rx: UnboundedReceiver<Vec<u8>>,
    mut exit_rx: oneshot::Receiver<Option<i32>>,
) {
    let exit_code = loop {
        tokio::select! {
            biased;
            chunk = output_rx.recv() => match chunk {
                Some(data) => shared.emit(SessionEvent::Output {
                    stream: OutputStream::Stdout,
                    data,
                }),
                // Reader hit EOF; the child is exiting
                None => break (&mut exit_rx).await.unwrap_or(None),
            },
            code = &mut exit_rx => {
                // Output the reader delivered after the exit was observed
                while let Ok(Some(data)) =
                    tokio::time::timeout(OUTPUT_DRAIN_IDLE, output_rx.recv()).await
                {
                    shared.emit(SessionEvent::Output {
                        stream: OutputStream::Stdout,
                        data,
                    });
                }
                break code.unwrap_or(None);
            }
        }
    };

    shared.finalize(exit_code).await;
}
