//! Session Manager
//!
//! Owns every live session and enforces one session per slot. Each session
//! gets a forwarder task that republishes its events on the manager's event
//! bus for as long as the session is the registered occupant of its slot.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::config::{AiTool, DefaultConfigFactory, SessionConfig, SessionConfigFactory};
use super::handle::{Session, SessionSubscription};
use super::{OutputStream, SessionEvent, SessionId, TerminalSize};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::pty::events::{EventBus, EventSubscription};

/// A logical role that holds at most one live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Shell,
    Ai(AiTool),
}

impl Slot {
    pub fn all() -> [Slot; 4] {
        [
            Slot::Shell,
            Slot::Ai(AiTool::Claude),
            Slot::Ai(AiTool::Codex),
            Slot::Ai(AiTool::Gemini),
        ]
    }

    pub fn tool(&self) -> Option<AiTool> {
        match self {
            Slot::Shell => None,
            Slot::Ai(tool) => Some(*tool),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Shell => f.write_str("shell"),
            Slot::Ai(tool) => write!(f, "{}", tool),
        }
    }
}

/// Manager-level events, ordered per session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    Started {
        session_id: SessionId,
        slot: Slot,
        pid: Option<u32>,
    },
    Output {
        session_id: SessionId,
        slot: Slot,
        stream: OutputStream,
        data: Vec<u8>,
    },
    Exited {
        session_id: SessionId,
        slot: Slot,
        exit_code: Option<i32>,
    },
}

impl ManagerEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            ManagerEvent::Started { session_id, .. }
            | ManagerEvent::Output { session_id, .. }
            | ManagerEvent::Exited { session_id, .. } => *session_id,
        }
    }

    pub fn slot(&self) -> Slot {
        match self {
            ManagerEvent::Started { slot, .. }
            | ManagerEvent::Output { slot, .. }
            | ManagerEvent::Exited { slot, .. } => *slot,
        }
    }
}

/// Tunables for the manager
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// How long a stopping session gets before it is force-killed
    pub grace_period: Duration,
    /// PTY size for new sessions
    pub size: TerminalSize,
    /// Broadcast capacity for manager events
    pub event_capacity: usize,
}

impl ManagerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            grace_period: config.sessions.grace_period(),
            size: TerminalSize::new(config.terminal.cols, config.terminal.rows),
            event_capacity: config.sessions.event_capacity,
        }
    }
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

struct LiveSession {
    session: Arc<Session>,
    forwarder: JoinHandle<()>,
}

type SlotMap = Arc<StdMutex<HashMap<Slot, LiveSession>>>;

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the live sessions, one per slot
pub struct SessionManager {
    slots: SlotMap,
    gates: StdMutex<HashMap<Slot, Arc<tokio::sync::Mutex<()>>>>,
    events: EventBus<ManagerEvent>,
    factory: Arc<dyn SessionConfigFactory>,
    options: ManagerOptions,
    shut_down: AtomicBool,
}

impl SessionManager {
    pub fn new(factory: Arc<dyn SessionConfigFactory>, options: ManagerOptions) -> Self {
        Self {
            slots: Arc::new(StdMutex::new(HashMap::new())),
            gates: StdMutex::new(HashMap::new()),
            events: EventBus::new(options.event_capacity),
            factory,
            options,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Manager over [`DefaultConfigFactory`] with default options
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(DefaultConfigFactory), ManagerOptions::default())
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// Subscribe to events from every session
    pub fn subscribe(&self) -> EventSubscription<ManagerEvent> {
        self.events.subscribe()
    }

    /// Start a shell, replacing any shell already running
    pub async fn start_shell(&self, config: Option<SessionConfig>) -> Result<SessionId> {
        let config = match config {
            Some(config) => config,
            None => self.factory.shell_config()?,
        };
        let (id, _) = self.start_in_slot(Slot::Shell, config).await?;
        Ok(id)
    }

    /// Start `tool` in its slot and type `prompt` into it
    pub async fn start_ai_tool(&self, tool: AiTool, prompt: &str) -> Result<SessionId> {
        let config = self.factory.ai_tool_config(tool)?;
        let (id, session) = self.start_in_slot(Slot::Ai(tool), config).await?;

        if !prompt.trim().is_empty() {
            session.write(format!("{}\r", prompt).as_bytes()).await?;
        }
        Ok(id)
    }

    pub async fn write(&self, session_id: SessionId, data: &[u8]) -> Result<()> {
        let (_, session) = self.find_live(session_id)?;
        session.write(data).await
    }

    pub async fn resize(&self, session_id: SessionId, cols: u16, rows: u16) -> Result<()> {
        let (_, session) = self.find_live(session_id)?;
        session.resize(cols, rows).await
    }

    /// Stop a live session and wait (bounded) for it to be reaped
    pub async fn stop(&self, session_id: SessionId) -> Result<()> {
        let detached = {
            let mut slots = lock(&self.slots);
            let slot = slots
                .iter()
                .find(|(_, live)| live.session.id() == session_id)
                .map(|(slot, _)| *slot);
            slot.and_then(|slot| slots.remove(&slot).map(|live| (slot, live)))
        };

        let Some((slot, live)) = detached else {
            return Err(Error::UnknownSession {
                session_id: session_id.to_string(),
            });
        };

        live.forwarder.abort();
        reap(&self.events, slot, live.session, self.options.grace_period).await;
        Ok(())
    }

    /// The session currently occupying `slot`
    pub fn session_in(&self, slot: Slot) -> Option<Arc<Session>> {
        lock(&self.slots).get(&slot).map(|live| live.session.clone())
    }

    /// Every live session with its slot
    pub fn live_sessions(&self) -> Vec<(Slot, SessionId)> {
        let mut live: Vec<_> = lock(&self.slots)
            .iter()
            .map(|(slot, live)| (*slot, live.session.id()))
            .collect();
        live.sort_by_key(|(slot, _)| Slot::all().iter().position(|s| s == slot));
        live
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Stop every live session and wait for all of them to be reaped.
    ///
    /// Later starts fail with [`Error::ManagerShutDown`].
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("Session manager already shut down");
            return;
        }

        let drained: Vec<(Slot, LiveSession)> = lock(&self.slots).drain().collect();
        info!(sessions = drained.len(), "Shutting down session manager");

        let reaps = drained.into_iter().map(|(slot, live)| {
            live.forwarder.abort();
            reap(&self.events, slot, live.session, self.options.grace_period)
        });
        futures::future::join_all(reaps).await;
    }

    async fn start_in_slot(
        &self,
        slot: Slot,
        config: SessionConfig,
    ) -> Result<(SessionId, Arc<Session>)> {
        if self.is_shut_down() {
            return Err(Error::ManagerShutDown);
        }

        let gate = self.gate(slot);
        let _guard = gate.lock().await;

        // Detaching under the slot lock stops routing of the old session's
        // events before anything else happens
        let previous = lock(&self.slots).remove(&slot);
        if let Some(previous) = previous {
            info!(%slot, old_session = %previous.session.id(), "Replacing session in slot");
            previous.forwarder.abort();
            reap(&self.events, slot, previous.session, self.options.grace_period).await;
        }

        let session = Arc::new(Session::start(config, self.options.size).await?);
        let session_id = session.id();
        let subscription = session.subscribe_output();

        {
            let mut slots = lock(&self.slots);
            if !self.is_shut_down() {
                let forwarder = tokio::spawn(forward(
                    slot,
                    session_id,
                    subscription,
                    self.slots.clone(),
                    self.events.clone(),
                ));
                slots.insert(
                    slot,
                    LiveSession {
                        session: session.clone(),
                        forwarder,
                    },
                );
                debug!(%slot, %session_id, "Session registered");
                return Ok((session_id, session));
            }
        }

        // Shutdown won the race; this session never became live
        reap(&self.events, slot, session, self.options.grace_period).await;
        Err(Error::ManagerShutDown)
    }

    fn find_live(&self, session_id: SessionId) -> Result<(Slot, Arc<Session>)> {
        lock(&self.slots)
            .iter()
            .find(|(_, live)| live.session.id() == session_id)
            .map(|(slot, live)| (*slot, live.session.clone()))
            .ok_or_else(|| Error::UnknownSession {
                session_id: session_id.to_string(),
            })
    }

    fn gate(&self, slot: Slot) -> Arc<tokio::sync::Mutex<()>> {
        lock(&self.gates).entry(slot).or_default().clone()
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let slots = lock(&self.slots);
        for (slot, live) in slots.iter() {
            live.forwarder.abort();
            if !live.session.is_reaped() {
                warn!(%slot, session_id = %live.session.id(), "Manager dropped with live session, killing");
                live.session.kill_now();
            }
        }
    }
}

/// Republish one session's events while it still owns its slot
async fn forward(
    slot: Slot,
    session_id: SessionId,
    mut subscription: SessionSubscription,
    slots: SlotMap,
    events: EventBus<ManagerEvent>,
) {
    let owns_slot = |slots: &HashMap<Slot, LiveSession>| {
        matches!(slots.get(&slot), Some(live) if live.session.id() == session_id)
    };

    while let Some(event) = subscription.recv().await {
        let mut guard = lock(&slots);
        if !owns_slot(&*guard) {
            break;
        }

        match event {
            SessionEvent::Started { pid } => events.publish(ManagerEvent::Started {
                session_id,
                slot,
                pid,
            }),
            SessionEvent::Output { stream, data } => events.publish(ManagerEvent::Output {
                session_id,
                slot,
                stream,
                data,
            }),
            SessionEvent::Exited { exit_code } => {
                guard.remove(&slot);
                events.publish(ManagerEvent::Exited {
                    session_id,
                    slot,
                    exit_code,
                });
                break;
            }
        }
    }
    trace!(%slot, %session_id, "Forwarder finished");
}

/// Stop `session`, escalating to a forced kill after the grace period, and
/// publish its `Exited` event.
async fn reap(
    events: &EventBus<ManagerEvent>,
    slot: Slot,
    session: Arc<Session>,
    grace_period: Duration,
) {
    let session_id = session.id();

    if let Err(e) = session.stop().await {
        warn!(%slot, %session_id, "Stop request failed: {}", e);
    }

    if !session.wait_for_exit(grace_period).await {
        warn!(%slot, %session_id, ?grace_period, "Session ignored stop, force killing");
        session.force_kill().await;

        if !session.wait_for_exit(grace_period).await {
            error!(%slot, %session_id, pid = ?session.pid(), "Session could not be reaped");
        }
    }

    events.publish(ManagerEvent::Exited {
        session_id,
        slot,
        exit_code: session.exit_code().await,
    });
}
