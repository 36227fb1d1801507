//! Core service
//!
//! Answers bus [`Request`]s by calling into the translation engine, the
//! session manager, settings and history, and turns manager events into
//! [`BusEvent`]s. Must be constructed inside a Tokio runtime: the event relay
//! runs as a task until [`CoreService::shutdown`].

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, RwLock};
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::messages::{BusEvent, OutputKind, Request, Response};
use crate::config::settings::{MemorySettings, SettingsStore, SettingsUpdate};
use crate::config::Config;
use crate::error::Result;
use crate::history::{HistoryRecord, HistoryStore, MemoryHistory};
use crate::pty::events::{EventBus, EventSubscription};
use crate::pty::streams::Utf8ChunkDecoder;
use crate::session::config::{AiTool, SessionConfigFactory, SettingsConfigFactory};
use crate::session::{
    ManagerEvent, ManagerOptions, SessionId, SessionManager, SessionState, Slot,
};
use crate::translate::{CommandPreview, TranslationEngine};

/// Upper bound on retained shell output, in bytes
const TERMINAL_LOG_LIMIT: usize = 1024 * 1024;

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// State shared between request handling and the event relay
#[derive(Default)]
struct ViewState {
    terminal_log: VecDeque<String>,
    log_bytes: usize,
    /// Prompts of AI starts that have not reported `Started` yet
    pending_prompts: HashMap<AiTool, String>,
}

impl ViewState {
    fn append_log(&mut self, text: &str) {
        self.log_bytes += text.len();
        self.terminal_log.push_back(text.to_string());
        while self.log_bytes > TERMINAL_LOG_LIMIT {
            match self.terminal_log.pop_front() {
                Some(chunk) => self.log_bytes -= chunk.len(),
                None => break,
            }
        }
    }

    fn clear_log(&mut self) {
        self.terminal_log.clear();
        self.log_bytes = 0;
    }
}

/// Engine, sessions, settings and history behind one request surface
pub struct CoreService {
    manager: Arc<SessionManager>,
    factory: Arc<dyn SessionConfigFactory>,
    engine: RwLock<TranslationEngine>,
    settings: Arc<dyn SettingsStore>,
    history: Arc<dyn HistoryStore>,
    events: EventBus<BusEvent>,
    view: Arc<StdMutex<ViewState>>,
    relay: StdMutex<Option<JoinHandle<()>>>,
    stop_relay: watch::Sender<bool>,
}

impl CoreService {
    /// Service over in-memory settings and history seeded from `config`
    pub fn new(config: Config) -> Result<Self> {
        let options = ManagerOptions::from_config(&config);
        let history = Arc::new(MemoryHistory::new(config.history.clone()));
        let settings: Arc<dyn SettingsStore> = Arc::new(MemorySettings::new(config));
        let factory = Arc::new(SettingsConfigFactory::new(settings.clone()));
        Self::with_parts(settings, history, factory, options)
    }

    /// Service over caller-supplied ports
    pub fn with_parts(
        settings: Arc<dyn SettingsStore>,
        history: Arc<dyn HistoryStore>,
        factory: Arc<dyn SessionConfigFactory>,
        options: ManagerOptions,
    ) -> Result<Self> {
        let engine = build_engine(settings.as_ref())?;
        let events = EventBus::new(options.event_capacity);
        let manager = Arc::new(SessionManager::new(factory.clone(), options));
        let view = Arc::new(StdMutex::new(ViewState::default()));
        let (stop_relay, stop_rx) = watch::channel(false);

        let relay = Relay {
            events: events.clone(),
            view: view.clone(),
            history: history.clone(),
            decoders: HashMap::new(),
            runs: HashMap::new(),
        };
        let handle = tokio::spawn(relay.run(manager.subscribe(), stop_rx));

        Ok(Self {
            manager,
            factory,
            engine: RwLock::new(engine),
            settings,
            history,
            events,
            view,
            relay: StdMutex::new(Some(handle)),
            stop_relay,
        })
    }

    /// Subscribe to bus events published from now on
    pub fn subscribe(&self) -> EventSubscription<BusEvent> {
        self.events.subscribe()
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Run `f` against the current translation engine
    pub fn with_engine<R>(&self, f: impl FnOnce(&TranslationEngine) -> R) -> R {
        let engine = self
            .engine
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&engine)
    }

    pub fn preview(&self, input: &str) -> CommandPreview {
        self.with_engine(|engine| engine.translate(input))
    }

    /// Shell output seen since the last `terminal:clear`
    pub fn terminal_log(&self) -> String {
        lock(&self.view).terminal_log.iter().map(String::as_str).collect()
    }

    /// Translate `input` and run the result in the shell
    pub async fn run_input(&self, input: &str) -> Result<SessionId> {
        let preview = self.preview(input);
        self.execute(preview.command, None, Some(preview.original))
            .await
    }

    pub async fn handle(&self, request: Request) -> Result<Response> {
        trace!(channel = request.channel(), "Handling request");

        match request {
            Request::TerminalExecute {
                command,
                cwd,
                original,
            } => {
                let session_id = self.execute(command, cwd, original).await?;
                Ok(Response::Started { session_id })
            }
            Request::TerminalInput { data } => {
                if let Some(session) = self.manager.session_in(Slot::Shell) {
                    session.write(data.as_bytes()).await?;
                } else {
                    debug!("Input for the shell dropped, no shell is running");
                }
                Ok(Response::Ack)
            }
            Request::TerminalResize { cols, rows } => {
                if let Some(session) = self.manager.session_in(Slot::Shell) {
                    session.resize(cols, rows).await?;
                }
                Ok(Response::Ack)
            }
            Request::TerminalClear => {
                lock(&self.view).clear_log();
                debug!("Terminal log cleared");
                Ok(Response::Ack)
            }
            Request::CommandPreview { input } => Ok(Response::Preview(self.preview(&input))),
            Request::AiExecute { prompt, tool } => {
                let session_id = self.execute_ai(tool, prompt).await?;
                Ok(Response::Started { session_id })
            }
            Request::AiInput { tool, data } => {
                if let Some(session) = self.manager.session_in(Slot::Ai(tool)) {
                    session.write(data.as_bytes()).await?;
                } else {
                    debug!(%tool, "Input dropped, tool is not running");
                }
                Ok(Response::Ack)
            }
            Request::AiResize { tool, cols, rows } => {
                if let Some(session) = self.manager.session_in(Slot::Ai(tool)) {
                    session.resize(cols, rows).await?;
                }
                Ok(Response::Ack)
            }
            Request::AiStop { tool } => {
                if let Some(session) = self.manager.session_in(Slot::Ai(tool)) {
                    match self.manager.stop(session.id()).await {
                        // Exited on its own in the meantime
                        Err(e) if e.is_unknown_session() => debug!(%tool, "Already gone"),
                        other => other?,
                    }
                }
                Ok(Response::Ack)
            }
            Request::SettingsGet => Ok(Response::Settings(self.settings.settings())),
            Request::SettingsSet { settings } => {
                self.update_settings(settings)?;
                Ok(Response::Ack)
            }
            Request::SettingsGetAliases => Ok(Response::Aliases(self.settings.aliases())),
            Request::SettingsSetAlias { key, value } => {
                self.settings.set_alias(&key, &value)?;
                self.rebuild_engine()?;
                self.publish_settings();
                Ok(Response::Ack)
            }
            Request::SettingsDeleteAlias { key } => {
                if self.settings.delete_alias(&key)? {
                    self.rebuild_engine()?;
                    self.publish_settings();
                }
                Ok(Response::Ack)
            }
            Request::HistoryGet { limit, query } => {
                let limit = limit.unwrap_or(usize::MAX);
                let entries: Vec<_> = match query.as_deref().map(str::trim) {
                    Some(query) if !query.is_empty() => {
                        self.history.search(query).into_iter().take(limit).collect()
                    }
                    _ => self.history.recent(limit),
                };
                Ok(Response::History(entries))
            }
            Request::HistoryAdd { entry } => {
                self.history.add(entry)?;
                Ok(Response::Ack)
            }
            Request::HistoryDelete { id } => {
                self.history.delete(id)?;
                Ok(Response::Ack)
            }
            Request::HistoryClear => {
                self.history.clear()?;
                Ok(Response::Ack)
            }
        }
    }

    /// Stop every session, flush the remaining events and stop the relay
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;

        let _ = self.stop_relay.send(true);
        let relay = lock(&self.relay).take();
        if let Some(relay) = relay {
            if let Err(e) = relay.await {
                warn!("Event relay ended abnormally: {}", e);
            }
        }
    }

    async fn execute(
        &self,
        command: String,
        cwd: Option<PathBuf>,
        original: Option<String>,
    ) -> Result<SessionId> {
        let session_id = match self.running_shell().await {
            Some(session_id) => session_id,
            None => {
                let mut config = self.factory.shell_config()?;
                if let Some(cwd) = cwd {
                    config = config.with_working_directory(cwd);
                }
                self.manager.start_shell(Some(config)).await?
            }
        };

        self.manager
            .write(session_id, format!("{}\n", command).as_bytes())
            .await?;

        let input = original.unwrap_or_else(|| command.clone());
        let converted = (input.trim() != command.trim()).then_some(command);
        if let Err(e) = self.history.add(HistoryRecord::command(input, converted)) {
            warn!("Failed to record history: {}", e);
        }

        Ok(session_id)
    }

    async fn running_shell(&self) -> Option<SessionId> {
        let session = self.manager.session_in(Slot::Shell)?;
        (session.state().await == SessionState::Running).then(|| session.id())
    }

    async fn execute_ai(&self, tool: AiTool, prompt: String) -> Result<SessionId> {
        lock(&self.view).pending_prompts.insert(tool, prompt.clone());

        match self.manager.start_ai_tool(tool, &prompt).await {
            Ok(session_id) => Ok(session_id),
            Err(e) => {
                lock(&self.view).pending_prompts.remove(&tool);
                error!(%tool, "Failed to start AI tool: {}", e);
                self.events.publish(BusEvent::AiOutput {
                    data: format!("{}: {}", tool, e),
                    kind: OutputKind::Error,
                });
                Err(e)
            }
        }
    }

    fn update_settings(&self, update: SettingsUpdate) -> Result<()> {
        let was_enabled = self.settings.history().enabled;
        let settings = self.settings.apply(update)?;

        self.history.configure(settings.history.clone());
        self.rebuild_engine()?;

        let enabled = settings.history.enabled;
        self.events.publish(BusEvent::SettingsChanged(settings));
        if enabled != was_enabled {
            info!(enabled, "History recording toggled");
            self.events.publish(BusEvent::HistoryToggled { enabled });
        }
        Ok(())
    }

    fn publish_settings(&self) {
        self.events
            .publish(BusEvent::SettingsChanged(self.settings.settings()));
    }

    fn rebuild_engine(&self) -> Result<()> {
        let engine = build_engine(self.settings.as_ref())?;
        *self
            .engine
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = engine;
        debug!("Translation engine rebuilt");
        Ok(())
    }
}

fn build_engine(settings: &dyn SettingsStore) -> Result<TranslationEngine> {
    TranslationEngine::with_presets()?
        .with_overlay(&settings.aliases())
        .with_rules(&settings.patterns())
}

struct AiRun {
    prompt: String,
    started: Instant,
}

/// Turns manager events into bus events
struct Relay {
    events: EventBus<BusEvent>,
    view: Arc<StdMutex<ViewState>>,
    history: Arc<dyn HistoryStore>,
    decoders: HashMap<SessionId, Utf8ChunkDecoder>,
    runs: HashMap<SessionId, AiRun>,
}

impl Relay {
    async fn run(
        mut self,
        mut manager_events: EventSubscription<ManagerEvent>,
        mut stop: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;
                event = manager_events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                _ = stop.changed() => {
                    while let Some(event) = manager_events.try_recv() {
                        self.handle(event);
                    }
                    break;
                }
            }
        }
        debug!("Event relay stopped");
    }

    fn handle(&mut self, event: ManagerEvent) {
        match event {
            ManagerEvent::Started {
                session_id,
                slot,
                pid,
            } => {
                debug!(%session_id, %slot, ?pid, "Session started");
                if let Slot::Ai(tool) = slot {
                    let prompt = lock(&self.view)
                        .pending_prompts
                        .remove(&tool)
                        .unwrap_or_default();
                    self.runs.insert(
                        session_id,
                        AiRun {
                            prompt,
                            started: Instant::now(),
                        },
                    );
                    self.events.publish(BusEvent::AiStarted { tool });
                }
            }
            ManagerEvent::Output {
                session_id,
                slot,
                stream,
                data,
            } => {
                let text = self.decoders.entry(session_id).or_default().decode(&data);
                self.publish_output(slot, text, stream.into());
            }
            ManagerEvent::Exited {
                session_id,
                slot,
                exit_code,
            } => {
                if let Some(mut decoder) = self.decoders.remove(&session_id) {
                    let rest = decoder.finish();
                    self.publish_output(slot, rest, OutputKind::Stdout);
                }

                match slot {
                    Slot::Shell => info!(%session_id, ?exit_code, "Shell exited"),
                    Slot::Ai(tool) => {
                        info!(%session_id, %tool, ?exit_code, "AI tool finished");
                        self.events.publish(BusEvent::AiFinished { tool, exit_code });

                        if let Some(run) = self.runs.remove(&session_id) {
                            let duration_ms = run.started.elapsed().as_millis() as u64;
                            let record = HistoryRecord::ai(tool, run.prompt, exit_code, duration_ms);
                            if let Err(e) = self.history.add(record) {
                                warn!("Failed to record history: {}", e);
                            }
                        }
                    }
                }
            }
        }
    }

    fn publish_output(&self, slot: Slot, data: String, kind: OutputKind) {
        if data.is_empty() {
            return;
        }
        let event = match slot {
            Slot::Shell => {
                lock(&self.view).append_log(&data);
                BusEvent::TerminalOutput { data, kind }
            }
            Slot::Ai(_) => BusEvent::AiOutput { data, kind },
        };
        self.events.publish(event);
    }
}
