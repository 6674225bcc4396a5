//! Coordinator service
//!
//! Runs the `PlaybackController` on a single tokio task. Every input (GUI
//! command, engine notification, timer tick, mount or prompt completion)
//! is applied to the controller one at a time, so the controller itself
//! never needs locking.
//!
//! **Responsibilities:**
//! - Serialize commands from any number of `CoordinatorHandle`s
//! - Drive the position tick and download fill timers
//! - Execute mount and credential effects as cancellable background tasks

use crate::coordinator::{
    CredentialReply, Effect, MountTicket, PlaybackController, PlaybackSnapshot, PromptTicket,
};
use crate::engine::{Credentials, EngineMessage, MediaSource};
use crate::error::{Error, Result};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use totem_common::PlayerSignal;
use tracing::{debug, info, warn};

/// Bound on queued GUI commands
const COMMAND_QUEUE_SIZE: usize = 32;

/// Mounts the volume enclosing a location
pub trait MountProvider: Send + Sync {
    /// Resolve once the mount finished; `Err` carries the failure text
    fn mount(&self, uri: String, resource: String) -> BoxFuture<'static, std::result::Result<(), String>>;
}

/// Asks the user for credentials
pub trait CredentialProvider: Send + Sync {
    fn prompt(&self, uri: String) -> BoxFuture<'static, CredentialReply>;
}

/// Mount provider that reports every mount as successful
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoMount;

impl MountProvider for AutoMount {
    fn mount(&self, uri: String, _resource: String) -> BoxFuture<'static, std::result::Result<(), String>> {
        async move {
            debug!("Auto-mounting {}", uri);
            Ok(())
        }
        .boxed()
    }
}

/// Credential provider for headless use: aborts every prompt
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn prompt(&self, uri: String) -> BoxFuture<'static, CredentialReply> {
        async move {
            info!("No credential source for {}, aborting prompt", uri);
            CredentialReply::Aborted
        }
        .boxed()
    }
}

/// Credential provider answering every prompt with fixed credentials
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl CredentialProvider for StaticCredentials {
    fn prompt(&self, _uri: String) -> BoxFuture<'static, CredentialReply> {
        let credentials = self.0.clone();
        async move { CredentialReply::Provided(credentials) }.boxed()
    }
}

enum Command {
    Open {
        source: MediaSource,
        reply: oneshot::Sender<Result<()>>,
    },
    Play(oneshot::Sender<Result<()>>),
    Pause(oneshot::Sender<Result<()>>),
    Stop(oneshot::Sender<()>),
    Close(oneshot::Sender<()>),
    Seek {
        time_ms: i64,
        accurate: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    SeekFraction {
        fraction: f64,
        reply: oneshot::Sender<Result<()>>,
    },
    SetSubtitle {
        id: i32,
        reply: oneshot::Sender<Result<()>>,
    },
    SetLanguage {
        id: i32,
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot(oneshot::Sender<PlaybackSnapshot>),
    Shutdown,
}

enum Completion {
    Mount(MountTicket, std::result::Result<(), String>),
    Credentials(PromptTicket, CredentialReply),
}

/// Cloneable front end to a running `CoordinatorService`
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
    signals: broadcast::Sender<PlayerSignal>,
}

impl CoordinatorHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| Error::ServiceStopped)?;
        rx.await.map_err(|_| Error::ServiceStopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerSignal> {
        self.signals.subscribe()
    }

    pub async fn open(&self, source: MediaSource) -> Result<()> {
        self.request(|reply| Command::Open { source, reply }).await?
    }

    pub async fn play(&self) -> Result<()> {
        self.request(Command::Play).await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await?
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    pub async fn close(&self) -> Result<()> {
        self.request(Command::Close).await
    }

    pub async fn seek(&self, time_ms: i64, accurate: bool) -> Result<()> {
        self.request(|reply| Command::Seek {
            time_ms,
            accurate,
            reply,
        })
        .await?
    }

    pub async fn seek_fraction(&self, fraction: f64) -> Result<()> {
        self.request(|reply| Command::SeekFraction { fraction, reply })
            .await?
    }

    pub async fn set_subtitle(&self, id: i32) -> Result<()> {
        self.request(|reply| Command::SetSubtitle { id, reply })
            .await?
    }

    pub async fn set_language(&self, id: i32) -> Result<()> {
        self.request(|reply| Command::SetLanguage { id, reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<PlaybackSnapshot> {
        self.request(Command::Snapshot).await
    }

    /// Close the source and stop the service loop
    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| Error::ServiceStopped)
    }
}

/// Event loop owning one `PlaybackController`
pub struct CoordinatorService {
    controller: PlaybackController,
    engine_rx: mpsc::UnboundedReceiver<EngineMessage>,
    commands: mpsc::Receiver<Command>,
    mounts: Arc<dyn MountProvider>,
    credentials: Arc<dyn CredentialProvider>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    mount_tasks: HashMap<MountTicket, JoinHandle<()>>,
    prompt_tasks: HashMap<PromptTicket, JoinHandle<()>>,
    tick: Option<Interval>,
    fill: Option<Interval>,
}

impl CoordinatorService {
    /// Create the service and its first handle
    ///
    /// `engine_rx` must receive the notifications of the engine owned by
    /// `controller`.
    pub fn new(
        controller: PlaybackController,
        engine_rx: mpsc::UnboundedReceiver<EngineMessage>,
    ) -> (Self, CoordinatorHandle) {
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let handle = CoordinatorHandle {
            commands: command_tx,
            signals: controller.signal_sender(),
        };

        let service = Self {
            controller,
            engine_rx,
            commands,
            mounts: Arc::new(AutoMount),
            credentials: Arc::new(NoCredentials),
            completion_tx,
            completion_rx,
            mount_tasks: HashMap::new(),
            prompt_tasks: HashMap::new(),
            tick: None,
            fill: None,
        };
        (service, handle)
    }

    pub fn with_mount_provider(mut self, provider: Arc<dyn MountProvider>) -> Self {
        self.mounts = provider;
        self
    }

    pub fn with_credential_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = provider;
        self
    }

    /// Run until shutdown, or until every handle and the engine are gone
    pub async fn run(mut self) {
        info!("Coordinator service started");

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Shutdown) | None => break,
                        Some(command) => self.handle_command(command),
                    }
                }
                message = self.engine_rx.recv() => {
                    match message {
                        Some(message) => self.controller.handle_message(message),
                        None => {
                            warn!("Engine notification channel closed");
                            break;
                        }
                    }
                }
                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion);
                }
                _ = next_tick(&mut self.tick) => {
                    self.controller.on_tick();
                }
                _ = next_tick(&mut self.fill) => {
                    self.controller.on_fill_tick();
                }
            }

            self.apply_effects();
        }

        self.controller.close();
        self.apply_effects();
        for (_, task) in self.mount_tasks.drain() {
            task.abort();
        }
        for (_, task) in self.prompt_tasks.drain() {
            task.abort();
        }
        info!("Coordinator service stopped");
    }

    fn handle_command(&mut self, command: Command) {
        // Send errors mean the caller stopped waiting
        match command {
            Command::Open { source, reply } => {
                let _ = reply.send(self.controller.open(source));
            }
            Command::Play(reply) => {
                let _ = reply.send(self.controller.play());
            }
            Command::Pause(reply) => {
                let _ = reply.send(self.controller.pause());
            }
            Command::Stop(reply) => {
                self.controller.stop();
                let _ = reply.send(());
            }
            Command::Close(reply) => {
                self.controller.close();
                let _ = reply.send(());
            }
            Command::Seek {
                time_ms,
                accurate,
                reply,
            } => {
                let _ = reply.send(self.controller.seek_to(time_ms, accurate));
            }
            Command::SeekFraction { fraction, reply } => {
                let _ = reply.send(self.controller.seek_fraction(fraction));
            }
            Command::SetSubtitle { id, reply } => {
                let _ = reply.send(self.controller.set_subtitle(id));
            }
            Command::SetLanguage { id, reply } => {
                let _ = reply.send(self.controller.set_language(id));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.controller.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Mount(ticket, result) => {
                self.mount_tasks.remove(&ticket);
                self.controller.on_mount_finished(ticket, result);
            }
            Completion::Credentials(ticket, reply) => {
                self.prompt_tasks.remove(&ticket);
                self.controller.on_credentials(ticket, reply);
            }
        }
    }

    fn apply_effects(&mut self) {
        for effect in self.controller.take_effects() {
            debug!("Applying effect {:?}", effect);
            match effect {
                Effect::StartMount {
                    ticket,
                    uri,
                    resource,
                } => {
                    let mount = self.mounts.mount(uri, resource);
                    let tx = self.completion_tx.clone();
                    let task = tokio::spawn(async move {
                        let result = mount.await;
                        let _ = tx.send(Completion::Mount(ticket, result));
                    });
                    self.mount_tasks.insert(ticket, task);
                }
                Effect::CancelMount(ticket) => {
                    if let Some(task) = self.mount_tasks.remove(&ticket) {
                        task.abort();
                    }
                }
                Effect::PromptCredentials { ticket, uri } => {
                    let prompt = self.credentials.prompt(uri);
                    let tx = self.completion_tx.clone();
                    let task = tokio::spawn(async move {
                        let reply = prompt.await;
                        let _ = tx.send(Completion::Credentials(ticket, reply));
                    });
                    self.prompt_tasks.insert(ticket, task);
                }
                Effect::CancelPrompt(ticket) => {
                    if let Some(task) = self.prompt_tasks.remove(&ticket) {
                        task.abort();
                    }
                }
                Effect::SetTickTimer(period) => self.tick = period.map(timer),
                Effect::SetFillTimer(period) => self.fill = period.map(timer),
            }
        }
    }
}

fn timer(period: Duration) -> Interval {
    // First tick one period from now, not immediately
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
