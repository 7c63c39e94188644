//! Host driver: the task that owns the session lifecycle manager.
//!
//! The host runs as a single Tokio task (actor model). Everything that can
//! touch the session is funnelled into it:
//!
//! ```text
//! game server ──HostEvent──→ ┐
//! backend ──BackendEvent───→ ├─→ Host task ──→ SessionLifecycleManager
//! sweep interval ──tick────→ ┘
//! ```
//!
//! Because one task handles all three sources, the manager never sees two
//! things at once, and the order it sees them in is the order they arrived.

use std::time::Duration;

use hostlink_backend::{BackendEvent, EventReceiver, OperationKind, PlayerId, SessionBackend};
use hostlink_session::{LifecyclePolicy, SessionLifecycleManager, SessionSnapshot};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{HostConfig, HostlinkError};

/// Channel size for host commands. Senders wait when it's full.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Something that happened on the game server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The server process finished starting up.
    Started,
    /// A player connected.
    PlayerJoined(PlayerId),
    /// A player disconnected. `None` if the identity couldn't be resolved.
    PlayerLeft(Option<PlayerId>),
    /// The server is shutting down. The host destroys the session and exits.
    Stopping,
}

/// Commands sent to the host task.
enum HostCommand {
    Event(HostEvent),
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Handle to a running host task.
///
/// Cheap to clone; the game server keeps one wherever it raises events.
#[derive(Clone)]
pub struct HostHandle {
    sender: mpsc::Sender<HostCommand>,
}

impl HostHandle {
    /// Forwards a host event.
    pub async fn send(&self, event: HostEvent) -> Result<(), HostlinkError> {
        self.sender
            .send(HostCommand::Event(event))
            .await
            .map_err(|_| HostlinkError::HostStopped)
    }

    pub async fn started(&self) -> Result<(), HostlinkError> {
        self.send(HostEvent::Started).await
    }

    pub async fn player_joined(&self, player: PlayerId) -> Result<(), HostlinkError> {
        self.send(HostEvent::PlayerJoined(player)).await
    }

    pub async fn player_left(&self, player: Option<PlayerId>) -> Result<(), HostlinkError> {
        self.send(HostEvent::PlayerLeft(player)).await
    }

    /// Requests the current session snapshot.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, HostlinkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(HostCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| HostlinkError::HostStopped)?;
        reply_rx.await.map_err(|_| HostlinkError::HostStopped)
    }

    /// Stops the host: destroys the session, waits for the destroy to
    /// complete (up to the shutdown grace), and returns the final snapshot.
    pub async fn shutdown(&self) -> Result<SessionSnapshot, HostlinkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(HostCommand::Shutdown { reply: reply_tx })
            .await
            .map_err(|_| HostlinkError::HostStopped)?;
        reply_rx.await.map_err(|_| HostlinkError::HostStopped)
    }
}

/// The host task state.
pub struct Host<B: SessionBackend, P: LifecyclePolicy> {
    manager: SessionLifecycleManager<B, P>,
    events: EventReceiver,
    commands: mpsc::Receiver<HostCommand>,
    sweep_interval: Duration,
    shutdown_grace: Duration,
}

impl<B: SessionBackend, P: LifecyclePolicy> Host<B, P> {
    /// Creates a host around a manager and the receiver its backend
    /// delivers completions on.
    pub fn new(
        manager: SessionLifecycleManager<B, P>,
        events: EventReceiver,
        config: &HostConfig,
    ) -> (Self, HostHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let host = Self {
            manager,
            events,
            commands: rx,
            sweep_interval: config.sweep_interval().max(Duration::from_millis(1)),
            shutdown_grace: config.shutdown_grace(),
        };
        (host, HostHandle { sender: tx })
    }

    /// Creates a host and runs it on a new task. The task resolves to the
    /// final session snapshot.
    pub fn spawn(
        manager: SessionLifecycleManager<B, P>,
        events: EventReceiver,
        config: &HostConfig,
    ) -> (HostHandle, JoinHandle<SessionSnapshot>) {
        let (host, handle) = Self::new(manager, events, config);
        (handle, tokio::spawn(host.run()))
    }

    /// Runs until told to stop or until every handle is dropped; either
    /// way the session is destroyed before returning.
    pub async fn run(mut self) -> SessionSnapshot {
        tracing::info!(session = %self.manager.session_name(), role = ?self.manager.role(), "host running");

        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reply = loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::info!("all host handles dropped");
                        break None;
                    };
                    match command {
                        HostCommand::Event(event) => {
                            if !self.handle_event(event) {
                                break None;
                            }
                        }
                        HostCommand::Snapshot { reply } => {
                            let _ = reply.send(self.manager.snapshot());
                        }
                        HostCommand::Shutdown { reply } => break Some(reply),
                    }
                }
                Some(event) = self.events.recv() => self.handle_backend(event),
                _ = sweep.tick() => self.sweep(),
            }
        };

        self.stop().await;
        let snapshot = self.manager.snapshot();
        if let Some(reply) = reply {
            let _ = reply.send(snapshot.clone());
        }
        tracing::info!(session = %snapshot.name, state = %snapshot.state, "host stopped");
        snapshot
    }

    /// Applies a host event. Returns `false` once the host should stop.
    fn handle_event(&mut self, event: HostEvent) -> bool {
        tracing::trace!(?event, "host event");
        match event {
            HostEvent::Started => self.manager.on_host_start(),
            HostEvent::PlayerJoined(player) => self.manager.on_player_join(player),
            HostEvent::PlayerLeft(player) => self.manager.on_player_leave(player),
            HostEvent::Stopping => return false,
        }
        true
    }

    fn handle_backend(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Session(completion) => {
                let kind = completion.kind;
                if let Err(e) = self.manager.handle_completion(completion) {
                    tracing::debug!(%kind, error = %e, "completion reported failure");
                }
            }
            BackendEvent::Login(completion) => {
                tracing::debug!(slot = %completion.slot, "login completion on host, ignoring");
            }
        }
    }

    fn sweep(&mut self) {
        let expired = self.manager.expire_overdue();
        if !expired.is_empty() {
            tracing::debug!(?expired, "expired pending operations");
        }
    }

    /// Destroys the session and waits for the destroy to complete.
    async fn stop(&mut self) {
        tracing::info!(session = %self.manager.session_name(), "host stopping");
        self.manager.on_host_stop();

        let deadline = tokio::time::sleep(self.shutdown_grace);
        tokio::pin!(deadline);

        while self.manager.is_pending(OperationKind::Destroy) {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_backend(event),
                    None => {
                        tracing::warn!("backend channel closed during shutdown");
                        break;
                    }
                },
                _ = &mut deadline => {
                    tracing::warn!(
                        session = %self.manager.session_name(),
                        "shutdown grace elapsed before the session was destroyed"
                    );
                    break;
                }
            }
        }
    }
}
