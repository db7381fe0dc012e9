//! One peer's game session
//!
//! [`Node`] holds the session's state and decides what happens for every
//! input. [`Session`] is the async driver around it: one task owns the node
//! and feeds it transport events, local commands, dial outcomes and the
//! round timer, then carries out what the node recorded in its [`Outbox`].
//! The UI talks to the driver through a cloneable [`SessionHandle`] and
//! listens on the [`SessionEvent`] channel.

mod actions;
mod guest;
mod handlers;
mod host;
mod node;

pub use actions::Action;
pub use node::{Node, Outbox, Outgoing, StatusLevel, TimerCommand};

use crate::config::GameConfig;
use crate::error::{SessionError, ValidationError};
use crate::link;
use crate::protocol::ChatMessage;
use crate::transport::{
    connect_with_timeout, EventReceiver, PeerId, Transport, TransportError, TransportEvent,
};
use crate::types::*;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::Instant;

/// What the UI is told about
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Status { level: StatusLevel, text: String },
    /// Italic system line in the chat log
    System(String),
    Chat(ChatMessage),
    ClueSubmitted { clue: String },
    StateChanged(GameState),
    RoundEnded { winner: String, phrase: String },
    GameOver { standings: Vec<Player> },
    PromotedToHost,
}

impl SessionEvent {
    pub fn status(level: StatusLevel, text: impl Into<String>) -> Self {
        SessionEvent::Status {
            level,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub player_name: String,
    /// Host to join; `None` starts a new session
    pub room: Option<PeerId>,
    /// Base of the join link shown to the host
    pub base_url: String,
    pub game: GameConfig,
}

type Reply<T> = oneshot::Sender<T>;

#[derive(Debug)]
enum Command {
    Act(Action, Reply<Result<(), ValidationError>>),
    State(Reply<GameState>),
    Shutdown,
}

/// Cloneable front door to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    local_id: PeerId,
    join_link: Option<String>,
}

impl SessionHandle {
    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    /// Link guests use to join, present when this peer created the session
    pub fn join_link(&self) -> Option<&str> {
        self.join_link.as_deref()
    }

    pub async fn act(&self, action: Action) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Act(action, reply))
            .map_err(|_| SessionError::Closed)?;
        Ok(response.await.map_err(|_| SessionError::Closed)??)
    }

    pub async fn start_game(&self) -> Result<(), SessionError> {
        self.act(Action::StartGame).await
    }

    pub async fn add_emoji(&self, emoji: impl Into<String>) -> Result<(), SessionError> {
        self.act(Action::AddEmoji(emoji.into())).await
    }

    pub async fn clear_clue(&self) -> Result<(), SessionError> {
        self.act(Action::ClearClue).await
    }

    pub async fn submit_clue(&self) -> Result<(), SessionError> {
        self.act(Action::SubmitClue).await
    }

    pub async fn guess(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.act(Action::Guess(text.into())).await
    }

    pub async fn play_again(&self) -> Result<(), SessionError> {
        self.act(Action::PlayAgain).await
    }

    /// Current local copy of the game state
    pub async fn state(&self) -> Result<GameState, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::State(reply))
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }

    /// Leave the session and close every link
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

#[derive(Debug, Clone, Copy)]
struct RoundTimer {
    deadline: Instant,
    round: u32,
}

pub struct Session<T: Transport> {
    node: Node,
    transport: Arc<T>,
    transport_events: EventReceiver,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SessionEvent>,
    dials: JoinSet<(PeerId, Result<(), TransportError>)>,
    round_timer: Option<RoundTimer>,
    reconnect_deadline: Option<Instant>,
    join_link: Option<String>,
}

impl<T: Transport> Session<T> {
    /// Spawn the session task on an opened transport
    pub fn start(
        transport: T,
        transport_events: EventReceiver,
        config: SessionConfig,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let local_id = transport.local_id().clone();
        let game = Arc::new(config.game);
        let node = match config.room {
            Some(room) => Node::guest(local_id.clone(), config.player_name, room, game),
            None => Node::host(local_id.clone(), config.player_name, game),
        };
        let join_link = node
            .is_host()
            .then(|| link::join_link(&config.base_url, &local_id));

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let session = Session {
            node,
            transport: Arc::new(transport),
            transport_events,
            commands: commands_rx,
            events: events_tx,
            dials: JoinSet::new(),
            round_timer: None,
            reconnect_deadline: None,
            join_link: join_link.clone(),
        };
        tokio::spawn(session.run());

        (
            SessionHandle {
                commands: commands_tx,
                local_id,
                join_link,
            },
            events_rx,
        )
    }

    async fn run(mut self) {
        let mut out = Outbox::default();
        self.node.open(&mut out);
        if let Some(link) = &self.join_link {
            out.system(format!("Share this link to invite players: {}", link));
        }
        self.flush(out).await;

        loop {
            let deadline = self.round_timer.map(|timer| timer.deadline);
            let reconnect = self.reconnect_deadline;

            tokio::select! {
                event = self.transport_events.recv() => {
                    let Some(event) = event else {
                        tracing::warn!("Transport event stream ended");
                        break;
                    };
                    self.on_transport_event(event).await;
                }

                command = self.commands.recv() => {
                    match command {
                        Some(Command::Shutdown) | None => break,
                        Some(command) => self.on_command(command).await,
                    }
                }

                Some(dialed) = self.dials.join_next(), if !self.dials.is_empty() => {
                    match dialed {
                        Ok((peer, Ok(()))) => tracing::debug!("Dial to {} completed", peer),
                        Ok((peer, Err(e))) => {
                            let mut out = Outbox::default();
                            self.node.handle_dial_failed(&peer, &e, &mut out);
                            self.flush(out).await;
                        }
                        Err(e) => tracing::error!("Dial task failed: {}", e),
                    }
                }

                _ = timer_elapsed(deadline) => {
                    if let Some(timer) = self.round_timer.take() {
                        let mut out = Outbox::default();
                        self.node.handle_round_timer(timer.round, &mut out);
                        self.flush(out).await;
                    }
                }

                _ = timer_elapsed(reconnect) => {
                    self.reconnect_deadline = None;
                    let linked = self.transport.peers().await;
                    let mut out = Outbox::default();
                    self.node.handle_reconnect_deadline(&linked, &mut out);
                    self.flush(out).await;
                }
            }
        }

        self.dials.abort_all();
        self.transport.shutdown().await;
        tracing::info!("Session {} closed", self.node.local_id());
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        let mut out = Outbox::default();
        match event {
            TransportEvent::Connected(peer) => self.node.handle_connected(&peer, &mut out),
            TransportEvent::Message { from, message } => {
                self.node.handle_message(&from, message, &mut out)
            }
            TransportEvent::Closed(peer) => self.node.handle_disconnected(&peer, &mut out),
            TransportEvent::Error(e) => self.node.handle_transport_error(&e, &mut out),
        }
        self.flush(out).await;
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Act(action, reply) => {
                let mut out = Outbox::default();
                let result = self.node.perform(action, &mut out);
                if let Err(e) = &result {
                    tracing::debug!("Action refused: {}", e);
                }
                self.flush(out).await;
                let _ = reply.send(result);
            }
            Command::State(reply) => {
                let _ = reply.send(self.node.state().clone());
            }
            Command::Shutdown => {}
        }
    }

    /// Carry out a handler's effects in the order they were recorded
    async fn flush(&mut self, out: Outbox) {
        for outgoing in out.sends {
            match outgoing {
                Outgoing::To(peer, message) => self.transport.send(&peer, &message).await,
                Outgoing::Broadcast(message) => self.transport.broadcast(&message).await,
                Outgoing::BroadcastExcept(skip, message) => {
                    for peer in self.transport.peers().await {
                        if peer != skip {
                            self.transport.send(&peer, &message).await;
                        }
                    }
                }
            }
        }

        match out.timer {
            Some(TimerCommand::Arm { round, after }) => {
                tracing::debug!("Round {} settles in {:?}", round, after);
                self.round_timer = Some(RoundTimer {
                    deadline: Instant::now() + after,
                    round,
                });
            }
            Some(TimerCommand::Cancel) => self.round_timer = None,
            None => {}
        }

        if let Some(window) = out.reconnect_window {
            tracing::debug!("Waiting {:?} for guests to reconnect", window);
            self.reconnect_deadline = Some(Instant::now() + window);
        }

        for peer in out.dials {
            let transport = self.transport.clone();
            let timeout = self.node.config().connection_timeout;
            self.dials.spawn(async move {
                let result = connect_with_timeout(transport.as_ref(), &peer, timeout).await;
                (peer, result)
            });
        }

        for event in out.events {
            if self.events.send(event).is_err() {
                tracing::debug!("No listener for session events");
                break;
            }
        }
    }
}

async fn timer_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
