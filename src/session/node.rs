use super::SessionEvent;
use crate::config::GameConfig;
use crate::protocol::Message;
use crate::state::GameStore;
use crate::transport::{PeerId, TransportError};
use crate::types::*;
use std::sync::Arc;
use std::time::Duration;

/// Where an outgoing message goes
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    To(PeerId, Message),
    Broadcast(Message),
    BroadcastExcept(PeerId, Message),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    /// Advance after `after`, provided round `round` is still the resolved one
    Arm { round: u32, after: Duration },
    Cancel,
}

/// Side effects produced by one handler run, applied by the session driver
/// in order once the handler returns.
#[derive(Debug, Default)]
pub struct Outbox {
    pub sends: Vec<Outgoing>,
    pub events: Vec<SessionEvent>,
    pub timer: Option<TimerCommand>,
    pub dials: Vec<PeerId>,
    /// Check which guests are linked once this much time has passed
    pub reconnect_window: Option<Duration>,
}

impl Outbox {
    pub fn send_to(&mut self, peer: &PeerId, message: Message) {
        self.sends.push(Outgoing::To(peer.clone(), message));
    }

    pub fn broadcast(&mut self, message: Message) {
        self.sends.push(Outgoing::Broadcast(message));
    }

    pub fn broadcast_except(&mut self, peer: &PeerId, message: Message) {
        self.sends.push(Outgoing::BroadcastExcept(peer.clone(), message));
    }

    pub fn notify(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    pub fn system(&mut self, text: impl Into<String>) {
        self.events.push(SessionEvent::System(text.into()));
    }

    pub fn arm_timer(&mut self, round: u32, after: Duration) {
        self.timer = Some(TimerCommand::Arm { round, after });
    }

    pub fn cancel_timer(&mut self) {
        self.timer = Some(TimerCommand::Cancel);
    }

    pub fn dial(&mut self, peer: &PeerId) {
        self.dials.push(peer.clone());
    }

    pub fn expect_reconnects(&mut self, within: Duration) {
        self.reconnect_window = Some(within);
    }
}

/// Everything one peer knows: its identity, its copy of the game, and who
/// it currently treats as the authority. Handlers take `&mut self` and
/// record their effects in an [`Outbox`].
#[derive(Debug)]
pub struct Node {
    pub(crate) local_id: PeerId,
    pub(crate) name: String,
    pub(crate) config: Arc<GameConfig>,
    pub(crate) store: GameStore,
    pub(crate) host_id: Option<PeerId>,
    pub(crate) clue_buffer: String,
}

impl Node {
    /// A node that creates a new session and owns its state
    pub fn host(local_id: PeerId, name: impl Into<String>, config: Arc<GameConfig>) -> Self {
        Self {
            store: GameStore::new(Role::Host, config.max_rounds),
            host_id: Some(local_id.clone()),
            local_id,
            name: name.into(),
            config,
            clue_buffer: String::new(),
        }
    }

    /// A node that joins the session hosted at `host_id`
    pub fn guest(
        local_id: PeerId,
        name: impl Into<String>,
        host_id: PeerId,
        config: Arc<GameConfig>,
    ) -> Self {
        Self {
            store: GameStore::new(Role::Guest, config.max_rounds),
            host_id: Some(host_id),
            local_id,
            name: name.into(),
            config,
            clue_buffer: String::new(),
        }
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_host(&self) -> bool {
        self.store.is_host()
    }

    pub fn role(&self) -> Role {
        self.store.role()
    }

    pub fn state(&self) -> &GameState {
        self.store.state()
    }

    pub fn host_id(&self) -> Option<&PeerId> {
        self.host_id.as_ref()
    }

    pub fn clue_buffer(&self) -> &str {
        &self.clue_buffer
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub(crate) fn local_player(&self) -> Player {
        Player::new(self.local_id.clone(), self.name.clone(), self.is_host())
    }

    /// Bring the node up once the transport is open
    pub fn open(&mut self, out: &mut Outbox) {
        if self.is_host() {
            let me = self.local_player();
            if let Ok((_, snapshot)) = self.store.local_mutate(|state| Ok(state.add_player(me))) {
                out.notify(SessionEvent::StateChanged(snapshot));
            }
            out.notify(SessionEvent::status(
                StatusLevel::Connected,
                "Connected - You are the host",
            ));
            tracing::info!("Hosting new session as {}", self.local_id);
        } else if let Some(host) = self.host_id.clone() {
            out.notify(SessionEvent::status(
                StatusLevel::Connecting,
                "Connecting to host...",
            ));
            tracing::info!("Joining session hosted by {}", host);
            out.dial(&host);
        }
    }

    /// A link opened, dialed by us or by the remote peer
    pub fn handle_connected(&mut self, peer: &PeerId, out: &mut Outbox) {
        if self.is_host() {
            tracing::debug!("Link from {} open, awaiting player-join", peer);
            return;
        }
        if self.host_id.as_ref() == Some(peer) {
            tracing::info!("Connection established with host {}", peer);
            out.send_to(
                peer,
                Message::PlayerJoin {
                    player: self.local_player(),
                },
            );
            out.notify(SessionEvent::status(StatusLevel::Connected, "Connected"));
        } else {
            tracing::warn!(
                "Direct link from non-host peer {}; its messages will be ignored",
                peer
            );
        }
    }

    /// A link closed
    pub fn handle_disconnected(&mut self, peer: &PeerId, out: &mut Outbox) {
        if self.is_host() {
            self.on_peer_left(peer, out);
        } else if self.host_id.as_ref() == Some(peer) {
            self.on_host_left(peer, out);
        } else {
            tracing::debug!("Link to non-host peer {} closed", peer);
        }
    }

    /// Our own dial attempt was abandoned
    pub fn handle_dial_failed(&mut self, peer: &PeerId, error: &TransportError, out: &mut Outbox) {
        tracing::error!("Failed to connect to {}: {}", peer, error);
        let text = match error {
            TransportError::PeerUnavailable(_) => "Host not found - Check the room link".to_string(),
            TransportError::Timeout(_) => "Connection timeout - Host may be offline".to_string(),
            TransportError::Network(_) => "Network error - Check your connection".to_string(),
            other => format!("Error: {}", other),
        };
        out.notify(SessionEvent::status(StatusLevel::Error, text));
    }

    /// Failure reported by the local transport itself
    pub fn handle_transport_error(&mut self, error: &TransportError, out: &mut Outbox) {
        tracing::error!("Transport error: {}", error);
        out.notify(SessionEvent::status(
            StatusLevel::Error,
            format!("Connection error: {}", error),
        ));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Connecting,
    Connected,
    Error,
}
