//! Peer message dispatch
//!
//! Every inbound frame enters here. Authority is checked before dispatch:
//! intents are only served by the host, snapshots and notices are only
//! accepted from the peer this node treats as host.

use super::node::{Node, Outbox};
use crate::protocol::Message;
use crate::transport::PeerId;

/// Return early unless this node is the host
macro_rules! require_host {
    ($node:expr, $from:expr, $kind:expr) => {
        if !$node.is_host() {
            tracing::debug!("Ignoring {} from {}: not the host", $kind, $from);
            return;
        }
    };
}

/// Return early unless the frame came from the current host
macro_rules! require_from_host {
    ($node:expr, $from:expr, $kind:expr) => {
        if $node.is_host() {
            tracing::warn!("Ignoring {} from {}: this node is the host", $kind, $from);
            return;
        }
        if $node.host_id.as_ref() != Some($from) {
            tracing::warn!("Ignoring {} from non-host peer {}", $kind, $from);
            return;
        }
    };
}

impl Node {
    /// Route one inbound message
    pub fn handle_message(&mut self, from: &PeerId, message: Message, out: &mut Outbox) {
        let kind = message.kind();
        tracing::debug!("Received {} from {}", kind, from);

        match message {
            // Intents served by the host
            Message::PlayerJoin { player } => {
                require_host!(self, from, kind);
                self.admit_player(from, player, out);
            }

            Message::EmojiClue { clue } => {
                if self.is_host() {
                    if let Err(e) = self.apply_clue(from, clue, out) {
                        tracing::warn!("Rejected clue from {}: {}", from, e);
                    }
                } else {
                    require_from_host!(self, from, kind);
                    self.on_clue_notice(clue, out);
                }
            }

            Message::ChatMessage(chat) => {
                if self.is_host() {
                    self.relay_chat(from, chat, out);
                } else {
                    require_from_host!(self, from, kind);
                    self.on_chat_relay(chat, out);
                }
            }

            // Snapshots and notices from the host
            Message::GameState { state } => {
                require_from_host!(self, from, kind);
                self.on_snapshot(state, out);
            }

            Message::StartGame { state } => {
                require_from_host!(self, from, kind);
                self.on_game_started(state, out);
            }

            Message::RoundEnd {
                state,
                winner,
                phrase,
            } => {
                require_from_host!(self, from, kind);
                self.on_round_end(state, winner, phrase, out);
            }

            Message::GameEnd { state } => {
                require_from_host!(self, from, kind);
                self.on_game_end(state, out);
            }

            Message::PlayAgain => {
                require_from_host!(self, from, kind);
                self.on_play_again(out);
            }

            Message::Unknown => {
                tracing::debug!("Ignoring unknown message kind from {}", from);
            }
        }
    }
}
