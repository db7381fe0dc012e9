//! Replica-side flows
//!
//! A guest never decides anything. It replaces its replica with whatever
//! the host sends and surfaces the notices. The one exception is host
//! loss, where every guest runs the same deterministic election.

use super::node::{Node, Outbox, StatusLevel};
use super::SessionEvent;
use crate::protocol::ChatMessage;
use crate::transport::PeerId;
use crate::types::*;

impl Node {
    pub(crate) fn on_snapshot(&mut self, state: GameState, out: &mut Outbox) {
        let previous = (self.state().current_round, self.state().describer_id.clone());
        if !self.store.apply_snapshot(state) {
            return;
        }
        let state = self.state();
        let round_changed = (state.current_round, state.describer_id.clone()) != previous;
        if round_changed || !state.round_in_progress {
            self.clue_buffer.clear();
        }
        out.notify(SessionEvent::StateChanged(self.state().clone()));
    }

    pub(crate) fn on_game_started(&mut self, state: GameState, out: &mut Outbox) {
        self.on_snapshot(state, out);
        out.system("Game starting!");
    }

    pub(crate) fn on_round_end(
        &mut self,
        state: GameState,
        winner: String,
        phrase: String,
        out: &mut Outbox,
    ) {
        self.on_snapshot(state, out);
        out.notify(SessionEvent::RoundEnded { winner, phrase });
    }

    pub(crate) fn on_game_end(&mut self, state: GameState, out: &mut Outbox) {
        self.on_snapshot(state, out);
        out.notify(SessionEvent::GameOver {
            standings: self.state().leaderboard(),
        });
    }

    /// The authoritative clue arrives in the snapshot that follows
    pub(crate) fn on_clue_notice(&mut self, clue: String, out: &mut Outbox) {
        out.notify(SessionEvent::ClueSubmitted { clue });
        out.system("Describer submitted a clue!");
    }

    pub(crate) fn on_chat_relay(&mut self, chat: ChatMessage, out: &mut Outbox) {
        if chat.player_id == self.local_id {
            return;
        }
        out.notify(SessionEvent::Chat(chat));
    }

    pub(crate) fn on_play_again(&mut self, out: &mut Outbox) {
        self.clue_buffer.clear();
        out.system("New game starting!");
    }

    /// The link to the host closed. In a running game the first remaining
    /// player in roster order takes over; everyone else reconnects to them.
    pub(crate) fn on_host_left(&mut self, host: &PeerId, out: &mut Outbox) {
        tracing::warn!("Lost connection to host {}", host);
        let Some(departure) = self.store.depart(host, &self.local_id) else {
            self.host_id = None;
            out.notify(SessionEvent::status(
                StatusLevel::Error,
                "Disconnected from host",
            ));
            return;
        };
        out.system(format!("{} disconnected", departure.player.name));

        match departure.promoted {
            Some(promoted) if promoted == self.local_id => {
                self.host_id = Some(promoted);
                out.notify(SessionEvent::PromotedToHost);
                out.system("You are now the host");
                self.resume_as_host(out);
            }
            Some(promoted) => {
                let name = self
                    .state()
                    .player(&promoted)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| promoted.clone());
                tracing::info!("Reconnecting to new host {}", promoted);
                out.system(format!("{} is now the host", name));
                out.notify(SessionEvent::status(
                    StatusLevel::Connecting,
                    "Connecting to new host...",
                ));
                out.dial(&promoted);
                self.host_id = Some(promoted);
                out.notify(SessionEvent::StateChanged(self.state().clone()));
            }
            None => {
                self.host_id = None;
                out.notify(SessionEvent::status(
                    StatusLevel::Error,
                    "The host left the game",
                ));
                out.notify(SessionEvent::StateChanged(self.state().clone()));
            }
        }
    }
}
