//! Host-side flows
//!
//! Everything here runs only on the authoritative node. Each flow commits a
//! transition through the store and broadcasts the resulting snapshot.

use super::node::{Node, Outbox};
use super::SessionEvent;
use crate::error::ValidationError;
use crate::guess;
use crate::protocol::{ChatMessage, Message};
use crate::transport::PeerId;
use crate::types::*;

impl Node {
    /// Send the authoritative state to every link
    pub(crate) fn broadcast_state(&self, out: &mut Outbox) {
        let snapshot = self.state().clone();
        out.broadcast(Message::GameState {
            state: snapshot.clone(),
        });
        out.notify(SessionEvent::StateChanged(snapshot));
    }

    /// A peer asked to join. The joiner always gets a direct snapshot first;
    /// everyone hears about a new member afterwards.
    pub(crate) fn admit_player(&mut self, from: &PeerId, mut player: Player, out: &mut Outbox) {
        if player.id != *from {
            tracing::warn!(
                "Ignoring player-join from {} claiming id {}",
                from,
                player.id
            );
            return;
        }
        player.is_host = false;
        player.score = 0;
        player.name = player.name.trim().to_string();
        if player.name.is_empty() {
            player.name = "Player".to_string();
        }
        let name = player.name.clone();

        let Ok((added, snapshot)) = self.store.local_mutate(|state| Ok(state.add_player(player)))
        else {
            return;
        };

        out.send_to(
            from,
            Message::GameState {
                state: snapshot.clone(),
            },
        );

        if added {
            tracing::info!("Player {} joined as {}", from, name);
            out.broadcast(Message::GameState {
                state: snapshot.clone(),
            });
            out.system(format!("{} joined the game", name));
            out.notify(SessionEvent::StateChanged(snapshot));
        } else {
            tracing::debug!("Duplicate join from {}, resent snapshot", from);
        }
    }

    /// Commit a clue and fan it out: the clue notice, then the new snapshot
    pub(crate) fn apply_clue(
        &mut self,
        from: &PeerId,
        clue: String,
        out: &mut Outbox,
    ) -> Result<(), ValidationError> {
        let (_, snapshot) = self
            .store
            .local_mutate(|state| state.submit_clue(from, &clue))?;

        let describer = snapshot
            .player(from)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        tracing::info!("Clue for round {}: {}", snapshot.current_round, clue);

        out.broadcast(Message::EmojiClue { clue: clue.clone() });
        out.broadcast(Message::GameState {
            state: snapshot.clone(),
        });
        out.notify(SessionEvent::ClueSubmitted { clue });
        out.system(format!("{} submitted a clue!", describer));
        out.notify(SessionEvent::StateChanged(snapshot));
        Ok(())
    }

    /// Relay a chat line to everyone but its sender, with the correctness
    /// flag recomputed here, then settle the round if it was the winner.
    pub(crate) fn relay_chat(&mut self, from: &PeerId, mut chat: ChatMessage, out: &mut Outbox) {
        if chat.player_id != *from {
            tracing::warn!(
                "Ignoring chat from {} attributed to {}",
                from,
                chat.player_id
            );
            return;
        }
        let state = self.state();
        let Some(sender) = state.player(from) else {
            tracing::warn!("Ignoring chat from unknown peer {}", from);
            return;
        };
        if state.round_in_progress && state.is_describer(from) {
            tracing::warn!("Ignoring chat from describer {}", from);
            return;
        }

        chat.player_name = sender.name.clone();
        chat.is_correct = state.guess_eligibility(from).is_ok()
            && guess::is_correct(&chat.message, &state.current_phrase);

        out.broadcast_except(from, Message::ChatMessage(chat.clone()));
        out.notify(SessionEvent::Chat(chat.clone()));

        if chat.is_correct {
            self.resolve_round(from, &chat.message, out);
        }
    }

    /// Award the round to `guesser` if the guess still wins it
    pub(crate) fn resolve_round(&mut self, guesser: &PeerId, text: &str, out: &mut Outbox) {
        let config = &self.config;
        let resolved = self
            .store
            .local_mutate(|state| Ok(state.resolve_guess(config, guesser, text)));

        let Ok((Some(result), snapshot)) = resolved else {
            tracing::debug!("Guess from {} did not settle the round", guesser);
            return;
        };

        tracing::info!(
            "Round {} won by {} ({})",
            snapshot.current_round,
            result.winner_name,
            result.phrase
        );
        out.broadcast(Message::RoundEnd {
            state: snapshot.clone(),
            winner: result.winner_name.clone(),
            phrase: result.phrase.clone(),
        });
        out.notify(SessionEvent::RoundEnded {
            winner: result.winner_name,
            phrase: result.phrase,
        });
        out.notify(SessionEvent::StateChanged(snapshot.clone()));
        out.arm_timer(snapshot.current_round, self.config.round_delay);
    }

    /// Begin the next round and announce it
    pub(crate) fn begin_next_round(&mut self, out: &mut Outbox) {
        let config = &self.config;
        match self.store.local_mutate(|state| Ok(state.start_round(config))) {
            Ok((true, _)) => {
                self.clue_buffer.clear();
                self.broadcast_state(out);
            }
            Ok((false, _)) => tracing::warn!("No further round could be started"),
            Err(e) => tracing::warn!("Failed to start round: {}", e),
        }
    }

    /// The inter-round delay for `round` elapsed
    pub fn handle_round_timer(&mut self, round: u32, out: &mut Outbox) {
        let state = self.state();
        let settled = state.game_started
            && !state.round_in_progress
            && state.round_winner.is_some()
            && state.current_round == round;
        if !self.is_host() || !settled {
            tracing::debug!("Discarding stale round timer for round {}", round);
            return;
        }

        match state.next_step() {
            RoundAdvance::NextRound => self.begin_next_round(out),
            RoundAdvance::GameOver => self.finish_game(out),
        }
    }

    fn finish_game(&mut self, out: &mut Outbox) {
        let Ok((_, snapshot)) = self.store.local_mutate(|state| {
            state.end_game();
            Ok(())
        }) else {
            return;
        };

        tracing::info!("Game over after {} rounds", snapshot.current_round);
        out.broadcast(Message::GameEnd {
            state: snapshot.clone(),
        });
        out.notify(SessionEvent::GameOver {
            standings: snapshot.leaderboard(),
        });
        out.notify(SessionEvent::StateChanged(snapshot));
    }

    /// A guest's link closed: drop them, redraw the round if they were
    /// describing it, and tell everyone else.
    pub(crate) fn on_peer_left(&mut self, peer: &PeerId, out: &mut Outbox) {
        let config = &self.config;
        let departed = self.store.local_mutate(|state| {
            let departure = state.depart(peer);
            let redrawn = state.round_in_progress
                && state.describer_id.is_none()
                && state.redraw_round(config);
            Ok((departure, redrawn))
        });

        let Ok(((Some(departure), redrawn), _)) = departed else {
            tracing::debug!("Link to {} closed before it joined", peer);
            return;
        };

        tracing::info!("Player {} ({}) left", departure.player.name, peer);
        out.system(format!("{} disconnected", departure.player.name));
        if redrawn {
            self.clue_buffer.clear();
            out.system("The describer left, starting the round over");
        }
        self.broadcast_state(out);
    }

    /// This node was just promoted: repair the round if needed, republish
    /// the state, and resume the round timer if it was pending. Guests
    /// that have not reconnected once the connection timeout passes are
    /// dropped.
    pub(crate) fn resume_as_host(&mut self, out: &mut Outbox) {
        out.expect_reconnects(self.config.connection_timeout);

        // The old host died between start-game and the first round
        let state = self.state();
        if state.game_started && state.current_round == 0 {
            self.begin_next_round(out);
            return;
        }

        let config = &self.config;
        let redrawn = self.store.local_mutate(|state| {
            Ok(state.round_in_progress
                && state.describer_id.is_none()
                && state.redraw_round(config))
        });
        if matches!(redrawn, Ok((true, _))) {
            self.clue_buffer.clear();
            out.system("The describer left, starting the round over");
        }

        self.broadcast_state(out);

        let state = self.state();
        if state.phase() == RoundPhase::RoundOver {
            out.arm_timer(state.current_round, self.config.round_delay);
        }
    }

    /// The reconnect window after a promotion closed. Every roster member
    /// without an open link is treated as departed.
    pub fn handle_reconnect_deadline(&mut self, linked: &[PeerId], out: &mut Outbox) {
        if !self.is_host() {
            return;
        }
        let missing: Vec<PeerId> = self
            .state()
            .players
            .iter()
            .map(|p| p.id.clone())
            .filter(|id| *id != self.local_id && !linked.contains(id))
            .collect();

        if missing.is_empty() {
            tracing::debug!("Every guest reconnected to the new host");
            return;
        }
        for peer in &missing {
            tracing::warn!("{} did not reconnect after failover", peer);
            self.on_peer_left(peer, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::node::{Outgoing, TimerCommand};
    use super::*;
    use crate::config::GameConfig;
    use std::sync::Arc;
    use std::time::Duration;

    fn config() -> Arc<GameConfig> {
        Arc::new(GameConfig {
            min_players: 2,
            max_rounds: 2,
            phrases: vec!["Pizza".to_string()],
            round_delay: Duration::from_millis(10),
            ..GameConfig::default()
        })
    }

    fn join(node: &mut Node, id: &str, name: &str) -> Outbox {
        let mut out = Outbox::default();
        node.handle_message(
            &id.to_string(),
            Message::PlayerJoin {
                player: Player::new(id, name, false),
            },
            &mut out,
        );
        out
    }

    /// Host "a" with guests "b" and "c", game started, round 1 described by "a"
    fn running_host() -> Node {
        let mut node = Node::host("a".to_string(), "Alice", config());
        node.open(&mut Outbox::default());
        join(&mut node, "b", "Bob");
        join(&mut node, "c", "Cat");
        node.start_game(&mut Outbox::default()).unwrap();
        node
    }

    fn chat(id: &str, text: &str) -> Message {
        Message::ChatMessage(ChatMessage {
            player_id: id.to_string(),
            player_name: String::new(),
            message: text.to_string(),
            is_correct: false,
            timestamp: 0,
        })
    }

    #[test]
    fn test_join_sends_direct_snapshot_before_broadcast() {
        let mut node = Node::host("a".to_string(), "Alice", config());
        node.open(&mut Outbox::default());

        let out = join(&mut node, "b", "Bob");

        assert_eq!(out.sends.len(), 2);
        match (&out.sends[0], &out.sends[1]) {
            (
                Outgoing::To(peer, Message::GameState { state: direct }),
                Outgoing::Broadcast(Message::GameState { state: broadcast }),
            ) => {
                assert_eq!(peer, "b");
                assert_eq!(direct, broadcast);
                assert_eq!(direct.players.len(), 2);
                assert!(!direct.players[1].is_host);
            }
            other => panic!("Unexpected sends: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_join_only_resends_snapshot() {
        let mut node = Node::host("a".to_string(), "Alice", config());
        node.open(&mut Outbox::default());
        join(&mut node, "b", "Bob");

        let out = join(&mut node, "b", "Bob");

        assert_eq!(out.sends.len(), 1);
        assert!(matches!(&out.sends[0], Outgoing::To(peer, _) if peer == "b"));
        assert_eq!(node.state().players.len(), 2);
    }

    #[test]
    fn test_join_for_another_id_is_ignored() {
        let mut node = Node::host("a".to_string(), "Alice", config());
        node.open(&mut Outbox::default());

        let mut out = Outbox::default();
        node.handle_message(
            &"b".to_string(),
            Message::PlayerJoin {
                player: Player::new("z", "Mallory", true),
            },
            &mut out,
        );

        assert!(out.sends.is_empty());
        assert_eq!(node.state().players.len(), 1);
    }

    #[test]
    fn test_clue_from_non_describer_is_ignored() {
        let mut node = running_host();
        let mut out = Outbox::default();

        node.handle_message(
            &"b".to_string(),
            Message::EmojiClue {
                clue: "🍕".to_string(),
            },
            &mut out,
        );

        assert!(out.sends.is_empty());
        assert!(node.state().emoji_clue.is_empty());
    }

    #[test]
    fn test_clue_is_broadcast_then_snapshot() {
        let mut node = running_host();
        let mut out = Outbox::default();

        node.apply_clue(&"a".to_string(), "🍕".to_string(), &mut out)
            .unwrap();

        assert!(matches!(
            &out.sends[0],
            Outgoing::Broadcast(Message::EmojiClue { clue }) if clue == "🍕"
        ));
        assert!(matches!(
            &out.sends[1],
            Outgoing::Broadcast(Message::GameState { state }) if state.emoji_clue == "🍕"
        ));
    }

    #[test]
    fn test_simultaneous_correct_guesses_have_one_winner() {
        let mut node = running_host();
        node.apply_clue(&"a".to_string(), "🍕".to_string(), &mut Outbox::default())
            .unwrap();

        let mut first = Outbox::default();
        node.handle_message(&"b".to_string(), chat("b", "pizza"), &mut first);
        let mut second = Outbox::default();
        node.handle_message(&"c".to_string(), chat("c", "Pizza!"), &mut second);

        let round_ends = |out: &Outbox| {
            out.sends
                .iter()
                .filter(|s| matches!(s, Outgoing::Broadcast(Message::RoundEnd { .. })))
                .count()
        };
        assert_eq!(round_ends(&first), 1);
        assert_eq!(round_ends(&second), 0);
        assert_eq!(first.timer, Some(TimerCommand::Arm { round: 1, after: Duration::from_millis(10) }));

        let state = node.state();
        assert_eq!(state.round_winner.as_deref(), Some("b"));
        assert_eq!(state.player("b").unwrap().score, 10);
        assert_eq!(state.player("c").unwrap().score, 0);
        assert_eq!(state.player("a").unwrap().score, 5);
    }

    #[test]
    fn test_chat_is_relayed_to_everyone_but_sender() {
        let mut node = running_host();
        let mut out = Outbox::default();

        node.handle_message(&"b".to_string(), chat("b", "hello"), &mut out);

        match &out.sends[0] {
            Outgoing::BroadcastExcept(peer, Message::ChatMessage(relayed)) => {
                assert_eq!(peer, "b");
                assert_eq!(relayed.player_name, "Bob");
                assert!(!relayed.is_correct);
            }
            other => panic!("Expected relay, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_timer_is_discarded() {
        let mut node = running_host();
        node.apply_clue(&"a".to_string(), "🍕".to_string(), &mut Outbox::default())
            .unwrap();
        node.handle_message(&"b".to_string(), chat("b", "pizza"), &mut Outbox::default());

        let mut stale = Outbox::default();
        node.handle_round_timer(7, &mut stale);
        assert!(stale.sends.is_empty());
        assert_eq!(node.state().current_round, 1);

        let mut due = Outbox::default();
        node.handle_round_timer(1, &mut due);
        assert_eq!(node.state().current_round, 2);
        assert_eq!(node.state().describer_id.as_deref(), Some("b"));

        // A second fire for the same round finds it in progress and does nothing
        let mut again = Outbox::default();
        node.handle_round_timer(1, &mut again);
        assert!(again.sends.is_empty());
        assert_eq!(node.state().current_round, 2);
    }

    #[test]
    fn test_last_round_timer_ends_game() {
        let mut node = running_host();
        for (round, describer, guesser) in [(1, "a", "b"), (2, "b", "c")] {
            node.apply_clue(&describer.to_string(), "🍕".to_string(), &mut Outbox::default())
                .unwrap();
            node.handle_message(&guesser.to_string(), chat(guesser, "pizza"), &mut Outbox::default());
            let mut out = Outbox::default();
            node.handle_round_timer(round, &mut out);
            if round == 2 {
                assert!(matches!(
                    &out.sends[0],
                    Outgoing::Broadcast(Message::GameEnd { .. })
                ));
                assert!(out
                    .events
                    .iter()
                    .any(|e| matches!(e, SessionEvent::GameOver { .. })));
            }
        }
        assert_eq!(node.state().phase(), RoundPhase::GameOver);
    }

    #[test]
    fn test_describer_leaving_redraws_round() {
        let mut node = running_host();
        node.begin_next_round_for_test("b");

        let mut out = Outbox::default();
        node.handle_disconnected(&"b".to_string(), &mut out);

        let state = node.state();
        assert_eq!(state.players.len(), 2);
        assert!(state.round_in_progress);
        assert!(state.describer_id.is_some());
        assert_ne!(state.describer_id.as_deref(), Some("b"));
        assert!(matches!(
            out.sends.last(),
            Some(Outgoing::Broadcast(Message::GameState { .. }))
        ));
    }

    #[test]
    fn test_guests_missing_after_failover_are_dropped() {
        let mut node = running_host();

        let mut settled = Outbox::default();
        node.handle_reconnect_deadline(&["b".to_string(), "c".to_string()], &mut settled);
        assert!(settled.sends.is_empty());
        assert_eq!(node.state().players.len(), 3);

        let mut out = Outbox::default();
        node.handle_reconnect_deadline(&["b".to_string()], &mut out);

        let ids: Vec<&str> = node.state().players.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(out
            .events
            .contains(&SessionEvent::System("Cat disconnected".to_string())));
        assert!(matches!(
            out.sends.last(),
            Some(Outgoing::Broadcast(Message::GameState { state })) if state.players.len() == 2
        ));
    }

    impl Node {
        /// Play round 1 out and move to round 2, checking its describer
        fn begin_next_round_for_test(&mut self, expected_describer: &str) {
            self.apply_clue(&"a".to_string(), "🍕".to_string(), &mut Outbox::default())
                .unwrap();
            self.handle_message(&"c".to_string(), chat("c", "pizza"), &mut Outbox::default());
            self.handle_round_timer(1, &mut Outbox::default());
            assert_eq!(self.state().describer_id.as_deref(), Some(expected_describer));
        }
    }
}
