//! Local player actions
//!
//! Validation happens before anything is sent. A refused action returns a
//! `ValidationError` and leaves both the state and the network untouched.

use super::node::{Node, Outbox};
use super::SessionEvent;
use crate::error::ValidationError;
use crate::guess;
use crate::protocol::{ChatMessage, Message};

/// What the local player can ask their node to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    StartGame,
    AddEmoji(String),
    ClearClue,
    SubmitClue,
    Guess(String),
    PlayAgain,
}

impl Node {
    pub fn perform(&mut self, action: Action, out: &mut Outbox) -> Result<(), ValidationError> {
        tracing::debug!("Local action: {:?}", action);
        match action {
            Action::StartGame => self.start_game(out),
            Action::AddEmoji(emoji) => self.add_emoji(&emoji),
            Action::ClearClue => {
                self.clue_buffer.clear();
                Ok(())
            }
            Action::SubmitClue => self.submit_clue(out),
            Action::Guess(text) => self.guess(&text, out),
            Action::PlayAgain => self.play_again(out),
        }
    }

    pub fn start_game(&mut self, out: &mut Outbox) -> Result<(), ValidationError> {
        if !self.is_host() {
            return Err(ValidationError::NotHost("start the game"));
        }
        let config = &self.config;
        let (_, snapshot) = self.store.local_mutate(|state| state.begin_game(config))?;

        tracing::info!("Game started with {} players", snapshot.players.len());
        out.cancel_timer();
        out.broadcast(Message::StartGame {
            state: snapshot.clone(),
        });
        out.notify(SessionEvent::StateChanged(snapshot));
        out.system("Game starting!");
        self.begin_next_round(out);
        Ok(())
    }

    pub fn play_again(&mut self, out: &mut Outbox) -> Result<(), ValidationError> {
        if !self.is_host() {
            return Err(ValidationError::NotHost("start a new game"));
        }
        self.store.local_mutate(|state| state.reset_for_replay())?;

        tracing::info!("Starting a new game with the same players");
        out.cancel_timer();
        out.broadcast(Message::PlayAgain);
        out.system("New game starting!");
        self.begin_next_round(out);
        Ok(())
    }

    /// Append one palette emoji to the clue being composed
    pub fn add_emoji(&mut self, emoji: &str) -> Result<(), ValidationError> {
        let state = self.state();
        if !state.round_in_progress {
            return Err(ValidationError::RoundNotInProgress);
        }
        if !state.is_describer(&self.local_id) {
            return Err(ValidationError::NotDescriber);
        }
        if !self.config.is_palette_emoji(emoji) {
            return Err(ValidationError::UnknownEmoji(emoji.to_string()));
        }
        self.clue_buffer.push_str(emoji);
        Ok(())
    }

    /// Submit the composed clue. The buffer is emptied once it is sent.
    pub fn submit_clue(&mut self, out: &mut Outbox) -> Result<(), ValidationError> {
        let state = self.state();
        if !state.round_in_progress {
            return Err(ValidationError::RoundNotInProgress);
        }
        if !state.is_describer(&self.local_id) {
            return Err(ValidationError::NotDescriber);
        }
        if self.clue_buffer.is_empty() {
            return Err(ValidationError::EmptyClue);
        }

        let clue = std::mem::take(&mut self.clue_buffer);
        if self.is_host() {
            let local_id = self.local_id.clone();
            self.apply_clue(&local_id, clue, out)?;
        } else if let Some(host) = &self.host_id {
            out.send_to(host, Message::EmojiClue { clue });
            out.system("You submitted a clue!");
        }
        Ok(())
    }

    /// Send a guess as a chat line. The local verdict is advisory, the host
    /// evaluates every guess again.
    pub fn guess(&mut self, text: &str, out: &mut Outbox) -> Result<(), ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyGuess);
        }
        let state = self.state();
        state.guess_eligibility(&self.local_id)?;

        let chat = ChatMessage {
            player_id: self.local_id.clone(),
            player_name: self.name.clone(),
            message: text.to_string(),
            is_correct: guess::is_correct(text, &state.current_phrase),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        out.notify(SessionEvent::Chat(chat.clone()));

        if self.is_host() {
            out.broadcast(Message::ChatMessage(chat.clone()));
            if chat.is_correct {
                let local_id = self.local_id.clone();
                self.resolve_round(&local_id, text, out);
            }
        } else if let Some(host) = &self.host_id {
            out.send_to(host, Message::ChatMessage(chat));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::node::Outgoing;
    use super::*;
    use crate::config::GameConfig;
    use crate::types::*;
    use std::sync::Arc;

    fn config(min_players: usize) -> Arc<GameConfig> {
        Arc::new(GameConfig {
            min_players,
            phrases: vec!["The Eiffel Tower".to_string()],
            ..GameConfig::default()
        })
    }

    fn host_with(guests: &[&str], min_players: usize) -> Node {
        let mut node = Node::host("a".to_string(), "Alice", config(min_players));
        node.open(&mut Outbox::default());
        for id in guests {
            node.handle_message(
                &id.to_string(),
                Message::PlayerJoin {
                    player: Player::new(*id, id.to_uppercase(), false),
                },
                &mut Outbox::default(),
            );
        }
        node
    }

    #[test]
    fn test_start_game_needs_min_players() {
        let mut node = host_with(&["b"], 3);
        let mut out = Outbox::default();

        assert_eq!(
            node.perform(Action::StartGame, &mut out),
            Err(ValidationError::NotEnoughPlayers { have: 2, need: 3 })
        );
        assert!(out.sends.is_empty());
        assert!(!node.state().game_started);
    }

    #[test]
    fn test_start_game_announces_then_begins_round() {
        let mut node = host_with(&["b", "c"], 3);
        let mut out = Outbox::default();

        node.perform(Action::StartGame, &mut out).unwrap();

        assert!(matches!(
            &out.sends[0],
            Outgoing::Broadcast(Message::StartGame { state }) if state.current_round == 0
        ));
        assert!(matches!(
            &out.sends[1],
            Outgoing::Broadcast(Message::GameState { state }) if state.current_round == 1
        ));
        assert_eq!(node.state().describer_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_guest_cannot_start_game() {
        let mut node = Node::guest("b".to_string(), "Bob", "a".to_string(), config(2));
        assert_eq!(
            node.perform(Action::StartGame, &mut Outbox::default()),
            Err(ValidationError::NotHost("start the game"))
        );
    }

    #[test]
    fn test_clue_is_composed_from_palette() {
        let mut node = host_with(&["b"], 2);
        node.perform(Action::StartGame, &mut Outbox::default()).unwrap();

        for emoji in ["🗼", "❤️", "🇫🇷"] {
            node.perform(Action::AddEmoji(emoji.to_string()), &mut Outbox::default())
                .unwrap();
        }
        assert_eq!(node.clue_buffer(), "🗼❤️🇫🇷");
        assert_eq!(
            node.perform(Action::AddEmoji("x".to_string()), &mut Outbox::default()),
            Err(ValidationError::UnknownEmoji("x".to_string()))
        );

        node.perform(Action::SubmitClue, &mut Outbox::default()).unwrap();
        assert_eq!(node.state().emoji_clue, "🗼❤️🇫🇷");
        assert!(node.clue_buffer().is_empty());
    }

    #[test]
    fn test_empty_clue_is_refused() {
        let mut node = host_with(&["b"], 2);
        node.perform(Action::StartGame, &mut Outbox::default()).unwrap();
        node.perform(Action::AddEmoji("🗼".to_string()), &mut Outbox::default())
            .unwrap();
        node.perform(Action::ClearClue, &mut Outbox::default()).unwrap();

        assert_eq!(
            node.perform(Action::SubmitClue, &mut Outbox::default()),
            Err(ValidationError::EmptyClue)
        );
    }

    #[test]
    fn test_guest_guess_goes_to_host_only() {
        let mut node = Node::guest("b".to_string(), "Bob", "a".to_string(), config(2));
        let mut state = GameState::lobby(5);
        state.players = vec![Player::new("a", "Alice", true), Player::new("b", "Bob", false)];
        state.game_started = true;
        state.current_round = 1;
        state.describer_id = Some("a".to_string());
        state.current_phrase = "The Eiffel Tower".to_string();
        state.emoji_clue = "🗼".to_string();
        state.round_in_progress = true;
        node.handle_message(&"a".to_string(), Message::GameState { state }, &mut Outbox::default());

        let mut out = Outbox::default();
        node.perform(Action::Guess(" eiffel tower ".to_string()), &mut out)
            .unwrap();

        match &out.sends[..] {
            [Outgoing::To(peer, Message::ChatMessage(chat))] => {
                assert_eq!(peer, "a");
                assert_eq!(chat.message, "eiffel tower");
                assert!(chat.is_correct);
            }
            other => panic!("Expected one chat to host, got {:?}", other),
        }
        // Nothing is decided locally
        assert!(node.state().round_in_progress);
    }

    #[test]
    fn test_describer_cannot_guess() {
        let mut node = host_with(&["b"], 2);
        node.perform(Action::StartGame, &mut Outbox::default()).unwrap();
        assert_eq!(
            node.perform(Action::Guess("eiffel".to_string()), &mut Outbox::default()),
            Err(ValidationError::DescriberCannotGuess)
        );
    }

    #[test]
    fn test_play_again_only_after_game_over() {
        let mut node = host_with(&["b"], 2);
        assert_eq!(
            node.perform(Action::PlayAgain, &mut Outbox::default()),
            Err(ValidationError::GameNotOver)
        );
    }
}
