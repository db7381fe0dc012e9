//! Round lifecycle
//!
//! Lobby -> round active (awaiting clue) -> round active (guessing) ->
//! round over -> next round | game over. Only the host runs these
//! transitions; replicas receive their results as snapshots.

use crate::config::GameConfig;
use crate::error::ValidationError;
use crate::guess;
use crate::types::*;
use rand::seq::IndexedRandom;

fn pick_phrase(config: &GameConfig) -> String {
    config
        .phrases
        .choose(&mut rand::rng())
        .cloned()
        .unwrap_or_default()
}

/// Round-robin: round `n` (1-based) is described by `players[(n - 1) % len]`
fn describer_for_round(players: &[Player], round: u32) -> Option<PlayerId> {
    if players.is_empty() || round == 0 {
        return None;
    }
    let index = (round as usize - 1) % players.len();
    Some(players[index].id.clone())
}

impl GameState {
    /// Lobby -> started. Scores reset, no round running yet.
    pub fn begin_game(&mut self, config: &GameConfig) -> Result<(), ValidationError> {
        if self.game_started {
            return Err(ValidationError::GameInProgress);
        }
        if self.players.len() < config.min_players {
            return Err(ValidationError::NotEnoughPlayers {
                have: self.players.len(),
                need: config.min_players,
            });
        }

        self.game_started = true;
        self.current_round = 0;
        self.max_rounds = config.max_rounds;
        self.round_in_progress = false;
        self.round_winner = None;
        self.describer_id = None;
        self.current_phrase.clear();
        self.emoji_clue.clear();
        for player in &mut self.players {
            player.score = 0;
        }
        Ok(())
    }

    /// Enter the next round. Returns false when no further round may start.
    pub fn start_round(&mut self, config: &GameConfig) -> bool {
        if !self.game_started || self.current_round >= self.max_rounds {
            return false;
        }
        let Some(describer) = describer_for_round(&self.players, self.current_round + 1) else {
            return false;
        };

        self.current_round += 1;
        self.describer_id = Some(describer);
        self.current_phrase = pick_phrase(config);
        self.emoji_clue.clear();
        self.round_winner = None;
        self.round_in_progress = true;

        tracing::info!(
            "Round {}: describer={:?}, phrase={:?}",
            self.current_round,
            self.describer_id,
            self.current_phrase
        );
        true
    }

    /// Restart the current round (same number) with the describer the
    /// current roster yields. Used when the describer leaves mid-round.
    pub fn redraw_round(&mut self, config: &GameConfig) -> bool {
        let Some(describer) = describer_for_round(&self.players, self.current_round) else {
            return false;
        };
        self.describer_id = Some(describer);
        self.current_phrase = pick_phrase(config);
        self.emoji_clue.clear();
        self.round_winner = None;
        self.round_in_progress = true;

        tracing::info!(
            "Round {} redrawn: describer={:?}",
            self.current_round,
            self.describer_id
        );
        true
    }

    /// Record the describer's clue. Resubmission replaces the earlier clue.
    pub fn submit_clue(&mut self, from: &str, clue: &str) -> Result<(), ValidationError> {
        if !self.round_in_progress {
            return Err(ValidationError::RoundNotInProgress);
        }
        if !self.is_describer(from) {
            return Err(ValidationError::NotDescriber);
        }
        if clue.trim().is_empty() {
            return Err(ValidationError::EmptyClue);
        }
        self.emoji_clue = clue.to_string();
        Ok(())
    }

    /// Whether `guesser` may have a guess evaluated right now
    pub fn guess_eligibility(&self, guesser: &str) -> Result<(), ValidationError> {
        if self.round_winner.is_some() {
            return Err(ValidationError::RoundAlreadyWon);
        }
        if !self.round_in_progress {
            return Err(ValidationError::RoundNotInProgress);
        }
        if self.is_describer(guesser) {
            return Err(ValidationError::DescriberCannotGuess);
        }
        if self.emoji_clue.is_empty() {
            return Err(ValidationError::ClueNotGiven);
        }
        Ok(())
    }

    /// Evaluate a guess. The first correct guess by an eligible player wins
    /// the round; every later guess in the same round is ignored.
    pub fn resolve_guess(
        &mut self,
        config: &GameConfig,
        guesser: &str,
        guess_text: &str,
    ) -> Option<RoundResult> {
        if self.guess_eligibility(guesser).is_err() {
            return None;
        }
        if !guess::is_correct(guess_text, &self.current_phrase) {
            return None;
        }
        let winner_name = self.player(guesser)?.name.clone();
        let describer_id = self.describer_id.clone();

        for player in &mut self.players {
            if player.id == guesser {
                player.score += config.points_correct_guess;
            } else if Some(&player.id) == describer_id.as_ref() {
                player.score += config.points_describer;
            }
        }
        self.round_winner = Some(guesser.to_string());
        self.round_in_progress = false;

        Some(RoundResult {
            winner_id: guesser.to_string(),
            winner_name,
            phrase: self.current_phrase.clone(),
        })
    }

    /// What follows a resolved round
    pub fn next_step(&self) -> RoundAdvance {
        if self.current_round < self.max_rounds {
            RoundAdvance::NextRound
        } else {
            RoundAdvance::GameOver
        }
    }

    pub fn end_game(&mut self) {
        self.game_started = false;
        self.round_in_progress = false;
    }

    /// GameOver -> started again with the same roster, counters zeroed
    pub fn reset_for_replay(&mut self) -> Result<(), ValidationError> {
        if self.phase() != RoundPhase::GameOver {
            return Err(ValidationError::GameNotOver);
        }
        self.current_round = 0;
        self.game_started = true;
        self.round_in_progress = false;
        self.round_winner = None;
        self.describer_id = None;
        self.current_phrase.clear();
        self.emoji_clue.clear();
        for player in &mut self.players {
            player.score = 0;
        }
        Ok(())
    }
}
