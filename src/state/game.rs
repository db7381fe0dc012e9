use crate::types::*;

impl GameState {
    /// Initial state: empty roster, nothing started
    pub fn lobby(max_rounds: u32) -> Self {
        Self {
            players: Vec::new(),
            current_round: 0,
            max_rounds,
            describer_id: None,
            current_phrase: String::new(),
            emoji_clue: String::new(),
            game_started: false,
            round_in_progress: false,
            round_winner: None,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        match (self.game_started, self.round_in_progress) {
            (false, _) if self.current_round == 0 => RoundPhase::Lobby,
            (false, _) => RoundPhase::GameOver,
            (true, true) if self.emoji_clue.is_empty() => RoundPhase::AwaitingClue,
            (true, true) => RoundPhase::Guessing,
            (true, false) => RoundPhase::RoundOver,
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }

    pub fn describer(&self) -> Option<&Player> {
        self.describer_id.as_deref().and_then(|id| self.player(id))
    }

    pub fn is_describer(&self, id: &str) -> bool {
        self.describer_id.as_deref() == Some(id)
    }

    /// Players ordered by score, highest first. Ties keep roster order.
    pub fn leaderboard(&self) -> Vec<Player> {
        let mut standings = self.players.clone();
        standings.sort_by(|a, b| b.score.cmp(&a.score));
        standings
    }

    /// First broken invariant, if any
    pub fn invariant_violation(&self) -> Option<&'static str> {
        if let Some(describer) = &self.describer_id {
            if self.player(describer).is_none() {
                return Some("describer is not in the roster");
            }
        }
        if self.game_started && self.current_round > self.max_rounds {
            return Some("current round exceeds max rounds");
        }
        if self.round_winner.is_some() && self.round_in_progress {
            return Some("round has a winner but is still in progress");
        }
        let mut ids: Vec<&str> = self.players.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != self.players.len() {
            return Some("duplicate player id in roster");
        }
        if self.game_started
            && !self.players.is_empty()
            && self.players.iter().filter(|p| p.is_host).count() != 1
        {
            return Some("active game must have exactly one host");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_follows_flags() {
        let mut state = GameState::lobby(3);
        assert_eq!(state.phase(), RoundPhase::Lobby);

        state.game_started = true;
        state.current_round = 1;
        state.round_in_progress = true;
        assert_eq!(state.phase(), RoundPhase::AwaitingClue);

        state.emoji_clue = "🍕🎉".to_string();
        assert_eq!(state.phase(), RoundPhase::Guessing);

        state.round_in_progress = false;
        assert_eq!(state.phase(), RoundPhase::RoundOver);

        state.game_started = false;
        assert_eq!(state.phase(), RoundPhase::GameOver);
    }

    #[test]
    fn test_leaderboard_sorts_by_score() {
        let mut state = GameState::lobby(3);
        state.players = vec![
            Player::new("a", "Alice", true),
            Player::new("b", "Bob", false),
            Player::new("c", "Cleo", false),
        ];
        state.players[1].score = 15;
        state.players[2].score = 15;
        state.players[0].score = 5;

        let names: Vec<_> = state.leaderboard().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Bob", "Cleo", "Alice"]);
    }

    #[test]
    fn test_invariant_violation_detects_dangling_describer() {
        let mut state = GameState::lobby(3);
        state.players = vec![Player::new("a", "Alice", true)];
        assert_eq!(state.invariant_violation(), None);

        state.describer_id = Some("gone".to_string());
        assert_eq!(
            state.invariant_violation(),
            Some("describer is not in the roster")
        );
    }
}
