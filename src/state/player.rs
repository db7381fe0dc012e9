use crate::types::*;

/// What happened to the roster when a peer left
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub player: Player,
    /// Player promoted to host because the departed player was the host
    pub promoted: Option<PlayerId>,
    /// The departed player was describing the running round
    pub was_describer: bool,
    /// Roster emptied out and the state went back to the lobby
    pub reset: bool,
}

impl GameState {
    /// Append a player unless one with the same id is already present
    pub fn add_player(&mut self, player: Player) -> bool {
        if self.player(&player.id).is_some() {
            return false;
        }
        self.players.push(player);
        true
    }

    /// Remove a departed peer and keep authority intact.
    ///
    /// When the host leaves a started game, the first remaining player in
    /// roster order becomes host. An emptied roster resets to the lobby.
    pub fn depart(&mut self, id: &str) -> Option<Departure> {
        let index = self.players.iter().position(|p| p.id == id)?;
        let player = self.players.remove(index);
        let was_describer = self.round_in_progress && self.is_describer(id);
        if self.is_describer(id) {
            self.describer_id = None;
        }

        if self.players.is_empty() {
            *self = GameState::lobby(self.max_rounds);
            return Some(Departure {
                player,
                promoted: None,
                was_describer,
                reset: true,
            });
        }

        let promoted = if player.is_host && self.game_started {
            self.elect_host()
        } else {
            None
        };

        Some(Departure {
            player,
            promoted,
            was_describer,
            reset: false,
        })
    }

    /// Deterministic election: lowest roster index wins
    fn elect_host(&mut self) -> Option<PlayerId> {
        for player in &mut self.players {
            player.is_host = false;
        }
        let first = self.players.first_mut()?;
        first.is_host = true;
        Some(first.id.clone())
    }
}
