mod game;
mod player;
mod round;

pub use player::Departure;

use crate::error::ValidationError;
use crate::types::*;

/// Single-writer store for the replicated `GameState`.
///
/// The host mutates through `local_mutate` and broadcasts the returned
/// snapshot; replicas only ever replace the whole value via `apply_snapshot`.
#[derive(Debug, Clone)]
pub struct GameStore {
    state: GameState,
    role: Role,
}

impl GameStore {
    pub fn new(role: Role, max_rounds: u32) -> Self {
        Self {
            state: GameState::lobby(max_rounds),
            role,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }

    /// Replace the replica wholesale. A host never accepts a snapshot.
    pub fn apply_snapshot(&mut self, state: GameState) -> bool {
        if self.is_host() {
            tracing::warn!("Host ignoring foreign snapshot for round {}", state.current_round);
            return false;
        }
        if let Some(violation) = state.invariant_violation() {
            tracing::warn!("Applying snapshot with broken invariant: {}", violation);
        }
        self.state = state;
        true
    }

    /// Run a transition against the authoritative state.
    ///
    /// The transition sees a scratch copy; nothing is committed when it
    /// fails. Returns the transition's output and the committed snapshot.
    pub fn local_mutate<R>(
        &mut self,
        transition: impl FnOnce(&mut GameState) -> Result<R, ValidationError>,
    ) -> Result<(R, GameState), ValidationError> {
        if !self.is_host() {
            return Err(ValidationError::NotHost("change the game state"));
        }
        let mut next = self.state.clone();
        let output = transition(&mut next)?;
        self.state = next;
        Ok((output, self.state.clone()))
    }

    /// Apply a peer departure locally, taking over authority if this node
    /// is the one promoted.
    pub fn depart(&mut self, departed: &PlayerId, local_id: &PlayerId) -> Option<Departure> {
        let departure = self.state.depart(departed)?;
        if departure.promoted.as_ref() == Some(local_id) && !self.is_host() {
            tracing::info!("Promoted to host after {} left", departed);
            self.role = Role::Host;
        }
        Some(departure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_state() -> GameState {
        let mut state = GameState::lobby(5);
        state.players = vec![
            Player::new("a", "Alice", true),
            Player::new("b", "Bob", false),
        ];
        state.game_started = true;
        state.current_round = 2;
        state.players[1].score = 10;
        state
    }

    #[test]
    fn test_apply_snapshot_is_idempotent() {
        let mut store = GameStore::new(Role::Guest, 5);
        let snapshot = started_state();

        assert!(store.apply_snapshot(snapshot.clone()));
        let once = store.state().clone();
        assert!(store.apply_snapshot(snapshot));

        assert_eq!(store.state(), &once);
        assert_eq!(store.state().players.len(), 2);
        assert_eq!(store.state().players[1].score, 10);
    }

    #[test]
    fn test_host_rejects_snapshots() {
        let mut store = GameStore::new(Role::Host, 5);
        assert!(!store.apply_snapshot(started_state()));
        assert_eq!(store.state(), &GameState::lobby(5));
    }

    #[test]
    fn test_replica_cannot_mutate() {
        let mut store = GameStore::new(Role::Guest, 5);
        let result = store.local_mutate(|state| {
            state.current_round = 3;
            Ok(())
        });
        assert!(matches!(result, Err(ValidationError::NotHost(_))));
        assert_eq!(store.state().current_round, 0);
    }

    #[test]
    fn test_failed_transition_commits_nothing() {
        let mut store = GameStore::new(Role::Host, 5);
        let result: Result<((), GameState), _> = store.local_mutate(|state| {
            state.current_round = 4;
            Err(ValidationError::GameInProgress)
        });
        assert_eq!(result.unwrap_err(), ValidationError::GameInProgress);
        assert_eq!(store.state().current_round, 0);
    }

    #[test]
    fn test_local_mutate_returns_committed_snapshot() {
        let mut store = GameStore::new(Role::Host, 5);
        let (added, snapshot) = store
            .local_mutate(|state| Ok(state.add_player(Player::new("a", "Alice", true))))
            .unwrap();
        assert!(added);
        assert_eq!(&snapshot, store.state());
    }

    #[test]
    fn test_depart_promotes_local_node() {
        let mut store = GameStore::new(Role::Guest, 5);
        store.apply_snapshot(started_state());

        let departure = store.depart(&"a".to_string(), &"b".to_string()).unwrap();
        assert_eq!(departure.promoted.as_deref(), Some("b"));
        assert!(store.is_host());
        assert!(store.state().players[0].is_host);
    }
}
