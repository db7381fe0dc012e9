use serde::{Deserialize, Serialize};

/// Opaque peer identifier. Doubles as the transport address of the peer.
pub type PlayerId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub is_host: bool,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>, is_host: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            score: 0,
            is_host,
        }
    }
}

/// The single replicated aggregate. The host owns the authoritative copy,
/// every other peer holds a replica that is replaced wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub players: Vec<Player>,
    pub current_round: u32,
    pub max_rounds: u32,
    pub describer_id: Option<PlayerId>,
    pub current_phrase: String,
    pub emoji_clue: String,
    pub game_started: bool,
    pub round_in_progress: bool,
    pub round_winner: Option<PlayerId>,
}

/// Which side of the replication a node is on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Guest,
}

/// Lifecycle position derived from a `GameState`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundPhase {
    Lobby,
    AwaitingClue,
    Guessing,
    RoundOver,
    GameOver,
}

/// Outcome of a resolved round, as announced in `round-end`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub winner_id: PlayerId,
    pub winner_name: String,
    pub phrase: String,
}

/// What the host does once the inter-round delay elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundAdvance {
    NextRound,
    GameOver,
}
