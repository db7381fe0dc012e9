use crate::types::*;
use serde::{Deserialize, Serialize};

/// A guess (or any chat line) as it travels through the mesh
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub player_id: PlayerId,
    pub player_name: String,
    pub message: String,
    pub is_correct: bool,
    /// Milliseconds since the Unix epoch, stamped by the sender
    pub timestamp: i64,
}

/// Every frame exchanged between peers. Decoding is exhaustive; kinds this
/// build does not know about land in `Unknown` and are ignored by the router.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum Message {
    PlayerJoin {
        player: Player,
    },
    GameState {
        state: GameState,
    },
    StartGame {
        state: GameState,
    },
    EmojiClue {
        clue: String,
    },
    ChatMessage(ChatMessage),
    RoundEnd {
        state: GameState,
        /// Display name of the winner
        winner: String,
        phrase: String,
    },
    GameEnd {
        state: GameState,
    },
    PlayAgain,
    #[serde(other)]
    Unknown,
}

impl Message {
    /// Wire name of this message kind, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Message::PlayerJoin { .. } => "player-join",
            Message::GameState { .. } => "game-state",
            Message::StartGame { .. } => "start-game",
            Message::EmojiClue { .. } => "emoji-clue",
            Message::ChatMessage(_) => "chat-message",
            Message::RoundEnd { .. } => "round-end",
            Message::GameEnd { .. } => "game-end",
            Message::PlayAgain => "play-again",
            Message::Unknown => "unknown",
        }
    }

    /// The full state carried by snapshot-bearing kinds
    pub fn snapshot(&self) -> Option<&GameState> {
        match self {
            Message::GameState { state }
            | Message::StartGame { state }
            | Message::RoundEnd { state, .. }
            | Message::GameEnd { state } => Some(state),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub fn encode(message: &Message) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode(frame: &str) -> Result<Message, ProtocolError> {
    Ok(serde_json::from_str(frame)?)
}
