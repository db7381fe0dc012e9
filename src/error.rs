/// A local action was refused. Nothing is sent when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Only the host can {0}")]
    NotHost(&'static str),

    #[error("Need at least {need} players to start (have {have})")]
    NotEnoughPlayers { have: usize, need: usize },

    #[error("A game is already in progress")]
    GameInProgress,

    #[error("The game is not over yet")]
    GameNotOver,

    #[error("Only the describer can submit a clue")]
    NotDescriber,

    #[error("Please add some emojis to your clue")]
    EmptyClue,

    #[error("{0:?} is not in the emoji palette")]
    UnknownEmoji(String),

    #[error("Type a guess first")]
    EmptyGuess,

    #[error("No round is in progress")]
    RoundNotInProgress,

    #[error("Wait for the describer's clue")]
    ClueNotGiven,

    #[error("The describer cannot guess")]
    DescriberCannotGuess,

    #[error("This round has already been won")]
    RoundAlreadyWon,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Session is no longer running")]
    Closed,
}
