use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Position outside the board")]
    OutOfBounds,
    #[error("Too many bombs, at least one cell must stay safe")]
    TooManyBombs,
    #[error("Explicit bomb positions do not match the requested count")]
    BombCountMismatch,
    #[error("Bombs are already planted")]
    AlreadyPlanted,
    #[error("Bombs are not planted yet")]
    NotPlanted,
    #[error("Game already ended, no new moves are accepted")]
    AlreadyEnded,
}

pub type Result<T> = std::result::Result<T, GameError>;
