use thiserror::Error;

use crate::cards::Card;

#[derive(Error, Debug)]
pub enum GtoError {
    #[error("Invalid rank: {0}")]
    InvalidRank(char),

    #[error("Invalid suit: {0}")]
    InvalidSuit(char),

    #[error("Invalid card notation: {0}")]
    InvalidCardNotation(String),

    #[error("Hand must be exactly 4 distinct cards, got {got}")]
    InvalidHoleCards { got: usize },

    #[error("Invalid board length: {len} (expected 0, 3, 4 or 5)")]
    InvalidBoardLength { len: usize },

    #[error("Duplicate card: {0}")]
    DuplicateCard(Card),

    #[error("Cannot deal {requested} cards, only {available} remaining")]
    InsufficientCards { requested: usize, available: usize },

    #[error("Simulation failed: {0}")]
    SimulationIteration(String),

    #[error("Invalid game state: {0}")]
    SolverConstruction(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Worker pool error: {0}")]
    ThreadPool(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Coarse error classes the calling job layer decides retry policy on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    DuplicateCard,
    InsufficientCards,
    SimulationIteration,
    SolverConstruction,
    Cancelled,
    Internal,
}

impl GtoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GtoError::InvalidRank(_)
            | GtoError::InvalidSuit(_)
            | GtoError::InvalidCardNotation(_)
            | GtoError::InvalidHoleCards { .. }
            | GtoError::InvalidBoardLength { .. }
            | GtoError::InvalidValue(_)
            | GtoError::JsonError(_) => ErrorKind::Validation,
            GtoError::DuplicateCard(_) => ErrorKind::DuplicateCard,
            GtoError::InsufficientCards { .. } => ErrorKind::InsufficientCards,
            GtoError::SimulationIteration(_) => ErrorKind::SimulationIteration,
            GtoError::SolverConstruction(_) => ErrorKind::SolverConstruction,
            GtoError::Cancelled => ErrorKind::Cancelled,
            GtoError::ThreadPool(_) => ErrorKind::Internal,
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for GtoError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        GtoError::ThreadPool(e.to_string())
    }
}

pub type GtoResult<T> = Result<T, GtoError>;
