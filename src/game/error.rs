//! Command rejection errors
//!
//! Every variant is recoverable: the offending command is dropped and the
//! originating session receives an error event. Nothing here interrupts a tick.

use serde::{Deserialize, Serialize};

/// Stable wire code for a rejected command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    RoomFull,
    NotEnoughPlayers,
    InvalidPhase,
    LeaderOnly,
    NotFound,
    LocalPlayerUnsupported,
    DevModeRequired,
    PowerUpOccupied,
    InvalidState,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::RoomFull => "ROOM_FULL",
            ErrorCode::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            ErrorCode::InvalidPhase => "INVALID_PHASE",
            ErrorCode::LeaderOnly => "LEADER_ONLY",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::LocalPlayerUnsupported => "LOCAL_PLAYER_UNSUPPORTED",
            ErrorCode::DevModeRequired => "DEV_MODE_REQUIRED",
            ErrorCode::PowerUpOccupied => "POWERUP_OCCUPIED",
            ErrorCode::InvalidState => "INVALID_STATE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Room is full")]
    RoomFull,
    #[error("At least {required} players are needed")]
    NotEnoughPlayers { required: usize },
    #[error("Not allowed during {phase}")]
    InvalidPhase { phase: &'static str },
    #[error("Only the room leader can do that")]
    LeaderOnly,
    #[error("Unknown player or bot")]
    NotFound,
    #[error("Local players are not supported in this build")]
    LocalPlayerUnsupported,
    #[error("Dev mode is not enabled")]
    DevModeRequired,
    #[error("Player already holds a power-up")]
    PowerUpOccupied,
    #[error("{0}")]
    InvalidState(String),
}

impl GameError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GameError::RoomFull => ErrorCode::RoomFull,
            GameError::NotEnoughPlayers { .. } => ErrorCode::NotEnoughPlayers,
            GameError::InvalidPhase { .. } => ErrorCode::InvalidPhase,
            GameError::LeaderOnly => ErrorCode::LeaderOnly,
            GameError::NotFound => ErrorCode::NotFound,
            GameError::LocalPlayerUnsupported => ErrorCode::LocalPlayerUnsupported,
            GameError::DevModeRequired => ErrorCode::DevModeRequired,
            GameError::PowerUpOccupied => ErrorCode::PowerUpOccupied,
            GameError::InvalidState(_) => ErrorCode::InvalidState,
        }
    }
}
