//! Error types

use thiserror::Error;

/// Chess rules error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChessError {
    /// Square token outside a1..h8
    #[error("Invalid square: {input}")]
    InvalidSquare { input: String },

    /// FEN string rejected
    #[error("Invalid FEN string: {reason}")]
    InvalidFen { reason: String },

    /// Move notation rejected by the parser
    #[error("Couldn't parse move: {input}")]
    ParseMove { input: String },

    /// Move rejected by the rules engine
    #[error("Invalid move: {notation}")]
    IllegalMove { notation: String },

    /// Move submitted after checkmate/stalemate
    #[error("Game is already over")]
    GameOver,
}

/// Transport and framing error
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Peer closed the connection
    #[error("Connection closed")]
    ConnectionClosed,

    /// Inbound line carries no `command` field
    #[error("Missing command field")]
    MissingCommand,

    /// Chess rules error
    #[error("Chess error: {0}")]
    Chess(#[from] ChessError),
}

/// Protocol operation result type
pub type Result<T> = std::result::Result<T, ProtocolError>;
