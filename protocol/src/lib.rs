//! Shared chess protocol library
//!
//! Contains:
//! - Pieces, board, squares, and position state
//! - Move generation and rules validation
//! - SAN notation rendering
//! - Wire message types (ClientCommand, ServerMessage)
//! - Notation parsers (coordinate, algebraic)
//! - The per-connection stream transport

mod board;
mod constants;
mod error;
mod fen;
mod message;
mod moves;
mod notation;
mod parser;
mod piece;
mod transport;

pub use board::{Board, BoardState, CastlingRights};
pub use constants::*;
pub use error::{ChessError, ProtocolError, Result};
pub use fen::{Fen, INITIAL_FEN};
pub use message::{
    BoardInfo, CaptureInfo, ClientCommand, ServerMessage, SessionId, StrikeRecord,
    UploadMetadata, KNOWN_COMMANDS,
};
pub use moves::{CastleSide, Move, MoveGenerator};
pub use notation::Notation;
pub use parser::{
    create_parser, AlgebraicParser, CoordinateParser, MoveParser, ParsedMove, ParserKind,
};
pub use piece::{Color, Piece, PieceKind, Square};
pub use transport::Transport;
