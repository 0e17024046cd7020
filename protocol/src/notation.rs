//! Standard algebraic notation rendering
//!
//! Renders a legal move against its position: `e4`, `Nf3`, `exd5`, `R1a3`,
//! `a8=Q`, `O-O`. Check and mate suffixes are not emitted; callers matching
//! user input strip them first with [`Notation::strip_suffixes`].

use crate::board::BoardState;
use crate::moves::{CastleSide, Move, MoveGenerator};
use crate::piece::PieceKind;

/// SAN renderer
pub struct Notation;

impl Notation {
    /// Render a legal move as SAN. `state` must be the position the move is
    /// played from.
    pub fn to_san(state: &BoardState, mv: &Move) -> String {
        if let Some(side) = mv.castling {
            return match side {
                CastleSide::Kingside => "O-O".to_string(),
                CastleSide::Queenside => "O-O-O".to_string(),
            };
        }

        let piece = match state.board.get(mv.from) {
            Some(p) => p,
            None => return String::new(),
        };

        let mut san = String::new();

        if piece.kind == PieceKind::Pawn {
            if mv.captured.is_some() {
                san.push(mv.from.file_char());
                san.push('x');
            }
            san.push_str(&mv.to.to_string());
        } else {
            san.push(piece.kind.san_letter().unwrap_or('?'));
            san.push_str(&Self::disambiguation(state, mv, piece.kind));
            if mv.captured.is_some() {
                san.push('x');
            }
            san.push_str(&mv.to.to_string());
        }

        if let Some(kind) = mv.promotion {
            san.push('=');
            san.push(kind.san_letter().unwrap_or('?'));
        }

        san
    }

    /// Minimal origin qualifier when another piece of the same kind can
    /// reach the same destination: file first, then rank, then both.
    fn disambiguation(state: &BoardState, mv: &Move, kind: PieceKind) -> String {
        let rivals: Vec<_> = MoveGenerator::generate_legal(state)
            .into_iter()
            .filter(|other| {
                other.to == mv.to
                    && other.from != mv.from
                    && state.board.get(other.from).map(|p| p.kind) == Some(kind)
            })
            .collect();

        if rivals.is_empty() {
            return String::new();
        }

        let file_unique = rivals.iter().all(|other| other.from.file != mv.from.file);
        let rank_unique = rivals.iter().all(|other| other.from.rank != mv.from.rank);

        if file_unique {
            mv.from.file_char().to_string()
        } else if rank_unique {
            mv.from.rank_char().to_string()
        } else {
            mv.from.to_string()
        }
    }

    /// Drop trailing check/mate markers for notation comparison
    pub fn strip_suffixes(notation: &str) -> &str {
        notation.trim_end_matches(['+', '#'])
    }
}
