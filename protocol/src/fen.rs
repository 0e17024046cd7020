//! FEN parsing and generation
//!
//! Field order: `<board> <side> <castling> <en-passant> <halfmove> <fullmove>`
//!
//! Example:
//! `rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1`

use crate::board::{Board, BoardState, CastlingRights};
use crate::constants::BOARD_SIZE;
use crate::error::ChessError;
use crate::piece::{Color, Piece, Square};

/// Starting position FEN
pub const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// FEN format handling
pub struct Fen;

impl Fen {
    /// Parse a FEN string into a position
    pub fn parse(fen: &str) -> Result<BoardState, ChessError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.is_empty() {
            return Err(ChessError::InvalidFen {
                reason: "Empty FEN string".to_string(),
            });
        }

        let board = Self::parse_board(parts[0])?;

        let side_to_move = if parts.len() > 1 {
            Color::from_fen_char(parts[1].chars().next().unwrap_or('w')).ok_or_else(|| {
                ChessError::InvalidFen {
                    reason: format!("Invalid side to move: {}", parts[1]),
                }
            })?
        } else {
            Color::White
        };

        let castling = if parts.len() > 2 {
            CastlingRights::from_fen_field(parts[2]).ok_or_else(|| ChessError::InvalidFen {
                reason: format!("Invalid castling field: {}", parts[2]),
            })?
        } else {
            CastlingRights::all()
        };

        let en_passant = if parts.len() > 3 && parts[3] != "-" {
            Some(
                Square::parse(parts[3]).map_err(|_| ChessError::InvalidFen {
                    reason: format!("Invalid en-passant square: {}", parts[3]),
                })?,
            )
        } else {
            None
        };

        let halfmove_clock = if parts.len() > 4 {
            parts[4].parse().unwrap_or(0)
        } else {
            0
        };

        let fullmove = if parts.len() > 5 {
            parts[5].parse().unwrap_or(1)
        } else {
            1
        };

        Ok(BoardState {
            board,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove,
        })
    }

    /// Parse the board field
    fn parse_board(board_str: &str) -> Result<Board, ChessError> {
        let mut board = Board::empty();
        let rows: Vec<&str> = board_str.split('/').collect();

        if rows.len() != BOARD_SIZE {
            return Err(ChessError::InvalidFen {
                reason: format!("Expected {} rows, got {}", BOARD_SIZE, rows.len()),
            });
        }

        // FEN rows run from rank 8 down to rank 1
        for (row_idx, row) in rows.iter().enumerate() {
            let rank = (BOARD_SIZE - 1 - row_idx) as u8;
            let mut file = 0u8;

            for c in row.chars() {
                if file >= BOARD_SIZE as u8 {
                    return Err(ChessError::InvalidFen {
                        reason: format!("Row {} has too many columns", row_idx),
                    });
                }

                if c.is_ascii_digit() {
                    file += c.to_digit(10).unwrap() as u8;
                } else if let Some(piece) = Piece::from_fen_char(c) {
                    board.set(Square::new_unchecked(file, rank), Some(piece));
                    file += 1;
                } else {
                    return Err(ChessError::InvalidFen {
                        reason: format!("Invalid piece character: {}", c),
                    });
                }
            }

            if file != BOARD_SIZE as u8 {
                return Err(ChessError::InvalidFen {
                    reason: format!(
                        "Row {} has {} columns, expected {}",
                        row_idx, file, BOARD_SIZE
                    ),
                });
            }
        }

        Ok(board)
    }

    /// Serialize a position to FEN
    pub fn to_string(state: &BoardState) -> String {
        format!(
            "{} {} {} {} {} {}",
            Self::board_to_string(&state.board),
            state.side_to_move.to_fen_char(),
            state.castling.to_fen_field(),
            state
                .en_passant
                .map(|sq| sq.to_string())
                .unwrap_or_else(|| "-".to_string()),
            state.halfmove_clock,
            state.fullmove
        )
    }

    /// Serialize the board field
    pub fn board_to_string(board: &Board) -> String {
        let mut rows = Vec::with_capacity(BOARD_SIZE);

        for rank in (0..BOARD_SIZE as u8).rev() {
            let mut row = String::new();
            let mut empty_count = 0;

            for file in 0..BOARD_SIZE as u8 {
                if let Some(piece) = board.get(Square::new_unchecked(file, rank)) {
                    if empty_count > 0 {
                        row.push_str(&empty_count.to_string());
                        empty_count = 0;
                    }
                    row.push(piece.to_fen_char());
                } else {
                    empty_count += 1;
                }
            }

            if empty_count > 0 {
                row.push_str(&empty_count.to_string());
            }

            rows.push(row);
        }

        rows.join("/")
    }

    /// The starting position
    pub fn initial() -> BoardState {
        Self::parse(INITIAL_FEN).expect("Initial FEN should be valid")
    }
}
