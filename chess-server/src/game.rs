//! Rules engine adapter
//!
//! Wraps the protocol crate's move generation behind the operations the
//! coordinator needs, and builds the strike record for each executed
//! half-move. Also holds the wall-clock game timer.

use std::time::Instant;

use protocol::{
    BoardState, CaptureInfo, ChessError, Color, Fen, Move, MoveGenerator, Notation, ParsedMove,
    PieceKind, StrikeRecord,
};

/// Authoritative chess rules state
pub struct ChessGame {
    state: BoardState,
    strike_number: u32,
}

impl ChessGame {
    /// Start position, white to move
    pub fn new() -> Self {
        Self {
            state: BoardState::initial(),
            strike_number: 1,
        }
    }

    /// Back to the start position; half-move counter returns to 1
    pub fn reset(&mut self) {
        self.state = BoardState::initial();
        self.strike_number = 1;
    }

    /// Side to move
    pub fn current_side(&self) -> Color {
        self.state.side_to_move
    }

    /// FEN of the current position
    pub fn fen(&self) -> String {
        Fen::to_string(&self.state)
    }

    /// ASCII board with file and rank labels
    pub fn formatted_board(&self) -> String {
        self.state.formatted()
    }

    /// Apply a parsed move. The record is assembled from the pre-move
    /// position; the post-move flags are filled in after the position has
    /// been mutated.
    pub fn apply(&mut self, parsed: &ParsedMove) -> Result<StrikeRecord, ChessError> {
        let mv = self.resolve(parsed)?;
        let piece = self
            .state
            .board
            .get(mv.from)
            .ok_or_else(|| ChessError::IllegalMove {
                notation: parsed.notation.clone(),
            })?;

        let mut record = StrikeRecord {
            strike_number: self.strike_number,
            color: piece.color,
            piece: piece.kind.name().to_string(),
            case_src: mv.from.to_string(),
            case_dest: mv.to.to_string(),
            capture: mv.captured.map(|p| CaptureInfo {
                piece: p.kind.name().to_string(),
                color: p.color,
            }),
            castling: mv.castling.map(|side| side.label().to_string()),
            check: false,
            checkmate: false,
            stalemate: false,
        };

        self.state.apply_move(&mv);

        if MoveGenerator::is_checkmate(&self.state) {
            record.checkmate = true;
        } else if MoveGenerator::is_stalemate(&self.state) {
            record.stalemate = true;
        } else if MoveGenerator::is_in_check(&self.state.board, self.state.side_to_move) {
            record.check = true;
        }

        self.strike_number += 1;
        Ok(record)
    }

    /// Resolve a parsed move against the legal move list. Coordinate moves
    /// match on source/destination; algebraic moves match on rendered SAN
    /// with check/mate suffixes stripped.
    fn resolve(&self, parsed: &ParsedMove) -> Result<Move, ChessError> {
        let legal = MoveGenerator::generate_legal(&self.state);
        let illegal = || ChessError::IllegalMove {
            notation: parsed.notation.clone(),
        };

        if let (Some(from), Some(to)) = (parsed.from, parsed.to) {
            let candidates: Vec<Move> = legal
                .into_iter()
                .filter(|m| m.from == from && m.to == to)
                .collect();
            match candidates.len() {
                0 => Err(illegal()),
                1 => Ok(candidates[0]),
                // Several candidates means a promotion; the coordinate
                // notation cannot express a choice, so take the queen
                _ => candidates
                    .into_iter()
                    .find(|m| m.promotion == Some(PieceKind::Queen))
                    .ok_or_else(illegal),
            }
        } else {
            let wanted = Notation::strip_suffixes(&parsed.notation);
            legal
                .into_iter()
                .find(|m| Notation::to_san(&self.state, m) == wanted)
                .ok_or_else(illegal)
        }
    }
}

impl Default for ChessGame {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock timer started when a game begins. Informational only; it
/// never adjudicates.
#[derive(Debug, Clone, Copy)]
pub struct GameClock {
    started_at: Instant,
}

impl GameClock {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    /// Whole seconds since the game started
    pub fn elapsed_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
