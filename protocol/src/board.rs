//! Board and position state

use serde::{Deserialize, Serialize};

use crate::constants::BOARD_SIZE;
use crate::moves::{CastleSide, Move};
use crate::piece::{Color, Piece, PieceKind, Square};

/// 8x8 board, indexed rank-major. Uses a Vec to stay serde-friendly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    squares: Vec<Option<Piece>>,
}

impl Board {
    /// Empty board
    pub fn empty() -> Self {
        Self {
            squares: vec![None; BOARD_SIZE * BOARD_SIZE],
        }
    }

    /// Standard starting position
    pub fn initial() -> Self {
        let mut board = Self::empty();

        let back_rank = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];

        for (file, kind) in back_rank.iter().enumerate() {
            let file = file as u8;
            board.set(
                Square::new_unchecked(file, 0),
                Some(Piece::new(*kind, Color::White)),
            );
            board.set(
                Square::new_unchecked(file, 1),
                Some(Piece::new(PieceKind::Pawn, Color::White)),
            );
            board.set(
                Square::new_unchecked(file, 6),
                Some(Piece::new(PieceKind::Pawn, Color::Black)),
            );
            board.set(
                Square::new_unchecked(file, 7),
                Some(Piece::new(*kind, Color::Black)),
            );
        }

        board
    }

    /// Piece at a square
    pub fn get(&self, sq: Square) -> Option<Piece> {
        self.squares[sq.to_index()]
    }

    /// Place or clear a square
    pub fn set(&mut self, sq: Square, piece: Option<Piece>) {
        self.squares[sq.to_index()] = piece;
    }

    /// Move a piece without rule checks, returning any captured piece
    pub fn move_piece(&mut self, from: Square, to: Square) -> Option<Piece> {
        let piece = self.get(from);
        let captured = self.get(to);
        self.set(from, None);
        self.set(to, piece);
        captured
    }

    /// Locate the king of a color
    pub fn find_king(&self, color: Color) -> Option<Square> {
        self.occupied().find_map(|(sq, piece)| {
            (piece.kind == PieceKind::King && piece.color == color).then_some(sq)
        })
    }

    /// All occupied squares
    pub fn occupied(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.squares.iter().enumerate().filter_map(|(i, p)| {
            p.map(|piece| {
                let sq = Square::new_unchecked((i % BOARD_SIZE) as u8, (i / BOARD_SIZE) as u8);
                (sq, piece)
            })
        })
    }

    /// All pieces of one color
    pub fn pieces(&self, color: Color) -> Vec<(Square, Piece)> {
        self.occupied().filter(|(_, p)| p.color == color).collect()
    }
}

/// Castling availability, FEN `KQkq` style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastlingRights {
    pub white_kingside: bool,
    pub white_queenside: bool,
    pub black_kingside: bool,
    pub black_queenside: bool,
}

impl CastlingRights {
    /// All four rights available
    pub fn all() -> Self {
        Self {
            white_kingside: true,
            white_queenside: true,
            black_kingside: true,
            black_queenside: true,
        }
    }

    /// No rights available
    pub fn none() -> Self {
        Self {
            white_kingside: false,
            white_queenside: false,
            black_kingside: false,
            black_queenside: false,
        }
    }

    /// Query one right
    pub fn allows(&self, color: Color, side: CastleSide) -> bool {
        match (color, side) {
            (Color::White, CastleSide::Kingside) => self.white_kingside,
            (Color::White, CastleSide::Queenside) => self.white_queenside,
            (Color::Black, CastleSide::Kingside) => self.black_kingside,
            (Color::Black, CastleSide::Queenside) => self.black_queenside,
        }
    }

    /// Drop both rights of a color (king moved)
    pub fn clear_color(&mut self, color: Color) {
        match color {
            Color::White => {
                self.white_kingside = false;
                self.white_queenside = false;
            }
            Color::Black => {
                self.black_kingside = false;
                self.black_queenside = false;
            }
        }
    }

    /// Drop the right tied to a rook's home square, if any
    pub fn clear_rook_square(&mut self, sq: Square) {
        match (sq.file, sq.rank) {
            (7, 0) => self.white_kingside = false,
            (0, 0) => self.white_queenside = false,
            (7, 7) => self.black_kingside = false,
            (0, 7) => self.black_queenside = false,
            _ => {}
        }
    }

    /// FEN field ("KQkq", "-", ...)
    pub fn to_fen_field(&self) -> String {
        let mut s = String::new();
        if self.white_kingside {
            s.push('K');
        }
        if self.white_queenside {
            s.push('Q');
        }
        if self.black_kingside {
            s.push('k');
        }
        if self.black_queenside {
            s.push('q');
        }
        if s.is_empty() {
            s.push('-');
        }
        s
    }

    /// Parse the FEN field
    pub fn from_fen_field(field: &str) -> Option<Self> {
        let mut rights = Self::none();
        if field == "-" {
            return Some(rights);
        }
        for c in field.chars() {
            match c {
                'K' => rights.white_kingside = true,
                'Q' => rights.white_queenside = true,
                'k' => rights.black_kingside = true,
                'q' => rights.black_queenside = true,
                _ => return None,
            }
        }
        Some(rights)
    }
}

/// Complete position: board plus the FEN bookkeeping fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardState {
    pub board: Board,
    pub side_to_move: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove: u32,
}

impl BoardState {
    /// Standard starting position
    pub fn initial() -> Self {
        Self {
            board: Board::initial(),
            side_to_move: Color::White,
            castling: CastlingRights::all(),
            en_passant: None,
            halfmove_clock: 0,
            fullmove: 1,
        }
    }

    /// Apply a generated move. The move must come from the legal move list
    /// for this position.
    pub fn apply_move(&mut self, mv: &Move) {
        let piece = match self.board.get(mv.from) {
            Some(p) => p,
            None => return,
        };

        let is_pawn = piece.kind == PieceKind::Pawn;
        let is_capture = mv.captured.is_some();

        // En passant removes the pawn that sits beside the destination
        if mv.en_passant {
            let victim = Square::new_unchecked(mv.to.file, mv.from.rank);
            self.board.set(victim, None);
        }

        self.board.move_piece(mv.from, mv.to);

        if let Some(kind) = mv.promotion {
            self.board.set(mv.to, Some(Piece::new(kind, piece.color)));
        }

        // Castling also moves the rook
        if let Some(side) = mv.castling {
            let rank = mv.from.rank;
            let (rook_from, rook_to) = match side {
                CastleSide::Kingside => {
                    (Square::new_unchecked(7, rank), Square::new_unchecked(5, rank))
                }
                CastleSide::Queenside => {
                    (Square::new_unchecked(0, rank), Square::new_unchecked(3, rank))
                }
            };
            self.board.move_piece(rook_from, rook_to);
        }

        // Castling rights: king move clears both, rook moves and rook
        // captures clear the square-tied right
        if piece.kind == PieceKind::King {
            self.castling.clear_color(piece.color);
        }
        self.castling.clear_rook_square(mv.from);
        self.castling.clear_rook_square(mv.to);

        // Double push opens an en-passant target behind the pawn
        let double_push = is_pawn && (mv.to.rank as i8 - mv.from.rank as i8).abs() == 2;
        self.en_passant = if double_push {
            Some(Square::new_unchecked(
                mv.from.file,
                (mv.from.rank + mv.to.rank) / 2,
            ))
        } else {
            None
        };

        if is_pawn || is_capture {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }

        if self.side_to_move == Color::Black {
            self.fullmove += 1;
        }
        self.side_to_move = self.side_to_move.opponent();
    }

    /// Human-readable ASCII rendering with file and rank labels
    pub fn formatted(&self) -> String {
        let mut out = String::new();
        out.push_str("   a   b   c   d   e   f   g   h\n");
        out.push_str(" ---------------------------------\n");

        for rank in (0..BOARD_SIZE as u8).rev() {
            out.push((b'1' + rank) as char);
            out.push_str(" |");
            for file in 0..BOARD_SIZE as u8 {
                let c = self
                    .board
                    .get(Square::new_unchecked(file, rank))
                    .map(|p| p.ascii_char())
                    .unwrap_or(' ');
                out.push(' ');
                out.push(c);
                out.push_str(" |");
            }
            out.push('\n');
            out.push_str(" ---------------------------------\n");
        }

        out.push_str("   a   b   c   d   e   f   g   h\n");
        out
    }
}
