//! Move generation and validation

use serde::{Deserialize, Serialize};

use crate::board::{Board, BoardState};
use crate::piece::{Color, Piece, PieceKind, Square};

/// Castling direction. `label()` matches the wire vocabulary: kingside
/// castling is "little", queenside is "big".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastleSide {
    Kingside,
    Queenside,
}

impl CastleSide {
    pub fn label(&self) -> &'static str {
        match self {
            CastleSide::Kingside => "little",
            CastleSide::Queenside => "big",
        }
    }
}

/// A generated move, fully resolved against a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    /// Captured piece, if any. For en passant this is the pawn beside the
    /// destination, not a piece on the destination square.
    pub captured: Option<Piece>,
    pub promotion: Option<PieceKind>,
    pub castling: Option<CastleSide>,
    pub en_passant: bool,
}

impl Move {
    /// Quiet move
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            captured: None,
            promotion: None,
            castling: None,
            en_passant: false,
        }
    }

    /// Capturing move
    pub fn with_capture(from: Square, to: Square, captured: Piece) -> Self {
        Self {
            captured: Some(captured),
            ..Self::new(from, to)
        }
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

const ROOK_DIRS: [(i8, i8); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const KNIGHT_JUMPS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

/// Move generator
pub struct MoveGenerator;

impl MoveGenerator {
    /// All pseudo-legal moves of the side to move (self-check not filtered)
    pub fn generate_pseudo_legal(state: &BoardState) -> Vec<Move> {
        let mut moves = Vec::with_capacity(64);
        let color = state.side_to_move;

        for (sq, piece) in state.board.pieces(color) {
            Self::generate_piece_moves(state, sq, piece, &mut moves);
        }

        moves
    }

    /// All legal moves of the side to move, castling included
    pub fn generate_legal(state: &BoardState) -> Vec<Move> {
        let mut moves = Self::generate_pseudo_legal(state);
        Self::generate_castling_moves(state, &mut moves);

        moves
            .into_iter()
            .filter(|mv| {
                let mut test = state.clone();
                test.apply_move(mv);
                !Self::is_in_check(&test.board, state.side_to_move)
            })
            .collect()
    }

    fn generate_piece_moves(state: &BoardState, sq: Square, piece: Piece, moves: &mut Vec<Move>) {
        match piece.kind {
            PieceKind::Pawn => Self::generate_pawn_moves(state, sq, piece.color, moves),
            PieceKind::Knight => Self::generate_knight_moves(&state.board, sq, piece.color, moves),
            PieceKind::Bishop => {
                Self::generate_sliding_moves(&state.board, sq, piece.color, &BISHOP_DIRS, moves)
            }
            PieceKind::Rook => {
                Self::generate_sliding_moves(&state.board, sq, piece.color, &ROOK_DIRS, moves)
            }
            PieceKind::Queen => {
                Self::generate_sliding_moves(&state.board, sq, piece.color, &ROOK_DIRS, moves);
                Self::generate_sliding_moves(&state.board, sq, piece.color, &BISHOP_DIRS, moves);
            }
            PieceKind::King => Self::generate_king_moves(&state.board, sq, piece.color, moves),
        }
    }

    fn generate_pawn_moves(state: &BoardState, sq: Square, color: Color, moves: &mut Vec<Move>) {
        let board = &state.board;
        let (forward, start_rank) = match color {
            Color::White => (1i8, 1u8),
            Color::Black => (-1i8, 6u8),
        };

        // Pushes
        if let Some(to) = sq.offset(0, forward) {
            if board.get(to).is_none() {
                Self::push_pawn_move(Move::new(sq, to), color, moves);

                if sq.rank == start_rank {
                    if let Some(double) = sq.offset(0, 2 * forward) {
                        if board.get(double).is_none() {
                            moves.push(Move::new(sq, double));
                        }
                    }
                }
            }
        }

        // Diagonal captures, en passant included
        for df in [-1i8, 1i8] {
            let Some(to) = sq.offset(df, forward) else {
                continue;
            };
            if let Some(target) = board.get(to) {
                if target.color != color {
                    Self::push_pawn_move(Move::with_capture(sq, to, target), color, moves);
                }
            } else if state.en_passant == Some(to) {
                let victim_sq = Square::new_unchecked(to.file, sq.rank);
                if let Some(victim) = board.get(victim_sq) {
                    moves.push(Move {
                        from: sq,
                        to,
                        captured: Some(victim),
                        promotion: None,
                        castling: None,
                        en_passant: true,
                    });
                }
            }
        }
    }

    /// Expand a pawn move reaching the last rank into its four promotions
    fn push_pawn_move(mv: Move, color: Color, moves: &mut Vec<Move>) {
        let promo_rank = match color {
            Color::White => 7,
            Color::Black => 0,
        };
        if mv.to.rank == promo_rank {
            for kind in [
                PieceKind::Queen,
                PieceKind::Rook,
                PieceKind::Bishop,
                PieceKind::Knight,
            ] {
                moves.push(Move {
                    promotion: Some(kind),
                    ..mv
                });
            }
        } else {
            moves.push(mv);
        }
    }

    fn try_add_move(board: &Board, from: Square, to: Square, color: Color, moves: &mut Vec<Move>) {
        if let Some(target) = board.get(to) {
            if target.color != color {
                moves.push(Move::with_capture(from, to, target));
            }
        } else {
            moves.push(Move::new(from, to));
        }
    }

    fn generate_knight_moves(board: &Board, sq: Square, color: Color, moves: &mut Vec<Move>) {
        for (df, dr) in KNIGHT_JUMPS {
            if let Some(to) = sq.offset(df, dr) {
                Self::try_add_move(board, sq, to, color, moves);
            }
        }
    }

    fn generate_king_moves(board: &Board, sq: Square, color: Color, moves: &mut Vec<Move>) {
        for dirs in [ROOK_DIRS, BISHOP_DIRS] {
            for (df, dr) in dirs {
                if let Some(to) = sq.offset(df, dr) {
                    Self::try_add_move(board, sq, to, color, moves);
                }
            }
        }
    }

    fn generate_sliding_moves(
        board: &Board,
        sq: Square,
        color: Color,
        dirs: &[(i8, i8)],
        moves: &mut Vec<Move>,
    ) {
        for &(df, dr) in dirs {
            let mut current = sq;
            while let Some(to) = current.offset(df, dr) {
                if let Some(target) = board.get(to) {
                    if target.color != color {
                        moves.push(Move::with_capture(sq, to, target));
                    }
                    break;
                }
                moves.push(Move::new(sq, to));
                current = to;
            }
        }
    }

    /// Castling moves for the side to move. Requires the right, an empty
    /// path, and that the king neither starts in, passes through, nor lands
    /// on an attacked square.
    fn generate_castling_moves(state: &BoardState, moves: &mut Vec<Move>) {
        let color = state.side_to_move;
        let rank = match color {
            Color::White => 0u8,
            Color::Black => 7u8,
        };
        let king_sq = Square::new_unchecked(4, rank);
        if state.board.get(king_sq) != Some(Piece::new(PieceKind::King, color)) {
            return;
        }

        let opponent = color.opponent();
        if Self::is_square_attacked(&state.board, king_sq, opponent) {
            return;
        }

        for side in [CastleSide::Kingside, CastleSide::Queenside] {
            if !state.castling.allows(color, side) {
                continue;
            }

            let (rook_file, empty_files, king_path): (u8, &[u8], [u8; 2]) = match side {
                CastleSide::Kingside => (7, &[5, 6], [5, 6]),
                CastleSide::Queenside => (0, &[1, 2, 3], [3, 2]),
            };

            let rook_sq = Square::new_unchecked(rook_file, rank);
            if state.board.get(rook_sq) != Some(Piece::new(PieceKind::Rook, color)) {
                continue;
            }
            if empty_files
                .iter()
                .any(|&f| state.board.get(Square::new_unchecked(f, rank)).is_some())
            {
                continue;
            }
            if king_path.iter().any(|&f| {
                Self::is_square_attacked(&state.board, Square::new_unchecked(f, rank), opponent)
            }) {
                continue;
            }

            moves.push(Move {
                from: king_sq,
                to: Square::new_unchecked(king_path[1], rank),
                captured: None,
                promotion: None,
                castling: Some(side),
                en_passant: false,
            });
        }
    }

    /// Is `sq` attacked by any piece of `by`?
    pub fn is_square_attacked(board: &Board, sq: Square, by: Color) -> bool {
        // Knight jumps
        for (df, dr) in KNIGHT_JUMPS {
            if let Some(from) = sq.offset(df, dr) {
                if board.get(from) == Some(Piece::new(PieceKind::Knight, by)) {
                    return true;
                }
            }
        }

        // Pawn attacks come from the rank the pawn stands on
        let pawn_dir = match by {
            Color::White => -1i8,
            Color::Black => 1i8,
        };
        for df in [-1i8, 1i8] {
            if let Some(from) = sq.offset(df, pawn_dir) {
                if board.get(from) == Some(Piece::new(PieceKind::Pawn, by)) {
                    return true;
                }
            }
        }

        // King adjacency
        for dirs in [ROOK_DIRS, BISHOP_DIRS] {
            for (df, dr) in dirs {
                if let Some(from) = sq.offset(df, dr) {
                    if board.get(from) == Some(Piece::new(PieceKind::King, by)) {
                        return true;
                    }
                }
            }
        }

        // Sliding attacks
        Self::sliding_attack(board, sq, by, &ROOK_DIRS, PieceKind::Rook)
            || Self::sliding_attack(board, sq, by, &BISHOP_DIRS, PieceKind::Bishop)
    }

    fn sliding_attack(
        board: &Board,
        sq: Square,
        by: Color,
        dirs: &[(i8, i8)],
        slider: PieceKind,
    ) -> bool {
        for &(df, dr) in dirs {
            let mut current = sq;
            while let Some(next) = current.offset(df, dr) {
                if let Some(piece) = board.get(next) {
                    if piece.color == by && (piece.kind == slider || piece.kind == PieceKind::Queen)
                    {
                        return true;
                    }
                    break;
                }
                current = next;
            }
        }
        false
    }

    /// Is the king of `color` in check?
    pub fn is_in_check(board: &Board, color: Color) -> bool {
        match board.find_king(color) {
            Some(king_sq) => Self::is_square_attacked(board, king_sq, color.opponent()),
            None => false,
        }
    }

    /// Side to move is in check with no legal move
    pub fn is_checkmate(state: &BoardState) -> bool {
        Self::is_in_check(&state.board, state.side_to_move)
            && Self::generate_legal(state).is_empty()
    }

    /// Side to move has no legal move but is not in check
    pub fn is_stalemate(state: &BoardState) -> bool {
        !Self::is_in_check(&state.board, state.side_to_move)
            && Self::generate_legal(state).is_empty()
    }
}
