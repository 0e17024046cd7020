//! Pieces, colors, and squares

use serde::{Deserialize, Serialize};

use crate::constants::BOARD_SIZE;
use crate::error::ChessError;

/// Piece kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// FEN character (white uppercase, black lowercase)
    pub fn to_fen_char(&self, color: Color) -> char {
        let c = match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        };
        match color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    /// Parse a FEN character
    pub fn from_fen_char(c: char) -> Option<(PieceKind, Color)> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        let kind = match c.to_ascii_lowercase() {
            'p' => PieceKind::Pawn,
            'n' => PieceKind::Knight,
            'b' => PieceKind::Bishop,
            'r' => PieceKind::Rook,
            'q' => PieceKind::Queen,
            'k' => PieceKind::King,
            _ => return None,
        };
        Some((kind, color))
    }

    /// Character used in the ASCII board rendering. The knight draws as `c`
    /// so it cannot be confused with the pawn column next to it.
    pub fn ascii_char(&self, color: Color) -> char {
        let c = match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'c',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        };
        match color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    /// SAN letter; pawns have none
    pub fn san_letter(&self) -> Option<char> {
        match self {
            PieceKind::Pawn => None,
            PieceKind::Knight => Some('N'),
            PieceKind::Bishop => Some('B'),
            PieceKind::Rook => Some('R'),
            PieceKind::Queen => Some('Q'),
            PieceKind::King => Some('K'),
        }
    }

    /// Parse a SAN letter
    pub fn from_san_letter(c: char) -> Option<PieceKind> {
        match c {
            'N' => Some(PieceKind::Knight),
            'B' => Some(PieceKind::Bishop),
            'R' => Some(PieceKind::Rook),
            'Q' => Some(PieceKind::Queen),
            'K' => Some(PieceKind::King),
            _ => None,
        }
    }

    /// Lowercase display name ("pawn", "knight", ...)
    pub fn name(&self) -> &'static str {
        match self {
            PieceKind::Pawn => "pawn",
            PieceKind::Knight => "knight",
            PieceKind::Bishop => "bishop",
            PieceKind::Rook => "rook",
            PieceKind::Queen => "queen",
            PieceKind::King => "king",
        }
    }
}

/// Side to move / piece ownership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// The other color
    pub fn opponent(&self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// FEN side-to-move character
    pub fn to_fen_char(&self) -> char {
        match self {
            Color::White => 'w',
            Color::Black => 'b',
        }
    }

    /// Parse the FEN side-to-move character
    pub fn from_fen_char(c: char) -> Option<Color> {
        match c {
            'w' | 'W' => Some(Color::White),
            'b' | 'B' => Some(Color::Black),
            _ => None,
        }
    }

    /// Lowercase display name ("white"/"black")
    pub fn name(&self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A piece on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
}

impl Piece {
    pub fn new(kind: PieceKind, color: Color) -> Self {
        Self { kind, color }
    }

    /// FEN character
    pub fn to_fen_char(&self) -> char {
        self.kind.to_fen_char(self.color)
    }

    /// Parse a FEN character
    pub fn from_fen_char(c: char) -> Option<Piece> {
        PieceKind::from_fen_char(c).map(|(kind, color)| Piece { kind, color })
    }

    /// ASCII board character
    pub fn ascii_char(&self) -> char {
        self.kind.ascii_char(self.color)
    }
}

/// Board square
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Square {
    /// File (0 = a, 7 = h)
    pub file: u8,
    /// Rank (0 = rank 1, 7 = rank 8)
    pub rank: u8,
}

impl Square {
    /// Bounds-checked constructor
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        if (file as usize) < BOARD_SIZE && (rank as usize) < BOARD_SIZE {
            Some(Self { file, rank })
        } else {
            None
        }
    }

    /// Unchecked constructor, internal use
    pub const fn new_unchecked(file: u8, rank: u8) -> Self {
        Self { file, rank }
    }

    /// Parse algebraic coordinates ("e4")
    pub fn parse(input: &str) -> Result<Self, ChessError> {
        let mut chars = input.chars();
        let (Some(file_c), Some(rank_c), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(ChessError::InvalidSquare {
                input: input.to_string(),
            });
        };
        if !('a'..='h').contains(&file_c) || !('1'..='8').contains(&rank_c) {
            return Err(ChessError::InvalidSquare {
                input: input.to_string(),
            });
        }
        Ok(Self {
            file: file_c as u8 - b'a',
            rank: rank_c as u8 - b'1',
        })
    }

    /// Offset by file/rank deltas, None when off the board
    pub fn offset(&self, df: i8, dr: i8) -> Option<Square> {
        let file = self.file as i8 + df;
        let rank = self.rank as i8 + dr;
        if (0..BOARD_SIZE as i8).contains(&file) && (0..BOARD_SIZE as i8).contains(&rank) {
            Some(Square {
                file: file as u8,
                rank: rank as u8,
            })
        } else {
            None
        }
    }

    /// Array index (rank-major)
    pub fn to_index(&self) -> usize {
        self.rank as usize * BOARD_SIZE + self.file as usize
    }

    /// From array index
    pub fn from_index(index: usize) -> Option<Self> {
        if index < BOARD_SIZE * BOARD_SIZE {
            Some(Square {
                file: (index % BOARD_SIZE) as u8,
                rank: (index / BOARD_SIZE) as u8,
            })
        } else {
            None
        }
    }

    /// File letter ('a'..'h')
    pub fn file_char(&self) -> char {
        (b'a' + self.file) as char
    }

    /// Rank digit ('1'..'8')
    pub fn rank_char(&self) -> char {
        (b'1' + self.rank) as char
    }
}

impl std::fmt::Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.file_char(), self.rank_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piece_fen_char() {
        let white_king = Piece::new(PieceKind::King, Color::White);
        assert_eq!(white_king.to_fen_char(), 'K');

        let black_knight = Piece::new(PieceKind::Knight, Color::Black);
        assert_eq!(black_knight.to_fen_char(), 'n');

        assert_eq!(
            Piece::from_fen_char('R'),
            Some(Piece::new(PieceKind::Rook, Color::White))
        );
        assert_eq!(
            Piece::from_fen_char('q'),
            Some(Piece::new(PieceKind::Queen, Color::Black))
        );
        assert_eq!(Piece::from_fen_char('x'), None);
    }

    #[test]
    fn test_knight_ascii_char() {
        // The board rendering draws knights as c/C, unlike FEN
        assert_eq!(PieceKind::Knight.ascii_char(Color::White), 'C');
        assert_eq!(PieceKind::Knight.ascii_char(Color::Black), 'c');
        assert_eq!(PieceKind::Knight.to_fen_char(Color::White), 'N');
    }

    #[test]
    fn test_square_parse() {
        let sq = Square::parse("e4").unwrap();
        assert_eq!(sq.file, 4);
        assert_eq!(sq.rank, 3);
        assert_eq!(sq.to_string(), "e4");

        assert!(Square::parse("a1").is_ok());
        assert!(Square::parse("h8").is_ok());
        assert!(Square::parse("i1").is_err());
        assert!(Square::parse("a9").is_err());
        assert!(Square::parse("e").is_err());
        assert!(Square::parse("e44").is_err());
    }

    #[test]
    fn test_square_offset() {
        let sq = Square::parse("a1").unwrap();
        assert_eq!(sq.offset(1, 1), Some(Square::parse("b2").unwrap()));
        assert_eq!(sq.offset(-1, 0), None);
        assert_eq!(sq.offset(0, -1), None);
    }

    #[test]
    fn test_color_opponent() {
        assert_eq!(Color::White.opponent(), Color::Black);
        assert_eq!(Color::Black.opponent(), Color::White);
    }

    #[test]
    fn test_color_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Color::White).unwrap(), "\"white\"");
        assert_eq!(serde_json::to_string(&Color::Black).unwrap(), "\"black\"");
    }
}
