//! Notation parsers
//!
//! Two strategies behind one trait: the coordinate format (`e2-e4`) and
//! standard algebraic notation (`Nf3`, `O-O`, `exd5`, ...). Parsers judge
//! syntax only; whether a move is playable is the rules engine's call.

use crate::piece::{PieceKind, Square};

/// Parser selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    /// Coordinate notation ("e2-e4")
    Simple,
    /// Standard algebraic notation / PGN move text
    Pgn,
}

impl ParserKind {
    pub fn name(&self) -> &'static str {
        match self {
            ParserKind::Simple => "simple",
            ParserKind::Pgn => "pgn",
        }
    }
}

impl std::str::FromStr for ParserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(ParserKind::Simple),
            "pgn" => Ok(ParserKind::Pgn),
            other => Err(format!("unknown parser '{}', expected simple|pgn", other)),
        }
    }
}

/// A syntactically valid move token. Coordinate moves carry both squares;
/// algebraic moves carry only the notation and are resolved against the
/// position by the rules engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMove {
    pub notation: String,
    pub from: Option<Square>,
    pub to: Option<Square>,
    pub san: bool,
}

/// Notation parser strategy
pub trait MoveParser: Send + Sync {
    /// Parse one move token; None on syntax failure
    fn parse_move(&self, input: &str) -> Option<ParsedMove>;

    /// Parse a whole game text into an ordered move list. Unparseable
    /// content yields an empty list, never an error.
    fn parse_game(&self, content: &str) -> Vec<ParsedMove>;

    fn kind(&self) -> ParserKind;
}

/// Build the parser selected on the command line
pub fn create_parser(kind: ParserKind) -> Box<dyn MoveParser> {
    match kind {
        ParserKind::Simple => Box::new(CoordinateParser),
        ParserKind::Pgn => Box::new(AlgebraicParser),
    }
}

/// Coordinate notation: `<square>[ -→]+<square>`
pub struct CoordinateParser;

impl MoveParser for CoordinateParser {
    fn parse_move(&self, input: &str) -> Option<ParsedMove> {
        let tokens: Vec<&str> = input
            .trim()
            .split(|c| c == '-' || c == ' ' || c == '→')
            .filter(|t| !t.is_empty())
            .collect();

        let [from_str, to_str] = tokens[..] else {
            return None;
        };
        let from = Square::parse(from_str).ok()?;
        let to = Square::parse(to_str).ok()?;

        Some(ParsedMove {
            notation: format!("{}-{}", from, to),
            from: Some(from),
            to: Some(to),
            san: false,
        })
    }

    fn parse_game(&self, content: &str) -> Vec<ParsedMove> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("//"))
            .filter_map(|line| self.parse_move(line))
            .collect()
    }

    fn kind(&self) -> ParserKind {
        ParserKind::Simple
    }
}

/// Standard algebraic notation. `parse_game` also digests PGN move text:
/// tag pairs, move numbers, comments, and result tokens are skipped.
pub struct AlgebraicParser;

impl AlgebraicParser {
    fn is_valid_san(token: &str) -> bool {
        let body = token.trim_end_matches(['+', '#']);
        if body.is_empty() {
            return false;
        }
        if body == "O-O" || body == "O-O-O" {
            return true;
        }

        // Peel from the back: promotion, destination, capture marker,
        // disambiguation, piece letter. Whatever is left is garbage.
        let mut rest = body;
        if let Some(stripped) = rest.strip_suffix(['Q', 'R', 'B', 'N']) {
            rest = match stripped.strip_suffix('=') {
                Some(s) => s,
                None => rest,
            };
        }

        if rest.len() < 2 {
            return false;
        }
        let dest = &rest[rest.len() - 2..];
        if Square::parse(dest).is_err() {
            return false;
        }
        rest = &rest[..rest.len() - 2];

        let mut chars: Vec<char> = rest.chars().collect();
        if chars.last() == Some(&'x') {
            chars.pop();
        }

        // Optional piece letter, then optional file/rank disambiguation
        let mut idx = 0;
        if idx < chars.len() && PieceKind::from_san_letter(chars[idx]).is_some() {
            idx += 1;
        }
        if idx < chars.len() && ('a'..='h').contains(&chars[idx]) {
            idx += 1;
        }
        if idx < chars.len() && ('1'..='8').contains(&chars[idx]) {
            idx += 1;
        }
        idx == chars.len()
    }

    /// Strip a leading move number ("1.", "23...") from a PGN token
    fn strip_move_number(token: &str) -> &str {
        let digits = token.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return token;
        }
        let rest = &token[digits..];
        let dots = rest.chars().take_while(|&c| c == '.').count();
        if dots == 0 {
            // "1-0" style results are handled elsewhere; a bare number
            // followed by anything other than dots is not a move prefix
            return token;
        }
        &rest[dots..]
    }

    fn strip_comments(content: &str) -> String {
        let mut out = String::with_capacity(content.len());
        let mut depth = 0usize;
        for c in content.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                _ if depth == 0 => out.push(c),
                _ => {}
            }
        }
        out
    }
}

impl MoveParser for AlgebraicParser {
    fn parse_move(&self, input: &str) -> Option<ParsedMove> {
        let token = input.trim();
        if !Self::is_valid_san(token) {
            return None;
        }
        Some(ParsedMove {
            notation: token.to_string(),
            from: None,
            to: None,
            san: true,
        })
    }

    fn parse_game(&self, content: &str) -> Vec<ParsedMove> {
        const RESULTS: &[&str] = &["1-0", "0-1", "1/2-1/2", "*"];

        let mut moves = Vec::new();
        for line in Self::strip_comments(content).lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('[') {
                continue;
            }
            for token in line.split_whitespace() {
                if RESULTS.contains(&token) {
                    continue;
                }
                let token = Self::strip_move_number(token);
                if token.is_empty() {
                    continue;
                }
                if let Some(mv) = self.parse_move(token) {
                    moves.push(mv);
                }
            }
        }
        moves
    }

    fn kind(&self) -> ParserKind {
        ParserKind::Pgn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_parse_move() {
        let parser = CoordinateParser;

        let mv = parser.parse_move("e2-e4").unwrap();
        assert_eq!(mv.notation, "e2-e4");
        assert_eq!(mv.from, Some(Square::parse("e2").unwrap()));
        assert_eq!(mv.to, Some(Square::parse("e4").unwrap()));
        assert!(!mv.san);

        // Alternate separators
        assert!(parser.parse_move("e2 e4").is_some());
        assert!(parser.parse_move("e2→e4").is_some());
        assert!(parser.parse_move("e2 - e4").is_some());

        assert!(parser.parse_move("e2").is_none());
        assert!(parser.parse_move("e2-e4-e5").is_none());
        assert!(parser.parse_move("z9-e4").is_none());
        assert!(parser.parse_move("").is_none());
    }

    #[test]
    fn test_coordinate_parse_game_skips_comments() {
        let parser = CoordinateParser;
        let content = "// opening\ne2-e4\nd7-d5\n\n// capture\ne4-d5\n";
        let moves = parser.parse_game(content);
        assert_eq!(moves.len(), 3);
        assert_eq!(moves[0].notation, "e2-e4");
        assert_eq!(moves[2].notation, "e4-d5");
    }

    #[test]
    fn test_coordinate_parse_game_empty() {
        let parser = CoordinateParser;
        assert!(parser.parse_game("// nothing here\n").is_empty());
        assert!(parser.parse_game("").is_empty());
    }

    #[test]
    fn test_algebraic_parse_move() {
        let parser = AlgebraicParser;

        for token in [
            "e4", "exd5", "Nf3", "Nbd2", "R1a3", "Qh4#", "Bb5+", "O-O", "O-O-O", "e8=Q", "axb8=N",
        ] {
            let mv = parser.parse_move(token).unwrap_or_else(|| {
                panic!("'{}' should parse", token);
            });
            assert!(mv.san);
            assert_eq!(mv.notation, token);
            assert!(mv.from.is_none());
        }

        for token in ["", "e9", "Xf3", "Nf", "hello", "e4e5e6"] {
            assert!(parser.parse_move(token).is_none(), "'{}' parsed", token);
        }
    }

    #[test]
    fn test_algebraic_parse_game_pgn() {
        let parser = AlgebraicParser;
        let content = r#"[Event "Casual Game"]
[White "Anderssen"]

1. e4 e5 2. Nf3 {a comment} Nc6 3. Bb5 a6 1-0
"#;
        let moves = parser.parse_game(content);
        let notations: Vec<&str> = moves.iter().map(|m| m.notation.as_str()).collect();
        assert_eq!(notations, vec!["e4", "e5", "Nf3", "Nc6", "Bb5", "a6"]);
    }

    #[test]
    fn test_algebraic_parse_game_inline_numbers() {
        let parser = AlgebraicParser;
        let moves = parser.parse_game("1.e4 e5 2.Qh5 Nc6 3.Bc4 Nf6 4.Qxf7#");
        let notations: Vec<&str> = moves.iter().map(|m| m.notation.as_str()).collect();
        assert_eq!(
            notations,
            vec!["e4", "e5", "Qh5", "Nc6", "Bc4", "Nf6", "Qxf7#"]
        );
    }

    #[test]
    fn test_algebraic_parse_game_empty() {
        let parser = AlgebraicParser;
        assert!(parser.parse_game("[Event \"x\"]\n").is_empty());
        assert!(parser.parse_game("no moves here at all").is_empty());
    }

    #[test]
    fn test_parser_kind_from_str() {
        assert_eq!("simple".parse::<ParserKind>().unwrap(), ParserKind::Simple);
        assert_eq!("pgn".parse::<ParserKind>().unwrap(), ParserKind::Pgn);
        assert!("antlr".parse::<ParserKind>().is_err());
    }

    #[test]
    fn test_create_parser() {
        assert_eq!(create_parser(ParserKind::Simple).kind(), ParserKind::Simple);
        assert_eq!(create_parser(ParserKind::Pgn).kind(), ParserKind::Pgn);
    }
}
