//! Wire message types
//!
//! One JSON object per `\n`-terminated line. Client commands are tagged by
//! the `command` field, server messages by the `type` field.

use serde::{Deserialize, Serialize};

use crate::piece::Color;

/// Session identifier, allocated once per accepted connection
pub type SessionId = String;

/// Chunk metadata for a streamed game-file upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMetadata {
    pub filename: String,
    pub total_size: u64,
    pub chunks_total: u32,
    pub chunk_current: u32,
}

/// Client-to-server commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Seat a player; in single-player mode both slots bind to the caller
    JoinGame { single_player: bool, color: String },
    /// ReadyToStart -> InProgress
    StartGame,
    /// One move in the server's configured notation
    MakeMove {
        #[serde(rename = "move")]
        mv: String,
    },
    /// Reset to WaitingForPlayers
    EndGame,
    /// Ask for the formatted board
    DisplayBoard,
    /// Ask for a human-readable lifecycle status line
    GetStatus,
    /// One chunk of a streamed game file
    UploadGame {
        metadata: UploadMetadata,
        data: String,
    },
}

/// Command strings this server understands, used to tell an unknown command
/// apart from a known command with bad fields.
pub const KNOWN_COMMANDS: &[&str] = &[
    "join_game",
    "start_game",
    "make_move",
    "end_game",
    "display_board",
    "get_status",
    "upload_game",
];

/// Captured piece details inside a strike record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureInfo {
    pub piece: String,
    pub color: Color,
}

/// One executed half-move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeRecord {
    pub strike_number: u32,
    pub color: Color,
    pub piece: String,
    pub case_src: String,
    pub case_dest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureInfo>,
    /// "little" (kingside) or "big" (queenside)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub castling: Option<String>,
    pub check: bool,
    pub checkmate: bool,
    pub stalemate: bool,
}

/// Position summary attached to a move result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardInfo {
    pub fen: String,
}

/// Server-to-client messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake, first line on every connection
    SessionCreated { session_id: SessionId },
    /// Reply to a successful join
    JoinSuccess {
        session_id: SessionId,
        color: String,
        status: String,
        single_player: bool,
    },
    /// Broadcast to others when one slot fills
    PlayerJoined { color: String, status: String },
    /// Broadcast to all when both slots are occupied
    GameReady {
        status: String,
        white_player: SessionId,
        black_player: SessionId,
        single_player: bool,
    },
    /// Broadcast to all on game start
    GameStarted {
        status: String,
        white_player: SessionId,
        black_player: SessionId,
    },
    /// Reply to the mover, broadcast to the others
    MoveResult {
        strike: StrikeRecord,
        board: BoardInfo,
    },
    /// Formatted board reply
    BoardDisplay { board: String },
    /// Lifecycle status reply
    Status { message: String },
    /// Ack for a non-final upload chunk
    UploadProgress {
        filename: String,
        chunk_received: u32,
        chunks_total: u32,
        percent: u32,
    },
    /// Terminal line of a streamed replay
    GameOver { result: String },
    /// Reset to WaitingForPlayers
    GameReset {
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Error reply
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

impl ServerMessage {
    /// Plain error reply
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            error: message.into(),
            details: None,
        }
    }

    /// Error reply with a diagnostic
    pub fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        ServerMessage::Error {
            error: message.into(),
            details: Some(details.into()),
        }
    }

    /// Serialize to one wire line (without the trailing newline)
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).expect("server messages always serialize")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_command_deserialize() {
        let line = r#"{"command":"join_game","single_player":false,"color":"white"}"#;
        let cmd: ClientCommand = serde_json::from_str(line).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::JoinGame {
                single_player: false,
                color: "white".to_string()
            }
        );

        let line = r#"{"command":"make_move","move":"e2-e4"}"#;
        let cmd: ClientCommand = serde_json::from_str(line).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::MakeMove {
                mv: "e2-e4".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_command_rejected() {
        let line = r#"{"command":"fly_to_the_moon"}"#;
        assert!(serde_json::from_str::<ClientCommand>(line).is_err());
        assert!(!KNOWN_COMMANDS.contains(&"fly_to_the_moon"));
        assert!(KNOWN_COMMANDS.contains(&"join_game"));
    }

    #[test]
    fn test_handshake_shape() {
        let msg = ServerMessage::SessionCreated {
            session_id: "session_1".to_string(),
        };
        assert_eq!(
            msg.to_line(),
            r#"{"type":"session_created","session_id":"session_1"}"#
        );
    }

    #[test]
    fn test_error_skips_empty_details() {
        let plain = ServerMessage::error("Unknown command").to_line();
        assert_eq!(plain, r#"{"type":"error","error":"Unknown command"}"#);

        let detailed =
            ServerMessage::error_with_details("Invalid JSON format", "expected value").to_line();
        assert!(detailed.contains(r#""details":"expected value""#));
    }

    #[test]
    fn test_strike_record_shape() {
        let strike = StrikeRecord {
            strike_number: 1,
            color: Color::White,
            piece: "pawn".to_string(),
            case_src: "e2".to_string(),
            case_dest: "e4".to_string(),
            capture: None,
            castling: None,
            check: false,
            checkmate: false,
            stalemate: false,
        };
        let json = serde_json::to_string(&strike).unwrap();
        assert!(json.contains(r#""case_src":"e2""#));
        assert!(json.contains(r#""color":"white""#));
        assert!(!json.contains("capture"));
        assert!(!json.contains("castling"));
    }

    #[test]
    fn test_upload_command_roundtrip() {
        let line = r#"{"command":"upload_game","metadata":{"filename":"game.txt","total_size":64,"chunks_total":2,"chunk_current":1},"data":"e2-e4\n"}"#;
        let cmd: ClientCommand = serde_json::from_str(line).unwrap();
        match cmd {
            ClientCommand::UploadGame { metadata, data } => {
                assert_eq!(metadata.filename, "game.txt");
                assert_eq!(metadata.chunks_total, 2);
                assert_eq!(data, "e2-e4\n");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
