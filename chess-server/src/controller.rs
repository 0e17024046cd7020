//! Message controller
//!
//! Parses each inbound line, dispatches by command to the coordinator under
//! its lock, and streams game-file replays back through the server-injected
//! unicast callback. The controller never touches the server type; fan-out
//! goes through the two closures injected at startup.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use protocol::{
    create_parser, ClientCommand, Color, MoveParser, ParserKind, ServerMessage, UploadMetadata,
    KNOWN_COMMANDS, REPLAY_PACING,
};
use tracing::{debug, info, warn};

use crate::coordinator::{Broadcast, GameCoordinator};

/// Send one line to one session
pub type UnicastFn = Box<dyn Fn(&str, &str) + Send + Sync>;
/// Send one line to every active session, or to all but the originator
pub type BroadcastFn = Box<dyn Fn(&str, &str, bool) + Send + Sync>;

struct FanOut {
    unicast: UnicastFn,
    broadcast: BroadcastFn,
}

/// Accumulator for one in-flight file upload
struct FileUpload {
    total_size: u64,
    chunks_total: u32,
    chunks_received: u32,
    data: String,
}

/// Shared controller, one per server
pub struct Controller {
    coordinator: Mutex<GameCoordinator>,
    parser: Box<dyn MoveParser>,
    uploads: Mutex<HashMap<String, FileUpload>>,
    fanout: OnceLock<FanOut>,
}

impl Controller {
    pub fn new(parser_kind: ParserKind) -> Self {
        info!("controller initialized with {} parser", parser_kind.name());
        Self {
            coordinator: Mutex::new(GameCoordinator::new()),
            parser: create_parser(parser_kind),
            uploads: Mutex::new(HashMap::new()),
            fanout: OnceLock::new(),
        }
    }

    /// Inject the server's fan-out callbacks. Called once at startup.
    pub fn set_fanout(&self, unicast: UnicastFn, broadcast: BroadcastFn) {
        if self
            .fanout
            .set(FanOut { unicast, broadcast })
            .is_err()
        {
            warn!("fan-out callbacks were already installed");
        }
    }

    fn unicast(&self, session_id: &str, message: &ServerMessage) {
        if let Some(fanout) = self.fanout.get() {
            (fanout.unicast)(session_id, &message.to_line());
        } else {
            warn!("unicast dropped: no fan-out installed");
        }
    }

    fn fan_out(&self, origin: &str, broadcast: &Broadcast) {
        if let Some(fanout) = self.fanout.get() {
            (fanout.broadcast)(origin, &broadcast.message.to_line(), broadcast.to_all);
        } else {
            warn!("broadcast dropped: no fan-out installed");
        }
    }

    /// Handle one framed line. Returns the reply to unicast back to the
    /// originating session, or None when the replies were already streamed.
    pub async fn handle_line(&self, session_id: &str, line: &str) -> Option<String> {
        debug!("routing message for session {}", session_id);

        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!("JSON parse error from {}: {}", session_id, e);
                return Some(
                    ServerMessage::error_with_details("Invalid JSON format", e.to_string())
                        .to_line(),
                );
            }
        };

        let Some(command_str) = value.get("command").and_then(|v| v.as_str()).map(String::from)
        else {
            return Some(
                ServerMessage::error_with_details(
                    "Invalid message structure",
                    "missing 'command' field",
                )
                .to_line(),
            );
        };

        let command: ClientCommand = match serde_json::from_value(value) {
            Ok(command) => command,
            Err(e) => {
                return Some(if KNOWN_COMMANDS.contains(&command_str.as_str()) {
                    ServerMessage::error_with_details(
                        format!("Invalid fields for '{}'", command_str),
                        e.to_string(),
                    )
                    .to_line()
                } else {
                    warn!("unknown command '{}' from {}", command_str, session_id);
                    ServerMessage::error("Unknown command").to_line()
                });
            }
        };

        match command {
            ClientCommand::JoinGame {
                single_player,
                color,
            } => self.with_coordinator(session_id, |coord| {
                coord.handle_join(session_id, &color, single_player)
            }),
            ClientCommand::StartGame => {
                self.with_coordinator(session_id, |coord| coord.handle_start(session_id))
            }
            ClientCommand::MakeMove { mv } => {
                let Some(parsed) = self.parser.parse_move(&mv) else {
                    debug!("unparseable move '{}' from {}", mv, session_id);
                    return Some(ServerMessage::error("Couldn't parse move").to_line());
                };
                self.with_coordinator(session_id, |coord| coord.handle_move(&parsed))
            }
            ClientCommand::EndGame => {
                self.with_coordinator(session_id, |coord| coord.handle_end(session_id))
            }
            ClientCommand::DisplayBoard => {
                self.with_coordinator(session_id, |coord| coord.handle_display())
            }
            ClientCommand::GetStatus => {
                self.with_coordinator(session_id, |coord| coord.handle_status())
            }
            ClientCommand::UploadGame { metadata, data } => {
                self.handle_upload_chunk(session_id, metadata, data).await
            }
        }
    }

    /// Run one coordinator operation under the lock, then fan out its
    /// broadcast intent and hand back the serialized reply.
    fn with_coordinator<F>(&self, session_id: &str, op: F) -> Option<String>
    where
        F: FnOnce(&mut GameCoordinator) -> crate::coordinator::Outcome,
    {
        let outcome = {
            let Ok(mut coordinator) = self.coordinator.lock() else {
                return Some(ServerMessage::error("Internal server error").to_line());
            };
            op(&mut coordinator)
        };

        if let Some(broadcast) = &outcome.broadcast {
            self.fan_out(session_id, broadcast);
        }
        Some(outcome.reply.to_line())
    }

    /// Accumulate one upload chunk; the final chunk triggers the replay.
    async fn handle_upload_chunk(
        &self,
        session_id: &str,
        metadata: UploadMetadata,
        data: String,
    ) -> Option<String> {
        if metadata.chunks_total == 0 || metadata.chunk_current == 0 {
            return Some(
                ServerMessage::error_with_details(
                    "Invalid fields for 'upload_game'",
                    "chunk numbers are 1-based",
                )
                .to_line(),
            );
        }

        let key = format!("{}:{}", session_id, metadata.filename);
        let (chunks_received, chunks_total, complete) = {
            let Ok(mut uploads) = self.uploads.lock() else {
                return Some(ServerMessage::error("Internal server error").to_line());
            };
            let upload = uploads.entry(key.clone()).or_insert_with(|| FileUpload {
                total_size: metadata.total_size,
                chunks_total: metadata.chunks_total,
                chunks_received: 0,
                data: String::new(),
            });

            if metadata.chunk_current == 1 {
                upload.total_size = metadata.total_size;
                upload.chunks_total = metadata.chunks_total;
                upload.chunks_received = 0;
                upload.data.clear();
                upload.data.reserve(metadata.total_size as usize);
                info!(
                    "starting file upload: {} ({} bytes) for session {}",
                    metadata.filename, metadata.total_size, session_id
                );
            }

            upload.data.push_str(&data);
            // Duplicate chunk numbers overwrite rather than accumulate
            upload.chunks_received = metadata.chunk_current;
            (
                upload.chunks_received,
                upload.chunks_total,
                upload.chunks_received >= upload.chunks_total,
            )
        };

        let percent = (chunks_received as u64 * 100 / chunks_total as u64) as u32;
        info!(
            "upload progress {}: {}% ({}/{})",
            metadata.filename, percent, chunks_received, chunks_total
        );

        if !complete {
            return Some(
                ServerMessage::UploadProgress {
                    filename: metadata.filename,
                    chunk_received: chunks_received,
                    chunks_total,
                    percent,
                }
                .to_line(),
            );
        }

        let (content, expected_size) = {
            let Ok(mut uploads) = self.uploads.lock() else {
                return Some(ServerMessage::error("Internal server error").to_line());
            };
            match uploads.remove(&key) {
                Some(upload) => (upload.data, upload.total_size),
                None => return Some(ServerMessage::error("Internal server error").to_line()),
            }
        };
        info!(
            "file upload complete: {} ({} of {} expected bytes)",
            metadata.filename,
            content.len(),
            expected_size
        );

        let moves = self.parser.parse_game(&content);
        if moves.is_empty() {
            warn!("no moves parsed from {}", metadata.filename);
            return Some(ServerMessage::error("No valid moves found in game file").to_line());
        }
        info!("found {} moves in {}", moves.len(), metadata.filename);

        self.replay_moves(session_id, &moves).await;
        None
    }

    /// Stream a parsed move list back to the uploader: apply under the lock,
    /// unicast the result, sleep the pacing delay off the lock. Stops at the
    /// first rejection or when the game ends.
    async fn replay_moves(&self, session_id: &str, moves: &[protocol::ParsedMove]) {
        for (index, parsed) in moves.iter().enumerate() {
            let outcome = {
                let Ok(mut coordinator) = self.coordinator.lock() else {
                    self.unicast(session_id, &ServerMessage::error("Internal server error"));
                    return;
                };
                coordinator.handle_move(parsed)
            };

            match outcome.reply {
                ServerMessage::MoveResult { ref strike, .. } => {
                    let finished = strike.checkmate || strike.stalemate;
                    let result = if strike.checkmate {
                        match strike.color {
                            Color::White => Some("White wins by checkmate".to_string()),
                            Color::Black => Some("Black wins by checkmate".to_string()),
                        }
                    } else if strike.stalemate {
                        Some("Draw by stalemate".to_string())
                    } else {
                        None
                    };

                    self.unicast(session_id, &outcome.reply);

                    if finished {
                        if let Some(result) = result {
                            self.unicast(session_id, &ServerMessage::GameOver { result });
                        }
                        return;
                    }
                }
                ref reply => {
                    warn!(
                        "replay aborted at move {} ({}) for session {}",
                        index + 1,
                        parsed.notation,
                        session_id
                    );
                    self.unicast(session_id, reply);
                    return;
                }
            }

            tokio::time::sleep(REPLAY_PACING).await;
        }
    }

    /// A session is gone: drop its upload accumulators and let the
    /// coordinator react.
    pub fn handle_disconnect(&self, session_id: &str) {
        let prefix = format!("{}:", session_id);
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.retain(|key, _| !key.starts_with(&prefix));
        }

        let broadcast = {
            let Ok(mut coordinator) = self.coordinator.lock() else {
                return;
            };
            coordinator.handle_disconnect(session_id)
        };

        if let Some(broadcast) = broadcast {
            self.fan_out(session_id, &broadcast);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    type Sent = Arc<Mutex<Vec<(String, String, bool)>>>;

    /// Controller with recording fan-out; entries are
    /// (target-or-origin, line, was_broadcast)
    fn controller_with_log(kind: ParserKind) -> (Arc<Controller>, Sent) {
        let controller = Arc::new(Controller::new(kind));
        let sent: Sent = Arc::new(Mutex::new(Vec::new()));

        let unicast_log = sent.clone();
        let broadcast_log = sent.clone();
        controller.set_fanout(
            Box::new(move |sid, line| {
                unicast_log
                    .lock()
                    .unwrap()
                    .push((sid.to_string(), line.to_string(), false));
            }),
            Box::new(move |origin, line, _to_all| {
                broadcast_log
                    .lock()
                    .unwrap()
                    .push((origin.to_string(), line.to_string(), true));
            }),
        );
        (controller, sent)
    }

    fn type_of(line: &str) -> String {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        value["type"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_malformed_json_reply() {
        let (controller, _) = controller_with_log(ParserKind::Simple);
        let reply = controller
            .handle_line("session_1", "this is not json")
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["error"], "Invalid JSON format");
        assert!(value["details"].is_string());
    }

    #[tokio::test]
    async fn test_missing_command_reply() {
        let (controller, _) = controller_with_log(ParserKind::Simple);
        let reply = controller
            .handle_line("session_1", r#"{"move":"e2-e4"}"#)
            .await
            .unwrap();
        assert_eq!(type_of(&reply), "error");
        assert!(reply.contains("Invalid message structure"));
    }

    #[tokio::test]
    async fn test_unknown_command_reply() {
        let (controller, _) = controller_with_log(ParserKind::Simple);
        let reply = controller
            .handle_line("session_1", r#"{"command":"teleport"}"#)
            .await
            .unwrap();
        assert_eq!(reply, r#"{"type":"error","error":"Unknown command"}"#);
    }

    #[tokio::test]
    async fn test_invalid_fields_reply() {
        let (controller, _) = controller_with_log(ParserKind::Simple);
        let reply = controller
            .handle_line("session_1", r#"{"command":"join_game","color":"white"}"#)
            .await
            .unwrap();
        assert!(reply.contains("Invalid fields for 'join_game'"));
    }

    #[tokio::test]
    async fn test_join_reply_and_broadcast() {
        let (controller, sent) = controller_with_log(ParserKind::Simple);
        let reply = controller
            .handle_line(
                "session_1",
                r#"{"command":"join_game","single_player":false,"color":"white"}"#,
            )
            .await
            .unwrap();

        assert_eq!(type_of(&reply), "join_success");
        let log = sent.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(type_of(&log[0].1), "player_joined");
        assert!(log[0].2);
    }

    #[tokio::test]
    async fn test_unparseable_move_reply() {
        let (controller, _) = controller_with_log(ParserKind::Simple);
        let _ = controller
            .handle_line(
                "session_1",
                r#"{"command":"join_game","single_player":true,"color":"white"}"#,
            )
            .await;
        let _ = controller
            .handle_line("session_1", r#"{"command":"start_game"}"#)
            .await;

        let reply = controller
            .handle_line("session_1", r#"{"command":"make_move","move":"pawn up"}"#)
            .await
            .unwrap();
        assert_eq!(reply, r#"{"type":"error","error":"Couldn't parse move"}"#);
    }

    #[tokio::test]
    async fn test_get_status() {
        let (controller, _) = controller_with_log(ParserKind::Simple);
        let reply = controller
            .handle_line("session_1", r#"{"command":"get_status"}"#)
            .await
            .unwrap();
        assert_eq!(type_of(&reply), "status");
        assert!(reply.contains("Waiting for players to join"));
    }

    fn upload_line(filename: &str, total: u32, current: u32, data: &str) -> String {
        format!(
            r#"{{"command":"upload_game","metadata":{{"filename":"{}","total_size":{},"chunks_total":{},"chunk_current":{}}},"data":"{}"}}"#,
            filename,
            data.len(),
            total,
            current,
            data.replace('\n', "\\n")
        )
    }

    #[tokio::test]
    async fn test_upload_chunks_ack_then_stream() {
        let (controller, sent) = controller_with_log(ParserKind::Simple);
        let _ = controller
            .handle_line(
                "session_1",
                r#"{"command":"join_game","single_player":true,"color":"white"}"#,
            )
            .await;
        let _ = controller
            .handle_line("session_1", r#"{"command":"start_game"}"#)
            .await;
        sent.lock().unwrap().clear();

        // Three chunks carrying four legal moves ending in checkmate
        let chunks = ["f2-f3\ne7-e5\n", "g2-g4\n", "d8-h4\n"];
        for (i, chunk) in chunks.iter().enumerate() {
            let reply = controller
                .handle_line(
                    "session_1",
                    &upload_line("mate.txt", chunks.len() as u32, i as u32 + 1, chunk),
                )
                .await;

            if i + 1 < chunks.len() {
                let reply = reply.unwrap();
                assert_eq!(type_of(&reply), "upload_progress");
                let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
                assert_eq!(value["chunk_received"], i as u64 + 1);
                assert_eq!(value["percent"], ((i as u64 + 1) * 100) / 3);
            } else {
                // Final chunk streams through the unicast callback instead
                assert!(reply.is_none());
            }
        }

        let log = sent.lock().unwrap();
        let types: Vec<String> = log.iter().map(|(_, line, _)| type_of(line)).collect();
        assert_eq!(
            types,
            vec![
                "move_result",
                "move_result",
                "move_result",
                "move_result",
                "game_over"
            ]
        );
        // Streamed lines are unicast to the uploader
        assert!(log.iter().all(|(sid, _, is_broadcast)| sid == "session_1" && !is_broadcast));

        let last: serde_json::Value = serde_json::from_str(&log[4].1).unwrap();
        assert_eq!(last["result"], "Black wins by checkmate");
    }

    #[tokio::test]
    async fn test_upload_replay_aborts_on_rejection() {
        let (controller, sent) = controller_with_log(ParserKind::Simple);
        let _ = controller
            .handle_line(
                "session_1",
                r#"{"command":"join_game","single_player":true,"color":"white"}"#,
            )
            .await;
        let _ = controller
            .handle_line("session_1", r#"{"command":"start_game"}"#)
            .await;
        sent.lock().unwrap().clear();

        let reply = controller
            .handle_line(
                "session_1",
                &upload_line("bad.txt", 1, 1, "e2-e4\ne2-e4\nd2-d4\n"),
            )
            .await;
        assert!(reply.is_none());

        let log = sent.lock().unwrap();
        let types: Vec<String> = log.iter().map(|(_, line, _)| type_of(line)).collect();
        // First move lands, the repeat is rejected, nothing follows
        assert_eq!(types, vec!["move_result", "error"]);
    }

    #[tokio::test]
    async fn test_upload_empty_game_file() {
        let (controller, _) = controller_with_log(ParserKind::Simple);
        let reply = controller
            .handle_line(
                "session_1",
                &upload_line("empty.txt", 1, 1, "// only comments\n"),
            )
            .await
            .unwrap();
        assert!(reply.contains("No valid moves found"));
    }

    #[tokio::test]
    async fn test_duplicate_chunk_overwrites_counter() {
        let (controller, _) = controller_with_log(ParserKind::Simple);

        let first = controller
            .handle_line("session_1", &upload_line("dup.txt", 3, 2, "x"))
            .await
            .unwrap();
        let second = controller
            .handle_line("session_1", &upload_line("dup.txt", 3, 2, "x"))
            .await
            .unwrap();

        let v1: serde_json::Value = serde_json::from_str(&first).unwrap();
        let v2: serde_json::Value = serde_json::from_str(&second).unwrap();
        assert_eq!(v1["chunk_received"], v2["chunk_received"]);
    }

    #[tokio::test]
    async fn test_disconnect_routes_reset() {
        let (controller, sent) = controller_with_log(ParserKind::Simple);
        let _ = controller
            .handle_line(
                "session_1",
                r#"{"command":"join_game","single_player":true,"color":"white"}"#,
            )
            .await;
        sent.lock().unwrap().clear();

        controller.handle_disconnect("session_1");

        let log = sent.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(type_of(&log[0].1), "game_reset");
        assert!(log[0].1.contains("all_players_disconnected"));
    }
}
