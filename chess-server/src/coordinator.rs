//! Game coordination
//!
//! The single shared state machine behind all sessions: player slots, the
//! lifecycle phases, and the rules engine. Every handler runs under the
//! controller's coordinator lock and returns plain values; broadcasts are
//! returned as intents for the caller to fan out after the lock is dropped.

use protocol::{BoardInfo, ParsedMove, ServerMessage, SessionId};
use tracing::{debug, info};

use crate::game::{ChessGame, GameClock};

/// Game lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    WaitingForPlayers,
    ReadyToStart,
    InProgress,
    GameOver,
}

impl GamePhase {
    pub fn name(&self) -> &'static str {
        match self {
            GamePhase::WaitingForPlayers => "WaitingForPlayers",
            GamePhase::ReadyToStart => "ReadyToStart",
            GamePhase::InProgress => "InProgress",
            GamePhase::GameOver => "GameOver",
        }
    }
}

/// A message to fan out to other sessions (or all of them)
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub message: ServerMessage,
    pub to_all: bool,
}

impl Broadcast {
    pub fn to_others(message: ServerMessage) -> Self {
        Self {
            message,
            to_all: false,
        }
    }

    pub fn to_all(message: ServerMessage) -> Self {
        Self {
            message,
            to_all: true,
        }
    }
}

/// Result of one coordinator operation: the reply for the originating
/// session plus an optional broadcast intent
#[derive(Debug, Clone)]
pub struct Outcome {
    pub reply: ServerMessage,
    pub broadcast: Option<Broadcast>,
}

impl Outcome {
    fn reply(reply: ServerMessage) -> Self {
        Self {
            reply,
            broadcast: None,
        }
    }

    fn with_broadcast(reply: ServerMessage, broadcast: Broadcast) -> Self {
        Self {
            reply,
            broadcast: Some(broadcast),
        }
    }
}

/// The shared game session
pub struct GameCoordinator {
    phase: GamePhase,
    white: Option<SessionId>,
    black: Option<SessionId>,
    game: ChessGame,
    clock: Option<GameClock>,
}

impl GameCoordinator {
    pub fn new() -> Self {
        Self {
            phase: GamePhase::WaitingForPlayers,
            white: None,
            black: None,
            game: ChessGame::new(),
            clock: None,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Seconds since the running game started
    pub fn elapsed_seconds(&self) -> Option<u64> {
        self.clock.map(|c| c.elapsed_seconds())
    }

    fn is_seated(&self, session_id: &str) -> bool {
        self.white.as_deref() == Some(session_id) || self.black.as_deref() == Some(session_id)
    }

    fn transition(&mut self, next: GamePhase) {
        debug!("state transition: {} -> {}", self.phase.name(), next.name());
        self.phase = next;
    }

    /// Clear slots, reset the rules engine, return to WaitingForPlayers
    fn reset_game(&mut self) {
        self.white = None;
        self.black = None;
        self.game.reset();
        self.clock = None;
        self.transition(GamePhase::WaitingForPlayers);
    }

    /// Lifecycle status line shown to clients
    pub fn status_message(&self) -> String {
        match self.phase {
            GamePhase::WaitingForPlayers => match (&self.white, &self.black) {
                (Some(_), None) => {
                    "Player 1 (White) joined. Waiting for Player 2 (Black)".to_string()
                }
                (None, Some(_)) => {
                    "Player 1 (Black) joined. Waiting for Player 2 (White)".to_string()
                }
                _ => "Waiting for players to join".to_string(),
            },
            GamePhase::ReadyToStart => {
                "Both players joined. Wait for start command to be sent by a player".to_string()
            }
            GamePhase::InProgress => format!(
                "Game in progress - {}'s turn",
                match self.game.current_side() {
                    protocol::Color::White => "White",
                    protocol::Color::Black => "Black",
                }
            ),
            GamePhase::GameOver => "Game over".to_string(),
        }
    }

    /// Seat a player. Both slots occupied moves the game to ReadyToStart.
    pub fn handle_join(&mut self, session_id: &str, color: &str, single_player: bool) -> Outcome {
        if self.phase != GamePhase::WaitingForPlayers {
            return Outcome::reply(ServerMessage::error(format!(
                "Cannot join: game is in state {}",
                self.phase.name()
            )));
        }

        if !matches!(color, "white" | "black") {
            return Outcome::reply(ServerMessage::error("Invalid color"));
        }

        if single_player {
            if self.white.as_deref().is_some_and(|id| id != session_id) {
                return Outcome::reply(ServerMessage::error("White player slot already taken"));
            }
            if self.black.as_deref().is_some_and(|id| id != session_id) {
                return Outcome::reply(ServerMessage::error("Black player slot already taken"));
            }
            self.white = Some(session_id.to_string());
            self.black = Some(session_id.to_string());
            info!("session {} joined both slots (single-player)", session_id);
        } else {
            match color {
                "white" => {
                    if self.white.as_deref().is_some_and(|id| id != session_id) {
                        return Outcome::reply(ServerMessage::error(
                            "White player slot already taken",
                        ));
                    }
                    self.white = Some(session_id.to_string());
                }
                _ => {
                    if self.black.as_deref().is_some_and(|id| id != session_id) {
                        return Outcome::reply(ServerMessage::error(
                            "Black player slot already taken",
                        ));
                    }
                    self.black = Some(session_id.to_string());
                }
            }
            info!("session {} joined as {}", session_id, color);
        }

        let both_seated = self.white.is_some() && self.black.is_some();
        let is_single = both_seated && self.white == self.black;

        let broadcast = if both_seated {
            self.transition(GamePhase::ReadyToStart);
            Broadcast::to_all(ServerMessage::GameReady {
                status: "Both players joined. You can now start the game!".to_string(),
                white_player: self.white.clone().unwrap_or_default(),
                black_player: self.black.clone().unwrap_or_default(),
                single_player: is_single,
            })
        } else {
            Broadcast::to_others(ServerMessage::PlayerJoined {
                color: color.to_string(),
                status: self.status_message(),
            })
        };

        Outcome::with_broadcast(
            ServerMessage::JoinSuccess {
                session_id: session_id.to_string(),
                color: color.to_string(),
                status: self.status_message(),
                single_player: is_single,
            },
            broadcast,
        )
    }

    /// ReadyToStart -> InProgress. Only a seated session may start.
    pub fn handle_start(&mut self, session_id: &str) -> Outcome {
        if self.phase != GamePhase::ReadyToStart {
            return Outcome::reply(ServerMessage::error(format!(
                "Cannot start: game is in state {}",
                self.phase.name()
            )));
        }
        if !self.is_seated(session_id) {
            return Outcome::reply(ServerMessage::error("Only seated players can start the game"));
        }

        self.game.reset();
        self.clock = Some(GameClock::start());
        self.transition(GamePhase::InProgress);
        info!("game started by session {}", session_id);

        let message = ServerMessage::GameStarted {
            status: self.status_message(),
            white_player: self.white.clone().unwrap_or_default(),
            black_player: self.black.clone().unwrap_or_default(),
        };
        Outcome::with_broadcast(message.clone(), Broadcast::to_all(message))
    }

    /// One half-move. Checkmate and stalemate end the game.
    pub fn handle_move(&mut self, parsed: &ParsedMove) -> Outcome {
        if self.phase != GamePhase::InProgress {
            return Outcome::reply(ServerMessage::error(format!(
                "Cannot move: game is in state {}",
                self.phase.name()
            )));
        }

        let strike = match self.game.apply(parsed) {
            Ok(strike) => strike,
            Err(e) => {
                debug!("move rejected: {}", e);
                return Outcome::reply(ServerMessage::error("Invalid move"));
            }
        };

        if strike.checkmate || strike.stalemate {
            self.transition(GamePhase::GameOver);
            info!(
                "game over after {} half-moves ({})",
                strike.strike_number,
                if strike.checkmate {
                    "checkmate"
                } else {
                    "stalemate"
                }
            );
        }

        let message = ServerMessage::MoveResult {
            strike,
            board: BoardInfo { fen: self.game.fen() },
        };
        Outcome::with_broadcast(message.clone(), Broadcast::to_others(message))
    }

    /// Formatted board; only meaningful while a game runs
    pub fn handle_display(&self) -> Outcome {
        if self.phase != GamePhase::InProgress {
            return Outcome::reply(ServerMessage::error(format!(
                "Cannot display board: game is in state {}",
                self.phase.name()
            )));
        }
        Outcome::reply(ServerMessage::BoardDisplay {
            board: self.game.formatted_board(),
        })
    }

    /// Lifecycle status; legal in every phase
    pub fn handle_status(&self) -> Outcome {
        Outcome::reply(ServerMessage::Status {
            message: self.status_message(),
        })
    }

    /// Full reset requested by a client
    pub fn handle_end(&mut self, session_id: &str) -> Outcome {
        info!("game ended by session {}", session_id);
        self.reset_game();

        Outcome::with_broadcast(
            ServerMessage::GameReset {
                status: self.status_message(),
                reason: None,
            },
            Broadcast::to_others(ServerMessage::GameReset {
                status: self.status_message(),
                reason: Some("ended_by_player".to_string()),
            }),
        )
    }

    /// A session went away. A seated session tears the game down; anyone
    /// else is a no-op.
    pub fn handle_disconnect(&mut self, session_id: &str) -> Option<Broadcast> {
        if !self.is_seated(session_id) {
            return None;
        }

        info!("seated session {} disconnected, resetting game", session_id);
        self.reset_game();

        Some(Broadcast::to_others(ServerMessage::GameReset {
            status: self.status_message(),
            reason: Some("all_players_disconnected".to_string()),
        }))
    }
}

impl Default for GameCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
