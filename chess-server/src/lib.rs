//! Chess game server
//!
//! Contains:
//! - The game coordinator state machine
//! - The rules engine adapter
//! - The message controller and streamed file replay
//! - Client sessions and framing
//! - The accept/registry/fan-out server

pub mod controller;
pub mod coordinator;
pub mod game;
pub mod server;
pub mod session;

pub use controller::Controller;
pub use coordinator::{Broadcast, GameCoordinator, GamePhase, Outcome};
pub use game::{ChessGame, GameClock};
pub use server::{Listener, Registry, Server, ServerConfig};
pub use session::Session;
