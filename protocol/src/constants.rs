//! Protocol constants

use std::time::Duration;

/// Board width and height (squares per side)
pub const BOARD_SIZE: usize = 8;

/// Default TCP bind address
pub const DEFAULT_BIND_IP: &str = "127.0.0.1";

/// Default TCP port
pub const DEFAULT_PORT: u16 = 2000;

/// Default Unix socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/chess_server.sock";

/// Receive buffer size for one transport read
pub const READ_CHUNK_SIZE: usize = 1024;

/// Pacing delay between streamed replay moves (milliseconds)
pub const REPLAY_PACING_MS: u64 = 50;

/// Period of the closed-session cleanup sweep (milliseconds)
pub const CLEANUP_INTERVAL_MS: u64 = 5000;

/// Pacing delay Duration
pub const REPLAY_PACING: Duration = Duration::from_millis(REPLAY_PACING_MS);

/// Cleanup sweep Duration
pub const CLEANUP_INTERVAL: Duration = Duration::from_millis(CLEANUP_INTERVAL_MS);
