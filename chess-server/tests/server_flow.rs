//! End-to-end loopback scenarios: real TCP connections against a running
//! server, exercising the handshake, the join/start/move flow, broadcast
//! fan-out, disconnect resets, and streamed file replay.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use chess_server::{Listener, Server, ServerConfig};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server() -> (Arc<Server>, String) {
    let config = ServerConfig {
        port: 0,
        ..ServerConfig::default()
    };
    let listener = Listener::bind(&config).expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let server = Server::new(config);
    tokio::spawn(Arc::clone(&server).run(listener));
    (server, addr)
}

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: &str) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, write_half) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer: write_half,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .expect("write");
    }

    async fn next(&mut self) -> serde_json::Value {
        let line = timeout(READ_TIMEOUT, self.lines.next_line())
            .await
            .expect("read timed out")
            .expect("read")
            .expect("connection closed early");
        serde_json::from_str(&line).expect("server lines are JSON")
    }

    async fn expect_type(&mut self, expected: &str) -> serde_json::Value {
        let value = self.next().await;
        assert_eq!(value["type"], expected, "unexpected message: {}", value);
        value
    }
}

#[tokio::test]
async fn test_handshake_and_join() {
    let (_server, addr) = start_server().await;

    let mut client = Client::connect(&addr).await;
    let handshake = client.expect_type("session_created").await;
    assert_eq!(handshake["session_id"], "session_1");

    client
        .send(r#"{"command":"join_game","single_player":false,"color":"white"}"#)
        .await;
    let reply = client.expect_type("join_success").await;
    assert_eq!(reply["session_id"], "session_1");
    assert_eq!(reply["color"], "white");
    assert_eq!(reply["single_player"], false);
}

#[tokio::test]
async fn test_unknown_command_gets_error() {
    let (_server, addr) = start_server().await;

    let mut client = Client::connect(&addr).await;
    client.expect_type("session_created").await;

    client.send(r#"{"command":"castle_the_moon"}"#).await;
    let reply = client.expect_type("error").await;
    assert_eq!(reply["error"], "Unknown command");

    client.send("not json at all").await;
    let reply = client.expect_type("error").await;
    assert_eq!(reply["error"], "Invalid JSON format");
    assert!(reply["details"].is_string());
}

#[tokio::test]
async fn test_two_player_game_and_disconnect_reset() {
    let (_server, addr) = start_server().await;

    // Client A seats white
    let mut a = Client::connect(&addr).await;
    let handshake = a.expect_type("session_created").await;
    assert_eq!(handshake["session_id"], "session_1");
    a.send(r#"{"command":"join_game","single_player":false,"color":"white"}"#)
        .await;
    a.expect_type("join_success").await;

    // Client B seats black; both get the ready broadcast
    let mut b = Client::connect(&addr).await;
    let handshake = b.expect_type("session_created").await;
    assert_eq!(handshake["session_id"], "session_2");
    b.send(r#"{"command":"join_game","single_player":false,"color":"black"}"#)
        .await;

    let ready = b.expect_type("game_ready").await;
    assert_eq!(ready["single_player"], false);
    b.expect_type("join_success").await;
    a.expect_type("game_ready").await;

    // B starts; the broadcast goes to all, the reply to B
    b.send(r#"{"command":"start_game"}"#).await;
    b.expect_type("game_started").await;
    b.expect_type("game_started").await;
    a.expect_type("game_started").await;

    // A moves; B sees the same move_result as a broadcast
    a.send(r#"{"command":"make_move","move":"e2-e4"}"#).await;
    let result = a.expect_type("move_result").await;
    assert_eq!(result["strike"]["case_src"], "e2");
    assert_eq!(result["strike"]["case_dest"], "e4");
    assert_eq!(result["strike"]["strike_number"], 1);
    assert_eq!(result["strike"]["piece"], "pawn");
    assert_eq!(result["strike"]["color"], "white");
    let fen = result["board"]["fen"].as_str().unwrap();
    assert!(fen.starts_with("rnbqkbnr/pppppppp/8/8/4P3/"));

    let broadcast = b.expect_type("move_result").await;
    assert_eq!(broadcast["strike"]["case_dest"], "e4");

    // An illegal move only errors back to the mover
    a.send(r#"{"command":"make_move","move":"e2-e4"}"#).await;
    let reply = a.expect_type("error").await;
    assert_eq!(reply["error"], "Invalid move");

    // B drops; A learns the game was reset
    drop(b);
    let reset = a.expect_type("game_reset").await;
    assert_eq!(reset["reason"], "all_players_disconnected");

    // The board is fresh again for a new game
    a.send(r#"{"command":"get_status"}"#).await;
    let status = a.expect_type("status").await;
    assert!(status["message"]
        .as_str()
        .unwrap()
        .contains("Waiting for players"));
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
async fn test_single_player_replay() {
    let (_server, addr) = start_server().await;

    let mut client = Client::connect(&addr).await;
    client.expect_type("session_created").await;

    client
        .send(r#"{"command":"join_game","single_player":true,"color":"white"}"#)
        .await;
    let ready = client.expect_type("game_ready").await;
    assert_eq!(ready["single_player"], true);
    let join = client.expect_type("join_success").await;
    assert_eq!(join["single_player"], true);

    client.send(r#"{"command":"start_game"}"#).await;
    client.expect_type("game_started").await;
    client.expect_type("game_started").await;

    // Three chunks parsing to four legal moves ending in checkmate
    let chunks = ["f2-f3\ne7-e5\n", "g2-g4\n", "d8-h4\n"];
    for (i, chunk) in chunks.iter().enumerate() {
        client
            .send(&upload_line("mate.txt", chunks.len() as u32, i as u32 + 1, chunk))
            .await;
    }

    // Two acks for the non-final chunks
    let ack = client.expect_type("upload_progress").await;
    assert_eq!(ack["chunk_received"], 1);
    assert_eq!(ack["percent"], 33);
    let ack = client.expect_type("upload_progress").await;
    assert_eq!(ack["chunk_received"], 2);
    assert_eq!(ack["percent"], 66);

    // Four streamed move results, then the terminal game_over
    for strike_number in 1..=4u64 {
        let result = client.expect_type("move_result").await;
        assert_eq!(result["strike"]["strike_number"], strike_number);
    }
    let over = client.expect_type("game_over").await;
    assert_eq!(over["result"], "Black wins by checkmate");

    // No further moves are accepted
    client
        .send(r#"{"command":"make_move","move":"a2-a3"}"#)
        .await;
    client.expect_type("error").await;
}

#[tokio::test]
async fn test_board_display() {
    let (_server, addr) = start_server().await;

    let mut client = Client::connect(&addr).await;
    client.expect_type("session_created").await;
    client
        .send(r#"{"command":"join_game","single_player":true,"color":"white"}"#)
        .await;
    client.expect_type("game_ready").await;
    client.expect_type("join_success").await;
    client.send(r#"{"command":"start_game"}"#).await;
    client.expect_type("game_started").await;
    client.expect_type("game_started").await;

    client.send(r#"{"command":"display_board"}"#).await;
    let display = client.expect_type("board_display").await;
    let board = display["board"].as_str().unwrap();
    assert!(board.contains("a   b   c   d   e   f   g   h"));
    assert!(board.contains("| R | C | B | Q | K | B | C | R |"));
}
