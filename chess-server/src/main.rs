//! Chess server entry point

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chess_server::{Listener, Server, ServerConfig};
use protocol::{ParserKind, DEFAULT_BIND_IP, DEFAULT_SOCKET_PATH};

/// Multi-session chess game server
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Bind address (TCP mode)
    #[arg(short = 'i', long, default_value = DEFAULT_BIND_IP)]
    ip: String,

    /// Bind port (TCP mode)
    #[arg(short = 'p', long, default_value_t = protocol::DEFAULT_PORT)]
    port: u16,

    /// Serve on a Unix-domain socket instead of TCP
    #[arg(long)]
    local: bool,

    /// Unix socket path
    #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
    socket: String,

    /// Notation parser: "simple" (e2-e4) or "pgn" (Nf3, O-O, ...)
    #[arg(long, default_value = "simple")]
    parser: ParserKind,

    /// Raise log verbosity
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig {
        ip: args.ip,
        port: args.port,
        local: args.local,
        socket_path: args.socket,
        parser: args.parser,
    };

    let listener = match Listener::bind(&config) {
        Ok(listener) => listener,
        Err(e) => {
            error!("initialization failed: {}", e);
            return ExitCode::from(1);
        }
    };
    if let Some(addr) = listener.local_addr() {
        info!(
            "server listening on {} ({} parser)",
            addr,
            config.parser.name()
        );
    }

    let server = Server::new(config);

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            signal_server.stop().await;
        }
    });

    match server.run(listener).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("internal error: {}", e);
            ExitCode::from(2)
        }
    }
}
