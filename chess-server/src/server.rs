//! Server
//!
//! Owns the listening socket and the session registry, injects the fan-out
//! callbacks into the shared controller, and runs the accept and cleanup
//! loops. Shutdown is cooperative: both loops watch a notify signal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use protocol::{
    ParserKind, SessionId, Transport, CLEANUP_INTERVAL, DEFAULT_BIND_IP, DEFAULT_PORT,
    DEFAULT_SOCKET_PATH,
};
use tokio::net::TcpSocket;
#[cfg(unix)]
use tokio::net::UnixListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::controller::Controller;
use crate::session::Session;

/// Server configuration, filled from the CLI
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub ip: String,
    pub port: u16,
    pub local: bool,
    pub socket_path: String,
    pub parser: ParserKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_BIND_IP.to_string(),
            port: DEFAULT_PORT,
            local: false,
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            parser: ParserKind::Simple,
        }
    }
}

/// Bound listening socket, TCP or Unix-domain
pub enum Listener {
    Tcp(tokio::net::TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Listener {
    /// Bind according to the configuration. TCP mode sets `SO_REUSEADDR`;
    /// Unix mode unlinks any stale path and opens the socket to everyone.
    pub fn bind(config: &ServerConfig) -> std::io::Result<Self> {
        if config.local {
            #[cfg(unix)]
            {
                let _ = std::fs::remove_file(&config.socket_path);
                let listener = UnixListener::bind(&config.socket_path)?;
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(
                    &config.socket_path,
                    std::fs::Permissions::from_mode(0o666),
                )?;
                info!("unix socket listening on {}", config.socket_path);
                return Ok(Listener::Unix(listener));
            }
            #[cfg(not(unix))]
            return Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "unix-socket mode is not available on this platform",
            ));
        }

        let addr: std::net::SocketAddr = format!("{}:{}", config.ip, config.port)
            .parse()
            .map_err(|e| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid bind address: {}", e),
                )
            })?;
        let socket = TcpSocket::new_v4()?;
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(64)?;
        Ok(Listener::Tcp(listener))
    }

    /// Bound address, for logs and for tests binding port 0
    pub fn local_addr(&self) -> Option<String> {
        match self {
            Listener::Tcp(listener) => listener.local_addr().ok().map(|a| a.to_string()),
            #[cfg(unix)]
            Listener::Unix(listener) => listener
                .local_addr()
                .ok()
                .and_then(|a| a.as_pathname().map(|p| p.display().to_string())),
        }
    }

    async fn accept(&self) -> std::io::Result<Transport> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                stream.set_nodelay(true)?;
                info!("new connection: {}", addr);
                Ok(Transport::from_tcp(stream))
            }
            #[cfg(unix)]
            Listener::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                info!("new connection on unix socket");
                Ok(Transport::from_unix(stream))
            }
        }
    }
}

/// Session registry with the two fan-out primitives the controller gets
pub struct Registry {
    sessions: StdMutex<HashMap<SessionId, Arc<Session>>>,
}

impl Registry {
    fn new() -> Self {
        Self {
            sessions: StdMutex::new(HashMap::new()),
        }
    }

    fn insert(&self, session: Arc<Session>) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id().to_string(), session);
    }

    fn remove(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().unwrap().remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send one line to exactly one session; silent no-op when absent
    pub fn unicast(&self, session_id: &str, line: &str) {
        let target = self.sessions.lock().unwrap().get(session_id).cloned();
        match target {
            Some(session) => session.send(line),
            None => warn!("unicast dropped: session {} not found", session_id),
        }
    }

    /// Send one line to every active session, or to all but the originator
    pub fn broadcast(&self, origin: &str, line: &str, to_all: bool) {
        let targets: Vec<Arc<Session>> = {
            let sessions = self.sessions.lock().unwrap();
            sessions
                .values()
                .filter(|s| (to_all || s.id() != origin) && s.is_active())
                .cloned()
                .collect()
        };

        for session in &targets {
            session.send(line);
        }
        debug!("broadcast sent to {} sessions", targets.len());
    }

    fn drain(&self) -> Vec<Arc<Session>> {
        self.sessions.lock().unwrap().drain().map(|(_, s)| s).collect()
    }
}

/// The server: accept loop, registry, cleanup
pub struct Server {
    config: ServerConfig,
    controller: Arc<Controller>,
    registry: Arc<Registry>,
    closed_queue: Arc<StdMutex<Vec<SessionId>>>,
    next_session_id: AtomicU64,
    shutdown: watch::Sender<bool>,
    stopping: AtomicBool,
}

impl Server {
    /// Build the server and wire the controller's fan-out callbacks to the
    /// registry. The controller only ever sees the two closures.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let controller = Arc::new(Controller::new(config.parser));
        let registry = Arc::new(Registry::new());

        let unicast_registry = Arc::clone(&registry);
        let broadcast_registry = Arc::clone(&registry);
        controller.set_fanout(
            Box::new(move |session_id, line| unicast_registry.unicast(session_id, line)),
            Box::new(move |origin, line, to_all| broadcast_registry.broadcast(origin, line, to_all)),
        );

        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            config,
            controller,
            registry,
            closed_queue: Arc::new(StdMutex::new(Vec::new())),
            next_session_id: AtomicU64::new(1),
            shutdown,
            stopping: AtomicBool::new(false),
        })
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Accept until stopped. Accept errors are logged and the loop continues.
    pub async fn run(self: Arc<Self>, listener: Listener) -> anyhow::Result<()> {
        Self::spawn_cleanup_task(Arc::clone(&self));
        let mut shutdown = self.shutdown.subscribe();

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => break,
                result = listener.accept() => match result {
                    Ok(transport) => self.accept_session(transport),
                    Err(e) => {
                        if self.stopping.load(Ordering::SeqCst) {
                            break;
                        }
                        error!("accept failed: {}", e);
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                }
            }
        }

        debug!("accept loop exiting");
        Ok(())
    }

    fn accept_session(&self, transport: Transport) {
        let id = format!(
            "session_{}",
            self.next_session_id.fetch_add(1, Ordering::SeqCst)
        );
        let session = Session::new(id.clone(), Arc::new(transport), Arc::clone(&self.controller));

        // Closed sessions queue up here; the periodic sweep prunes the
        // registry, while the disconnect itself is routed immediately by
        // Session::close
        let queue = Arc::clone(&self.closed_queue);
        session.set_close_callback(move || {
            queue.lock().unwrap().push(id);
        });

        self.registry.insert(Arc::clone(&session));
        session.start();
    }

    fn spawn_cleanup_task(server: Arc<Self>) {
        tokio::spawn(async move {
            let mut shutdown = server.shutdown.subscribe();
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = interval.tick() => server.cleanup_closed_sessions(),
                }
            }
            debug!("cleanup task exiting");
        });
    }

    fn cleanup_closed_sessions(&self) {
        let to_cleanup: Vec<SessionId> = std::mem::take(&mut *self.closed_queue.lock().unwrap());
        if to_cleanup.is_empty() {
            return;
        }

        debug!("cleaning up {} sessions", to_cleanup.len());
        for session_id in to_cleanup {
            if self.registry.remove(&session_id).is_some() {
                debug!("removed session {} from registry", session_id);
            }
        }
    }

    /// Cooperative shutdown: wake both loops, close every session, clean up
    /// the unix socket path
    pub async fn stop(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("server stopping");
        self.shutdown.send_replace(true);

        for session in self.registry.drain() {
            session.close().await;
        }

        if self.config.local {
            let _ = std::fs::remove_file(&self.config.socket_path);
        }
    }
}
