//! Client sessions
//!
//! One session per accepted connection. The session frames the transport's
//! raw chunks into `\n`-delimited lines, hands them to the shared controller
//! in arrival order, and owns the outbound writer task so replies and
//! broadcasts reach the peer in the order they were produced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};

use protocol::{ServerMessage, SessionId, Transport};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::controller::Controller;

type CloseCallback = Box<dyn FnOnce() + Send>;

/// One connected client
pub struct Session {
    id: SessionId,
    transport: Arc<Transport>,
    controller: Arc<Controller>,
    active: AtomicBool,
    outbound: mpsc::UnboundedSender<String>,
    outbound_rx: StdMutex<Option<mpsc::UnboundedReceiver<String>>>,
    close_cb: StdMutex<Option<CloseCallback>>,
}

impl Session {
    pub fn new(id: SessionId, transport: Arc<Transport>, controller: Arc<Controller>) -> Arc<Self> {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        info!("session created: {}", id);
        Arc::new(Self {
            id,
            transport,
            controller,
            active: AtomicBool::new(false),
            outbound,
            outbound_rx: StdMutex::new(Some(outbound_rx)),
            close_cb: StdMutex::new(None),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Register the server-side notification fired when this session closes
    pub fn set_close_callback(&self, cb: impl FnOnce() + Send + 'static) {
        *self.close_cb.lock().unwrap() = Some(Box::new(cb));
    }

    /// Idempotent startup: writer task, handshake, transport callbacks,
    /// inbound framing. The handshake is enqueued before the receive loop
    /// starts, so it is always the first outbound line.
    pub fn start(self: Arc<Self>) {
        if self.active.swap(true, Ordering::SeqCst) {
            return;
        }

        // Writer task: drains the outbound queue serially
        if let Some(mut rx) = self.outbound_rx.lock().unwrap().take() {
            let transport = Arc::clone(&self.transport);
            tokio::spawn(async move {
                while let Some(line) = rx.recv().await {
                    transport.send(line.as_bytes()).await;
                }
            });
        }

        self.send(
            &ServerMessage::SessionCreated {
                session_id: self.id.clone(),
            }
            .to_line(),
        );

        // Peer-close notification closes the session
        let weak: Weak<Session> = Arc::downgrade(&self);
        self.transport.set_close_callback(move || {
            if let Some(session) = weak.upgrade() {
                tokio::spawn(async move {
                    session.close().await;
                });
            }
        });

        // Receive loop feeds a channel; the framing task drains it serially
        // so messages reach the controller in arrival order
        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        Arc::clone(&self.transport).start(move |chunk| {
            let _ = chunk_tx.send(chunk.to_vec());
        });

        let session = Arc::clone(&self);
        tokio::spawn(async move {
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = chunk_rx.recv().await {
                if !session.is_active() {
                    break;
                }
                buffer.extend_from_slice(&chunk);

                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line_bytes: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line_bytes[..line_bytes.len() - 1]);
                    let line = line.trim_end_matches('\r');

                    if !session.is_active() {
                        return;
                    }
                    session.handle_message(line).await;
                }
            }
        });

        info!("session started: {}", self.id);
    }

    async fn handle_message(&self, line: &str) {
        trace!("session {} <- {}", self.id, line);
        if let Some(reply) = self.controller.handle_line(&self.id, line).await {
            self.send(&reply);
        }
    }

    /// Enqueue one line for the peer; the writer task appends are serial so
    /// per-receiver ordering holds
    pub fn send(&self, line: &str) {
        if !self.is_active() {
            return;
        }
        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');
        let _ = self.outbound.send(framed);
    }

    /// Idempotent shutdown: transport down, server notified for cleanup,
    /// synthetic disconnect routed to the controller
    pub async fn close(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }

        self.transport.close().await;

        let cb = self.close_cb.lock().unwrap().take();
        if let Some(cb) = cb {
            cb();
        }

        self.controller.handle_disconnect(&self.id);
        debug!("session closed: {}", self.id);
    }
}
