//! Stream transport
//!
//! Wraps the split halves of one accepted stream (TCP or Unix). The receive
//! loop surfaces raw chunks as they arrive; framing is the session's job.
//! Peer shutdown and read errors fire a one-shot close callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::sync::{Mutex, Notify};
use tracing::{error, trace};

use crate::constants::READ_CHUNK_SIZE;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type CloseCallback = Box<dyn FnOnce() + Send>;

/// Byte channel over one connected stream
pub struct Transport {
    reader: StdMutex<Option<BoxedReader>>,
    writer: Mutex<BoxedWriter>,
    running: AtomicBool,
    started: AtomicBool,
    closed: AtomicBool,
    shutdown: Notify,
    close_cb: StdMutex<Option<CloseCallback>>,
}

impl Transport {
    /// Wrap a split stream
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: StdMutex::new(Some(Box::new(reader))),
            writer: Mutex::new(Box::new(writer)),
            running: AtomicBool::new(true),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
            close_cb: StdMutex::new(None),
        }
    }

    /// Wrap an accepted TCP stream
    pub fn from_tcp(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self::new(read_half, write_half)
    }

    /// Wrap an accepted Unix-domain stream
    #[cfg(unix)]
    pub fn from_unix(stream: UnixStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self::new(read_half, write_half)
    }

    /// Register the one-shot notification fired when the peer closes the
    /// connection or a read error occurs
    pub fn set_close_callback(&self, cb: impl FnOnce() + Send + 'static) {
        *self.close_cb.lock().unwrap() = Some(Box::new(cb));
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the receive loop. Callable at most once; later calls are no-ops.
    /// Each successful read hands the raw chunk to `on_payload`.
    pub fn start<F>(self: Arc<Self>, mut on_payload: F)
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let reader = self.reader.lock().unwrap().take();
        let Some(mut reader) = reader else {
            return;
        };
        let transport = self;

        tokio::spawn(async move {
            let mut buf = [0u8; READ_CHUNK_SIZE];
            loop {
                tokio::select! {
                    _ = transport.shutdown.notified() => break,
                    result = reader.read(&mut buf) => match result {
                        Ok(0) => {
                            trace!("peer closed the connection");
                            transport.running.store(false, Ordering::SeqCst);
                            transport.fire_close_callback();
                            break;
                        }
                        Ok(n) => on_payload(&buf[..n]),
                        Err(e) => {
                            error!("read error: {}", e);
                            transport.running.store(false, Ordering::SeqCst);
                            transport.fire_close_callback();
                            break;
                        }
                    }
                }
            }
            trace!("receive loop exiting");
        });
    }

    /// Best-effort write. A failure marks the transport not-running but is
    /// not fatal to the process.
    pub async fn send(&self, data: &[u8]) {
        if !self.is_running() {
            return;
        }

        let mut writer = self.writer.lock().await;
        let result = async {
            writer.write_all(data).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            error!("write error: {}", e);
            self.running.store(false, Ordering::SeqCst);
        }
    }

    /// Idempotent shutdown of both directions. Does not fire the close
    /// callback; that is reserved for peer-initiated closes.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();

        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    fn fire_close_callback(&self) {
        let cb = self.close_cb.lock().unwrap().take();
        if let Some(cb) = cb {
            cb();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn pair() -> (Arc<Transport>, tokio::io::DuplexStream) {
        let (server_side, client_side) = tokio::io::duplex(256);
        let (read_half, write_half) = tokio::io::split(server_side);
        (Arc::new(Transport::new(read_half, write_half)), client_side)
    }

    #[tokio::test]
    async fn test_payloads_surface_in_order() {
        let (transport, mut client) = pair();
        let (tx, mut rx) = mpsc::unbounded_channel();

        transport.clone().start(move |chunk| {
            let _ = tx.send(chunk.to_vec());
        });

        client.write_all(b"hello ").await.unwrap();
        client.write_all(b"world").await.unwrap();

        let mut received = Vec::new();
        while received.len() < b"hello world".len() {
            received.extend(rx.recv().await.unwrap());
        }
        assert_eq!(received, b"hello world");
    }

    #[tokio::test]
    async fn test_send_reaches_peer() {
        let (transport, mut client) = pair();
        transport.clone().start(|_| {});

        transport.send(b"ack\n").await;

        let mut buf = [0u8; 16];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ack\n");
    }

    #[tokio::test]
    async fn test_close_callback_fires_once_on_peer_close() {
        let (transport, client) = pair();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.set_close_callback(move || {
            let _ = tx.send(());
        });
        transport.clone().start(|_| {});

        drop(client);

        rx.recv().await.expect("close callback should fire");
        assert!(!transport.is_running());
        // Channel closes with the consumed one-shot callback
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_local_close_does_not_fire_callback() {
        let (transport, _client) = pair();
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        transport.set_close_callback(move || {
            let _ = tx.send(());
        });
        transport.clone().start(|_| {});

        transport.close().await;
        transport.close().await;

        assert!(!transport.is_running());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_start_is_single_shot() {
        let (transport, mut client) = pair();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let tx1 = tx.clone();
        transport.clone().start(move |chunk| {
            let _ = tx1.send((1u8, chunk.to_vec()));
        });
        // Second receive loop must not spawn
        transport.clone().start(move |chunk| {
            let _ = tx.send((2u8, chunk.to_vec()));
        });

        client.write_all(b"x").await.unwrap();
        let (loop_id, chunk) = rx.recv().await.unwrap();
        assert_eq!(loop_id, 1);
        assert_eq!(chunk, b"x");
    }
}
