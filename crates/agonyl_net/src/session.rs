use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Capacity of the per-session outgoing channel. A full channel is a
/// retriable error at the producer; the session itself keeps running.
pub const SESSION_SEND_CAPACITY: usize = 100;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    #[error("send channel is full")]
    ChannelFull,
    #[error("session is closing")]
    Closed,
    #[error("client is not connected")]
    NotConnected,
}

/// One accepted TCP connection. Holds the sending side of the bounded
/// outgoing channel and the shutdown signal shared by the session's reader
/// and writer tasks.
pub struct Session {
    id: u32,
    peer_addr: SocketAddr,
    outgoing: flume::Sender<Vec<u8>>,
    closed: watch::Sender<bool>,
}

impl Session {
    /// Creates the session and hands back the receiving side for the writer
    /// task (or for a test that wants to observe outbound frames).
    pub fn new(id: u32, peer_addr: SocketAddr) -> (Arc<Self>, flume::Receiver<Vec<u8>>) {
        let (outgoing, rx) = flume::bounded(SESSION_SEND_CAPACITY);
        let (closed, _) = watch::channel(false);

        (
            Arc::new(Self {
                id,
                peer_addr,
                outgoing,
                closed,
            }),
            rx,
        )
    }

    /// A detached session for tests: sent frames pile up in the returned
    /// receiver.
    pub fn detached(id: u32) -> (Arc<Self>, flume::Receiver<Vec<u8>>) {
        Self::new(id, ([127, 0, 0, 1], 0).into())
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn peer_ip(&self) -> String {
        self.peer_addr.ip().to_string()
    }

    /// Queues a frame for the writer task. Never blocks.
    pub fn send(&self, frame: Vec<u8>) -> Result<(), SendError> {
        if *self.closed.borrow() {
            return Err(SendError::Closed);
        }

        match self.outgoing.try_send(frame) {
            Ok(()) => Ok(()),
            Err(flume::TrySendError::Full(_)) => Err(SendError::ChannelFull),
            Err(flume::TrySendError::Disconnected(_)) => Err(SendError::Closed),
        }
    }

    /// Signals the reader and writer to wind down. Idempotent.
    pub fn close(&self) {
        let _ = self.closed.send(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// A receiver on the shared shutdown signal.
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    /// Spawns the single writer task draining `rx` into `writer`. On
    /// shutdown the queue is drained without waiting before the task exits.
    pub fn spawn_writer<W>(
        self: &Arc<Self>,
        rx: flume::Receiver<Vec<u8>>,
        mut writer: W,
    ) -> JoinHandle<()>
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut closed = self.closed_signal();
        let id = self.id;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = rx.recv_async() => match frame {
                        Ok(frame) => {
                            if let Err(e) = writer.write_all(&frame).await {
                                debug!(session = id, "error writing to stream: {e}");
                                return;
                            }
                        }
                        Err(_) => break,
                    },
                    _ = closed.changed() => break,
                }
            }

            // Deterministic drain of whatever was queued before the close.
            while let Ok(frame) = rx.try_recv() {
                if writer.write_all(&frame).await.is_err() {
                    return;
                }
            }

            let _ = writer.flush().await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_channel_is_a_retriable_error() {
        let (session, _rx) = Session::detached(1);

        for _ in 0..SESSION_SEND_CAPACITY {
            session.send(vec![0]).unwrap();
        }

        assert_eq!(session.send(vec![0]), Err(SendError::ChannelFull));
    }

    #[test]
    fn send_after_close_fails() {
        let (session, _rx) = Session::detached(2);
        session.close();
        assert_eq!(session.send(vec![0]), Err(SendError::Closed));
    }

    #[tokio::test]
    async fn writer_drains_queue_on_close() {
        let (session, rx) = Session::detached(3);
        session.send(vec![1, 2, 3]).unwrap();
        session.send(vec![4, 5]).unwrap();

        let (client, mut server) = tokio::io::duplex(1024);
        let writer = session.spawn_writer(rx, client);
        session.close();
        writer.await.unwrap();

        use tokio::io::AsyncReadExt;
        let mut out = Vec::new();
        server.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
    }
}
