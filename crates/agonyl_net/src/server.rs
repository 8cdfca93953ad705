use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agonyl_protocol::FrameCodec;
use bytes::BytesMut;
use dashmap::DashMap;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::{IdGenerator, Session};

const READ_BUF_SIZE: usize = 4096;

/// Per-session protocol logic, produced by the factory handed to
/// [`TcpServer::run`]. Returning `Err` from `on_frame` closes the session;
/// recoverable decode faults should be logged and swallowed instead.
#[async_trait::async_trait]
pub trait SessionHandler: Send + 'static {
    /// The fixed-length preamble, when the server expects one before framed
    /// traffic.
    async fn on_preamble(&mut self, _bytes: &[u8]) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_frame(&mut self, frame: BytesMut) -> anyhow::Result<()>;

    /// Runs after the reader loop ends, before the session deregisters.
    async fn on_close(&mut self) {}
}

/// A TCP listener owning a session registry, an id generator and a running
/// flag. The frame format is fixed by the `C` codec parameter.
pub struct TcpServer<C> {
    name: String,
    addr: SocketAddr,
    sessions: DashMap<u32, Arc<Session>>,
    ids: IdGenerator,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
    preamble_len: usize,
    _codec: PhantomData<fn() -> C>,
}

impl<C: FrameCodec + 'static> TcpServer<C> {
    pub fn new(name: impl Into<String>, addr: SocketAddr) -> Arc<Self> {
        Self::with_preamble(name, addr, 0)
    }

    /// A server whose peers send `preamble_len` raw bytes before framed
    /// traffic (the MainServer's 5-byte hello).
    pub fn with_preamble(name: impl Into<String>, addr: SocketAddr, preamble_len: usize) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            name: name.into(),
            addr,
            sessions: DashMap::new(),
            ids: IdGenerator::default(),
            running: AtomicBool::new(false),
            shutdown,
            preamble_len,
            _codec: PhantomData,
        })
    }

    pub fn session(&self, id: u32) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|s| s.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Accepts connections until [`stop`](Self::stop) is called, then closes
    /// every session and joins their tasks before returning.
    pub async fn run<F, H>(self: &Arc<Self>, factory: F) -> anyhow::Result<()>
    where
        F: Fn(Arc<Session>) -> H + Send + Sync + 'static,
        H: SessionHandler,
    {
        anyhow::ensure!(
            !self.running.swap(true, Ordering::AcqRel),
            "server {} already running",
            self.name
        );

        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            self.running.store(false, Ordering::Release);
            anyhow::anyhow!("server {} failed to bind {}: {e}", self.name, self.addr)
        })?;

        info!(name = %self.name, addr = %self.addr, "server started");

        let factory = Arc::new(factory);
        let mut shutdown = self.shutdown.subscribe();
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        let server = Arc::clone(self);
                        let factory = Arc::clone(&factory);
                        tasks.spawn(async move {
                            server.handle_connection(stream, peer_addr, &*factory).await;
                        });
                    }
                    Err(e) => {
                        if !self.is_running() {
                            break;
                        }

                        error!(name = %self.name, "accept error: {e}");
                    }
                },
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);
        for entry in self.sessions.iter() {
            entry.value().close();
        }

        while tasks.join_next().await.is_some() {}
        self.sessions.clear();
        info!(name = %self.name, "server stopped");
        Ok(())
    }

    /// Stops accepting and signals every session to wind down. The pending
    /// [`run`](Self::run) call joins the writers and then returns.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        let _ = self.shutdown.send(true);
    }

    async fn handle_connection<F, H>(
        self: &Arc<Self>,
        stream: TcpStream,
        peer_addr: SocketAddr,
        factory: &F,
    ) where
        F: Fn(Arc<Session>) -> H,
        H: SessionHandler,
    {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(name = %self.name, "failed to set TCP_NODELAY: {e}");
        }

        let id = self.ids.next_id();
        let (session, outgoing_rx) = Session::new(id, peer_addr);
        let (read_half, write_half) = stream.into_split();

        self.sessions.insert(id, Arc::clone(&session));
        let writer = session.spawn_writer(outgoing_rx, write_half);

        let mut handler = factory(Arc::clone(&session));
        self.read_loop(&session, read_half, &mut handler).await;

        handler.on_close().await;
        self.sessions.remove(&id);
        session.close();
        let _ = writer.await;
        debug!(name = %self.name, session = id, "session ended");
    }

    async fn read_loop<H>(
        &self,
        session: &Arc<Session>,
        mut read_half: tokio::net::tcp::OwnedReadHalf,
        handler: &mut H,
    ) where
        H: SessionHandler,
    {
        let mut closed = session.closed_signal();

        if self.preamble_len > 0 {
            let mut preamble = vec![0_u8; self.preamble_len];
            tokio::select! {
                read = read_half.read_exact(&mut preamble) => {
                    if read.is_err() {
                        return;
                    }
                }
                _ = closed.changed() => return,
            }

            if let Err(e) = handler.on_preamble(&preamble).await {
                warn!(name = %self.name, session = session.id(), "preamble rejected: {e:#}");
                return;
            }
        }

        let mut codec = C::default();
        loop {
            loop {
                match codec.try_next_frame() {
                    Ok(Some(frame)) => {
                        if let Err(e) = handler.on_frame(frame).await {
                            debug!(name = %self.name, session = session.id(), "session error: {e:#}");
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(name = %self.name, session = session.id(), "framing fault: {e}");
                        return;
                    }
                }
            }

            codec.reserve(READ_BUF_SIZE);
            let mut buf = codec.take_capacity();

            tokio::select! {
                read = read_half.read_buf(&mut buf) => match read {
                    Ok(0) => return,
                    Ok(_) => codec.queue_bytes(buf),
                    Err(e) => {
                        debug!(name = %self.name, session = session.id(), "read error: {e}");
                        return;
                    }
                },
                _ = closed.changed() => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use agonyl_protocol::FrameDecoder;
    use tokio::io::AsyncWriteExt;

    use super::*;

    struct Echo {
        session: Arc<Session>,
    }

    #[async_trait::async_trait]
    impl SessionHandler for Echo {
        async fn on_frame(&mut self, frame: BytesMut) -> anyhow::Result<()> {
            self.session.send(frame.to_vec())?;
            Ok(())
        }
    }

    fn frame(body: &[u8]) -> Vec<u8> {
        let size = (10 + body.len()) as u32;
        let mut f = Vec::new();
        f.extend_from_slice(&size.to_le_bytes());
        f.extend_from_slice(&[0; 4]);
        f.extend_from_slice(&[0x03, 0xFF]);
        f.extend_from_slice(body);
        f
    }

    #[tokio::test]
    async fn accepts_frames_and_echoes() {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = probe.local_addr().unwrap();
        drop(probe);

        let server = TcpServer::<FrameDecoder>::new("echo", addr);
        let run = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server
                    .run(|session| Echo { session })
                    .await
                    .unwrap();
            })
        };

        // Give the listener a moment to come up.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        let sent = frame(b"hello");
        client.write_all(&sent).await.unwrap();

        let mut echoed = vec![0_u8; sent.len()];
        client.read_exact(&mut echoed).await.unwrap();
        assert_eq!(echoed, sent);
        assert_eq!(server.session_count(), 1);

        server.stop();
        run.await.unwrap();
        assert_eq!(server.session_count(), 0);
    }
}
