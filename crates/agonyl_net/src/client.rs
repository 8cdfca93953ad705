use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agonyl_protocol::FrameCodec;
use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{SendError, Session};

const READ_BUF_SIZE: usize = 4096;

/// How long a peer link waits between reconnect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Protocol logic for a long-lived outbound link. `on_connect` runs once per
/// established connection and is where the startup hello goes; returning
/// `Err` drops the connection and re-enters the backoff loop.
#[async_trait::async_trait]
pub trait PeerHandler<C>: Send + Sync + 'static {
    async fn on_connect(&self, link: &PeerClient<C>) -> anyhow::Result<()>;

    async fn on_frame(&self, link: &PeerClient<C>, frame: BytesMut);

    async fn on_disconnect(&self, _link: &PeerClient<C>) {}
}

/// A reconnecting client to a peer process. The supervisor loop is
/// `connect → on_connect → read/write until error → wait 10 s → repeat`
/// until [`stop`](Self::stop). `send` fails with `NotConnected` outside a
/// live session; callers are expected to cope.
pub struct PeerClient<C> {
    name: String,
    addr: String,
    reconnect_delay: Duration,
    running: AtomicBool,
    should_reconnect: AtomicBool,
    link: Mutex<Option<Arc<Session>>>,
    shutdown: watch::Sender<bool>,
    _codec: PhantomData<fn() -> C>,
}

impl<C: FrameCodec + 'static> PeerClient<C> {
    pub fn new(name: impl Into<String>, addr: impl Into<String>) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            name: name.into(),
            addr: addr.into(),
            reconnect_delay: RECONNECT_DELAY,
            running: AtomicBool::new(false),
            should_reconnect: AtomicBool::new(true),
            link: Mutex::new(None),
            shutdown,
            _codec: PhantomData,
        })
    }

    #[cfg(test)]
    fn with_delay(name: &str, addr: &str, delay: Duration) -> Arc<Self> {
        let client = Self::new(name, addr);
        // Safety valve for tests only; Arc::get_mut is fine pre-share.
        let mut client = client;
        Arc::get_mut(&mut client).unwrap().reconnect_delay = delay;
        client
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_connected(&self) -> bool {
        self.link.lock().is_some()
    }

    /// Queues a frame on the current connection.
    pub fn send(&self, frame: Vec<u8>) -> Result<(), SendError> {
        let link = self.link.lock().clone();
        match link {
            Some(session) => session.send(frame),
            None => Err(SendError::NotConnected),
        }
    }

    /// Runs the supervisor loop until [`stop`](Self::stop).
    pub async fn run<H>(self: Arc<Self>, handler: H)
    where
        H: PeerHandler<C>,
    {
        self.running.store(true, Ordering::Release);
        self.should_reconnect.store(true, Ordering::Release);
        info!(name = %self.name, addr = %self.addr, "starting peer client");

        let mut shutdown = self.shutdown.subscribe();
        while self.running.load(Ordering::Acquire) {
            match TcpStream::connect(&self.addr).await {
                Ok(stream) => {
                    info!(name = %self.name, addr = %self.addr, "connected");
                    self.run_connection(stream, &handler).await;
                    handler.on_disconnect(&self).await;
                    info!(name = %self.name, addr = %self.addr, "disconnected");
                }
                Err(e) => {
                    debug!(name = %self.name, addr = %self.addr, "connect failed: {e}");
                }
            }

            if !self.should_reconnect.load(Ordering::Acquire) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!(name = %self.name, "peer client stopped");
    }

    /// Breaks the supervisor loop and closes the live connection, if any.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.should_reconnect.store(false, Ordering::Release);
        let _ = self.shutdown.send(true);
    }

    async fn run_connection<H>(self: &Arc<Self>, stream: TcpStream, handler: &H)
    where
        H: PeerHandler<C>,
    {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(name = %self.name, "failed to set TCP_NODELAY: {e}");
        }

        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(_) => ([0, 0, 0, 0], 0).into(),
        };

        // The link's outgoing side reuses the session writer machinery.
        let (session, outgoing_rx) = Session::new(0, peer_addr);
        let (mut read_half, write_half) = stream.into_split();
        let writer = session.spawn_writer(outgoing_rx, write_half);

        *self.link.lock() = Some(Arc::clone(&session));

        if let Err(e) = self.read_loop(&mut read_half, handler).await {
            warn!(name = %self.name, "link error: {e:#}");
        }

        *self.link.lock() = None;
        session.close();
        let _ = writer.await;
    }

    async fn read_loop<H>(
        self: &Arc<Self>,
        read_half: &mut tokio::net::tcp::OwnedReadHalf,
        handler: &H,
    ) -> anyhow::Result<()>
    where
        H: PeerHandler<C>,
    {
        handler.on_connect(self).await?;

        let mut shutdown = self.shutdown.subscribe();
        let mut codec = C::default();

        loop {
            loop {
                match codec.try_next_frame() {
                    Ok(Some(frame)) => handler.on_frame(self, frame).await,
                    Ok(None) => break,
                    Err(e) => return Err(e.into()),
                }
            }

            codec.reserve(READ_BUF_SIZE);
            let mut buf = codec.take_capacity();

            tokio::select! {
                read = read_half.read_buf(&mut buf) => match read {
                    Ok(0) => return Ok(()),
                    Ok(_) => codec.queue_bytes(buf),
                    Err(e) => return Err(e.into()),
                },
                _ = shutdown.changed() => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use agonyl_protocol::FrameDecoder;

    use super::*;

    struct Collect {
        frames: flume::Sender<Vec<u8>>,
    }

    #[async_trait::async_trait]
    impl PeerHandler<FrameDecoder> for Collect {
        async fn on_connect(&self, link: &PeerClient<FrameDecoder>) -> anyhow::Result<()> {
            link.send(b"hi".to_vec()).map_err(anyhow::Error::from)
        }

        async fn on_frame(&self, _link: &PeerClient<FrameDecoder>, frame: BytesMut) {
            let _ = self.frames.send(frame.to_vec());
        }
    }

    #[test]
    fn send_while_disconnected_is_not_connected() {
        let client = PeerClient::<FrameDecoder>::new("peer", "127.0.0.1:1");
        assert_eq!(client.send(vec![1]), Err(SendError::NotConnected));
    }

    #[tokio::test]
    async fn connects_sends_hello_and_receives_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (frames_tx, frames_rx) = flume::unbounded();
        let client =
            PeerClient::<FrameDecoder>::with_delay("peer", &addr.to_string(), Duration::from_millis(10));

        let run = tokio::spawn(Arc::clone(&client).run(Collect { frames: frames_tx }));

        let (mut peer, _) = listener.accept().await.unwrap();

        // The hello queued by on_connect arrives first.
        let mut hello = [0_u8; 2];
        peer.read_exact(&mut hello).await.unwrap();
        assert_eq!(&hello, b"hi");

        // Push one frame back through the link.
        let mut frame = Vec::new();
        frame.extend_from_slice(&12_u32.to_le_bytes());
        frame.extend_from_slice(&7_u32.to_le_bytes());
        frame.extend_from_slice(&[0x01, 0xE1, 2, 0]);
        peer.write_all(&frame).await.unwrap();

        let got = frames_rx.recv_async().await.unwrap();
        assert_eq!(got, frame);

        client.stop();
        run.await.unwrap();
    }
}
