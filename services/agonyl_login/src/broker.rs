//! The gate-facing side of the login server: keeps the live gate registry
//! and relays login/logout events into the ticket cache.

use std::net::SocketAddr;
use std::sync::Arc;

use agonyl_net::{Session, SessionHandler, TcpServer};
use agonyl_protocol::messages::{
    Gate2LsAccLogout, Gate2LsConnect, Gate2LsPreparedAccLogin, GateServerEntry,
};
use agonyl_protocol::{head, FrameDecoder};
use agonyl_store::CacheService;
use bytes::BytesMut;
use dashmap::DashMap;
use tracing::{error, info, warn};

pub(crate) struct GateRegistration {
    pub(crate) session: Arc<Session>,
    pub(crate) server_id: u8,
    pub(crate) ip: String,
    pub(crate) port: u32,
    pub(crate) name: String,
}

pub(crate) struct Broker {
    pub(crate) server: Arc<TcpServer<FrameDecoder>>,
    gates: DashMap<u32, GateRegistration>,
    cache: CacheService,
}

impl Broker {
    pub(crate) fn new(addr: SocketAddr, cache: CacheService) -> Arc<Self> {
        Arc::new(Self {
            server: TcpServer::new("login-server-broker", addr),
            gates: DashMap::new(),
            cache,
        })
    }

    pub(crate) async fn run(self: &Arc<Self>) -> anyhow::Result<()> {
        let broker = Arc::clone(self);
        self.server
            .run(move |session| BrokerSession {
                broker: Arc::clone(&broker),
                session,
                registered: false,
            })
            .await
    }

    pub(crate) fn stop(&self) {
        self.server.stop();
    }

    pub(crate) fn gate_count(&self) -> usize {
        self.gates.len()
    }

    /// One entry per unique gate port; a gate reconnecting from several
    /// sessions must not show up twice in the client list.
    pub(crate) fn gate_list(&self) -> Vec<GateServerEntry> {
        let mut seen_ports = Vec::new();
        let mut entries = Vec::new();
        for gate in self.gates.iter() {
            if seen_ports.contains(&gate.port) {
                continue;
            }

            seen_ports.push(gate.port);
            entries.push(GateServerEntry {
                server_id: gate.server_id,
                name: gate.name.as_str().into(),
                status: "ok".into(),
            });
        }

        entries
    }

    pub(crate) fn find_gate(&self, server_id: u8) -> Option<(Arc<Session>, String, u32)> {
        self.gates.iter().find_map(|gate| {
            (gate.server_id == server_id)
                .then(|| (Arc::clone(&gate.session), gate.ip.clone(), gate.port))
        })
    }
}

struct BrokerSession {
    broker: Arc<Broker>,
    session: Arc<Session>,
    registered: bool,
}

#[async_trait::async_trait]
impl SessionHandler for BrokerSession {
    async fn on_frame(&mut self, frame: BytesMut) -> anyhow::Result<()> {
        let (ctrl, cmd) = (head::frame_ctrl(&frame), head::frame_cmd(&frame));
        if ctrl != 0x02 {
            return Ok(());
        }

        match cmd {
            0xE0 => self.handle_gate_connect(&frame),
            0xE2 => self.handle_account_logout(&frame).await,
            0xE3 => self.handle_prepared_login(&frame).await,
            _ => {}
        }

        Ok(())
    }

    async fn on_close(&mut self) {
        if let Some((_, gate)) = self.broker.gates.remove(&self.session.id()) {
            info!(server_id = gate.server_id, name = %gate.name, "gate server disconnected");
        }
    }
}

impl BrokerSession {
    fn handle_gate_connect(&mut self, frame: &[u8]) {
        if self.registered {
            return;
        }

        let msg = match Gate2LsConnect::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                error!("failed to read gate connect message: {e:#}");
                return;
            }
        };

        let registration = GateRegistration {
            session: Arc::clone(&self.session),
            server_id: msg.server_id,
            ip: msg.ip.to_str(),
            port: msg.port,
            name: msg.name.to_str(),
        };

        info!(
            server_id = registration.server_id,
            ip = %registration.ip,
            port = registration.port,
            name = %registration.name,
            session = self.session.id(),
            "gate server connected"
        );

        self.broker.gates.insert(self.session.id(), registration);
        self.registered = true;
    }

    async fn handle_account_logout(&self, frame: &[u8]) {
        let msg = match Gate2LsAccLogout::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                error!("failed to read gate account logout message: {e:#}");
                return;
            }
        };

        let account = msg.account.to_str();
        info!(%account, "account logged out");
        if let Err(e) = self.broker.cache.remove_logged_in_user(&account).await {
            warn!(%account, "failed to revoke login ticket: {e}");
        }
    }

    async fn handle_prepared_login(&self, frame: &[u8]) {
        let msg = match Gate2LsPreparedAccLogin::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                error!("failed to read prepared login message: {e:#}");
                return;
            }
        };

        let account = msg.account.to_str();
        info!(%account, pc_id = msg.pc_id, "account logged in at gate");
        if let Err(e) = self
            .broker
            .cache
            .add_logged_in_user(&account, msg.pc_id)
            .await
        {
            warn!(%account, "failed to mirror login ticket: {e}");
        }
    }
}
