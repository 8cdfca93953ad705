//! The client-facing edge. The first packet of a connection must be the
//! gate login; after that every client packet is deciphered, has its pcId
//! field stamped with the session's identity, and is routed per the
//! dispatch rules.

use std::net::SocketAddr;
use std::sync::Arc;

use agonyl_net::{PeerClient, Session, SessionHandler, TcpServer};
use agonyl_protocol::messages::{
    C2SGateLogin, Gate2AsNewClient, Gate2LsAccLogout, Gate2LsPreparedAccLogin, S2CError,
    Za2ZsAccLogout,
};
use agonyl_protocol::{codes, head, strings, Dyn562, FrameDecoder};
use agonyl_store::AccountRepo;
use bytes::BytesMut;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::login_link::PreauthTable;
use crate::player::Player;
use crate::routing::{self, ACCOUNT_SERVER_ZONE_ID};
use crate::zone_link::{Players, ZoneLinks};

pub(crate) struct GateServer {
    pub(crate) server: Arc<TcpServer<FrameDecoder>>,
    pub(crate) players: Players,
    preauth: PreauthTable,
    accounts: AccountRepo,
    login_link: Arc<PeerClient<FrameDecoder>>,
    zones: Arc<ZoneLinks>,
    crypto: Dyn562,
}

impl GateServer {
    pub(crate) fn new(
        addr: SocketAddr,
        accounts: AccountRepo,
        preauth: PreauthTable,
        login_link: Arc<PeerClient<FrameDecoder>>,
        zones: Arc<ZoneLinks>,
        crypto: Dyn562,
    ) -> Arc<Self> {
        Arc::new(Self {
            server: TcpServer::new("gate-server", addr),
            players: Arc::new(DashMap::new()),
            preauth,
            accounts,
            login_link,
            zones,
            crypto,
        })
    }

    pub(crate) async fn run(self: &Arc<Self>) -> anyhow::Result<()> {
        let gate = Arc::clone(self);
        self.server
            .run(move |session| ClientSession {
                gate: Arc::clone(&gate),
                session,
                player: None,
            })
            .await
    }

    pub(crate) fn stop(&self) {
        self.server.stop();
    }
}

struct ClientSession {
    gate: Arc<GateServer>,
    session: Arc<Session>,
    player: Option<Arc<Player>>,
}

#[async_trait::async_trait]
impl SessionHandler for ClientSession {
    async fn on_frame(&mut self, mut frame: BytesMut) -> anyhow::Result<()> {
        let ctrl = head::frame_ctrl(&frame);
        let cmd = head::frame_cmd(&frame);

        // Clients cannot be trusted with their own identity; the session's
        // pcId wins before anything is dispatched or forwarded.
        if let Some(player) = &self.player {
            head::set_frame_pc_id(&mut frame, player.pc_id);
        }

        match ctrl {
            0x01 => match cmd {
                0xE2 => self.handle_login(&frame).await,
                0xF0 => {} // ping, acknowledged by silence
                _ => {}
            },
            0x03 => {
                let Some(player) = self.player.clone() else {
                    return Ok(());
                };

                self.gate.crypto.decrypt(&mut frame);
                let protocol = head::frame_protocol(&frame);
                if let Some(zone_id) = routing::route_zone(ctrl, protocol, player.current_zone()) {
                    self.forward(zone_id, &frame);
                }
            }
            _ => {
                if self.player.is_none() {
                    return Ok(());
                }

                self.gate.crypto.decrypt(&mut frame);
                let protocol = head::frame_protocol(&frame);
                if let Some(zone_id) = routing::route_zone(ctrl, protocol, 0) {
                    self.forward(zone_id, &frame);
                }
            }
        }

        Ok(())
    }

    async fn on_close(&mut self) {
        let Some(player) = self.player.take() else {
            return;
        };

        info!(pc_id = player.pc_id, username = %player.username, "client session ended");

        let logout = Gate2LsAccLogout::new(0x00, &player.username);
        if let Err(e) = self.gate.login_link.send(logout.to_frame()) {
            warn!(pc_id = player.pc_id, "failed to notify broker of logout: {e}");
        }

        let zone_logout = Za2ZsAccLogout::new(player.pc_id, 0x00);
        if let Err(e) = self
            .gate
            .zones
            .send(player.current_zone(), zone_logout.to_frame())
        {
            warn!(
                pc_id = player.pc_id,
                zone = player.current_zone(),
                "failed to notify zone of logout: {e}"
            );
        }

        self.gate.players.remove(&player.pc_id);
        if let Err(e) = self.gate.accounts.set_offline(player.pc_id).await {
            warn!(pc_id = player.pc_id, "failed to mark account offline: {e}");
        }
    }
}

impl ClientSession {
    fn forward(&self, zone_id: u8, frame: &[u8]) {
        if let Err(e) = self.gate.zones.send(zone_id, frame.to_vec()) {
            warn!(
                session = self.session.id(),
                zone = zone_id,
                "failed to route packet: {e}"
            );
        }
    }

    /// Errors toward the client travel enciphered like any other payload
    /// frame.
    fn send_error(&self, code: u16, message: &str) {
        let mut frame = S2CError::new(0, code, message).to_frame();
        self.gate.crypto.encrypt(&mut frame);
        if let Err(e) = self.session.send(frame) {
            warn!(session = self.session.id(), "failed to send error: {e}");
        }
    }

    async fn handle_login(&mut self, frame: &[u8]) {
        if self.player.is_some() {
            return;
        }

        let msg = match C2SGateLogin::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(session = self.session.id(), "malformed gate login: {e:#}");
                self.send_error(codes::error::LOGIN_FAILED, strings::LOGIN_FAILED);
                return;
            }
        };

        let pc_id = msg.pc_id;
        let username = msg.account.to_str_trimmed();
        let password = msg.password.to_str_trimmed();

        let preauthorized = self
            .gate
            .preauth
            .get(&pc_id)
            .map(|entry| entry.value().clone());
        if preauthorized.is_none() {
            self.send_error(codes::error::LOGIN_FAILED, strings::LOGIN_FAILED);
            return;
        }

        if self.gate.players.contains_key(&pc_id) {
            self.send_error(codes::error::LOGIN_FAILED, strings::ACCOUNT_ALREADY_LOGGED_IN);
            return;
        }

        let account = match self.gate.accounts.get_active(pc_id).await {
            Ok(account) => account,
            Err(e) => {
                warn!(pc_id, "account lookup failed: {e}");
                self.send_error(codes::error::LOGIN_FAILED, strings::LOGIN_FAILED);
                return;
            }
        };

        if account.username != username {
            warn!(pc_id, expected = %account.username, got = %username, "username mismatch");
            self.send_error(codes::error::LOGIN_FAILED, strings::LOGIN_FAILED);
            return;
        }

        if account.is_online {
            self.send_error(codes::error::LOGIN_FAILED, strings::ACCOUNT_ALREADY_LOGGED_IN);
            return;
        }

        if let Err(e) = self.gate.accounts.set_online(pc_id).await {
            warn!(pc_id, "failed to mark account online: {e}");
            self.send_error(codes::error::LOGIN_FAILED, strings::LOGIN_FAILED);
            return;
        }

        self.gate.preauth.remove(&pc_id);

        let player = Player::new(pc_id, username.clone(), Arc::clone(&self.session));
        self.gate.players.insert(pc_id, Arc::clone(&player));
        self.player = Some(player);

        info!(pc_id, %username, "client session started");

        let prepared = Gate2LsPreparedAccLogin::new(&username, pc_id);
        if let Err(e) = self.gate.login_link.send(prepared.to_frame()) {
            warn!(pc_id, "failed to mirror login to broker: {e}");
        }

        let new_client =
            Gate2AsNewClient::new(&username, &password, &self.session.peer_ip(), pc_id);
        if let Err(e) = self
            .gate
            .zones
            .send(ACCOUNT_SERVER_ZONE_ID, new_client.to_frame())
        {
            warn!(pc_id, "failed to hand client to account server: {e}");
        }
    }
}
