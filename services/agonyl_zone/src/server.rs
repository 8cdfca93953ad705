//! Gate-facing sessions. A gate introduces itself with its agent id, then
//! streams routed client frames; the world-login handshake is the only one
//! handled inline, everything else goes through the owning zone's queues.

use std::net::SocketAddr;
use std::sync::Arc;

use agonyl_net::{PeerClient, Session, SessionHandler, TcpServer};
use agonyl_protocol::messages::{C2SWorldLogin, S2MWorldLogin, Za2ZsAccLogout};
use agonyl_protocol::{codes, head, FrameDecoder, MsFrameDecoder};
use bytes::BytesMut;
use tracing::{debug, info, warn};

use crate::player::{Players, ZonePlayer};
use crate::zone::PlayerEvent;

pub(crate) struct ZoneServer {
    pub(crate) server: Arc<TcpServer<FrameDecoder>>,
    pub(crate) players: Players,
    main_link: Arc<PeerClient<MsFrameDecoder>>,
}

impl ZoneServer {
    pub(crate) fn new(
        addr: SocketAddr,
        name: String,
        players: Players,
        main_link: Arc<PeerClient<MsFrameDecoder>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            server: TcpServer::new(name, addr),
            players,
            main_link,
        })
    }

    pub(crate) async fn run(self: &Arc<Self>) -> anyhow::Result<()> {
        let shared = Arc::clone(self);
        self.server
            .run(move |session| GateSession {
                shared: Arc::clone(&shared),
                session,
                agent_id: 0,
            })
            .await
    }

    pub(crate) fn stop(&self) {
        self.server.stop();
    }
}

struct GateSession {
    shared: Arc<ZoneServer>,
    session: Arc<Session>,
    agent_id: u8,
}

#[async_trait::async_trait]
impl SessionHandler for GateSession {
    async fn on_frame(&mut self, frame: BytesMut) -> anyhow::Result<()> {
        let ctrl = head::frame_ctrl(&frame);
        let cmd = head::frame_cmd(&frame);

        match (ctrl, cmd) {
            (0x01, 0xE0) => {
                if frame.len() > 10 {
                    self.agent_id = frame[10];
                    info!(agent_id = self.agent_id, "gate server connected");
                }
            }
            (0x01, 0xE2) => self.handle_account_logout(&frame),
            (0x03, _) => self.handle_protocol(&frame),
            _ => {}
        }

        Ok(())
    }

    async fn on_close(&mut self) {
        info!(agent_id = self.agent_id, "gate server disconnected");
    }
}

impl GateSession {
    fn handle_account_logout(&self, frame: &[u8]) {
        let msg = match Za2ZsAccLogout::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("malformed account logout: {e:#}");
                return;
            }
        };

        let Some((_, player)) = self.shared.players.remove(&msg.pc_id) else {
            return;
        };

        if let Some(zone) = player.zone() {
            zone.enqueue_event(PlayerEvent::Logout(msg.pc_id));
        }

        info!(pc_id = msg.pc_id, character = %player.character_name, "player logged out");
    }

    fn handle_protocol(&self, frame: &[u8]) {
        let Some(protocol) = head::frame_protocol(frame) else {
            return;
        };

        if protocol == codes::C2S_WORLD_LOGIN {
            self.handle_world_login(frame);
            return;
        }

        let pc_id = head::frame_pc_id(frame);
        let Some(player) = self.shared.players.get(&pc_id).map(|p| Arc::clone(&p)) else {
            debug!(pc_id, protocol = format!("{protocol:#06x}"), "frame for unknown player");
            return;
        };

        match player.zone() {
            Some(zone) => zone.enqueue_player_packet(frame.to_vec()),
            None => debug!(pc_id, "frame before world login; dropping"),
        }
    }

    /// Step one of the world-login handshake: remember the player as
    /// pending and ask the MainServer to admit it.
    fn handle_world_login(&self, frame: &[u8]) {
        let msg = match C2SWorldLogin::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("malformed world login: {e:#}");
                return;
            }
        };

        let character_name = msg.name.to_str_trimmed();
        let player = ZonePlayer::pending(
            msg.pc_id,
            character_name.clone(),
            Arc::clone(&self.session),
        );
        self.shared.players.insert(msg.pc_id, player);

        debug!(pc_id = msg.pc_id, %character_name, "world login requested");

        let ask = S2MWorldLogin::new(msg.pc_id, &character_name);
        match ask.to_frame() {
            Ok(frame) => {
                if let Err(e) = self.shared.main_link.send(frame) {
                    warn!(pc_id = msg.pc_id, "failed to forward world login: {e}");
                }
            }
            Err(e) => warn!(pc_id = msg.pc_id, "failed to encode world login: {e:#}"),
        }
    }
}
