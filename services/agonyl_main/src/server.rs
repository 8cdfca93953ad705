//! Back-end sessions. Every peer (account server, zones) introduces itself
//! with the 5-byte hello carrying its server id, then speaks the short
//! frame format.

use std::net::SocketAddr;
use std::sync::Arc;

use agonyl_net::{Session, SessionHandler, TcpServer};
use agonyl_protocol::messages::{
    parse_main_server_hello, M2SAnsCharacterLogin, M2SError, M2SWorldLogin, S2MCharacterLogin,
    S2MCharacterLogout, S2MMapList, S2MWorldLogin, MAIN_SERVER_HELLO_LEN,
};
use agonyl_protocol::{codes, Decode, MsFrameDecoder, MsHead};
use agonyl_store::CharacterRepo;
use bytes::BytesMut;
use tracing::{debug, info, warn};

use crate::world::{GlobalPlayer, PlayerState, World};

const PLAYER_ALREADY_LOGGED_IN: &str = "Player already logged in";
const CHARACTER_NOT_FOUND: &str = "Character not found";
const CHARACTER_ZONE_NOT_FOUND: &str = "Character zone not found";

pub(crate) struct MainServer {
    pub(crate) server: Arc<TcpServer<MsFrameDecoder>>,
    pub(crate) world: Arc<World>,
    characters: CharacterRepo,
}

impl MainServer {
    pub(crate) fn new(addr: SocketAddr, characters: CharacterRepo) -> Arc<Self> {
        Arc::new(Self {
            server: TcpServer::with_preamble("main-server", addr, MAIN_SERVER_HELLO_LEN),
            world: Arc::new(World::new()),
            characters,
        })
    }

    pub(crate) async fn run(self: &Arc<Self>) -> anyhow::Result<()> {
        let shared = Arc::clone(self);
        self.server
            .run(move |session| PeerSession {
                shared: Arc::clone(&shared),
                session,
                server_id: 0,
            })
            .await
    }

    pub(crate) fn stop(&self) {
        self.server.stop();
    }
}

struct PeerSession {
    shared: Arc<MainServer>,
    session: Arc<Session>,
    server_id: u8,
}

#[async_trait::async_trait]
impl SessionHandler for PeerSession {
    async fn on_preamble(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.server_id = parse_main_server_hello(bytes)?;
        info!(server_id = self.server_id, "server connected");
        Ok(())
    }

    async fn on_frame(&mut self, frame: BytesMut) -> anyhow::Result<()> {
        let Ok(head) = MsHead::decode(&mut &frame[..]) else {
            return Ok(());
        };

        match head.protocol {
            codes::S2M_MAP_LIST => self.handle_map_list(&frame),
            codes::S2M_CHARACTER_LOGIN => self.handle_character_login(&frame).await,
            codes::S2M_CHARACTER_LOGOUT => self.handle_character_logout(&frame),
            codes::S2M_WORLD_LOGIN => self.handle_world_login(&frame),
            _ => self.route_to_player_zone(head.pc_id, &frame),
        }

        Ok(())
    }

    async fn on_close(&mut self) {
        info!(server_id = self.server_id, "server disconnected");
        self.shared.world.unregister_session(self.server_id);
    }
}

impl PeerSession {
    fn send_error(&self, pc_id: u32, gate_server_id: u8, message: &str) {
        let error = M2SError::new(
            pc_id,
            codes::error::CHARACTER_LOGIN_FAILED,
            message,
            gate_server_id,
        );

        match error.to_frame() {
            Ok(frame) => {
                if let Err(e) = self.session.send(frame) {
                    warn!(pc_id, "failed to send error: {e}");
                }
            }
            Err(e) => warn!(pc_id, "failed to encode error: {e:#}"),
        }
    }

    fn handle_map_list(&self, frame: &[u8]) {
        let msg = match S2MMapList::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(server_id = self.server_id, "malformed map list: {e:#}");
                return;
            }
        };

        let registered = self.shared.world.register_zone(
            self.server_id,
            Arc::clone(&self.session),
            msg.maps.clone(),
        );

        if !registered {
            debug!(server_id = self.server_id, "repeat map list ignored");
        }
    }

    async fn handle_character_login(&self, frame: &[u8]) {
        let msg = match S2MCharacterLogin::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("malformed character login: {e:#}");
                return;
            }
        };

        let pc_id = msg.pc_id;
        let character_name = msg.character_name.to_str_trimmed();

        if self.shared.world.player(pc_id).is_some() {
            self.send_error(pc_id, msg.gate_server_id, PLAYER_ALREADY_LOGGED_IN);
            return;
        }

        let map_id = match self
            .shared
            .characters
            .map_code(pc_id, &character_name)
            .await
        {
            Ok(map_id) => map_id,
            Err(e) => {
                if !e.is_not_found() {
                    warn!(pc_id, "character lookup failed: {e}");
                }

                self.send_error(pc_id, msg.gate_server_id, CHARACTER_NOT_FOUND);
                return;
            }
        };

        let Some(zone) = self.shared.world.zone_for_map(map_id) else {
            self.send_error(pc_id, msg.gate_server_id, CHARACTER_ZONE_NOT_FOUND);
            return;
        };

        let player = GlobalPlayer {
            pc_id,
            account: msg.account.to_str_trimmed(),
            character_name: character_name.clone(),
            client_ip: msg.client_ip.to_str(),
            map_id,
            zone_id: zone.server_id,
            gate_server_id: msg.gate_server_id,
            state: PlayerState::Login,
        };

        if !self.shared.world.add_player(player) {
            self.send_error(pc_id, msg.gate_server_id, PLAYER_ALREADY_LOGGED_IN);
            return;
        }

        info!(pc_id, %character_name, map_id, zone_id = zone.server_id, "character login");

        let answer =
            M2SAnsCharacterLogin::new(pc_id, zone.server_id, map_id, msg.gate_server_id);
        match answer.to_frame() {
            Ok(frame) => {
                if let Err(e) = self.session.send(frame) {
                    warn!(pc_id, "failed to answer character login: {e}");
                }
            }
            Err(e) => warn!(pc_id, "failed to encode character login answer: {e:#}"),
        }
    }

    fn handle_character_logout(&self, frame: &[u8]) {
        let msg = match S2MCharacterLogout::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("malformed character logout: {e:#}");
                return;
            }
        };

        if let Some(player) = self.shared.world.remove_player(msg.pc_id) {
            info!(
                pc_id = msg.pc_id,
                character_name = %player.character_name,
                "character logout"
            );
        }
    }

    fn handle_world_login(&self, frame: &[u8]) {
        let msg = match S2MWorldLogin::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("malformed world login: {e:#}");
                return;
            }
        };

        let pc_id = msg.pc_id;
        let Some(player) = self.shared.world.player(pc_id) else {
            self.send_error(pc_id, msg.gate_server_id, CHARACTER_NOT_FOUND);
            return;
        };

        let Some(zone) = self.shared.world.zone_for_map(player.map_id) else {
            self.send_error(pc_id, player.gate_server_id, CHARACTER_ZONE_NOT_FOUND);
            return;
        };

        self.shared.world.set_world_state(pc_id);
        info!(pc_id, map_id = player.map_id, zone_id = zone.server_id, "world login");

        let grant = M2SWorldLogin::new(pc_id, &player.character_name);
        match grant.to_frame() {
            Ok(frame) => {
                if let Err(e) = zone.session.send(frame) {
                    warn!(pc_id, "failed to grant world login: {e}");
                }
            }
            Err(e) => warn!(pc_id, "failed to encode world login grant: {e:#}"),
        }
    }

    /// Default path for in-world protocols: hand the frame to the zone
    /// owning the player's map.
    fn route_to_player_zone(&self, pc_id: u32, frame: &[u8]) {
        let Some(zone) = self.shared.world.player_zone(pc_id) else {
            debug!(pc_id, "dropping frame for unknown player or unbound zone");
            return;
        };

        if let Err(e) = zone.session.send(frame.to_vec()) {
            warn!(pc_id, zone_id = zone.server_id, "failed to route frame: {e}");
        }
    }
}
