//! The reconnecting link to the MainServer. Announces the zone's maps once
//! per connection and completes the world-login handshake.

use std::sync::Arc;

use agonyl_net::{PeerClient, PeerHandler};
use agonyl_protocol::messages::{
    main_server_hello, M2SError, M2SWorldLogin, S2CError, S2MMapList,
};
use agonyl_protocol::{codes, Decode, MsFrameDecoder, MsHead};
use agonyl_store::CharacterRepo;
use bytes::BytesMut;
use tracing::{debug, info, warn};

use crate::manager::ZoneManager;
use crate::player::Players;

pub(crate) struct MainLinkHandler {
    server_id: u8,
    players: Players,
    manager: Arc<ZoneManager>,
    characters: CharacterRepo,
}

impl MainLinkHandler {
    pub(crate) fn new(
        server_id: u8,
        players: Players,
        manager: Arc<ZoneManager>,
        characters: CharacterRepo,
    ) -> Self {
        Self {
            server_id,
            players,
            manager,
            characters,
        }
    }
}

#[async_trait::async_trait]
impl PeerHandler<MsFrameDecoder> for MainLinkHandler {
    async fn on_connect(&self, link: &PeerClient<MsFrameDecoder>) -> anyhow::Result<()> {
        link.send(main_server_hello(self.server_id).to_vec())?;

        // The map binding is announced exactly once per connection.
        let maps = self.manager.maps();
        info!(?maps, "announcing map list");
        link.send(S2MMapList::new(maps).to_frame()?)?;
        Ok(())
    }

    async fn on_frame(&self, _link: &PeerClient<MsFrameDecoder>, frame: BytesMut) {
        let Ok(head) = MsHead::decode(&mut &frame[..]) else {
            return;
        };

        match head.protocol {
            codes::M2S_WORLD_LOGIN => self.handle_world_login_grant(&frame).await,
            codes::M2S_ERROR => self.handle_error(&frame),
            other => {
                // Anything else is per-player traffic for the owning zone.
                self.route_to_zone(head.pc_id, &frame, other);
            }
        }
    }
}

impl MainLinkHandler {
    /// Step two of the world-login handshake: the MainServer admitted the
    /// player; load the character and hand the login to the owning zone.
    async fn handle_world_login_grant(&self, frame: &[u8]) {
        let msg = match M2SWorldLogin::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("malformed world login grant: {e:#}");
                return;
            }
        };

        let pc_id = msg.pc_id;
        let Some(player) = self.players.get(&pc_id).map(|p| Arc::clone(&p)) else {
            warn!(pc_id, "world login grant for unknown player");
            return;
        };

        let character_name = msg.character_name.to_str_trimmed();
        let character = match self.characters.get(pc_id, &character_name).await {
            Ok(character) => Arc::new(character),
            Err(e) => {
                // A malformed data blob surfaces the same way as a missing
                // row: the character cannot enter the world.
                if !e.is_not_found() {
                    warn!(pc_id, %character_name, "character load failed: {e}");
                }

                let error = S2CError::new(
                    pc_id,
                    codes::error::CHARACTER_NOT_FOUND,
                    agonyl_protocol::strings::CHARACTER_NOT_FOUND,
                );
                if let Err(e) = player.gate_session.send(error.to_frame()) {
                    warn!(pc_id, "failed to send error: {e}");
                }
                return;
            }
        };

        let map_code = character.data.location.map_code;
        let Some(zone) = self.manager.zone_for_map(map_code) else {
            warn!(pc_id, map_code, "no zone for the character's map");
            return;
        };

        debug!(pc_id, %character_name, map_code, "world login granted");

        player.admit(character, zone.clone());
        zone.enqueue_event(crate::zone::PlayerEvent::Login(pc_id));
    }

    fn handle_error(&self, frame: &[u8]) {
        let msg = match M2SError::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("malformed main server error: {e:#}");
                return;
            }
        };

        let Some(player) = self.players.get(&msg.pc_id).map(|p| Arc::clone(&p)) else {
            return;
        };

        let error = S2CError::new(msg.pc_id, msg.code, &msg.message.to_str());
        if let Err(e) = player.gate_session.send(error.to_frame()) {
            warn!(pc_id = msg.pc_id, "failed to relay error: {e}");
        }
    }

    fn route_to_zone(&self, pc_id: u32, frame: &[u8], protocol: u16) {
        let Some(player) = self.players.get(&pc_id).map(|p| Arc::clone(&p)) else {
            debug!(pc_id, protocol = format!("{protocol:#06x}"), "frame for unknown player");
            return;
        };

        match player.zone() {
            Some(zone) => zone.enqueue_main_packet(frame.to_vec()),
            None => debug!(pc_id, "main server frame before admission; dropping"),
        }
    }
}
