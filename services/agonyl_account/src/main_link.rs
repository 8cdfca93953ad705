//! The reconnecting link to the MainServer. Answers to the character-login
//! handshake come back here and are turned into zone-change directives for
//! the owning gate.

use agonyl_net::{PeerClient, PeerHandler};
use agonyl_protocol::messages::{
    main_server_hello, M2SAnsCharacterLogin, M2SError, S2CError, S2GZoneChange,
};
use agonyl_protocol::{codes, Decode, MsFrameDecoder, MsHead};
use bytes::BytesMut;
use tracing::{debug, warn};

use crate::players::Players;

pub(crate) struct MainLinkHandler {
    server_id: u8,
    players: Players,
}

impl MainLinkHandler {
    pub(crate) fn new(server_id: u8, players: Players) -> Self {
        Self { server_id, players }
    }
}

#[async_trait::async_trait]
impl PeerHandler<MsFrameDecoder> for MainLinkHandler {
    async fn on_connect(&self, link: &PeerClient<MsFrameDecoder>) -> anyhow::Result<()> {
        link.send(main_server_hello(self.server_id).to_vec())?;
        Ok(())
    }

    async fn on_frame(&self, _link: &PeerClient<MsFrameDecoder>, frame: BytesMut) {
        let Ok(head) = MsHead::decode(&mut &frame[..]) else {
            return;
        };

        match head.protocol {
            codes::M2S_ERROR => self.handle_error(&frame),
            codes::S2M_CHARACTER_LOGIN => self.handle_ans_character_login(&frame),
            other => debug!(protocol = format!("{other:#06x}"), "unhandled main server frame"),
        }
    }
}

impl MainLinkHandler {
    fn handle_error(&self, frame: &[u8]) {
        let msg = match M2SError::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("malformed main server error: {e:#}");
                return;
            }
        };

        let Some(player) = self.players.get(&msg.pc_id).map(|p| p.clone()) else {
            return;
        };

        let error = S2CError::new(msg.pc_id, msg.code, &msg.message.to_str());
        if let Err(e) = player.gate_session.send(error.to_frame()) {
            warn!(pc_id = msg.pc_id, "failed to relay main server error: {e}");
        }
    }

    fn handle_ans_character_login(&self, frame: &[u8]) {
        let msg = match M2SAnsCharacterLogin::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("malformed character login answer: {e:#}");
                return;
            }
        };

        let Some(player) = self.players.get(&msg.pc_id).map(|p| p.clone()) else {
            return;
        };

        debug!(
            pc_id = msg.pc_id,
            zone_id = msg.zone_id,
            map_id = msg.map_id,
            "character placed; rerouting gate"
        );

        let directive = S2GZoneChange::new(msg.pc_id, msg.zone_id);
        if let Err(e) = player.gate_session.send(directive.to_frame()) {
            warn!(pc_id = msg.pc_id, "failed to send zone change: {e}");
        }
    }
}
