//! The reconnecting links to every configured zone (the AccountServer is
//! zone 255). Frames coming back from a zone are delivered to the owning
//! player: the zone-change directive mutates the player's routing, every
//! other frame is enciphered and forwarded to the client.

use std::collections::HashMap;
use std::sync::Arc;

use agonyl_net::{PeerClient, PeerHandler, SendError};
use agonyl_protocol::messages::Gate2ZsConnect;
use agonyl_protocol::{head, Dyn562, FrameDecoder};
use bytes::BytesMut;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::Config;
use crate::player::Player;
use crate::routing;

pub(crate) type Players = Arc<DashMap<u32, Arc<Player>>>;

struct ZoneLinkHandler {
    zone_id: u8,
    agent_id: u8,
    players: Players,
    crypto: Dyn562,
}

#[async_trait::async_trait]
impl PeerHandler<FrameDecoder> for ZoneLinkHandler {
    async fn on_connect(&self, link: &PeerClient<FrameDecoder>) -> anyhow::Result<()> {
        link.send(Gate2ZsConnect::new(self.agent_id).to_frame())?;
        Ok(())
    }

    async fn on_frame(&self, _link: &PeerClient<FrameDecoder>, mut frame: BytesMut) {
        let pc_id = head::frame_pc_id(&frame);
        let Some(player) = self.players.get(&pc_id).map(|p| Arc::clone(&p)) else {
            return;
        };

        if routing::is_zone_change(&frame) {
            let zone_id = frame[10];
            debug!(pc_id, zone_id, "zone change");
            player.set_current_zone(zone_id);
            return;
        }

        self.crypto.encrypt(&mut frame);
        if let Err(e) = player.send(frame.to_vec()) {
            warn!(pc_id, zone = self.zone_id, "failed to forward zone frame: {e}");
        }
    }
}

/// The full set of zone links, keyed by zone id.
pub(crate) struct ZoneLinks {
    links: HashMap<u8, Arc<PeerClient<FrameDecoder>>>,
}

impl ZoneLinks {
    pub(crate) fn new(cfg: &Config) -> Self {
        let mut links = HashMap::new();
        for endpoint in &cfg.zone_servers.0 {
            let name = if endpoint.id == routing::ACCOUNT_SERVER_ZONE_ID {
                "account server".to_owned()
            } else {
                format!("zone server {}", endpoint.id)
            };

            links.insert(endpoint.id, PeerClient::new(name, endpoint.addr()));
        }

        Self { links }
    }

    /// Spawns the supervisor loop of every link.
    pub(crate) fn start(&self, cfg: &Config, players: Players, crypto: Dyn562) {
        for (&zone_id, link) in &self.links {
            let handler = ZoneLinkHandler {
                zone_id,
                agent_id: cfg.server_id,
                players: Arc::clone(&players),
                crypto,
            };

            tokio::spawn(Arc::clone(link).run(handler));
        }
    }

    pub(crate) fn stop(&self) {
        for link in self.links.values() {
            link.stop();
        }
    }

    pub(crate) fn send(&self, zone_id: u8, frame: Vec<u8>) -> Result<(), SendError> {
        match self.links.get(&zone_id) {
            Some(link) => link.send(frame),
            None => Err(SendError::NotConnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use agonyl_net::Session;
    use agonyl_protocol::messages::{S2CError, S2GZoneChange};

    use super::*;

    fn handler_with_player(pc_id: u32) -> (ZoneLinkHandler, Arc<Player>, flume::Receiver<Vec<u8>>) {
        let (session, rx) = Session::detached(1);
        let player = Player::new(pc_id, "alice".to_owned(), session);
        let players: Players = Arc::new(DashMap::new());
        players.insert(pc_id, Arc::clone(&player));

        (
            ZoneLinkHandler {
                zone_id: 0,
                agent_id: 0,
                players,
                crypto: Dyn562::new(0x04C478BD),
            },
            player,
            rx,
        )
    }

    #[tokio::test]
    async fn zone_change_is_consumed_not_forwarded() {
        let (handler, player, rx) = handler_with_player(9);
        let link = PeerClient::<FrameDecoder>::new("zone", "127.0.0.1:1");

        let directive = S2GZoneChange::new(9, 2).to_frame();
        handler
            .on_frame(&link, BytesMut::from(&directive[..]))
            .await;

        assert_eq!(player.current_zone(), 2);
        assert!(rx.try_recv().is_err(), "directive must not reach the client");
    }

    #[tokio::test]
    async fn zone_frames_are_enciphered_before_the_client() {
        let (handler, player, rx) = handler_with_player(9);
        let link = PeerClient::<FrameDecoder>::new("zone", "127.0.0.1:1");

        let plain = S2CError::new(9, 1, "Login failed.").to_frame();
        handler.on_frame(&link, BytesMut::from(&plain[..])).await;

        let mut sent = rx.try_recv().unwrap();
        assert_ne!(sent, plain, "payload must be enciphered");

        Dyn562::new(0x04C478BD).decrypt(&mut sent);
        assert_eq!(sent, plain);
        assert_eq!(player.current_zone(), crate::routing::ACCOUNT_SERVER_ZONE_ID);
    }
}
