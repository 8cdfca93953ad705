//! One zone per map: a single task owning the map state and draining three
//! bounded queues. Producers never block; a full queue drops the packet and
//! logs.

use std::sync::Arc;

use agonyl_data::{ItemCatalog, MapData, NpcData, SpawnData};
use agonyl_protocol::{codes, head};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::player::{world_login_message, Players, ZonePlayerState};

pub(crate) const ZONE_QUEUE_CAPACITY: usize = 4096;

#[derive(Clone, Copy, Debug)]
pub(crate) enum PlayerEvent {
    Login(u32),
    Logout(u32),
}

/// The producer side of a zone. Cheap to clone; owned by players and
/// sessions that feed the zone.
#[derive(Clone)]
pub(crate) struct ZoneHandle {
    pub(crate) map_id: u16,
    events: flume::Sender<PlayerEvent>,
    player_packets: flume::Sender<Vec<u8>>,
    main_packets: flume::Sender<Vec<u8>>,
}

impl ZoneHandle {
    pub(crate) fn enqueue_event(&self, event: PlayerEvent) {
        if self.events.try_send(event).is_err() {
            warn!(map_id = self.map_id, ?event, "event queue full; dropping");
        }
    }

    pub(crate) fn enqueue_player_packet(&self, frame: Vec<u8>) {
        if self.player_packets.try_send(frame).is_err() {
            warn!(map_id = self.map_id, "player packet queue full; dropping");
        }
    }

    pub(crate) fn enqueue_main_packet(&self, frame: Vec<u8>) {
        if self.main_packets.try_send(frame).is_err() {
            warn!(map_id = self.map_id, "main server packet queue full; dropping");
        }
    }
}

/// A spawn point with its NPC record resolved at startup.
pub(crate) struct ResolvedSpawn {
    pub(crate) spawn: SpawnData,
    pub(crate) npc: Option<Arc<NpcData>>,
}

/// The task side of a zone. Owns the map, the spawn table and the set of
/// players currently in the map; nothing else touches these.
pub(crate) struct ZoneTask {
    map_id: u16,
    map_data: MapData,
    spawns: Vec<ResolvedSpawn>,
    catalog: Arc<ItemCatalog>,
    players: Players,
    current_players: Vec<u32>,
    events: flume::Receiver<PlayerEvent>,
    player_packets: flume::Receiver<Vec<u8>>,
    main_packets: flume::Receiver<Vec<u8>>,
    shutdown: watch::Receiver<bool>,
}

pub(crate) fn new_zone(
    map_data: MapData,
    spawns: Vec<ResolvedSpawn>,
    catalog: Arc<ItemCatalog>,
    players: Players,
    shutdown: watch::Receiver<bool>,
) -> (ZoneHandle, ZoneTask) {
    let map_id = map_data.id;
    let (events_tx, events_rx) = flume::bounded(ZONE_QUEUE_CAPACITY);
    let (player_tx, player_rx) = flume::bounded(ZONE_QUEUE_CAPACITY);
    let (main_tx, main_rx) = flume::bounded(ZONE_QUEUE_CAPACITY);

    (
        ZoneHandle {
            map_id,
            events: events_tx,
            player_packets: player_tx,
            main_packets: main_tx,
        },
        ZoneTask {
            map_id,
            map_data,
            spawns,
            catalog,
            players,
            current_players: Vec::new(),
            events: events_rx,
            player_packets: player_rx,
            main_packets: main_rx,
            shutdown,
        },
    )
}

impl ZoneTask {
    pub(crate) async fn run(mut self) {
        let monsters = self
            .spawns
            .iter()
            .filter(|s| s.spawn.is_monster() && s.npc.is_some())
            .count();

        info!(
            map_id = self.map_id,
            map = %self.map_data.name,
            spawns = self.spawns.len(),
            monsters,
            "zone started"
        );

        // Receivers are pulled out so the select arms don't hold borrows of
        // `self` while the handlers mutate zone state.
        let events = self.events.clone();
        let player_packets = self.player_packets.clone();
        let main_packets = self.main_packets.clone();
        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = events.recv_async() => match event {
                    Ok(event) => self.handle_event(event),
                    Err(_) => break,
                },
                frame = player_packets.recv_async() => match frame {
                    Ok(frame) => self.handle_player_packet(&frame),
                    Err(_) => break,
                },
                frame = main_packets.recv_async() => match frame {
                    Ok(frame) => self.handle_main_packet(&frame),
                    Err(_) => break,
                },
            }
        }

        info!(map_id = self.map_id, "zone stopped");
    }

    fn handle_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Login(pc_id) => self.admit_player(pc_id),
            PlayerEvent::Logout(pc_id) => {
                self.current_players.retain(|&id| id != pc_id);
                debug!(map_id = self.map_id, pc_id, "player left zone");
            }
        }
    }

    fn admit_player(&mut self, pc_id: u32) {
        let Some(player) = self.players.get(&pc_id).map(|p| Arc::clone(&p)) else {
            warn!(map_id = self.map_id, pc_id, "login event for unknown player");
            return;
        };

        let Some(character) = player.character() else {
            warn!(map_id = self.map_id, pc_id, "login event without character");
            return;
        };

        let msg = world_login_message(pc_id, &character, &self.catalog);
        if let Err(e) = player.gate_session.send(msg.to_frame()) {
            warn!(map_id = self.map_id, pc_id, "failed to send world login: {e}");
            return;
        }

        player.set_state(ZonePlayerState::InGame);
        if !self.current_players.contains(&pc_id) {
            self.current_players.push(pc_id);
        }

        info!(
            map_id = self.map_id,
            pc_id,
            character = %character.name,
            "player entered zone"
        );
    }

    fn handle_player_packet(&mut self, frame: &[u8]) {
        let pc_id = head::frame_pc_id(frame);
        let Some(protocol) = head::frame_protocol(frame) else {
            return;
        };

        match protocol {
            codes::C2S_PING => {
                trace!(map_id = self.map_id, pc_id, "ping");
            }
            other => {
                // Simulation protocols land here as they are implemented.
                debug!(
                    map_id = self.map_id,
                    pc_id,
                    protocol = format!("{other:#06x}"),
                    "unhandled gameplay packet"
                );
            }
        }
    }

    fn handle_main_packet(&mut self, frame: &[u8]) {
        let pc_id = head::frame_pc_id(frame);
        debug!(
            map_id = self.map_id,
            pc_id,
            len = frame.len(),
            "unhandled main server packet"
        );
    }
}
