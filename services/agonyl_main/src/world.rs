//! The coordinator's in-memory state: every live player globally, and the
//! map → zone binding announced by each zone on connect.

use std::sync::Arc;

use agonyl_net::Session;
use dashmap::DashMap;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PlayerState {
    Login,
    World,
}

/// At-most-one per pcId across the installation.
#[derive(Clone, Debug)]
pub(crate) struct GlobalPlayer {
    pub(crate) pc_id: u32,
    pub(crate) account: String,
    pub(crate) character_name: String,
    pub(crate) client_ip: String,
    pub(crate) map_id: u16,
    pub(crate) zone_id: u8,
    pub(crate) gate_server_id: u8,
    pub(crate) state: PlayerState,
}

pub(crate) struct Zone {
    pub(crate) server_id: u8,
    pub(crate) session: Arc<Session>,
    pub(crate) maps: Vec<u16>,
}

/// Registration and lookup tables. A map binds to exactly one zone per
/// process lifetime; later claims are dropped.
#[derive(Default)]
pub(crate) struct World {
    players: DashMap<u32, GlobalPlayer>,
    map_zones: DashMap<u16, Arc<Zone>>,
    zone_sessions: DashMap<u8, Arc<Zone>>,
}

impl World {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a zone and binds its maps. Repeat announcements from an
    /// already-registered zone are ignored.
    pub(crate) fn register_zone(
        &self,
        server_id: u8,
        session: Arc<Session>,
        maps: Vec<u16>,
    ) -> bool {
        if self.zone_sessions.contains_key(&server_id) {
            return false;
        }

        let zone = Arc::new(Zone {
            server_id,
            session,
            maps: maps.clone(),
        });

        self.zone_sessions.insert(server_id, Arc::clone(&zone));
        for map_id in maps {
            match self.map_zones.entry(map_id) {
                dashmap::mapref::entry::Entry::Vacant(entry) => {
                    entry.insert(Arc::clone(&zone));
                }
                dashmap::mapref::entry::Entry::Occupied(mut existing) => {
                    // The binding belongs to a zone identity, not a session:
                    // the same zone reconnecting refreshes it, a different
                    // zone never steals it.
                    if existing.get().server_id == server_id {
                        existing.insert(Arc::clone(&zone));
                    } else {
                        warn!(
                            map_id,
                            claimed_by = existing.get().server_id,
                            claimant = server_id,
                            "map already bound to a zone; keeping the first binding"
                        );
                    }
                }
            }
        }

        info!(server_id, "zone registered");
        true
    }

    pub(crate) fn unregister_session(&self, server_id: u8) {
        self.zone_sessions.remove(&server_id);
        // Map bindings survive for the process lifetime; a zone that comes
        // back re-announces the same set and is matched by server id.
    }

    pub(crate) fn zone_for_map(&self, map_id: u16) -> Option<Arc<Zone>> {
        self.map_zones.get(&map_id).map(|z| Arc::clone(&z))
    }

    /// Admits a player at character-login time. Fails when the pcId is
    /// already live anywhere.
    pub(crate) fn add_player(&self, player: GlobalPlayer) -> bool {
        match self.players.entry(player.pc_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(player);
                true
            }
        }
    }

    pub(crate) fn player(&self, pc_id: u32) -> Option<GlobalPlayer> {
        self.players.get(&pc_id).map(|p| p.clone())
    }

    pub(crate) fn remove_player(&self, pc_id: u32) -> Option<GlobalPlayer> {
        self.players.remove(&pc_id).map(|(_, p)| p)
    }

    pub(crate) fn set_world_state(&self, pc_id: u32) -> bool {
        match self.players.get_mut(&pc_id) {
            Some(mut player) => {
                player.state = PlayerState::World;
                true
            }
            None => false,
        }
    }

    /// The zone owning the player's current map.
    pub(crate) fn player_zone(&self, pc_id: u32) -> Option<Arc<Zone>> {
        let player = self.players.get(&pc_id)?;
        self.zone_for_map(player.map_id)
    }

    pub(crate) fn player_count(&self) -> usize {
        self.players.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(pc_id: u32, map_id: u16) -> GlobalPlayer {
        GlobalPlayer {
            pc_id,
            account: "alice".to_owned(),
            character_name: "Warr".to_owned(),
            client_ip: "127.0.0.1".to_owned(),
            map_id,
            zone_id: 0,
            gate_server_id: 0,
            state: PlayerState::Login,
        }
    }

    #[test]
    fn repeat_zone_registration_is_ignored() {
        let world = World::new();
        let (session, _rx) = Session::detached(1);

        assert!(world.register_zone(0, Arc::clone(&session), vec![1, 2, 7]));
        assert!(!world.register_zone(0, session, vec![9]));
        assert!(world.zone_for_map(7).is_some());
        assert!(world.zone_for_map(9).is_none());
    }

    #[test]
    fn a_map_binds_to_exactly_one_zone() {
        let world = World::new();
        let (s1, _r1) = Session::detached(1);
        let (s2, _r2) = Session::detached(2);

        world.register_zone(0, s1, vec![7]);
        world.register_zone(1, s2, vec![7, 8]);

        assert_eq!(world.zone_for_map(7).unwrap().server_id, 0);
        assert_eq!(world.zone_for_map(8).unwrap().server_id, 1);
    }

    #[test]
    fn duplicate_players_are_rejected() {
        let world = World::new();
        assert!(world.add_player(player(5, 7)));
        assert!(!world.add_player(player(5, 8)));
        assert_eq!(world.player_count(), 1);
    }

    #[test]
    fn world_login_flips_state_and_routes_by_map() {
        let world = World::new();
        let (session, _rx) = Session::detached(1);
        world.register_zone(2, session, vec![7]);

        assert!(world.add_player(player(5, 7)));
        assert!(world.set_world_state(5));
        assert_eq!(world.player(5).unwrap().state, PlayerState::World);
        assert_eq!(world.player_zone(5).unwrap().server_id, 2);
    }
}
