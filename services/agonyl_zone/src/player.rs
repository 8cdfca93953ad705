use std::sync::Arc;

use agonyl_data::ItemCatalog;
use agonyl_net::Session;
use agonyl_protocol::messages::{CharacterWear, InventoryEntry, Pet, S2CWorldLogin};
use agonyl_store::Character;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::zone::ZoneHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ZonePlayerState {
    /// World login forwarded to the MainServer, waiting for the grant.
    LoginPending,
    /// Grant received, character loaded; the zone task has not admitted
    /// the player yet.
    LoginSuccess,
    InGame,
}

/// A player owned by this zone process. Born pending on `C2SWorldLogin`,
/// enriched with the character once the MainServer grants the login.
pub(crate) struct ZonePlayer {
    pub(crate) pc_id: u32,
    pub(crate) character_name: String,
    pub(crate) gate_session: Arc<Session>,
    state: Mutex<ZonePlayerState>,
    character: Mutex<Option<Arc<Character>>>,
    zone: Mutex<Option<ZoneHandle>>,
}

impl ZonePlayer {
    pub(crate) fn pending(
        pc_id: u32,
        character_name: String,
        gate_session: Arc<Session>,
    ) -> Arc<Self> {
        Arc::new(Self {
            pc_id,
            character_name,
            gate_session,
            state: Mutex::new(ZonePlayerState::LoginPending),
            character: Mutex::new(None),
            zone: Mutex::new(None),
        })
    }

    pub(crate) fn state(&self) -> ZonePlayerState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: ZonePlayerState) {
        *self.state.lock() = state;
    }

    pub(crate) fn admit(&self, character: Arc<Character>, zone: ZoneHandle) {
        *self.character.lock() = Some(character);
        *self.zone.lock() = Some(zone);
        self.set_state(ZonePlayerState::LoginSuccess);
    }

    pub(crate) fn character(&self) -> Option<Arc<Character>> {
        self.character.lock().clone()
    }

    pub(crate) fn zone(&self) -> Option<ZoneHandle> {
        self.zone.lock().clone()
    }
}

pub(crate) type Players = Arc<DashMap<u32, Arc<ZonePlayer>>>;

/// Builds the world-login block streamed to the client from the stored
/// character, resolving wear slots through the item catalog.
pub(crate) fn world_login_message(
    pc_id: u32,
    character: &Character,
    catalog: &ItemCatalog,
) -> S2CWorldLogin {
    let data = &character.data;
    let mut msg = S2CWorldLogin::new(pc_id, &character.name);

    msg.class = character.class as u8;
    msg.level = data.stats.level;
    msg.exp = data.stats.experience;
    msg.map_index = u32::from(data.location.map_code);
    msg.map_cell = u32::from(data.location.y) << 8 | u32::from(data.location.x);
    msg.pk_count = 0;
    msg.social.nation = data.social_info.nation;
    msg.social.kh_index = data.social_info.kh_index;
    msg.woonz = data.stats.woonz;
    msg.lore = data.lore;
    msg.remaining_points = data.stats.remaining_points;
    msg.strength = data.stats.strength;
    msg.intelligence = data.stats.intelligence;
    msg.dexterity = data.stats.dexterity;
    msg.vitality = data.stats.vitality;
    msg.mana = data.stats.mana;
    msg.hp_capacity = data.stats.hp_capacity;
    msg.mp_capacity = data.stats.mp_capacity;
    msg.hp = data.stats.hp;
    msg.mp = data.stats.mp;
    msg.max_hp = data.stats.hp;
    msg.max_mp = data.stats.mp;

    for (slot, item) in msg.wear.iter_mut().zip(data.wear.iter()) {
        *slot = CharacterWear {
            item_ptr: 0,
            item_code: item.item_code,
            item_option: item.item_option,
            wear_index: u32::from(catalog.slot_index(item.item_code).unwrap_or(0)),
        };
    }

    for (slot, item) in msg.inventory.iter_mut().zip(data.inventory.iter()) {
        *slot = InventoryEntry {
            item_ptr: 0,
            item_code: item.item_code,
            item_option: item.item_option,
            slot: u32::from(item.slot),
        };
    }

    msg.active_pet = Pet {
        item_code: data.active_pet.item_code,
        item_option: data.active_pet.item_option,
        hp: data.active_pet.hp,
    };

    for (slot, pet) in msg.pet_inventory.iter_mut().zip(data.pet_inventory.iter()) {
        *slot = Pet {
            item_code: pet.item_code,
            item_option: pet.item_option,
            hp: pet.hp,
        };
    }

    msg
}

#[cfg(test)]
mod tests {
    use agonyl_store::{CharacterData, Location, Stats, WearItem};

    use super::*;

    #[test]
    fn world_login_block_reflects_the_stored_character() {
        let character = Character {
            id: 9,
            account_id: 5,
            name: "Warr".to_owned(),
            class: 1,
            level: 12,
            data: CharacterData {
                wear: vec![WearItem {
                    item_code: 1101,
                    item_option: 3,
                    item_unique_code: 77,
                }],
                location: Location {
                    map_code: 7,
                    x: 10,
                    y: 2,
                },
                stats: Stats {
                    level: 12,
                    experience: 4000,
                    woonz: 123,
                    hp: 80,
                    mp: 40,
                    ..Default::default()
                },
                ..Default::default()
            },
        };

        let catalog = ItemCatalog::default();
        let msg = world_login_message(5, &character, &catalog);

        assert_eq!(msg.pc_id, 5);
        assert_eq!(msg.character_name.to_str(), "Warr");
        assert_eq!(msg.level, 12);
        assert_eq!(msg.map_index, 7);
        assert_eq!(msg.map_cell, 2 << 8 | 10);
        assert_eq!(msg.woonz, 123);
        assert_eq!(msg.wear[0].item_code, 1101);
        assert_eq!(msg.wear[0].item_option, 3);
        assert_eq!(msg.hp, 80);
    }

    #[test]
    fn pending_players_admit_once_granted() {
        let (session, _rx) = Session::detached(1);
        let player = ZonePlayer::pending(5, "Warr".to_owned(), session);
        assert_eq!(player.state(), ZonePlayerState::LoginPending);
        assert!(player.character().is_none());
        assert!(player.zone().is_none());
    }
}
