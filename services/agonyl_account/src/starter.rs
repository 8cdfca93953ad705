//! Starter templates for freshly created characters: stats, gear and spawn
//! point per class and starting town. Seven item serials are consumed per
//! creation, one for each starter item.

use agonyl_store::{
    CharacterData, InventoryItem, Location, SocialInfo, Stats, WearItem,
};

pub(crate) const CLASS_WARRIOR: u8 = 0;
pub(crate) const CLASS_HK: u8 = 1;
pub(crate) const CLASS_MAGE: u8 = 2;
pub(crate) const CLASS_ARCHER: u8 = 3;

/// Items per starter template; the serial allocator is asked for exactly
/// this many codes.
pub(crate) const STARTER_ITEM_COUNT: usize = 7;

const TOWN_TEMOZ: u8 = 0;

struct ClassTemplate {
    strength: u16,
    intelligence: u16,
    dexterity: u16,
    vitality: u16,
    mana: u16,
    // Six worn items and one inventory item.
    wear_codes: [u32; 6],
    inventory_code: u32,
}

fn template(class: u8) -> Option<ClassTemplate> {
    match class {
        CLASS_WARRIOR => Some(ClassTemplate {
            strength: 25,
            intelligence: 10,
            dexterity: 15,
            vitality: 20,
            mana: 10,
            wear_codes: [1101, 2101, 2201, 2301, 2401, 2501],
            inventory_code: 416,
        }),
        CLASS_HK => Some(ClassTemplate {
            strength: 20,
            intelligence: 15,
            dexterity: 15,
            vitality: 20,
            mana: 10,
            wear_codes: [1201, 2111, 2211, 2311, 2411, 2511],
            inventory_code: 416,
        }),
        CLASS_MAGE => Some(ClassTemplate {
            strength: 10,
            intelligence: 25,
            dexterity: 15,
            vitality: 15,
            mana: 15,
            wear_codes: [1301, 2121, 2221, 2321, 2421, 2521],
            inventory_code: 417,
        }),
        CLASS_ARCHER => Some(ClassTemplate {
            strength: 15,
            intelligence: 10,
            dexterity: 25,
            vitality: 15,
            mana: 15,
            wear_codes: [1401, 2131, 2231, 2331, 2431, 2531],
            inventory_code: 416,
        }),
        _ => None,
    }
}

fn spawn_point(town: u8) -> Location {
    if town == TOWN_TEMOZ {
        Location {
            map_code: 0,
            x: 110,
            y: 96,
        }
    } else {
        Location {
            map_code: 7,
            x: 106,
            y: 108,
        }
    }
}

/// Builds the data blob of a new character. `serials` must hold
/// [`STARTER_ITEM_COUNT`] fresh item serials.
pub(crate) fn new_character_data(class: u8, town: u8, serials: &[u32]) -> Option<CharacterData> {
    let template = template(class)?;
    if serials.len() < STARTER_ITEM_COUNT {
        return None;
    }

    let wear = template
        .wear_codes
        .iter()
        .zip(serials)
        .map(|(&item_code, &serial)| WearItem {
            item_code,
            item_option: 0,
            item_unique_code: serial,
        })
        .collect();

    let inventory = vec![InventoryItem {
        item_code: template.inventory_code,
        item_option: 0,
        item_unique_code: serials[STARTER_ITEM_COUNT - 1],
        slot: 0,
    }];

    Some(CharacterData {
        social_info: SocialInfo {
            nation: town,
            kh_index: 0,
        },
        wear,
        inventory,
        location: spawn_point(town),
        stats: Stats {
            level: 1,
            experience: 0,
            woonz: 5000,
            remaining_points: 0,
            strength: template.strength,
            intelligence: template.intelligence,
            dexterity: template.dexterity,
            vitality: template.vitality,
            mana: template.mana,
            hp: 100,
            mp: 50,
            hp_capacity: 100,
            mp_capacity: 50,
        },
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERIALS: [u32; 7] = [11, 12, 13, 14, 15, 16, 17];

    #[test]
    fn every_class_has_a_template() {
        for class in [CLASS_WARRIOR, CLASS_HK, CLASS_MAGE, CLASS_ARCHER] {
            let data = new_character_data(class, 0, &SERIALS).unwrap();
            assert_eq!(data.wear.len(), 6);
            assert_eq!(data.inventory.len(), 1);
            assert_eq!(data.stats.level, 1);
        }
    }

    #[test]
    fn unknown_class_is_rejected() {
        assert!(new_character_data(9, 0, &SERIALS).is_none());
    }

    #[test]
    fn serials_are_spread_over_the_items() {
        let data = new_character_data(CLASS_WARRIOR, 0, &SERIALS).unwrap();
        let mut used: Vec<u32> = data
            .wear
            .iter()
            .map(|item| item.item_unique_code)
            .chain(data.inventory.iter().map(|item| item.item_unique_code))
            .collect();
        used.sort_unstable();
        assert_eq!(used, vec![11, 12, 13, 14, 15, 16, 17]);
    }

    #[test]
    fn town_decides_the_spawn_map() {
        let temoz = new_character_data(CLASS_WARRIOR, 0, &SERIALS).unwrap();
        let quanato = new_character_data(CLASS_WARRIOR, 1, &SERIALS).unwrap();
        assert_eq!(temoz.location.map_code, 0);
        assert_eq!(quanato.location.map_code, 7);
        assert_eq!(quanato.social_info.nation, 1);
    }
}
