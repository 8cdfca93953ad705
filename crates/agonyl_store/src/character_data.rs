//! The typed in-memory form of the `character_data` JSON blob. JSON stays
//! at the storage boundary for compatibility with the other consumers of
//! the table; everything in-process works with these records.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterData {
    #[serde(default)]
    pub parole: u32,
    #[serde(default)]
    pub social_info: SocialInfo,
    #[serde(default)]
    pub wear: Vec<WearItem>,
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    #[serde(default)]
    pub lore: u32,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub current_quest: QuestInfo,
    #[serde(default)]
    pub skills: Vec<SkillEntry>,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub npc_favors: Vec<NpcFavor>,
    #[serde(default)]
    pub active_pet: PetData,
    #[serde(default)]
    pub pet_inventory: Vec<PetInventoryItem>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialInfo {
    #[serde(default)]
    pub nation: u8,
    #[serde(default)]
    pub kh_index: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WearItem {
    pub item_code: u32,
    #[serde(default)]
    pub item_option: u32,
    #[serde(default)]
    pub item_unique_code: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub item_code: u32,
    #[serde(default)]
    pub item_option: u32,
    #[serde(default)]
    pub item_unique_code: u32,
    #[serde(default)]
    pub slot: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub map_code: u16,
    #[serde(default)]
    pub x: u8,
    #[serde(default)]
    pub y: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestInfo {
    #[serde(default)]
    pub quest_id: u32,
    #[serde(default)]
    pub step: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillEntry {
    pub skill_code: u32,
    #[serde(default)]
    pub level: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub level: u16,
    #[serde(default)]
    pub experience: u32,
    #[serde(default)]
    pub woonz: u32,
    #[serde(default)]
    pub remaining_points: u16,
    #[serde(default)]
    pub strength: u16,
    #[serde(default)]
    pub intelligence: u16,
    #[serde(default)]
    pub dexterity: u16,
    #[serde(default)]
    pub vitality: u16,
    #[serde(default)]
    pub mana: u16,
    #[serde(default)]
    pub hp: u16,
    #[serde(default)]
    pub mp: u16,
    #[serde(default)]
    pub hp_capacity: u32,
    #[serde(default)]
    pub mp_capacity: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NpcFavor {
    pub npc_id: u16,
    #[serde(default)]
    pub favor: u16,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PetData {
    #[serde(default)]
    pub item_code: u32,
    #[serde(default)]
    pub item_option: u32,
    #[serde(default)]
    pub hp: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PetInventoryItem {
    #[serde(default)]
    pub item_code: u32,
    #[serde(default)]
    pub item_option: u32,
    #[serde(default)]
    pub hp: u32,
    #[serde(default)]
    pub slot: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let data = CharacterData {
            parole: 1,
            social_info: SocialInfo {
                nation: 1,
                kh_index: 0,
            },
            wear: vec![WearItem {
                item_code: 1101,
                item_option: 0,
                item_unique_code: 501,
            }],
            inventory: vec![InventoryItem {
                item_code: 416,
                item_option: 0,
                item_unique_code: 502,
                slot: 0,
            }],
            location: Location {
                map_code: 7,
                x: 110,
                y: 96,
            },
            stats: Stats {
                level: 1,
                woonz: 5000,
                strength: 20,
                ..Default::default()
            },
            ..Default::default()
        };

        let json = serde_json::to_string(&data).unwrap();
        let back: CharacterData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn missing_fields_default() {
        // Blobs written by older tooling may omit whole sections.
        let back: CharacterData =
            serde_json::from_str(r#"{"location": {"map_code": 3}}"#).unwrap();
        assert_eq!(back.location.map_code, 3);
        assert!(back.wear.is_empty());
        assert_eq!(back.stats.level, 0);
    }
}
