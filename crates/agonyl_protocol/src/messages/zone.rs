//! The world-login block a zone sends to the client once the MainServer
//! admits the character.

use std::io::Write;

use super::{begin_long, finish, protocol_body};
use crate::head::frame_pc_id;
use crate::messages::CharacterWear;
use crate::{codes, Decode, Encode, FixedStr};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SkillInfo {
    pub mastery: [u8; 2],
    pub skills: [u32; 6],
}

impl Encode for SkillInfo {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        self.mastery.encode(&mut w)?;
        self.skills.encode(&mut w)?;
        Ok(())
    }
}

impl Decode for SkillInfo {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        Ok(Self {
            mastery: <[u8; 2]>::decode(r)?,
            skills: <[u32; 6]>::decode(r)?,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SocialInfo {
    pub nation: u8,
    pub kh_index: u8,
    pub clan_id: u32,
    pub clan_rank: u8,
    pub reserved: u8,
}

impl Encode for SocialInfo {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        self.nation.encode(&mut w)?;
        self.kh_index.encode(&mut w)?;
        self.clan_id.encode(&mut w)?;
        self.clan_rank.encode(&mut w)?;
        self.reserved.encode(&mut w)?;
        Ok(())
    }
}

impl Decode for SocialInfo {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        Ok(Self {
            nation: u8::decode(r)?,
            kh_index: u8::decode(r)?,
            clan_id: u32::decode(r)?,
            clan_rank: u8::decode(r)?,
            reserved: u8::decode(r)?,
        })
    }
}

/// One inventory cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InventoryEntry {
    pub item_ptr: u32,
    pub item_code: u32,
    pub item_option: u32,
    pub slot: u32,
}

impl Encode for InventoryEntry {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        self.item_ptr.encode(&mut w)?;
        self.item_code.encode(&mut w)?;
        self.item_option.encode(&mut w)?;
        self.slot.encode(&mut w)?;
        Ok(())
    }
}

impl Decode for InventoryEntry {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        Ok(Self {
            item_ptr: u32::decode(r)?,
            item_code: u32::decode(r)?,
            item_option: u32::decode(r)?,
            slot: u32::decode(r)?,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pet {
    pub item_code: u32,
    pub item_option: u32,
    pub hp: u32,
}

impl Encode for Pet {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        self.item_code.encode(&mut w)?;
        self.item_option.encode(&mut w)?;
        self.hp.encode(&mut w)?;
        Ok(())
    }
}

impl Decode for Pet {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        Ok(Self {
            item_code: u32::decode(r)?,
            item_option: u32::decode(r)?,
            hp: u32::decode(r)?,
        })
    }
}

/// `(0x03, 0xFF)` protocol `0x1107`: the full character state streamed to
/// the client when it enters the world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S2CWorldLogin {
    pub pc_id: u32,
    pub character_name: FixedStr<21>,
    pub class: u8,
    pub level: u16,
    pub exp: u32,
    pub map_index: u32,
    pub map_cell: u32,
    pub skill: SkillInfo,
    pub pk_count: u32,
    pub rtime: u32,
    pub social: SocialInfo,
    pub woonz: u32,
    pub hp_store: u32,
    pub mp_store: u32,
    pub lore: u32,
    pub remaining_points: u16,
    pub strength: u16,
    pub intelligence: u16,
    pub dexterity: u16,
    pub vitality: u16,
    pub mana: u16,
    pub hp_capacity: u32,
    pub mp_capacity: u32,
    pub hp: u16,
    pub mp: u16,
    pub hit_attack: u16,
    pub magic_attack: u16,
    pub defense: u16,
    pub fire_attack: u16,
    pub fire_defense: u16,
    pub ice_attack: u16,
    pub ice_defense: u16,
    pub light_attack: u16,
    pub light_defense: u16,
    pub max_hp: u16,
    pub max_mp: u16,
    pub additional_hit_attack: u16,
    pub additional_magic_attack: u16,
    pub reserved: u16,
    pub wear: [CharacterWear; 10],
    pub inventory: [InventoryEntry; 30],
    pub active_pet: Pet,
    pub pet_inventory: [Pet; 5],
}

impl S2CWorldLogin {
    pub fn new(pc_id: u32, character_name: &str) -> Self {
        Self {
            pc_id,
            character_name: character_name.into(),
            class: 0,
            level: 0,
            exp: 0,
            map_index: 0,
            map_cell: 0,
            skill: SkillInfo::default(),
            pk_count: 0,
            rtime: 0,
            social: SocialInfo::default(),
            woonz: 0,
            hp_store: 0,
            mp_store: 0,
            lore: 0,
            remaining_points: 0,
            strength: 0,
            intelligence: 0,
            dexterity: 0,
            vitality: 0,
            mana: 0,
            hp_capacity: 0,
            mp_capacity: 0,
            hp: 0,
            mp: 0,
            hit_attack: 0,
            magic_attack: 0,
            defense: 0,
            fire_attack: 0,
            fire_defense: 0,
            ice_attack: 0,
            ice_defense: 0,
            light_attack: 0,
            light_defense: 0,
            max_hp: 0,
            max_mp: 0,
            additional_hit_attack: 0,
            additional_magic_attack: 0,
            reserved: 0,
            wear: [CharacterWear::default(); 10],
            inventory: [InventoryEntry::default(); 30],
            active_pet: Pet::default(),
            pet_inventory: [Pet::default(); 5],
        }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(self.pc_id, 0x03, 0xFF);
        codes::S2C_WORLD_LOGIN.encode(&mut buf).unwrap();
        self.encode_body(&mut buf).unwrap();
        finish(buf)
    }

    fn encode_body(&self, mut w: impl Write) -> anyhow::Result<()> {
        self.character_name.encode(&mut w)?;
        self.class.encode(&mut w)?;
        self.level.encode(&mut w)?;
        self.exp.encode(&mut w)?;
        self.map_index.encode(&mut w)?;
        self.map_cell.encode(&mut w)?;
        self.skill.encode(&mut w)?;
        self.pk_count.encode(&mut w)?;
        self.rtime.encode(&mut w)?;
        self.social.encode(&mut w)?;
        self.woonz.encode(&mut w)?;
        self.hp_store.encode(&mut w)?;
        self.mp_store.encode(&mut w)?;
        self.lore.encode(&mut w)?;
        self.remaining_points.encode(&mut w)?;
        self.strength.encode(&mut w)?;
        self.intelligence.encode(&mut w)?;
        self.dexterity.encode(&mut w)?;
        self.vitality.encode(&mut w)?;
        self.mana.encode(&mut w)?;
        self.hp_capacity.encode(&mut w)?;
        self.mp_capacity.encode(&mut w)?;
        self.hp.encode(&mut w)?;
        self.mp.encode(&mut w)?;
        self.hit_attack.encode(&mut w)?;
        self.magic_attack.encode(&mut w)?;
        self.defense.encode(&mut w)?;
        self.fire_attack.encode(&mut w)?;
        self.fire_defense.encode(&mut w)?;
        self.ice_attack.encode(&mut w)?;
        self.ice_defense.encode(&mut w)?;
        self.light_attack.encode(&mut w)?;
        self.light_defense.encode(&mut w)?;
        self.max_hp.encode(&mut w)?;
        self.max_mp.encode(&mut w)?;
        self.additional_hit_attack.encode(&mut w)?;
        self.additional_magic_attack.encode(&mut w)?;
        self.reserved.encode(&mut w)?;
        self.wear.encode(&mut w)?;
        self.inventory.encode(&mut w)?;
        self.active_pet.encode(&mut w)?;
        self.pet_inventory.encode(&mut w)?;
        Ok(())
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = protocol_body(frame, codes::S2C_WORLD_LOGIN)?;
        let mut msg = Self::new(frame_pc_id(frame), "");
        msg.character_name = FixedStr::decode(&mut r)?;
        msg.class = u8::decode(&mut r)?;
        msg.level = u16::decode(&mut r)?;
        msg.exp = u32::decode(&mut r)?;
        msg.map_index = u32::decode(&mut r)?;
        msg.map_cell = u32::decode(&mut r)?;
        msg.skill = SkillInfo::decode(&mut r)?;
        msg.pk_count = u32::decode(&mut r)?;
        msg.rtime = u32::decode(&mut r)?;
        msg.social = SocialInfo::decode(&mut r)?;
        msg.woonz = u32::decode(&mut r)?;
        msg.hp_store = u32::decode(&mut r)?;
        msg.mp_store = u32::decode(&mut r)?;
        msg.lore = u32::decode(&mut r)?;
        msg.remaining_points = u16::decode(&mut r)?;
        msg.strength = u16::decode(&mut r)?;
        msg.intelligence = u16::decode(&mut r)?;
        msg.dexterity = u16::decode(&mut r)?;
        msg.vitality = u16::decode(&mut r)?;
        msg.mana = u16::decode(&mut r)?;
        msg.hp_capacity = u32::decode(&mut r)?;
        msg.mp_capacity = u32::decode(&mut r)?;
        msg.hp = u16::decode(&mut r)?;
        msg.mp = u16::decode(&mut r)?;
        msg.hit_attack = u16::decode(&mut r)?;
        msg.magic_attack = u16::decode(&mut r)?;
        msg.defense = u16::decode(&mut r)?;
        msg.fire_attack = u16::decode(&mut r)?;
        msg.fire_defense = u16::decode(&mut r)?;
        msg.ice_attack = u16::decode(&mut r)?;
        msg.ice_defense = u16::decode(&mut r)?;
        msg.light_attack = u16::decode(&mut r)?;
        msg.light_defense = u16::decode(&mut r)?;
        msg.max_hp = u16::decode(&mut r)?;
        msg.max_mp = u16::decode(&mut r)?;
        msg.additional_hit_attack = u16::decode(&mut r)?;
        msg.additional_magic_attack = u16::decode(&mut r)?;
        msg.reserved = u16::decode(&mut r)?;
        msg.wear = <[CharacterWear; 10]>::decode(&mut r)?;
        msg.inventory = <[InventoryEntry; 30]>::decode(&mut r)?;
        msg.active_pet = Pet::decode(&mut r)?;
        msg.pet_inventory = <[Pet; 5]>::decode(&mut r)?;
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_login_round_trip() {
        let mut msg = S2CWorldLogin::new(77, "Warr");
        msg.class = 1;
        msg.level = 12;
        msg.woonz = 5000;
        msg.social.nation = 1;
        msg.wear[0] = CharacterWear {
            item_ptr: 0,
            item_code: 1101,
            item_option: 0,
            wear_index: 0,
        };
        msg.inventory[3] = InventoryEntry {
            item_ptr: 0,
            item_code: 416,
            item_option: 0,
            slot: 3,
        };

        let frame = msg.to_frame();
        assert_eq!(
            u32::from_le_bytes(frame[..4].try_into().unwrap()) as usize,
            frame.len()
        );
        assert_eq!(S2CWorldLogin::from_frame(&frame).unwrap(), msg);
    }
}
