//! NPC stat records, one fixed-layout struct per file.

use std::io::Read;
use std::path::Path;

use byteorder::{ReadBytesExt, LE};

use crate::{read_fixed_name, DataError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NpcAttack {
    pub range: u8,
    pub area: u8,
    pub damage: u16,
    pub additional_damage: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NpcData {
    pub name: String,
    pub id: u16,
    pub respawn_rate: u16,
    pub attack_type_info: u8,
    pub target_selection_info: u8,
    pub defense: u8,
    pub additional_defense: u8,
    pub attacks: [NpcAttack; 3],
    pub attack_speed_low: u16,
    pub attack_speed_high: u16,
    pub attack_speed: u16,
    pub level: u8,
    pub player_exp: u16,
    pub appearance: u8,
    pub hp: u32,
    pub blue_attack_defense: u16,
    pub red_attack_defense: u16,
    pub grey_attack_defense: u16,
    pub mercenary_exp: u16,
}

impl NpcData {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, DataError> {
        let mut r = bytes;

        let mut name = [0_u8; 0x14];
        r.read_exact(&mut name)?;

        let id = r.read_u16::<LE>()?;
        let respawn_rate = r.read_u16::<LE>()?;
        let attack_type_info = r.read_u8()?;
        let target_selection_info = r.read_u8()?;
        let defense = r.read_u8()?;
        let additional_defense = r.read_u8()?;

        let mut attacks = [NpcAttack::default(); 3];
        for attack in &mut attacks {
            attack.range = r.read_u8()?;
            attack.area = r.read_u8()?;
            attack.damage = r.read_u16::<LE>()?;
            attack.additional_damage = r.read_u16::<LE>()?;
        }

        Ok(Self {
            name: read_fixed_name(&name),
            id,
            respawn_rate,
            attack_type_info,
            target_selection_info,
            defense,
            additional_defense,
            attacks,
            attack_speed_low: r.read_u16::<LE>()?,
            attack_speed_high: r.read_u16::<LE>()?,
            attack_speed: r.read_u16::<LE>()?,
            level: r.read_u8()?,
            player_exp: r.read_u16::<LE>()?,
            appearance: r.read_u8()?,
            hp: r.read_u32::<LE>()?,
            blue_attack_defense: r.read_u16::<LE>()?,
            red_attack_defense: r.read_u16::<LE>()?,
            grey_attack_defense: r.read_u16::<LE>()?,
            mercenary_exp: r.read_u16::<LE>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_record() {
        let mut buf = Vec::new();
        let mut name = [0_u8; 0x14];
        name[..4].copy_from_slice(b"Wolf");
        buf.extend_from_slice(&name);
        buf.extend_from_slice(&101_u16.to_le_bytes()); // id
        buf.extend_from_slice(&30_u16.to_le_bytes()); // respawn
        buf.extend_from_slice(&[1, 0, 5, 2]); // attack/target/defense
        for _ in 0..3 {
            buf.push(1); // range
            buf.push(0); // area
            buf.extend_from_slice(&12_u16.to_le_bytes());
            buf.extend_from_slice(&3_u16.to_le_bytes());
        }
        buf.extend_from_slice(&10_u16.to_le_bytes());
        buf.extend_from_slice(&20_u16.to_le_bytes());
        buf.extend_from_slice(&15_u16.to_le_bytes());
        buf.push(4); // level
        buf.extend_from_slice(&55_u16.to_le_bytes());
        buf.push(1); // appearance
        buf.extend_from_slice(&300_u32.to_le_bytes());
        buf.extend_from_slice(&1_u16.to_le_bytes());
        buf.extend_from_slice(&2_u16.to_le_bytes());
        buf.extend_from_slice(&3_u16.to_le_bytes());
        buf.extend_from_slice(&9_u16.to_le_bytes());

        let npc = NpcData::parse(&buf).unwrap();
        assert_eq!(npc.name, "Wolf");
        assert_eq!(npc.id, 101);
        assert_eq!(npc.attacks[0].damage, 12);
        assert_eq!(npc.hp, 300);
        assert_eq!(npc.mercenary_exp, 9);
    }
}
