//! The item catalog. Four table files cover the item kinds: IT0 holds
//! weapons with ten per-level property rows (IT0Ex extends them with five
//! more), IT1 wearables, IT2 skill books and IT3 plain goods.

use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::path::Path;

use byteorder::{ReadBytesExt, LE};
use tracing::info;

use crate::{read_fixed_name, DataError};

/// One upgrade level of an IT0 item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ItemLevel {
    pub additional_attribute: u16,
    pub strength: u16,
    pub dexterity: u16,
    pub intelligence: u16,
    pub attribute: u16,
    pub range: u16,
    pub blue_option: u16,
    pub red_option: u16,
    pub grey_option: u16,
}

impl ItemLevel {
    fn read(r: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            additional_attribute: r.read_u16::<LE>()?,
            strength: r.read_u16::<LE>()?,
            dexterity: r.read_u16::<LE>()?,
            intelligence: r.read_u16::<LE>()?,
            attribute: r.read_u16::<LE>()?,
            range: r.read_u16::<LE>()?,
            blue_option: r.read_u16::<LE>()?,
            red_option: r.read_u16::<LE>()?,
            grey_option: r.read_u16::<LE>()?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemProperties {
    /// IT0: leveled weapons.
    Weapon { levels: Vec<ItemLevel> },
    /// IT1: armor and accessories.
    Wearable {
        required_level: u16,
        attribute: u16,
        red_option: u16,
        grey_option: u16,
        blue_option: u16,
    },
    /// IT2: skill books.
    Skill {
        required_level: u16,
        skill_level: u16,
    },
    /// IT3: potions, quest goods, everything else.
    Plain,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    pub item_code: u32,
    pub slot_index: u8,
    pub name: String,
    pub kind: u8,
    pub npc_price: u32,
    pub properties: ItemProperties,
}

/// `itemCode → Item`, loaded once at startup and shared read-only.
#[derive(Debug, Default)]
pub struct ItemCatalog {
    items: HashMap<u32, Item>,
}

impl ItemCatalog {
    /// Loads the catalog from a directory containing the `IT0`, `IT0Ex`,
    /// `IT1`, `IT2` and `IT3` table files.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, DataError> {
        let dir = dir.as_ref();
        let mut catalog = Self::default();

        catalog.load_it0(&std::fs::read(dir.join("IT0"))?)?;
        catalog.load_it0ex(&std::fs::read(dir.join("IT0Ex"))?)?;
        catalog.load_it1(&std::fs::read(dir.join("IT1"))?)?;
        catalog.load_it2(&std::fs::read(dir.join("IT2"))?)?;
        catalog.load_it3(&std::fs::read(dir.join("IT3"))?)?;

        info!(items = catalog.items.len(), "item catalog loaded");
        Ok(catalog)
    }

    pub fn get(&self, item_code: u32) -> Option<&Item> {
        self.items.get(&item_code)
    }

    /// The wear-slot index the client expects for this item, when known.
    pub fn slot_index(&self, item_code: u32) -> Option<u8> {
        self.items.get(&item_code).map(|item| item.slot_index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn load_it0(&mut self, bytes: &[u8]) -> Result<(), DataError> {
        let mut r = bytes;
        loop {
            match r.read_u16::<LE>() {
                Ok(_unknown) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e.into()),
            }

            let row = r.read_u16::<LE>()?;
            let slot = r.read_u16::<LE>()?;
            let kind = r.read_u16::<LE>()?;
            let mut name = [0_u8; 32];
            r.read_exact(&mut name)?;
            let npc_price = r.read_u32::<LE>()?;
            let mut skip = [0_u8; 18];
            r.read_exact(&mut skip)?;

            let mut levels = Vec::with_capacity(10);
            for _ in 0..10 {
                levels.push(ItemLevel::read(&mut r)?);
            }

            self.items.insert(
                u32::from(row),
                Item {
                    item_code: u32::from(row),
                    slot_index: slot as u8,
                    name: read_fixed_name(&name),
                    kind: kind as u8,
                    npc_price,
                    properties: ItemProperties::Weapon { levels },
                },
            );
        }
    }

    pub(crate) fn load_it0ex(&mut self, bytes: &[u8]) -> Result<(), DataError> {
        let mut r = bytes;
        loop {
            let row = match r.read_u16::<LE>() {
                Ok(row) => row,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e.into()),
            };

            let mut extra = Vec::with_capacity(5);
            for _ in 0..5 {
                extra.push(ItemLevel::read(&mut r)?);
            }

            if let Some(item) = self.items.get_mut(&u32::from(row)) {
                if let ItemProperties::Weapon { levels } = &mut item.properties {
                    levels.extend(extra);
                }
            }
        }
    }

    pub(crate) fn load_it1(&mut self, bytes: &[u8]) -> Result<(), DataError> {
        let mut r = bytes;
        loop {
            let row = match r.read_u16::<LE>() {
                Ok(row) => row,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e.into()),
            };

            let slot = r.read_u16::<LE>()?;
            let kind = r.read_u16::<LE>()?;
            let mut name = [0_u8; 32];
            r.read_exact(&mut name)?;
            let npc_price = r.read_u32::<LE>()?;

            self.items.insert(
                u32::from(row),
                Item {
                    item_code: u32::from(row),
                    slot_index: slot as u8,
                    name: read_fixed_name(&name),
                    kind: kind as u8,
                    npc_price,
                    properties: ItemProperties::Wearable {
                        required_level: r.read_u16::<LE>()?,
                        attribute: r.read_u16::<LE>()?,
                        red_option: r.read_u16::<LE>()?,
                        grey_option: r.read_u16::<LE>()?,
                        blue_option: r.read_u16::<LE>()?,
                    },
                },
            );
        }
    }

    pub(crate) fn load_it2(&mut self, bytes: &[u8]) -> Result<(), DataError> {
        let mut r = bytes;
        loop {
            let row = match r.read_u16::<LE>() {
                Ok(row) => row,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e.into()),
            };

            let slot = r.read_u16::<LE>()?;
            let kind = r.read_u16::<LE>()?;
            let mut name = [0_u8; 32];
            r.read_exact(&mut name)?;
            let npc_price = r.read_u32::<LE>()?;

            self.items.insert(
                u32::from(row),
                Item {
                    item_code: u32::from(row),
                    slot_index: slot as u8,
                    name: read_fixed_name(&name),
                    kind: kind as u8,
                    npc_price,
                    properties: ItemProperties::Skill {
                        required_level: r.read_u16::<LE>()?,
                        skill_level: r.read_u16::<LE>()?,
                    },
                },
            );
        }
    }

    pub(crate) fn load_it3(&mut self, bytes: &[u8]) -> Result<(), DataError> {
        let mut r = bytes;
        loop {
            let row = match r.read_u16::<LE>() {
                Ok(row) => row,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e.into()),
            };

            let slot = r.read_u16::<LE>()?;
            let kind = r.read_u16::<LE>()?;
            let mut name = [0_u8; 32];
            r.read_exact(&mut name)?;
            let npc_price = r.read_u32::<LE>()?;

            self.items.insert(
                u32::from(row),
                Item {
                    item_code: u32::from(row),
                    slot_index: slot as u8,
                    name: read_fixed_name(&name),
                    kind: kind as u8,
                    npc_price,
                    properties: ItemProperties::Plain,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_u16(buf: &mut Vec<u8>, v: u16) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn push_name(buf: &mut Vec<u8>, name: &str) {
        let mut bytes = [0_u8; 32];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        buf.extend_from_slice(&bytes);
    }

    fn it0_record(row: u16, slot: u16, name: &str, price: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        push_u16(&mut buf, 0); // unknown
        push_u16(&mut buf, row);
        push_u16(&mut buf, slot);
        push_u16(&mut buf, 0); // kind
        push_name(&mut buf, name);
        buf.extend_from_slice(&price.to_le_bytes());
        buf.extend_from_slice(&[0_u8; 18]); // unknown block
        for level in 0..10_u16 {
            // strength ramps with the level so the test can see ordering
            for field in [0, level, 0, 0, 0, 0, 0, 0, 0] {
                push_u16(&mut buf, field);
            }
        }
        buf
    }

    #[test]
    fn it0_records_parse() {
        let mut bytes = it0_record(1101, 0, "Small Sword", 100);
        bytes.extend(it0_record(1102, 0, "Long Sword", 250));

        let mut catalog = ItemCatalog::default();
        catalog.load_it0(&bytes).unwrap();

        assert_eq!(catalog.len(), 2);
        let item = catalog.get(1101).unwrap();
        assert_eq!(item.name, "Small Sword");
        assert_eq!(item.npc_price, 100);
        match &item.properties {
            ItemProperties::Weapon { levels } => {
                assert_eq!(levels.len(), 10);
                assert_eq!(levels[3].strength, 3);
            }
            other => panic!("unexpected properties: {other:?}"),
        }
    }

    #[test]
    fn it0ex_extends_levels() {
        let mut catalog = ItemCatalog::default();
        catalog
            .load_it0(&it0_record(1101, 0, "Small Sword", 100))
            .unwrap();

        let mut ex = Vec::new();
        push_u16(&mut ex, 1101);
        for _ in 0..5 {
            for field in [7_u16, 0, 0, 0, 0, 0, 0, 0, 0] {
                push_u16(&mut ex, field);
            }
        }
        catalog.load_it0ex(&ex).unwrap();

        match &catalog.get(1101).unwrap().properties {
            ItemProperties::Weapon { levels } => {
                assert_eq!(levels.len(), 15);
                assert_eq!(levels[10].additional_attribute, 7);
            }
            other => panic!("unexpected properties: {other:?}"),
        }
    }

    #[test]
    fn it1_slot_index_is_exposed() {
        let mut buf = Vec::new();
        push_u16(&mut buf, 2201);
        push_u16(&mut buf, 3); // slot
        push_u16(&mut buf, 1);
        push_name(&mut buf, "Leather Boots");
        buf.extend_from_slice(&50_u32.to_le_bytes());
        for field in [5_u16, 0, 0, 0, 0] {
            push_u16(&mut buf, field);
        }

        let mut catalog = ItemCatalog::default();
        catalog.load_it1(&buf).unwrap();
        assert_eq!(catalog.slot_index(2201), Some(3));
    }
}
