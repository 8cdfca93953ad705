//! Decoders for the static content files the zone and account servers load
//! at startup: the item tables (IT0/IT0Ex/IT1/IT2/IT3), per-map terrain
//! files and NPC records. All files are packed little-endian structs.

mod item;
mod map;
mod npc;
mod spawn;

pub use item::{Item, ItemCatalog, ItemLevel, ItemProperties};
pub use map::{MapData, NavigationCell, WarpData, MAP_EDGE};
pub use npc::{NpcAttack, NpcData};
pub use spawn::{load_spawns, SpawnData};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("i/o error reading content file: {0}")]
    Io(#[from] std::io::Error),
    #[error("content file {0} is truncated")]
    Truncated(&'static str),
}

pub(crate) fn read_fixed_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
