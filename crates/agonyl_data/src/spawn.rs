//! Monster/NPC spawn tables, one 8-byte record per spawn point.

use std::path::Path;

use byteorder::{ReadBytesExt, LE};

use crate::DataError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnData {
    pub id: u16,
    pub x: u8,
    pub y: u8,
    pub orientation: u8,
    pub spawn_step: u8,
}

impl SpawnData {
    /// Ids below 1000 are monsters; the rest are interactive NPCs.
    pub fn is_monster(&self) -> bool {
        self.id < 1000
    }
}

pub fn load_spawns(path: impl AsRef<Path>) -> Result<Vec<SpawnData>, DataError> {
    let bytes = std::fs::read(path)?;
    parse_spawns(&bytes)
}

pub(crate) fn parse_spawns(bytes: &[u8]) -> Result<Vec<SpawnData>, DataError> {
    let mut r = bytes;
    let mut spawns = Vec::with_capacity(bytes.len() / 8);

    while r.len() >= 8 {
        let id = r.read_u16::<LE>()?;
        let x = r.read_u8()?;
        let y = r.read_u8()?;
        let _unknown = r.read_u16::<LE>()?;
        let orientation = r.read_u8()?;
        let spawn_step = r.read_u8()?;

        spawns.push(SpawnData {
            id,
            x,
            y,
            orientation,
            spawn_step,
        });
    }

    Ok(spawns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_eight_byte_records() {
        let mut buf = Vec::new();
        for (id, x, y) in [(101_u16, 10_u8, 20_u8), (1500, 30, 40)] {
            buf.extend_from_slice(&id.to_le_bytes());
            buf.push(x);
            buf.push(y);
            buf.extend_from_slice(&[0, 0]);
            buf.push(1); // orientation
            buf.push(0); // spawn step
        }

        let spawns = parse_spawns(&buf).unwrap();
        assert_eq!(spawns.len(), 2);
        assert!(spawns[0].is_monster());
        assert!(!spawns[1].is_monster());
        assert_eq!(spawns[1].x, 30);
    }
}
