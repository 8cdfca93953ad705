//! Per-map terrain files: a header, warp gates, and a 255×255 navigation
//! mesh of movability flags.

use std::io::Read;
use std::path::Path;

use byteorder::{ReadBytesExt, LE};

use crate::{read_fixed_name, DataError};

pub const MAP_EDGE: usize = 0xFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WarpData {
    pub map_id: u16,
    pub x: u8,
    pub y: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NavigationCell {
    pub is_movable: bool,
}

pub struct MapData {
    pub id: u16,
    pub name: String,
    pub warps: Vec<WarpData>,
    pub navigation: Box<[[NavigationCell; MAP_EDGE]; MAP_EDGE]>,
}

impl MapData {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, DataError> {
        let mut r = bytes;

        let id = r.read_u16::<LE>()?;
        let mut name = [0_u8; 0x14];
        r.read_exact(&mut name)?;
        let warp_count = r.read_u8()?;

        let mut warps = Vec::with_capacity(warp_count as usize);
        for _ in 0..warp_count {
            let map_id = r.read_u16::<LE>()?;
            let x = r.read_u8()?;
            let y = r.read_u8()?;
            let _unknown = r.read_u16::<LE>()?;
            warps.push(WarpData { map_id, x, y });
        }

        let mut navigation = Box::new([[NavigationCell::default(); MAP_EDGE]; MAP_EDGE]);
        for row in navigation.iter_mut() {
            for cell in row.iter_mut() {
                let is_movable = r.read_u8()?;
                let mut skip = [0_u8; 3];
                r.read_exact(&mut skip)?;
                cell.is_movable = is_movable != 0;
            }
        }

        Ok(Self {
            id,
            name: read_fixed_name(&name),
            warps,
            navigation,
        })
    }

    pub fn is_movable(&self, x: u8, y: u8) -> bool {
        self.navigation[x as usize][y as usize].is_movable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_map_file(id: u16, name: &str, warps: &[WarpData]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&id.to_le_bytes());
        let mut name_bytes = [0_u8; 0x14];
        name_bytes[..name.len()].copy_from_slice(name.as_bytes());
        buf.extend_from_slice(&name_bytes);
        buf.push(warps.len() as u8);
        for warp in warps {
            buf.extend_from_slice(&warp.map_id.to_le_bytes());
            buf.push(warp.x);
            buf.push(warp.y);
            buf.extend_from_slice(&[0, 0]);
        }

        for x in 0..MAP_EDGE {
            for y in 0..MAP_EDGE {
                // A simple pattern: even cells walkable.
                buf.push(u8::from((x + y) % 2 == 0));
                buf.extend_from_slice(&[0, 0, 0]);
            }
        }
        buf
    }

    #[test]
    fn parses_header_warps_and_mesh() {
        let warps = [
            WarpData {
                map_id: 2,
                x: 10,
                y: 20,
            },
            WarpData {
                map_id: 3,
                x: 200,
                y: 100,
            },
        ];

        let bytes = build_map_file(7, "Temoz", &warps);
        let map = MapData::parse(&bytes).unwrap();

        assert_eq!(map.id, 7);
        assert_eq!(map.name, "Temoz");
        assert_eq!(map.warps, warps);
        assert!(map.is_movable(0, 0));
        assert!(!map.is_movable(0, 1));
    }

    #[test]
    fn truncated_mesh_is_an_error() {
        let mut bytes = build_map_file(7, "Temoz", &[]);
        bytes.truncate(bytes.len() - 100);
        assert!(MapData::parse(&bytes).is_err());
    }
}
