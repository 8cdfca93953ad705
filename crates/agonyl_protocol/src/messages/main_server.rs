//! Short-framed messages exchanged with the MainServer.

use super::{begin_short, finish_short, short_body};
use crate::head::MsHead;
use crate::{codes, Decode, Encode, FixedStr};

/// The 5-byte hello every peer sends right after connecting to the
/// MainServer.
pub const MAIN_SERVER_HELLO_LEN: usize = 5;

pub fn main_server_hello(server_id: u8) -> [u8; MAIN_SERVER_HELLO_LEN] {
    [0x01, 0xA0, 0x00, 0x00, server_id]
}

/// Parses the hello, returning the peer's server id.
pub fn parse_main_server_hello(bytes: &[u8]) -> anyhow::Result<u8> {
    anyhow::ensure!(
        bytes.len() == MAIN_SERVER_HELLO_LEN && bytes[..2] == [0x01, 0xA0],
        "malformed main server hello: {bytes:02x?}"
    );

    Ok(bytes[4])
}

/// `0xA010`: the AccountServer asks to place a character in the world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S2MCharacterLogin {
    pub pc_id: u32,
    pub gate_server_id: u8,
    pub account: FixedStr<21>,
    pub password: FixedStr<21>,
    pub character_name: FixedStr<21>,
    pub client_ip: FixedStr<16>,
}

impl S2MCharacterLogin {
    pub fn new(
        pc_id: u32,
        account: &str,
        character_name: &str,
        client_ip: &str,
        gate_server_id: u8,
    ) -> Self {
        Self {
            pc_id,
            gate_server_id,
            account: account.into(),
            password: FixedStr::default(),
            character_name: character_name.into(),
            client_ip: client_ip.into(),
        }
    }

    pub fn to_frame(&self) -> anyhow::Result<Vec<u8>> {
        let mut buf = begin_short(codes::S2M_CHARACTER_LOGIN, self.pc_id, self.gate_server_id);
        self.account.encode(&mut buf)?;
        self.password.encode(&mut buf)?;
        self.character_name.encode(&mut buf)?;
        self.client_ip.encode(&mut buf)?;
        finish_short(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let head = MsHead::decode(&mut &frame[..])?;
        let mut r = short_body(frame)?;
        Ok(Self {
            pc_id: head.pc_id,
            gate_server_id: head.gate_server_id,
            account: FixedStr::decode(&mut r)?,
            password: FixedStr::decode(&mut r)?,
            character_name: FixedStr::decode(&mut r)?,
            client_ip: FixedStr::decode(&mut r)?,
        })
    }
}

/// `0xA010` back to the AccountServer: the zone owning the character's map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct M2SAnsCharacterLogin {
    pub pc_id: u32,
    pub gate_server_id: u8,
    pub zone_id: u8,
    pub map_id: u16,
}

impl M2SAnsCharacterLogin {
    pub fn new(pc_id: u32, zone_id: u8, map_id: u16, gate_server_id: u8) -> Self {
        Self {
            pc_id,
            gate_server_id,
            zone_id,
            map_id,
        }
    }

    pub fn to_frame(&self) -> anyhow::Result<Vec<u8>> {
        let mut buf = begin_short(codes::S2M_CHARACTER_LOGIN, self.pc_id, self.gate_server_id);
        buf.push(self.zone_id);
        self.map_id.encode(&mut buf)?;
        finish_short(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let head = MsHead::decode(&mut &frame[..])?;
        let mut r = short_body(frame)?;
        Ok(Self {
            pc_id: head.pc_id,
            gate_server_id: head.gate_server_id,
            zone_id: u8::decode(&mut r)?,
            map_id: u16::decode(&mut r)?,
        })
    }
}

/// `0xA000`: a typed error for pcId, relayed back toward the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct M2SError {
    pub pc_id: u32,
    pub gate_server_id: u8,
    pub code: u16,
    pub message: FixedStr<64>,
}

impl M2SError {
    pub fn new(pc_id: u32, code: u16, message: &str, gate_server_id: u8) -> Self {
        Self {
            pc_id,
            gate_server_id,
            code,
            message: message.into(),
        }
    }

    pub fn to_frame(&self) -> anyhow::Result<Vec<u8>> {
        let mut buf = begin_short(codes::M2S_ERROR, self.pc_id, self.gate_server_id);
        self.code.encode(&mut buf)?;
        self.message.encode(&mut buf)?;
        finish_short(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let head = MsHead::decode(&mut &frame[..])?;
        let mut r = short_body(frame)?;
        Ok(Self {
            pc_id: head.pc_id,
            gate_server_id: head.gate_server_id,
            code: u16::decode(&mut r)?,
            message: FixedStr::decode(&mut r)?,
        })
    }
}

/// `0xC001`: a zone announces the maps it simulates, once per connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S2MMapList {
    pub maps: Vec<u16>,
}

impl S2MMapList {
    pub fn new(maps: Vec<u16>) -> Self {
        Self { maps }
    }

    pub fn to_frame(&self) -> anyhow::Result<Vec<u8>> {
        let mut buf = begin_short(codes::S2M_MAP_LIST, 0, 0);
        (self.maps.len() as u16).encode(&mut buf)?;
        for map in &self.maps {
            map.encode(&mut buf)?;
        }
        finish_short(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = short_body(frame)?;
        let count = u16::decode(&mut r)?;
        let mut maps = Vec::with_capacity(count as usize);
        for _ in 0..count {
            maps.push(u16::decode(&mut r)?);
        }

        Ok(Self { maps })
    }
}

macro_rules! name_only_short_msg {
    ($(#[$doc:meta])* $name:ident, $protocol:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name {
            pub pc_id: u32,
            pub gate_server_id: u8,
            pub character_name: FixedStr<21>,
        }

        impl $name {
            pub fn new(pc_id: u32, character_name: &str) -> Self {
                Self {
                    pc_id,
                    gate_server_id: 0,
                    character_name: character_name.into(),
                }
            }

            pub fn to_frame(&self) -> anyhow::Result<Vec<u8>> {
                let mut buf = begin_short($protocol, self.pc_id, self.gate_server_id);
                self.character_name.encode(&mut buf)?;
                finish_short(buf)
            }

            pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
                let head = MsHead::decode(&mut &frame[..])?;
                let mut r = short_body(frame)?;
                Ok(Self {
                    pc_id: head.pc_id,
                    gate_server_id: head.gate_server_id,
                    character_name: FixedStr::decode(&mut r)?,
                })
            }
        }
    };
}

name_only_short_msg!(
    /// `0x1107`: a zone asks the MainServer to admit pcId to the world.
    S2MWorldLogin,
    codes::S2M_WORLD_LOGIN
);

name_only_short_msg!(
    /// `0x1107`: the MainServer grants the world login to the owning zone.
    M2SWorldLogin,
    codes::M2S_WORLD_LOGIN
);

name_only_short_msg!(
    /// `0x1108`: pcId left its character (logout or disconnect).
    S2MCharacterLogout,
    codes::S2M_CHARACTER_LOGOUT
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_shape() {
        let hello = main_server_hello(3);
        assert_eq!(hello, [0x01, 0xA0, 0x00, 0x00, 3]);
        assert_eq!(parse_main_server_hello(&hello).unwrap(), 3);
        assert!(parse_main_server_hello(&[0x01, 0xA1, 0, 0, 3]).is_err());
    }

    #[test]
    fn character_login_round_trip() {
        let msg = S2MCharacterLogin::new(12, "alice", "Warr", "127.0.0.1", 2);
        let frame = msg.to_frame().unwrap();
        assert_eq!(
            u16::from_le_bytes(frame[2..4].try_into().unwrap()) as usize,
            frame.len()
        );
        assert_eq!(S2MCharacterLogin::from_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn ans_character_login_round_trip() {
        let msg = M2SAnsCharacterLogin::new(12, 1, 7, 2);
        let frame = msg.to_frame().unwrap();
        assert_eq!(M2SAnsCharacterLogin::from_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn map_list_round_trip() {
        let msg = S2MMapList::new(vec![0, 1, 2, 7, 1101]);
        let frame = msg.to_frame().unwrap();
        assert_eq!(S2MMapList::from_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn error_round_trip() {
        let msg = M2SError::new(1, codes::error::CHARACTER_NOT_FOUND, "Character not found.", 0);
        assert_eq!(M2SError::from_frame(&msg.to_frame().unwrap()).unwrap(), msg);
    }

    #[test]
    fn world_login_round_trip() {
        let msg = S2MWorldLogin::new(8, "Warr");
        assert_eq!(S2MWorldLogin::from_frame(&msg.to_frame().unwrap()).unwrap(), msg);
    }
}
