//! Messages originated by the game client.

use super::{begin_long, finish, long_body, protocol_body};
use crate::head::frame_pc_id;
use crate::{codes, Decode, Encode, FixedStr};

/// `(0x01, 0xE0)`: credentials sent to the LoginServer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct C2SLogin {
    pub username: FixedStr<21>,
    pub password: FixedStr<21>,
}

impl C2SLogin {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(0, 0x01, 0xE0);
        self.username.encode(&mut buf).unwrap();
        self.password.encode(&mut buf).unwrap();
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = long_body(frame)?;
        Ok(Self {
            username: FixedStr::decode(&mut r)?,
            password: FixedStr::decode(&mut r)?,
        })
    }
}

/// `(0x01, 0xE1)`: the client picked a gate from the server list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct C2SServerSelect {
    pub server_id: u8,
}

impl C2SServerSelect {
    pub fn new(server_id: u8) -> Self {
        Self { server_id }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(0, 0x01, 0xE1);
        buf.push(self.server_id);
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = long_body(frame)?;
        Ok(Self {
            server_id: u8::decode(&mut r)?,
        })
    }
}

/// `(0x01, 0xE2)`: first packet on a gate connection; pcId travels in the
/// head.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct C2SGateLogin {
    pub pc_id: u32,
    pub account: FixedStr<21>,
    pub password: FixedStr<21>,
}

impl C2SGateLogin {
    pub fn new(pc_id: u32, account: &str, password: &str) -> Self {
        Self {
            pc_id,
            account: account.into(),
            password: password.into(),
        }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(self.pc_id, 0x01, 0xE2);
        self.account.encode(&mut buf).unwrap();
        self.password.encode(&mut buf).unwrap();
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = long_body(frame)?;
        Ok(Self {
            pc_id: frame_pc_id(frame),
            account: FixedStr::decode(&mut r)?,
            password: FixedStr::decode(&mut r)?,
        })
    }
}

macro_rules! name_only_protocol_msg {
    ($(#[$doc:meta])* $name:ident, $protocol:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name {
            pub pc_id: u32,
            pub name: FixedStr<21>,
        }

        impl $name {
            pub fn new(pc_id: u32, name: &str) -> Self {
                Self {
                    pc_id,
                    name: name.into(),
                }
            }

            pub fn to_frame(&self) -> Vec<u8> {
                let mut buf = begin_long(self.pc_id, 0x03, 0xFF);
                ($protocol as u16).encode(&mut buf).unwrap();
                self.name.encode(&mut buf).unwrap();
                finish(buf)
            }

            pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
                let mut r = protocol_body(frame, $protocol)?;
                Ok(Self {
                    pc_id: frame_pc_id(frame),
                    name: FixedStr::decode(&mut r)?,
                })
            }
        }
    };
}

name_only_protocol_msg!(
    /// Protocol `0x1106`: select a character for login.
    C2SCharacterLogin,
    codes::C2S_CHARACTER_LOGIN
);

name_only_protocol_msg!(
    /// Protocol `0x1107`: enter the world with the selected character.
    C2SWorldLogin,
    codes::C2S_WORLD_LOGIN
);

name_only_protocol_msg!(
    /// Protocol `0x1108`: back out to the character list.
    C2SCharacterLogout,
    codes::C2S_CHARACTER_LOGOUT
);

name_only_protocol_msg!(
    /// Protocol `0xA002`: delete (soft) a character.
    C2SDeleteCharacter,
    codes::C2S_ASK_DELETE_PLAYER
);

/// Protocol `0xA001`: create a character.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct C2SCreateCharacter {
    pub pc_id: u32,
    pub name: FixedStr<21>,
    pub class: u8,
    pub town: u8,
}

impl C2SCreateCharacter {
    pub fn new(pc_id: u32, name: &str, class: u8, town: u8) -> Self {
        Self {
            pc_id,
            name: name.into(),
            class,
            town,
        }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(self.pc_id, 0x03, 0xFF);
        codes::C2S_ASK_CREATE_PLAYER.encode(&mut buf).unwrap();
        self.name.encode(&mut buf).unwrap();
        buf.push(self.class);
        buf.push(self.town);
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = protocol_body(frame, codes::C2S_ASK_CREATE_PLAYER)?;
        Ok(Self {
            pc_id: frame_pc_id(frame),
            name: FixedStr::decode(&mut r)?,
            class: u8::decode(&mut r)?,
            town: u8::decode(&mut r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_round_trip() {
        let msg = C2SLogin::new("alice", "Pa55word!");
        let frame = msg.to_frame();
        assert_eq!(frame.len(), 10 + 21 + 21);
        assert_eq!(u32::from_le_bytes(frame[..4].try_into().unwrap()), 52);
        assert_eq!(C2SLogin::from_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn gate_login_carries_pc_id_in_head() {
        let msg = C2SGateLogin::new(1234, "alice", "pw");
        let frame = msg.to_frame();
        assert_eq!(frame_pc_id(&frame), 1234);
        assert_eq!(C2SGateLogin::from_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn create_character_round_trip() {
        let msg = C2SCreateCharacter::new(9, "Warr", 1, 0);
        let decoded = C2SCreateCharacter::from_frame(&msg.to_frame()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn protocol_word_is_validated() {
        let frame = C2SCharacterLogin::new(1, "Warr").to_frame();
        assert!(C2SWorldLogin::from_frame(&frame).is_err());
        assert!(C2SCharacterLogin::from_frame(&frame).is_ok());
    }
}
