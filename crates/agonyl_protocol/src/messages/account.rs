//! Messages originated by the AccountServer toward the client.

use std::io::Write;

use super::{begin_long, finish, protocol_body};
use crate::head::frame_pc_id;
use crate::{codes, Decode, Encode, FixedStr};

/// One worn-item descriptor in a character list or create reply.
/// `wear_index` comes from the item catalog's slot index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CharacterWear {
    pub item_ptr: u32,
    pub item_code: u32,
    pub item_option: u32,
    pub wear_index: u32,
}

impl Encode for CharacterWear {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        self.item_ptr.encode(&mut w)?;
        self.item_code.encode(&mut w)?;
        self.item_option.encode(&mut w)?;
        self.wear_index.encode(&mut w)?;
        Ok(())
    }
}

impl Decode for CharacterWear {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        Ok(Self {
            item_ptr: u32::decode(r)?,
            item_code: u32::decode(r)?,
            item_option: u32::decode(r)?,
            wear_index: u32::decode(r)?,
        })
    }
}

/// Marks an unused slot in the five-slot character list.
pub const EMPTY_SLOT_CLASS: u8 = 255;

/// One slot of the character list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharacterInfo {
    pub name: FixedStr<21>,
    pub last_used: u8,
    pub class: u8,
    pub town: u8,
    pub level: u32,
    pub wear: [CharacterWear; 10],
}

impl Default for CharacterInfo {
    fn default() -> Self {
        Self {
            name: FixedStr::default(),
            last_used: 0,
            class: EMPTY_SLOT_CLASS,
            town: 0,
            level: 0,
            wear: [CharacterWear::default(); 10],
        }
    }
}

impl Encode for CharacterInfo {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        self.name.encode(&mut w)?;
        self.last_used.encode(&mut w)?;
        self.class.encode(&mut w)?;
        self.town.encode(&mut w)?;
        self.level.encode(&mut w)?;
        self.wear.encode(&mut w)?;
        Ok(())
    }
}

impl Decode for CharacterInfo {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        Ok(Self {
            name: FixedStr::decode(r)?,
            last_used: u8::decode(r)?,
            class: u8::decode(r)?,
            town: u8::decode(r)?,
            level: u32::decode(r)?,
            wear: <[CharacterWear; 10]>::decode(r)?,
        })
    }
}

/// `(0x03, 0xFF)` protocol `0x1105`: the five-slot character list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S2CCharacterList {
    pub pc_id: u32,
    pub characters: [CharacterInfo; 5],
}

impl S2CCharacterList {
    /// Builds the list from up to five characters; remaining slots are
    /// marked empty.
    pub fn new(pc_id: u32, characters: &[CharacterInfo]) -> Self {
        let mut slots: [CharacterInfo; 5] = Default::default();
        for (slot, character) in slots.iter_mut().zip(characters.iter()) {
            *slot = character.clone();
        }

        Self {
            pc_id,
            characters: slots,
        }
    }

    pub fn empty(pc_id: u32) -> Self {
        Self::new(pc_id, &[])
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(self.pc_id, 0x03, 0xFF);
        codes::S2C_CHARACTER_LIST.encode(&mut buf).unwrap();
        self.characters.encode(&mut buf).unwrap();
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = protocol_body(frame, codes::S2C_CHARACTER_LIST)?;
        Ok(Self {
            pc_id: frame_pc_id(frame),
            characters: <[CharacterInfo; 5]>::decode(&mut r)?,
        })
    }
}

/// `(0x03, 0x01)` protocol `0xA001`: character created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S2CAnsCreatePlayer {
    pub pc_id: u32,
    pub class: u8,
    pub name: FixedStr<21>,
    pub wear: [CharacterWear; 10],
}

impl S2CAnsCreatePlayer {
    pub fn new(pc_id: u32, class: u8, name: &str, wear: [CharacterWear; 10]) -> Self {
        Self {
            pc_id,
            class,
            name: name.into(),
            wear,
        }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(self.pc_id, 0x03, 0x01);
        codes::S2C_ANS_CREATE_PLAYER.encode(&mut buf).unwrap();
        buf.push(self.class);
        self.name.encode(&mut buf).unwrap();
        self.wear.encode(&mut buf).unwrap();
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = protocol_body(frame, codes::S2C_ANS_CREATE_PLAYER)?;
        Ok(Self {
            pc_id: frame_pc_id(frame),
            class: u8::decode(&mut r)?,
            name: FixedStr::decode(&mut r)?,
            wear: <[CharacterWear; 10]>::decode(&mut r)?,
        })
    }
}

/// `(0x01, 0x01)` protocol `0xA002`: character deleted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S2CAnsDeletePlayer {
    pub pc_id: u32,
    pub name: FixedStr<21>,
}

impl S2CAnsDeletePlayer {
    pub fn new(pc_id: u32, name: &str) -> Self {
        Self {
            pc_id,
            name: name.into(),
        }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(self.pc_id, 0x01, 0x01);
        codes::S2C_ANS_DELETE_PLAYER.encode(&mut buf).unwrap();
        self.name.encode(&mut buf).unwrap();
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = protocol_body(frame, codes::S2C_ANS_DELETE_PLAYER)?;
        Ok(Self {
            pc_id: frame_pc_id(frame),
            name: FixedStr::decode(&mut r)?,
        })
    }
}

/// `(0x03, 0xFF)` protocol `0x0FFF`: a typed in-session error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S2CError {
    pub pc_id: u32,
    pub code: u16,
    pub message: FixedStr<64>,
}

impl S2CError {
    pub fn new(pc_id: u32, code: u16, message: &str) -> Self {
        Self {
            pc_id,
            code,
            message: message.into(),
        }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(self.pc_id, 0x03, 0xFF);
        codes::S2C_ERROR.encode(&mut buf).unwrap();
        self.code.encode(&mut buf).unwrap();
        self.message.encode(&mut buf).unwrap();
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = protocol_body(frame, codes::S2C_ERROR)?;
        Ok(Self {
            pc_id: frame_pc_id(frame),
            code: u16::decode(&mut r)?,
            message: FixedStr::decode(&mut r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_pads_with_empty_slots() {
        let one = CharacterInfo {
            name: "Warr".into(),
            class: 1,
            level: 10,
            ..Default::default()
        };

        let msg = S2CCharacterList::new(3, std::slice::from_ref(&one));
        assert_eq!(msg.characters[0].class, 1);
        for slot in &msg.characters[1..] {
            assert_eq!(slot.class, EMPTY_SLOT_CLASS);
        }

        let decoded = S2CCharacterList::from_frame(&msg.to_frame()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn empty_list_is_all_empty_slots() {
        let msg = S2CCharacterList::empty(3);
        assert!(msg
            .characters
            .iter()
            .all(|slot| slot.class == EMPTY_SLOT_CLASS));
    }

    #[test]
    fn error_round_trip() {
        let msg = S2CError::new(5, codes::error::LOGIN_FAILED, "Login failed.");
        let frame = msg.to_frame();
        assert_eq!(frame.len(), 12 + 2 + 64);
        assert_eq!(S2CError::from_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn create_reply_round_trip() {
        let msg = S2CAnsCreatePlayer::new(5, 2, "Mage", [CharacterWear::default(); 10]);
        assert_eq!(S2CAnsCreatePlayer::from_frame(&msg.to_frame()).unwrap(), msg);
    }
}
