//! Messages originated by the LoginServer (toward clients and gates).

use super::{begin_long, finish, long_body};
use crate::head::frame_pc_id;
use crate::{Decode, Encode, FixedStr};

/// `(0x01, 0xE0)`: a pre-login notice line shown by the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ls2ClSay {
    pub kind: u8,
    pub words: FixedStr<81>,
}

impl Ls2ClSay {
    pub fn new(words: &str) -> Self {
        Self {
            kind: 0x00,
            words: words.into(),
        }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(0, 0x01, 0xE0);
        buf.push(self.kind);
        self.words.encode(&mut buf).unwrap();
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = long_body(frame)?;
        Ok(Self {
            kind: u8::decode(&mut r)?,
            words: FixedStr::decode(&mut r)?,
        })
    }
}

/// One row of the gate list shown after a successful login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GateServerEntry {
    pub server_id: u8,
    pub name: FixedStr<17>,
    pub status: FixedStr<81>,
}

impl Encode for GateServerEntry {
    fn encode(&self, mut w: impl std::io::Write) -> anyhow::Result<()> {
        self.server_id.encode(&mut w)?;
        self.name.encode(&mut w)?;
        self.status.encode(&mut w)?;
        Ok(())
    }
}

impl Decode for GateServerEntry {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        Ok(Self {
            server_id: u8::decode(r)?,
            name: FixedStr::decode(r)?,
            status: FixedStr::decode(r)?,
        })
    }
}

/// `(0x01, 0xE1)` toward the client: login accepted, pick a gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S2CServerList {
    pub pc_id: u32,
    pub entries: Vec<GateServerEntry>,
}

impl S2CServerList {
    pub fn new(pc_id: u32, entries: Vec<GateServerEntry>) -> Self {
        Self { pc_id, entries }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(self.pc_id, 0x01, 0xE1);
        (self.entries.len() as u16).encode(&mut buf).unwrap();
        for entry in &self.entries {
            entry.encode(&mut buf).unwrap();
        }
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = long_body(frame)?;
        let count = u16::decode(&mut r)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(GateServerEntry::decode(&mut r)?);
        }

        Ok(Self {
            pc_id: frame_pc_id(frame),
            entries,
        })
    }
}

/// `(0x01, 0xE2)` toward the client: address of the selected gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S2CGateInfo {
    pub pc_id: u32,
    pub ip: FixedStr<16>,
    pub port: u32,
}

impl S2CGateInfo {
    pub fn new(pc_id: u32, ip: &str, port: u32) -> Self {
        Self {
            pc_id,
            ip: ip.into(),
            port,
        }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(self.pc_id, 0x01, 0xE2);
        self.pc_id.encode(&mut buf).unwrap();
        self.ip.encode(&mut buf).unwrap();
        self.port.encode(&mut buf).unwrap();
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = long_body(frame)?;
        Ok(Self {
            pc_id: u32::decode(&mut r)?,
            ip: FixedStr::decode(&mut r)?,
            port: u32::decode(&mut r)?,
        })
    }
}

/// `(0x01, 0xE1)` over the broker link: pre-authorize a gate login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ls2GateLogin {
    pub pc_id: u32,
    pub account: FixedStr<21>,
    pub reserved: [u8; 9],
}

impl Ls2GateLogin {
    pub fn new(account: &str, pc_id: u32) -> Self {
        Self {
            pc_id,
            account: account.into(),
            reserved: [0; 9],
        }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(self.pc_id, 0x01, 0xE1);
        self.account.encode(&mut buf).unwrap();
        self.reserved.encode(&mut buf).unwrap();
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = long_body(frame)?;
        Ok(Self {
            pc_id: frame_pc_id(frame),
            account: FixedStr::decode(&mut r)?,
            reserved: <[u8; 9]>::decode(&mut r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn say_notice_round_trip() {
        let msg = Ls2ClSay::new("Server is under maintenance!");
        let frame = msg.to_frame();
        assert_eq!(frame.len(), 10 + 1 + 81);
        assert_eq!(Ls2ClSay::from_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn server_list_entry_count_prefix() {
        let entries = vec![
            GateServerEntry {
                server_id: 0,
                name: "Gate01".into(),
                status: "ok".into(),
            },
            GateServerEntry {
                server_id: 1,
                name: "Gate02".into(),
                status: "ok".into(),
            },
        ];

        let msg = S2CServerList::new(42, entries);
        let frame = msg.to_frame();
        assert_eq!(frame.len(), 10 + 2 + 2 * (1 + 17 + 81));

        let decoded = S2CServerList::from_frame(&frame).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn gate_info_round_trip() {
        let msg = S2CGateInfo::new(7, "10.0.0.2", 9860);
        assert_eq!(S2CGateInfo::from_frame(&msg.to_frame()).unwrap(), msg);
    }

    #[test]
    fn gate_preauth_round_trip() {
        let msg = Ls2GateLogin::new("alice", 1234);
        let decoded = Ls2GateLogin::from_frame(&msg.to_frame()).unwrap();
        assert_eq!(decoded.pc_id, 1234);
        assert_eq!(decoded.account.to_str(), "alice");
    }
}
