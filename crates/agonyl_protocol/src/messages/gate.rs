//! Messages originated by the GateServer, plus the zone-change directive it
//! consumes.

use super::{begin_long, finish, long_body};
use crate::head::frame_pc_id;
use crate::{Decode, Encode, FixedStr};

/// `(0x02, 0xE0)`: first frame on the broker link; registers the gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gate2LsConnect {
    pub server_id: u8,
    pub agent_id: u8,
    pub ip: FixedStr<16>,
    pub port: u32,
    pub name: FixedStr<17>,
}

impl Gate2LsConnect {
    pub fn new(server_id: u8, agent_id: u8, ip: &str, port: u32, name: &str) -> Self {
        Self {
            server_id,
            agent_id,
            ip: ip.into(),
            port,
            name: name.into(),
        }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(0, 0x02, 0xE0);
        buf.push(self.server_id);
        buf.push(self.agent_id);
        self.ip.encode(&mut buf).unwrap();
        self.port.encode(&mut buf).unwrap();
        self.name.encode(&mut buf).unwrap();
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = long_body(frame)?;
        Ok(Self {
            server_id: u8::decode(&mut r)?,
            agent_id: u8::decode(&mut r)?,
            ip: FixedStr::decode(&mut r)?,
            port: u32::decode(&mut r)?,
            name: FixedStr::decode(&mut r)?,
        })
    }
}

/// `(0x02, 0xE2)`: a player logged out; the broker drops the ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gate2LsAccLogout {
    pub reason: u8,
    pub account: FixedStr<21>,
    pub logout_date: FixedStr<9>,
    pub logout_time: FixedStr<7>,
}

impl Gate2LsAccLogout {
    pub fn new(reason: u8, account: &str) -> Self {
        Self {
            reason,
            account: account.into(),
            logout_date: FixedStr::default(),
            logout_time: FixedStr::default(),
        }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(0, 0x02, 0xE2);
        buf.push(self.reason);
        self.account.encode(&mut buf).unwrap();
        self.logout_date.encode(&mut buf).unwrap();
        self.logout_time.encode(&mut buf).unwrap();
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = long_body(frame)?;
        Ok(Self {
            reason: u8::decode(&mut r)?,
            account: FixedStr::decode(&mut r)?,
            logout_date: FixedStr::decode(&mut r)?,
            logout_time: FixedStr::decode(&mut r)?,
        })
    }
}

/// `(0x02, 0xE3)`: mirror a completed gate login into the ticket cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gate2LsPreparedAccLogin {
    pub pc_id: u32,
    pub account: FixedStr<21>,
}

impl Gate2LsPreparedAccLogin {
    pub fn new(account: &str, pc_id: u32) -> Self {
        Self {
            pc_id,
            account: account.into(),
        }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(self.pc_id, 0x02, 0xE3);
        self.account.encode(&mut buf).unwrap();
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = long_body(frame)?;
        Ok(Self {
            pc_id: frame_pc_id(frame),
            account: FixedStr::decode(&mut r)?,
        })
    }
}

/// `(0x01, 0xE0)`: first frame on a gate → zone link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gate2ZsConnect {
    pub agent_id: u8,
}

impl Gate2ZsConnect {
    pub fn new(agent_id: u8) -> Self {
        Self { agent_id }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(0, 0x01, 0xE0);
        buf.push(self.agent_id);
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = long_body(frame)?;
        Ok(Self {
            agent_id: u8::decode(&mut r)?,
        })
    }
}

/// `(0x01, 0xE1)`: a freshly authenticated client, handed to the
/// AccountServer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gate2AsNewClient {
    pub pc_id: u32,
    pub account: FixedStr<21>,
    pub password: FixedStr<21>,
    pub client_ip: FixedStr<16>,
    pub reserved: [u8; 78],
}

impl Gate2AsNewClient {
    pub fn new(account: &str, password: &str, client_ip: &str, pc_id: u32) -> Self {
        Self {
            pc_id,
            account: account.into(),
            password: password.into(),
            client_ip: client_ip.into(),
            reserved: [0; 78],
        }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(self.pc_id, 0x01, 0xE1);
        self.account.encode(&mut buf).unwrap();
        self.password.encode(&mut buf).unwrap();
        self.client_ip.encode(&mut buf).unwrap();
        self.reserved.encode(&mut buf).unwrap();
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = long_body(frame)?;
        Ok(Self {
            pc_id: frame_pc_id(frame),
            account: FixedStr::decode(&mut r)?,
            password: FixedStr::decode(&mut r)?,
            client_ip: FixedStr::decode(&mut r)?,
            reserved: <[u8; 78]>::decode(&mut r)?,
        })
    }
}

/// `(0x01, 0xE2)`: the client behind pcId disconnected from the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Za2ZsAccLogout {
    pub pc_id: u32,
    pub reason: u8,
}

impl Za2ZsAccLogout {
    pub fn new(pc_id: u32, reason: u8) -> Self {
        Self { pc_id, reason }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(self.pc_id, 0x01, 0xE2);
        buf.push(self.reason);
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = long_body(frame)?;
        Ok(Self {
            pc_id: frame_pc_id(frame),
            reason: u8::decode(&mut r)?,
        })
    }
}

/// `(0x01, 0xE1)` toward a gate: reroute pcId to `zone_id` from now on.
/// Never forwarded to the client; the gate consumes it (byte 10 is the new
/// zone id).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct S2GZoneChange {
    pub pc_id: u32,
    pub zone_id: u8,
}

impl S2GZoneChange {
    pub fn new(pc_id: u32, zone_id: u8) -> Self {
        Self { pc_id, zone_id }
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = begin_long(self.pc_id, 0x01, 0xE1);
        buf.push(self.zone_id);
        finish(buf)
    }

    pub fn from_frame(frame: &[u8]) -> anyhow::Result<Self> {
        let mut r = long_body(frame)?;
        Ok(Self {
            pc_id: frame_pc_id(frame),
            zone_id: u8::decode(&mut r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_round_trip() {
        let msg = Gate2LsConnect::new(0, 0, "10.1.2.3", 9860, "Gate01");
        let frame = msg.to_frame();
        assert_eq!(frame.len(), 10 + 1 + 1 + 16 + 4 + 17);
        assert_eq!(Gate2LsConnect::from_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn new_client_round_trip() {
        let msg = Gate2AsNewClient::new("alice", "pw", "127.0.0.1", 55);
        let frame = msg.to_frame();
        assert_eq!(frame.len(), 10 + 21 + 21 + 16 + 78);
        assert_eq!(Gate2AsNewClient::from_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn zone_change_zone_id_is_byte_ten() {
        let frame = S2GZoneChange::new(9, 2).to_frame();
        assert_eq!(frame[8], 0x01);
        assert_eq!(frame[9], 0xE1);
        assert_eq!(frame[10], 2);
    }

    #[test]
    fn acc_logout_round_trip() {
        let msg = Za2ZsAccLogout::new(31, 0x00);
        assert_eq!(Za2ZsAccLogout::from_frame(&msg.to_frame()).unwrap(), msg);
    }
}
