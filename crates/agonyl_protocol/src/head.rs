//! Frame heads and raw-frame field accessors.
//!
//! Long frames keep their 4-byte size prefix, so field offsets are absolute:
//! pcId at 4..8, ctrl at 8, cmd at 9, protocol (when present) at 10..12.

use std::io::Write;

use byteorder::{ReadBytesExt, WriteBytesExt, LE};

use crate::{Decode, Encode};

/// Head of a client/gate ("long") frame. `size` is the inclusive length of
/// the whole frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameHead {
    pub size: u32,
    pub pc_id: u32,
    pub ctrl: u8,
    pub cmd: u8,
}

impl FrameHead {
    pub const LEN: usize = 10;
    /// Head length when a protocol word follows.
    pub const LEN_WITH_PROTOCOL: usize = 12;

    pub fn new(pc_id: u32, ctrl: u8, cmd: u8) -> Self {
        Self {
            size: 0,
            pc_id,
            ctrl,
            cmd,
        }
    }
}

impl Encode for FrameHead {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        w.write_u32::<LE>(self.size)?;
        w.write_u32::<LE>(self.pc_id)?;
        w.write_u8(self.ctrl)?;
        w.write_u8(self.cmd)?;
        Ok(())
    }
}

impl Decode for FrameHead {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        Ok(Self {
            size: r.read_u32::<LE>()?,
            pc_id: r.read_u32::<LE>()?,
            ctrl: r.read_u8()?,
            cmd: r.read_u8()?,
        })
    }
}

/// Head of a MainServer ("short") frame. `size` is the total frame length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MsHead {
    pub protocol: u16,
    pub size: u16,
    pub pc_id: u32,
    pub gate_server_id: u8,
}

impl MsHead {
    pub const LEN: usize = 9;

    pub fn new(protocol: u16, pc_id: u32, gate_server_id: u8) -> Self {
        Self {
            protocol,
            size: 0,
            pc_id,
            gate_server_id,
        }
    }
}

impl Encode for MsHead {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        w.write_u16::<LE>(self.protocol)?;
        w.write_u16::<LE>(self.size)?;
        w.write_u32::<LE>(self.pc_id)?;
        w.write_u8(self.gate_server_id)?;
        Ok(())
    }
}

impl Decode for MsHead {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        Ok(Self {
            protocol: r.read_u16::<LE>()?,
            size: r.read_u16::<LE>()?,
            pc_id: r.read_u32::<LE>()?,
            gate_server_id: r.read_u8()?,
        })
    }
}

/// `ctrl` byte of a long frame, or 0 for runts.
pub fn frame_ctrl(frame: &[u8]) -> u8 {
    frame.get(8).copied().unwrap_or(0)
}

/// `cmd` byte of a long frame, or 0 for runts.
pub fn frame_cmd(frame: &[u8]) -> u8 {
    frame.get(9).copied().unwrap_or(0)
}

/// The pcId field of a long frame.
pub fn frame_pc_id(frame: &[u8]) -> u32 {
    match frame.get(4..8) {
        Some(b) => u32::from_le_bytes(b.try_into().unwrap()),
        None => 0,
    }
}

/// The protocol word of a long frame, when the frame is large enough to
/// carry one.
pub fn frame_protocol(frame: &[u8]) -> Option<u16> {
    frame
        .get(10..12)
        .map(|b| u16::from_le_bytes(b.try_into().unwrap()))
}

/// Stamps the session's pcId over the frame's pcId field. Every routed
/// client packet gets this treatment so a tampered id never leaves the gate.
pub fn set_frame_pc_id(frame: &mut [u8], pc_id: u32) {
    if let Some(b) = frame.get_mut(4..8) {
        b.copy_from_slice(&pc_id.to_le_bytes());
    }
}

/// Finalizes a long frame by writing the inclusive size into bytes 0..4.
pub fn finish_long_frame(mut frame: Vec<u8>) -> Vec<u8> {
    let size = frame.len() as u32;
    frame[..4].copy_from_slice(&size.to_le_bytes());
    frame
}

/// Finalizes a short frame by writing the total size into bytes 2..4.
/// Frames that cannot express their length in a u16 are refused rather than
/// silently truncated.
pub fn finish_short_frame(mut frame: Vec<u8>) -> anyhow::Result<Vec<u8>> {
    let size = u16::try_from(frame.len())
        .map_err(|_| anyhow::anyhow!("short frame of {} bytes overflows u16 size", frame.len()))?;
    frame[2..4].copy_from_slice(&size.to_le_bytes());
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_head_round_trip() {
        let head = FrameHead {
            size: 0x2A,
            pc_id: 77,
            ctrl: 0x01,
            cmd: 0xE2,
        };

        let mut buf = Vec::new();
        head.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), FrameHead::LEN);

        let mut r = &buf[..];
        assert_eq!(FrameHead::decode(&mut r).unwrap(), head);
    }

    #[test]
    fn pc_id_overwrite() {
        let mut frame = vec![0_u8; 16];
        frame[4..8].copy_from_slice(&999_u32.to_le_bytes());
        set_frame_pc_id(&mut frame, 42);
        assert_eq!(frame_pc_id(&frame), 42);
    }

    #[test]
    fn protocol_word_requires_full_head() {
        let frame = vec![0_u8; 10];
        assert_eq!(frame_protocol(&frame), None);

        let mut frame = vec![0_u8; 12];
        frame[10..12].copy_from_slice(&0x1106_u16.to_le_bytes());
        assert_eq!(frame_protocol(&frame), Some(0x1106));
    }

    #[test]
    fn short_frame_size_overflow_is_refused() {
        let frame = vec![0_u8; u16::MAX as usize + 1];
        assert!(finish_short_frame(frame).is_err());
    }
}
