//! Every message exchanged between the processes of the mesh, with explicit
//! per-type encode/decode. Constructors fill the frame head; `to_frame`
//! produces the finished byte frame with its size field patched in.

mod account;
mod client;
mod gate;
mod login;
mod main_server;
mod zone;

pub use account::{
    CharacterInfo, CharacterWear, S2CAnsCreatePlayer, S2CAnsDeletePlayer, S2CCharacterList,
    S2CError, EMPTY_SLOT_CLASS,
};
pub use client::{
    C2SCharacterLogin, C2SCharacterLogout, C2SCreateCharacter, C2SDeleteCharacter, C2SGateLogin,
    C2SLogin, C2SServerSelect, C2SWorldLogin,
};
pub use gate::{
    Gate2AsNewClient, Gate2LsAccLogout, Gate2LsConnect, Gate2LsPreparedAccLogin, Gate2ZsConnect,
    S2GZoneChange, Za2ZsAccLogout,
};
pub use login::{GateServerEntry, Ls2ClSay, Ls2GateLogin, S2CGateInfo, S2CServerList};
pub use main_server::{
    main_server_hello, parse_main_server_hello, M2SAnsCharacterLogin, M2SError, M2SWorldLogin,
    S2MCharacterLogin, S2MCharacterLogout, S2MMapList, S2MWorldLogin, MAIN_SERVER_HELLO_LEN,
};
pub use zone::{InventoryEntry, Pet, S2CWorldLogin, SkillInfo, SocialInfo};

use crate::head::{finish_long_frame, finish_short_frame};
use crate::{Encode, FrameHead, MsHead};

/// Starts a long frame: head written with a zeroed size, patched by
/// [`finish`]. The protocol word, when a message carries one, is part of the
/// body from the head's point of view.
pub(crate) fn begin_long(pc_id: u32, ctrl: u8, cmd: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    FrameHead::new(pc_id, ctrl, cmd)
        .encode(&mut buf)
        .expect("writing to a Vec cannot fail");
    buf
}

pub(crate) fn finish(buf: Vec<u8>) -> Vec<u8> {
    finish_long_frame(buf)
}

pub(crate) fn begin_short(protocol: u16, pc_id: u32, gate_server_id: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32);
    MsHead::new(protocol, pc_id, gate_server_id)
        .encode(&mut buf)
        .expect("writing to a Vec cannot fail");
    buf
}

pub(crate) fn finish_short(buf: Vec<u8>) -> anyhow::Result<Vec<u8>> {
    finish_short_frame(buf)
}

/// Skips the plain long head, returning the body slice.
pub(crate) fn long_body(frame: &[u8]) -> anyhow::Result<&[u8]> {
    anyhow::ensure!(
        frame.len() >= FrameHead::LEN,
        "frame of {} bytes is shorter than its head",
        frame.len()
    );

    Ok(&frame[FrameHead::LEN..])
}

/// Skips the long head plus the protocol word, validating the latter.
pub(crate) fn protocol_body(frame: &[u8], expected: u16) -> anyhow::Result<&[u8]> {
    anyhow::ensure!(
        frame.len() >= FrameHead::LEN_WITH_PROTOCOL,
        "frame of {} bytes has no protocol word",
        frame.len()
    );

    let protocol = u16::from_le_bytes(frame[10..12].try_into().unwrap());
    anyhow::ensure!(
        protocol == expected,
        "protocol mismatch: expected {expected:#06x}, got {protocol:#06x}"
    );

    Ok(&frame[FrameHead::LEN_WITH_PROTOCOL..])
}

/// Skips the short head, returning the body slice.
pub(crate) fn short_body(frame: &[u8]) -> anyhow::Result<&[u8]> {
    anyhow::ensure!(
        frame.len() >= MsHead::LEN,
        "short frame of {} bytes is shorter than its head",
        frame.len()
    );

    Ok(&frame[MsHead::LEN..])
}
