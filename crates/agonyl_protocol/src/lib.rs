//! Wire types shared by every process in the server mesh.
//!
//! Two frame formats coexist: the client/gate "long" format
//! (`[size u32][pcId u32][ctrl u8][cmd u8][protocol u16]? [body]`, size
//! inclusive of the whole frame) and the MainServer "short" format
//! (`[protocol u16][size u16][pcId u32][gateServerId u8][body]`). All
//! integers are little-endian; strings are NUL-padded fixed-width byte
//! arrays.

pub mod cipher;
pub mod codes;
pub mod decoder;
mod fixed_str;
pub mod head;
pub mod messages;
pub mod strings;

use std::io::Write;

pub use cipher::Dyn562;
pub use decoder::{FrameCodec, FrameDecoder, FramingError, MsFrameDecoder};
pub use fixed_str::FixedStr;
pub use head::{FrameHead, MsHead};

/// Frames larger than this are treated as a framing fault.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// The `Encode` trait writes a value in its wire representation. It is the
/// inverse of [`Decode`].
pub trait Encode {
    fn encode(&self, w: impl Write) -> anyhow::Result<()>;
}

/// The `Decode` trait reads a value from its wire representation, advancing
/// the input slice past the consumed bytes.
pub trait Decode: Sized {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self>;
}

impl Encode for u8 {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        use byteorder::WriteBytesExt;
        Ok(w.write_u8(*self)?)
    }
}

impl Decode for u8 {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        use byteorder::ReadBytesExt;
        Ok(r.read_u8()?)
    }
}

impl Encode for u16 {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        use byteorder::{WriteBytesExt, LE};
        Ok(w.write_u16::<LE>(*self)?)
    }
}

impl Decode for u16 {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        use byteorder::{ReadBytesExt, LE};
        Ok(r.read_u16::<LE>()?)
    }
}

impl Encode for u32 {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        use byteorder::{WriteBytesExt, LE};
        Ok(w.write_u32::<LE>(*self)?)
    }
}

impl Decode for u32 {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        use byteorder::{ReadBytesExt, LE};
        Ok(r.read_u32::<LE>()?)
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        for item in self {
            item.encode(&mut w)?;
        }
        Ok(())
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        let mut items = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(T::decode(r)?);
        }

        items
            .try_into()
            .map_err(|_| anyhow::anyhow!("array length mismatch"))
    }
}
