//! Incremental frame extraction from a TCP byte stream.
//!
//! Modeled so that concatenated reads split at arbitrary byte boundaries
//! reassemble into the original frame sequence. Both decoders keep a
//! persistent buffer; `queue_bytes` appends freshly read bytes and
//! `try_next_frame` yields complete frames until more input is needed.

use bytes::{Buf, BytesMut};
use thiserror::Error;

use crate::{MsHead, MAX_FRAME_SIZE};

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("frame size of {0} bytes exceeds the {MAX_FRAME_SIZE} byte limit")]
    Oversized(usize),
    #[error("frame size of {0} bytes is shorter than the frame head")]
    Runt(usize),
}

/// Common decoder surface so session loops can be written once for both
/// frame formats.
pub trait FrameCodec: Default + Send {
    /// Appends freshly read bytes to the decode buffer.
    fn queue_bytes(&mut self, bytes: BytesMut);

    /// Extracts the next complete frame, `Ok(None)` when more input is
    /// needed, or a [`FramingError`] that must close the connection.
    fn try_next_frame(&mut self) -> Result<Option<BytesMut>, FramingError>;

    /// Splits off the unused capacity of the buffer for the next read.
    fn take_capacity(&mut self) -> BytesMut;

    fn reserve(&mut self, additional: usize);
}

/// Decoder for the client/gate "long" format. Yielded frames include their
/// 4-byte size prefix. A size of zero is a heartbeat and is consumed
/// silently.
#[derive(Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameCodec for FrameDecoder {
    fn queue_bytes(&mut self, bytes: BytesMut) {
        self.buf.unsplit(bytes);
    }

    fn try_next_frame(&mut self) -> Result<Option<BytesMut>, FramingError> {
        loop {
            if self.buf.len() < 4 {
                return Ok(None);
            }

            let size = u32::from_le_bytes(self.buf[..4].try_into().unwrap()) as usize;
            if size == 0 {
                // Heartbeat; skip the bare size word.
                self.buf.advance(4);
                continue;
            }

            if size > MAX_FRAME_SIZE {
                return Err(FramingError::Oversized(size));
            }

            if size < 4 {
                return Err(FramingError::Runt(size));
            }

            if self.buf.len() < size {
                return Ok(None);
            }

            return Ok(Some(self.buf.split_to(size)));
        }
    }

    fn take_capacity(&mut self) -> BytesMut {
        self.buf.split_off(self.buf.len())
    }

    fn reserve(&mut self, additional: usize) {
        self.buf.reserve(additional);
    }
}

/// Decoder for the MainServer "short" format. The size field is a u16 at
/// offset 2 and counts the whole frame.
#[derive(Default)]
pub struct MsFrameDecoder {
    buf: BytesMut,
}

impl MsFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameCodec for MsFrameDecoder {
    fn queue_bytes(&mut self, bytes: BytesMut) {
        self.buf.unsplit(bytes);
    }

    fn try_next_frame(&mut self) -> Result<Option<BytesMut>, FramingError> {
        if self.buf.len() < 4 {
            return Ok(None);
        }

        let size = u16::from_le_bytes(self.buf[2..4].try_into().unwrap()) as usize;
        if size < MsHead::LEN {
            return Err(FramingError::Runt(size));
        }

        if self.buf.len() < size {
            return Ok(None);
        }

        Ok(Some(self.buf.split_to(size)))
    }

    fn take_capacity(&mut self) -> BytesMut {
        self.buf.split_off(self.buf.len())
    }

    fn reserve(&mut self, additional: usize) {
        self.buf.reserve(additional);
    }
}

#[cfg(test)]
mod tests {
    use rand::{thread_rng, Rng};

    use super::*;

    fn long_frame(pc_id: u32, body: &[u8]) -> Vec<u8> {
        let size = (10 + body.len()) as u32;
        let mut frame = Vec::new();
        frame.extend_from_slice(&size.to_le_bytes());
        frame.extend_from_slice(&pc_id.to_le_bytes());
        frame.push(0x03);
        frame.push(0xFF);
        frame.extend_from_slice(body);
        frame
    }

    #[test]
    fn whole_frame_in_one_read() {
        let frame = long_frame(7, &[1, 2, 3, 4]);

        let mut dec = FrameDecoder::new();
        dec.queue_bytes(BytesMut::from(&frame[..]));

        let out = dec.try_next_frame().unwrap().unwrap();
        assert_eq!(&out[..], &frame[..]);
        assert!(dec.try_next_frame().unwrap().is_none());
    }

    #[test]
    fn arbitrary_splits_reassemble_in_order() {
        let frames: Vec<Vec<u8>> = (0..64_u32)
            .map(|i| long_frame(i, &vec![i as u8; (i as usize * 7) % 300]))
            .collect();

        let stream: Vec<u8> = frames.concat();

        let mut rng = thread_rng();
        for _ in 0..100 {
            let mut dec = FrameDecoder::new();
            let mut produced = Vec::new();
            let mut rest = &stream[..];

            while !rest.is_empty() {
                let n = rng.gen_range(1..=rest.len().min(37));
                let (chunk, tail) = rest.split_at(n);
                rest = tail;

                dec.queue_bytes(BytesMut::from(chunk));
                while let Some(frame) = dec.try_next_frame().unwrap() {
                    produced.push(frame.to_vec());
                }
            }

            assert_eq!(produced, frames);
        }
    }

    #[test]
    fn heartbeats_are_skipped() {
        let frame = long_frame(1, b"ok");
        let mut stream = vec![0_u8; 4]; // size == 0
        stream.extend_from_slice(&frame);
        stream.extend_from_slice(&[0_u8; 4]);

        let mut dec = FrameDecoder::new();
        dec.queue_bytes(BytesMut::from(&stream[..]));

        let out = dec.try_next_frame().unwrap().unwrap();
        assert_eq!(&out[..], &frame[..]);
        assert!(dec.try_next_frame().unwrap().is_none());
    }

    #[test]
    fn oversized_frame_is_a_fault() {
        let mut dec = FrameDecoder::new();
        let size = (MAX_FRAME_SIZE as u32 + 1).to_le_bytes();
        dec.queue_bytes(BytesMut::from(&size[..]));
        assert!(matches!(
            dec.try_next_frame(),
            Err(FramingError::Oversized(_))
        ));
    }

    #[test]
    fn short_frames_split_on_size_field() {
        // protocol 0xC001, size 11, pcId 5, gate 0, body [9, 9].
        let mut frame = Vec::new();
        frame.extend_from_slice(&0xC001_u16.to_le_bytes());
        frame.extend_from_slice(&11_u16.to_le_bytes());
        frame.extend_from_slice(&5_u32.to_le_bytes());
        frame.push(0);
        frame.extend_from_slice(&[9, 9]);

        let mut dec = MsFrameDecoder::new();
        for chunk in frame.chunks(3) {
            dec.queue_bytes(BytesMut::from(chunk));
        }

        let out = dec.try_next_frame().unwrap().unwrap();
        assert_eq!(&out[..], &frame[..]);
    }

    #[test]
    fn short_frame_zero_size_is_a_fault() {
        let mut dec = MsFrameDecoder::new();
        dec.queue_bytes(BytesMut::from(&[0_u8, 0, 0, 0][..]));
        assert!(matches!(dec.try_next_frame(), Err(FramingError::Runt(0))));
    }
}
