use std::fmt;
use std::io::Write;

use crate::{Decode, Encode};

/// A NUL-padded fixed-width string field. The historical client reads these
/// up to the first NUL byte; anything after it is ignored but still
/// transmitted. Over-long input is truncated to `N` bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FixedStr<const N: usize>([u8; N]);

impl<const N: usize> FixedStr<N> {
    pub fn new(s: &str) -> Self {
        let mut bytes = [0_u8; N];
        let len = s.len().min(N);
        bytes[..len].copy_from_slice(&s.as_bytes()[..len]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    /// The string up to the first NUL, lossily decoded.
    pub fn to_str(&self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(N);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }

    /// Like [`to_str`](Self::to_str) but with surrounding whitespace
    /// stripped, the way credential fields are read.
    pub fn to_str_trimmed(&self) -> String {
        self.to_str().trim().to_owned()
    }
}

impl<const N: usize> Default for FixedStr<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> From<&str> for FixedStr<N> {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl<const N: usize> fmt::Debug for FixedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedStr::<{N}>({:?})", self.to_str())
    }
}

impl<const N: usize> Encode for FixedStr<N> {
    fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
        Ok(w.write_all(&self.0)?)
    }
}

impl<const N: usize> Decode for FixedStr<N> {
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
        anyhow::ensure!(
            r.len() >= N,
            "not enough data for a {N}-byte string field (got {})",
            r.len()
        );

        let (field, rest) = r.split_at(N);
        *r = rest;

        let mut bytes = [0_u8; N];
        bytes.copy_from_slice(field);
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_until_first_nul() {
        let mut bytes = [0_u8; 21];
        bytes[..5].copy_from_slice(b"alice");
        bytes[7] = b'x'; // garbage past the terminator
        assert_eq!(FixedStr::from_bytes(bytes).to_str(), "alice");
    }

    #[test]
    fn truncates_over_long_input() {
        let s = FixedStr::<4>::new("abcdef");
        assert_eq!(s.as_bytes(), b"abcd");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let s = FixedStr::<21>::new("  bob ");
        assert_eq!(s.to_str_trimmed(), "bob");
        assert_eq!(s.to_str(), "  bob ");
    }

    #[test]
    fn round_trip() {
        let s = FixedStr::<17>::new("Gate01");
        let mut buf = Vec::new();
        s.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 17);

        let mut r = &buf[..];
        let decoded = FixedStr::<17>::decode(&mut r).unwrap();
        assert!(r.is_empty());
        assert_eq!(decoded, s);
    }
}
