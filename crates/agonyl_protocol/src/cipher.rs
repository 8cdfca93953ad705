//! The "Dyn562" stream cipher applied on the client ↔ gate link only.
//!
//! The first 12 bytes of a frame (size, pcId, ctrl, cmd and the protocol
//! word) stay cleartext. Every aligned 4-byte block past offset 12 is
//! processed with a key state local to that block, so frames and blocks are
//! independent of each other. A trailing remainder of fewer than 4 bytes is
//! left untouched.
//!
//! Both directions update the running key from the *ciphertext* byte (the
//! pre-XOR byte when decrypting, the post-XOR byte when encrypting), which
//! is what makes the two operations mutual inverses. Arithmetic is wrapping
//! 32-bit.

const CONST_KEY1: i32 = 0x241AE7;
const CONST_KEY2: i32 = 0x15DCB2;

/// Offset of the first enciphered byte in a frame.
const CIPHER_OFFSET: usize = 12;

#[derive(Clone, Copy, Debug)]
pub struct Dyn562 {
    dynamic_key: i32,
}

impl Dyn562 {
    pub fn new(dynamic_key: i32) -> Self {
        Self { dynamic_key }
    }

    pub fn decrypt(&self, data: &mut [u8]) {
        let mut i = CIPHER_OFFSET;
        while i + 4 <= data.len() {
            let mut key = self.dynamic_key;
            for byte in &mut data[i..i + 4] {
                let src = *byte;
                *byte = src ^ (key >> 8) as u8;
                key = (i32::from(src))
                    .wrapping_add(key)
                    .wrapping_mul(CONST_KEY1)
                    .wrapping_add(CONST_KEY2);
            }

            i += 4;
        }
    }

    pub fn encrypt(&self, data: &mut [u8]) {
        let mut i = CIPHER_OFFSET;
        while i + 4 <= data.len() {
            let mut key = self.dynamic_key;
            for byte in &mut data[i..i + 4] {
                *byte ^= (key >> 8) as u8;
                key = (i32::from(*byte))
                    .wrapping_add(key)
                    .wrapping_mul(CONST_KEY1)
                    .wrapping_add(CONST_KEY2);
            }

            i += 4;
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{thread_rng, Rng};

    use super::*;

    const TEST_KEY: i32 = 0x04C478BD;

    #[test]
    fn encrypt_then_decrypt_is_identity() {
        let cipher = Dyn562::new(TEST_KEY);
        let mut rng = thread_rng();

        for len in 0..100 {
            let original: Vec<u8> = (0..len).map(|_| rng.gen()).collect();

            let mut data = original.clone();
            cipher.encrypt(&mut data);
            cipher.decrypt(&mut data);
            assert_eq!(data, original);

            let mut data = original.clone();
            cipher.decrypt(&mut data);
            cipher.encrypt(&mut data);
            assert_eq!(data, original);
        }
    }

    #[test]
    fn head_bytes_are_never_touched() {
        let cipher = Dyn562::new(TEST_KEY);
        let mut rng = thread_rng();

        let original: Vec<u8> = (0..64).map(|_| rng.gen()).collect();
        let mut data = original.clone();
        cipher.encrypt(&mut data);
        assert_eq!(&data[..12], &original[..12]);
    }

    #[test]
    fn trailing_remainder_is_never_touched() {
        let cipher = Dyn562::new(TEST_KEY);

        // 12-byte head, one full block, 3 trailing bytes.
        let mut data = vec![0xAB_u8; 19];
        cipher.encrypt(&mut data);
        assert_eq!(&data[16..], &[0xAB, 0xAB, 0xAB]);
    }

    #[test]
    fn known_ciphertext_fixture() {
        let cipher = Dyn562::new(TEST_KEY);

        let mut data = vec![0_u8; 28];
        cipher.encrypt(&mut data);

        // Key state is per-block, so the zeroed blocks encipher identically.
        let expected_block = [0x78, 0x9D, 0x01, 0xF5];
        assert_eq!(&data[12..16], &expected_block);
        assert_eq!(&data[16..20], &expected_block);
        assert_eq!(&data[20..24], &expected_block);
        assert_eq!(&data[24..28], &expected_block);
    }
}
