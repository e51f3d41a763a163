// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Session key exchange and the payload stream cipher
//!
//! Both sides of the link recompute these values independently, so every
//! shift and constant here has to match the handheld's boot firmware bit
//! for bit.

use crate::protocol::*;

// ============================================================================
// Key Exchange
// ============================================================================

/// Derives the key the host announces for a transfer window of `window_size` bytes.
///
/// `window_size` must be at least [`MIN_WINDOW`]; callers validate this through
/// [`crate::image::ProgramImage`].
pub fn derive_local_key(window_size: u32) -> u32 {
    let n = window_size.wrapping_sub(MIN_WINDOW) >> 3;

    let scrambled = ((n & 0x3F80) << 1) | ((n & 0x4000) << 2) | (n & 0x7F) | KEY_SIZE_TAG;

    let sum = (scrambled >> 8)
        .wrapping_add(scrambled >> 16)
        .wrapping_add(scrambled);
    let spread = (sum << 24) | scrambled | KEY_SPREAD_MASK;

    let pattern = if spread & 0x200 == 0 {
        KEY_PATTERN_KAWA
    } else {
        KEY_PATTERN_SEDO
    };

    // Low byte of the spread value lands in the top byte of the key.
    let bytes = spread.to_le_bytes();
    u32::from_be_bytes([
        bytes[0] ^ pattern[0],
        bytes[1] ^ pattern[1],
        bytes[2] ^ pattern[2],
        bytes[3] ^ pattern[3],
    ])
}

/// Turns the word read from the peer into the cipher seed.
pub fn decode_remote_key(received: u32) -> u32 {
    (received.swap_bytes() ^ REMOTE_KEY_XOR).swap_bytes()
}

/// Value handed to a write command so the local key goes out big-endian.
pub fn encode_local_key(local_key: u32) -> u32 {
    local_key.swap_bytes()
}

// ============================================================================
// Stream Cipher
// ============================================================================

/// Linear-congruential keystream applied to every payload word.
///
/// Obfuscation only, not a secure cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCipher {
    key: u32,
}

impl StreamCipher {
    pub fn new(seed: u32) -> Self {
        StreamCipher { key: seed }
    }

    pub fn key(&self) -> u32 {
        self.key
    }

    /// Moves the key to the state used for the next word.
    pub fn advance(&mut self) {
        self.key = self.key.wrapping_mul(CIPHER_MULTIPLIER).wrapping_add(1);
    }

    /// Mask for the word at byte `offset` under the current key.
    pub fn mask(&self, offset: u32) -> u32 {
        self.key ^ offset.wrapping_add(CIPHER_OFFSET_BASE).wrapping_neg() ^ CIPHER_MASK_XOR
    }

    /// Masks (or unmasks) `word` at `offset` without advancing.
    pub fn apply(&self, word: u32, offset: u32) -> u32 {
        word ^ self.mask(offset)
    }

    /// Advances the key, then masks `word`. This is what goes on the wire.
    pub fn encrypt(&mut self, word: u32, offset: u32) -> u32 {
        self.advance();
        self.apply(word, offset)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0x200, 0xCBE1_CFD9)]
    #[case(0x208, 0xCAE1_CFD8)]
    #[case(0x1000, 0xB3E6_DC94)]
    #[case(0x8000, 0xB3FA_DCF8)]
    #[case(0x4_0000, 0xB39A_DD97)]
    fn test_derive_local_key(#[case] window: u32, #[case] expected: u32) {
        assert_eq!(derive_local_key(window), expected);
    }

    #[test]
    fn test_derive_local_key_is_deterministic() {
        for window in (MIN_WINDOW..0x2000).step_by(8) {
            assert_eq!(derive_local_key(window), derive_local_key(window));
        }
    }

    #[test]
    fn test_remote_key_decoding() {
        // Bytes 11 22 33 44 read little-endian.
        assert_eq!(decode_remote_key(0x4433_2211), 0x2B57_4762);
        assert_eq!(decode_remote_key(0x4433_2211), 0x4433_2211 ^ 0x6F64_6573);
    }

    #[test]
    fn test_local_key_goes_out_big_endian() {
        let wire = encode_local_key(0xCBE1_CFD9);
        assert_eq!(wire.to_le_bytes(), [0xCB, 0xE1, 0xCF, 0xD9]);
    }

    #[test]
    fn test_cipher_advance() {
        let mut cipher = StreamCipher::new(0);
        cipher.advance();
        assert_eq!(cipher.key(), 1);
        cipher.advance();
        assert_eq!(cipher.key(), 0x6177_614C);
    }

    #[test]
    fn test_cipher_mask_known_value() {
        let mut cipher = StreamCipher::new(0);
        assert_eq!(cipher.encrypt(0, 0xC0), 0xDD86_9D61);
    }

    #[test]
    fn test_cipher_is_self_inverse() {
        let mut cipher = StreamCipher::new(0x2B57_4762);
        for offset in (HEADER_SIZE..0x400).step_by(4) {
            cipher.advance();
            let word = offset.wrapping_mul(0x0101_0101) ^ 0xA5A5_5A5A;
            let masked = cipher.apply(word, offset);
            assert_eq!(cipher.apply(masked, offset), word);
        }
    }

    #[test]
    fn test_both_sides_agree() {
        let mut host = StreamCipher::new(0x1234_5678);
        let mut peer = StreamCipher::new(0x1234_5678);
        for offset in (HEADER_SIZE..0x200).step_by(4) {
            let sent = host.encrypt(offset, offset);
            assert_eq!(peer.encrypt(sent, offset), offset);
        }
    }
}
