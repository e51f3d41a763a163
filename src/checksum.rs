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

use crate::protocol::{CHECKSUM_FEEDBACK, CHECKSUM_SEED};

/// Folds one 32-bit payload word into the running checksum, LSB first.
pub fn fold(checksum: u32, word: u32) -> u32 {
    let mut crc = checksum;
    let mut val = word;
    for _ in 0..32 {
        if (crc ^ val) & 1 != 0 {
            crc = (crc >> 1) ^ CHECKSUM_FEEDBACK;
        } else {
            crc >>= 1;
        }
        val >>= 1;
    }
    crc
}

/// Running checksum over the ciphered part of the transfer window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum(u32);

impl Checksum {
    pub fn new() -> Self {
        Checksum(CHECKSUM_SEED)
    }

    pub fn update(&mut self, word: u32) {
        self.0 = fold(self.0, word);
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Combines the accumulated value with the unpadded image length.
    pub fn finish(self, image_len: u32) -> u32 {
        self.0 | (image_len << 16)
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_known_values() {
        assert_eq!(fold(CHECKSUM_SEED, 0), 0x8613);
        assert_eq!(fold(CHECKSUM_SEED, 1), 0x493B);
        assert_eq!(fold(CHECKSUM_SEED, 0xDEAD_BEEF), 0x76E1);
    }

    #[test]
    fn test_fold_is_order_sensitive() {
        let mut ab = Checksum::new();
        ab.update(1);
        ab.update(2);

        let mut ba = Checksum::new();
        ba.update(2);
        ba.update(1);

        assert_eq!(ab.value(), 0x743F);
        assert_eq!(ba.value(), 0x20D4);
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_finish_ors_in_length() {
        let checksum = Checksum::new();
        assert_eq!(checksum.finish(0x200), 0x0200_15A0);
    }
}
