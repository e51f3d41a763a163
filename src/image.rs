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

use std::path::Path;
use thiserror::Error;
use crate::protocol::{HEADER_SIZE, MAX_IMAGE_SIZE, MIN_WINDOW};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image length {0} is not a multiple of 4")]
    Malformed(usize),
    #[error("image length {0} is too small, the transfer window must be at least 0x200 bytes")]
    TooSmall(usize),
    #[error("image length {0} exceeds the 0x40000 byte multiboot area")]
    TooLarge(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Program Image
// ============================================================================

/// Executable image pushed to the handheld. Its length is always a multiple of 4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    bytes: Vec<u8>,
}

impl ProgramImage {
    pub fn new(bytes: Vec<u8>) -> Result<Self, ImageError> {
        let len = bytes.len();
        if len % 4 != 0 {
            return Err(ImageError::Malformed(len));
        }
        if len > MAX_IMAGE_SIZE as usize {
            return Err(ImageError::TooLarge(len));
        }
        if TransferWindow::for_len(len as u32).size < MIN_WINDOW {
            return Err(ImageError::TooSmall(len));
        }
        Ok(ProgramImage { bytes })
    }

    pub fn load(path: &Path) -> Result<Self, ImageError> {
        let bytes = std::fs::read(path)?;
        Self::new(bytes)
    }

    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn window(&self) -> TransferWindow {
        TransferWindow::for_len(self.len())
    }

    /// Little-endian word at `offset`, zero past the end of the image.
    pub fn word_at(&self, offset: u32) -> u32 {
        let start = offset as usize;
        match self.bytes.get(start..start + 4) {
            Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            None => 0,
        }
    }
}

// ============================================================================
// Transfer Window
// ============================================================================

/// Image length rounded up to 8 bytes: the span actually sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferWindow {
    pub size: u32,
}

impl TransferWindow {
    pub fn for_len(len: u32) -> Self {
        TransferWindow { size: (len + 7) & !7 }
    }

    /// Offsets of the words sent in the clear.
    pub fn header_offsets(&self) -> impl Iterator<Item = u32> {
        (0..HEADER_SIZE).step_by(4)
    }

    /// Offsets of the ciphered words, padding included.
    pub fn payload_offsets(&self) -> impl Iterator<Item = u32> {
        (HEADER_SIZE..self.size).step_by(4)
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
    #[case(0x1FE)]
    #[case(0x201)]
    #[case(0x203)]
    fn test_rejects_unaligned_length(#[case] len: usize) {
        assert!(matches!(ProgramImage::new(vec![0; len]), Err(ImageError::Malformed(l)) if l == len));
    }

    #[rstest]
    #[case(0)]
    #[case(0xC0)]
    #[case(0x1F8)]
    fn test_rejects_short_images(#[case] len: usize) {
        assert!(matches!(ProgramImage::new(vec![0; len]), Err(ImageError::TooSmall(_))));
    }

    #[test]
    fn test_rejects_oversized_image() {
        assert!(matches!(
            ProgramImage::new(vec![0; MAX_IMAGE_SIZE as usize + 4]),
            Err(ImageError::TooLarge(_))
        ));
        assert!(ProgramImage::new(vec![0; MAX_IMAGE_SIZE as usize]).is_ok());
    }

    #[test]
    fn test_window_rounds_to_eight() {
        assert_eq!(TransferWindow::for_len(0x1FC).size, 0x200);
        assert_eq!(TransferWindow::for_len(0x200).size, 0x200);
        assert_eq!(TransferWindow::for_len(0x204).size, 0x208);

        let image = ProgramImage::new(vec![0; 0x1FC]).unwrap();
        assert_eq!(image.window().size, 0x200);
    }

    #[test]
    fn test_word_at_pads_with_zero() {
        let mut bytes = vec![0xAA; 0x204];
        bytes[0x200..].copy_from_slice(&[0x01, 0x02, 0x03, 0x04]);
        let image = ProgramImage::new(bytes).unwrap();

        assert_eq!(image.word_at(0x200), 0x0403_0201);
        assert_eq!(image.word_at(0x204), 0);
        assert_eq!(image.window().payload_offsets().last(), Some(0x204));
    }

    #[test]
    fn test_offset_counts() {
        let window = TransferWindow::for_len(0x200);
        assert_eq!(window.header_offsets().count(), 48);
        assert_eq!(window.payload_offsets().count(), 80);
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("joyboot_missing_image.gba");
        std::fs::remove_file(&path).ok();
        assert!(matches!(ProgramImage::load(&path), Err(ImageError::Io(_))));
    }
}
