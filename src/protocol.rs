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

//! Joybus multiboot protocol constants

/// Reset - resets the peer's link session, answered with 3 bytes
pub const CMD_RESET: u8 = 0xFF;

/// Status - polls the peer's boot firmware, answered with 3 bytes
pub const CMD_STATUS: u8 = 0x00;

/// Read - receives a 32-bit little-endian value plus a status byte
pub const CMD_READ: u8 = 0x14;

/// Write - sends a 32-bit little-endian value, answered with 1 byte
pub const CMD_WRITE: u8 = 0x15;

/// Reply lengths for each command
pub const RESET_REPLY_LEN: usize = 3;
pub const STATUS_REPLY_LEN: usize = 3;
pub const READ_REPLY_LEN: usize = 5;
pub const WRITE_REPLY_LEN: usize = 1;

/// Bit of the third status byte set once the boot firmware accepts a key
pub const STATUS_BIOS_READY: u8 = 0x10;

/// Bit of the fifth read byte set when the peer wrote a fresh value
pub const READ_HAS_DATA: u8 = 0x08;

/// Probe error code: peripheral busy
pub const PROBE_BUSY: u8 = 0x80;

/// Probe error code: nothing answered
pub const PROBE_NO_RESPONSE: u8 = 0x08;

/// Peer type reported by a handheld waiting in its boot firmware
pub const PEER_TYPE_HANDHELD: u32 = 0x0004_0000;

/// Peer type occasionally reported while a handheld is attached
pub const PEER_TYPE_SPURIOUS: u32 = 0x0800_0000;

/// Bytes at the start of the image that are sent in the clear
pub const HEADER_SIZE: u32 = 0xC0;

/// Smallest transfer window the key derivation accepts
pub const MIN_WINDOW: u32 = 0x200;

/// Largest image the handheld can hold in its multiboot area
pub const MAX_IMAGE_SIZE: u32 = 0x4_0000;

/// Initial value of the payload checksum
pub const CHECKSUM_SEED: u32 = 0x15A0;

/// Feedback polynomial of the payload checksum
pub const CHECKSUM_FEEDBACK: u32 = 0xA1C1;

/// Tag OR'd into the scrambled window size during key derivation
pub const KEY_SIZE_TAG: u32 = 0x38_0000;

/// Mask OR'd into the spread key value
pub const KEY_SPREAD_MASK: u32 = 0x8080_8080;

/// Byte patterns XOR'd into the local key, picked by bit 9 of the spread value
pub const KEY_PATTERN_KAWA: [u8; 4] = *b"Kawa";
pub const KEY_PATTERN_SEDO: [u8; 4] = *b"sedo";

/// Constant folded into the key received from the peer
pub const REMOTE_KEY_XOR: u32 = 0x7365_646F;

/// Multiplier of the cipher's key recurrence
pub const CIPHER_MULTIPLIER: u32 = 0x6177_614B;

/// Base added to the byte offset before it is negated into the mask
pub const CIPHER_OFFSET_BASE: u32 = 0x20 << 20;

/// Constant XOR'd into every cipher mask
pub const CIPHER_MASK_XOR: u32 = 0x2079_6220;
