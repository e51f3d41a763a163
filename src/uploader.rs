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

use log::{info, trace};
use thiserror::Error;
use crate::checksum::Checksum;
use crate::crypto::{decode_remote_key, derive_local_key, encode_local_key, StreamCipher};
use crate::handshake::{Handshake, HandshakeState};
use crate::image::ProgramImage;
use crate::joybus::Joybus;
use crate::link::LinkError;
use crate::monitor::{LinkMonitor, LinkStatus};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum TransferFailure {
    #[error("peer lost during transfer ({0})")]
    PeerLost(LinkStatus),
    #[error(transparent)]
    Link(#[from] LinkError),
}

impl TransferFailure {
    /// Host-side failures that retrying with the same adapter cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransferFailure::Link(e) if !e.is_timeout())
    }
}

/// Final reply of the peer. Not checked against anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub value: u32,
}

// ============================================================================
// Session
// ============================================================================

/// State of one upload attempt, advanced word by word.
pub struct Session {
    pub local_key: u32,
    pub remote_key: u32,
    cursor: u32,
    checksum: Checksum,
    cipher: StreamCipher,
}

impl Session {
    pub fn new(local_key: u32, remote_key: u32) -> Self {
        Session {
            local_key,
            remote_key,
            cursor: 0,
            checksum: Checksum::new(),
            cipher: StreamCipher::new(remote_key),
        }
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn cipher(&self) -> &StreamCipher {
        &self.cipher
    }

    /// Running checksum, before the length is folded in.
    pub fn checksum(&self) -> u32 {
        self.checksum.value()
    }

    /// Header words go out untouched.
    pub fn header_word(&mut self, word: u32) -> u32 {
        self.cursor += 4;
        word
    }

    pub fn payload_word(&mut self, word: u32) -> u32 {
        self.checksum.update(word);
        let masked = self.cipher.encrypt(word, self.cursor);
        self.cursor += 4;
        masked
    }

    /// Masked checksum trailer, sent at the cursor just past the window.
    pub fn checksum_word(&mut self, image_len: u32) -> u32 {
        let checksum = self.checksum.finish(image_len);
        trace!("checksum 0x{:08X}", checksum);
        self.cipher.encrypt(checksum, self.cursor)
    }
}

// ============================================================================
// Uploader
// ============================================================================

pub struct Uploader<'a> {
    bus: &'a mut Joybus,
    monitor: &'a mut LinkMonitor,
    handshake: &'a mut Handshake,
}

impl<'a> Uploader<'a> {
    pub fn new(bus: &'a mut Joybus, monitor: &'a mut LinkMonitor, handshake: &'a mut Handshake) -> Self {
        Uploader { bus, monitor, handshake }
    }

    pub fn upload(&mut self, image: &ProgramImage) -> Result<Ack, TransferFailure> {
        let window = image.window();

        info!("waiting for boot firmware");
        self.wait_for_bios()?;

        let remote_key = decode_remote_key(self.bus.read()?.value);
        let mut session = Session::new(derive_local_key(window.size), remote_key);
        info!("local key 0x{:08X}, remote key 0x{:08X}", session.local_key, session.remote_key);
        self.bus.write(encode_local_key(session.local_key))?;

        for offset in window.header_offsets() {
            let word = session.header_word(image.word_at(offset));
            trace!("header 0x{:03X}: 0x{:08X}", offset, word);
            self.bus.write(word)?;
        }
        info!("header sent ({} bytes)", session.cursor());

        for offset in window.payload_offsets() {
            let word = session.payload_word(image.word_at(offset));
            trace!("payload 0x{:05X}: 0x{:08X}", offset, word);
            self.bus.write(word)?;
        }
        info!("payload sent ({} of {} bytes), checksum 0x{:04X}", image.len(), window.size, session.checksum());

        let trailer = session.checksum_word(image.len());
        trace!("trailer 0x{:08X}, cipher key 0x{:08X}", trailer, session.cipher().key());
        self.bus.write(trailer)?;

        let ack = Ack { value: self.bus.read()?.value };
        info!("transfer finished, peer replied 0x{:08X}", ack.value);
        Ok(ack)
    }

    /// Repeats the handshake for as long as the monitor still sees the peer.
    fn wait_for_bios(&mut self) -> Result<(), TransferFailure> {
        self.handshake.restart();
        loop {
            let status = self.monitor.poll(self.bus)?;
            if status != LinkStatus::Connected {
                return Err(TransferFailure::PeerLost(status));
            }
            if self.handshake.attempt(self.bus)? == HandshakeState::Ready {
                info!("boot firmware ready after {} attempts", self.handshake.attempts());
                return Ok(());
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
