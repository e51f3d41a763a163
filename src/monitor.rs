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

use std::fmt;
use log::{debug, info};
use crate::joybus::Joybus;
use crate::link::LinkError;
use crate::protocol::{PEER_TYPE_HANDHELD, PEER_TYPE_SPURIOUS, PROBE_BUSY, PROBE_NO_RESPONSE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    NoPeer,
    WrongPeerType,
    Connected,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::NoPeer => write!(f, "no response"),
            LinkStatus::WrongPeerType => write!(f, "wrong device"),
            LinkStatus::Connected => write!(f, "connected"),
        }
    }
}

/// Debounced view of the probe result.
///
/// A probe that comes back with an error code only counts down; the peer is
/// declared gone once `debounce_frames` such probes arrive in a row.
pub struct LinkMonitor {
    status: LinkStatus,
    countdown: u32,
    debounce_frames: u32,
}

impl LinkMonitor {
    pub fn new(debounce_frames: u32) -> Self {
        LinkMonitor { status: LinkStatus::NoPeer, countdown: 0, debounce_frames }
    }

    /// Probes the link and folds the result in.
    pub fn poll(&mut self, bus: &mut Joybus) -> Result<LinkStatus, LinkError> {
        let raw = bus.probe()?;
        Ok(self.update(raw))
    }

    pub fn update(&mut self, raw: u32) -> LinkStatus {
        let error = (raw & 0xFF) as u8;
        let peer_type = raw & !0xFFFF;
        let previous = self.status;

        if error != 0 {
            match error {
                PROBE_BUSY => debug!("probe 0x{:08X}: busy", raw),
                PROBE_NO_RESPONSE => debug!("probe 0x{:08X}: no response", raw),
                _ => debug!("probe 0x{:08X}: error 0x{:02X}", raw, error),
            }
            self.countdown = self.countdown.saturating_sub(1);
            if self.countdown == 0 {
                self.status = LinkStatus::NoPeer;
            }
        } else if peer_type == PEER_TYPE_HANDHELD {
            self.status = LinkStatus::Connected;
            self.countdown = self.debounce_frames;
        } else if peer_type == PEER_TYPE_SPURIOUS {
            debug!("probe 0x{:08X}: ignoring transient peer type", raw);
        } else {
            self.status = LinkStatus::WrongPeerType;
            self.countdown = self.debounce_frames;
        }

        if self.status != previous {
            info!("link status: {} (probe 0x{:08X})", self.status, raw);
        }
        self.status
    }

    /// Drops the debounce so the next inconclusive probe reports `NoPeer`.
    pub fn force_disconnect(&mut self) {
        self.countdown = 0;
    }
}

// ============================================================================
// Tests
// ============================================================================
