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

use log::debug;
use crate::joybus::Joybus;
use crate::link::LinkError;
use crate::protocol::STATUS_BIOS_READY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    AwaitingBios,
    Ready,
}

/// Reset/status sequence that waits for the peer's boot firmware.
pub struct Handshake {
    state: HandshakeState,
    attempts: u32,
}

impl Handshake {
    pub fn new() -> Self {
        Handshake { state: HandshakeState::AwaitingBios, attempts: 0 }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn restart(&mut self) {
        self.state = HandshakeState::AwaitingBios;
        self.attempts = 0;
    }

    /// Issues one reset followed by one status command.
    ///
    /// A timed-out command just means the firmware is not ready yet.
    pub fn attempt(&mut self, bus: &mut Joybus) -> Result<HandshakeState, LinkError> {
        self.attempts += 1;

        let status = match bus.reset().and_then(|_| bus.status()) {
            Ok(status) => status,
            Err(e) if e.is_timeout() => {
                debug!("handshake attempt {}: {}", self.attempts, e);
                [0u8; 3]
            }
            Err(e) => return Err(e),
        };

        if status[2] & STATUS_BIOS_READY != 0 {
            self.state = HandshakeState::Ready;
        } else {
            self.state = HandshakeState::AwaitingBios;
        }
        Ok(self.state)
    }
}

impl Default for Handshake {
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
    use crate::config::LinkConfig;
    use crate::link::MockLink;
    use crate::protocol::{CMD_RESET, CMD_STATUS};

    fn bus(mock: MockLink) -> Joybus {
        Joybus::new(Box::new(mock), LinkConfig::default())
    }

    #[test]
    fn test_ready_when_status_bit_set() {
        let mock = MockLink::new(
            vec![Some(vec![0, 0, 0]), Some(vec![0x00, 0x04, 0x10])],
            vec![vec![CMD_RESET], vec![CMD_STATUS]],
        );
        let mut bus = bus(mock);
        let mut handshake = Handshake::new();

        assert_eq!(handshake.attempt(&mut bus).unwrap(), HandshakeState::Ready);
        assert_eq!(handshake.attempts(), 1);
    }

    #[test]
    fn test_retries_until_ready() {
        let mock = MockLink::new(
            vec![
                Some(vec![0, 0, 0]), Some(vec![0x00, 0x04, 0x00]),
                None,
                Some(vec![0, 0, 0]), Some(vec![0x00, 0x04, 0x30]),
            ],
            vec![
                vec![CMD_RESET], vec![CMD_STATUS],
                vec![CMD_RESET],
                vec![CMD_RESET], vec![CMD_STATUS],
            ],
        );
        let mut bus = bus(mock);
        let mut handshake = Handshake::new();

        assert_eq!(handshake.attempt(&mut bus).unwrap(), HandshakeState::AwaitingBios);
        assert_eq!(handshake.attempt(&mut bus).unwrap(), HandshakeState::AwaitingBios);
        assert_eq!(handshake.attempt(&mut bus).unwrap(), HandshakeState::Ready);
        assert_eq!(handshake.attempts(), 3);

        handshake.restart();
        assert_eq!(handshake.attempts(), 0);
    }
}
