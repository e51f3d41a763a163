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

//! Command layer over a [`LinkPort`]: reset, status, read and write.

use log::{debug, warn};
use crate::config::{LinkConfig, TimeoutPolicy};
use crate::link::{LinkError, LinkPort};
use crate::protocol::*;

/// Reply to a read command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadReply {
    pub value: u32,
    pub flags: u8,
}

impl ReadReply {
    /// The peer wrote a value since the last read.
    pub fn has_data(&self) -> bool {
        self.flags & READ_HAS_DATA != 0
    }
}

pub fn command_name(command: u8) -> &'static str {
    match command {
        CMD_RESET => "reset",
        CMD_STATUS => "status",
        CMD_READ => "read",
        CMD_WRITE => "write",
        _ => "unknown",
    }
}

pub struct Joybus {
    port: Box<dyn LinkPort>,
    config: LinkConfig,
}

impl Joybus {
    pub fn new(port: Box<dyn LinkPort>, config: LinkConfig) -> Self {
        Joybus { port, config }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    fn transfer(&mut self, send: &[u8], recv: &mut [u8]) -> Result<(), LinkError> {
        recv.fill(0);
        match self.port.exchange(send, recv, self.config.exchange_timeout) {
            Err(e) if e.is_timeout() && self.config.timeout_policy == TimeoutPolicy::Continue => {
                warn!("{} timed out, continuing with an empty reply", command_name(send[0]));
                recv.fill(0);
                Ok(())
            }
            result => result,
        }
    }

    pub fn reset(&mut self) -> Result<[u8; RESET_REPLY_LEN], LinkError> {
        let mut reply = [0u8; RESET_REPLY_LEN];
        self.transfer(&[CMD_RESET], &mut reply)?;
        debug!("reset -> {:02X?}", reply);
        Ok(reply)
    }

    pub fn status(&mut self) -> Result<[u8; STATUS_REPLY_LEN], LinkError> {
        let mut reply = [0u8; STATUS_REPLY_LEN];
        self.transfer(&[CMD_STATUS], &mut reply)?;
        debug!("status -> {:02X?}", reply);
        Ok(reply)
    }

    pub fn read(&mut self) -> Result<ReadReply, LinkError> {
        let mut reply = [0u8; READ_REPLY_LEN];
        self.transfer(&[CMD_READ], &mut reply)?;
        Ok(ReadReply {
            value: u32::from_le_bytes([reply[0], reply[1], reply[2], reply[3]]),
            flags: reply[4],
        })
    }

    pub fn write(&mut self, value: u32) -> Result<u8, LinkError> {
        let [b0, b1, b2, b3] = value.to_le_bytes();
        let mut reply = [0u8; WRITE_REPLY_LEN];
        self.transfer(&[CMD_WRITE, b0, b1, b2, b3], &mut reply)?;
        Ok(reply[0])
    }

    pub fn probe(&mut self) -> Result<u32, LinkError> {
        self.port.probe()
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

#[cfg(test)]
pub fn write_frame(value: u32) -> Vec<u8> {
    let mut frame = vec![CMD_WRITE];
    frame.extend_from_slice(&value.to_le_bytes());
    frame
}

#[cfg(test)]
pub fn read_reply(value: u32, flags: u8) -> Option<Vec<u8>> {
    let mut reply = value.to_le_bytes().to_vec();
    reply.push(flags);
    Some(reply)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MockLink;

    fn bus(mock: MockLink, policy: TimeoutPolicy) -> Joybus {
        let config = LinkConfig { timeout_policy: policy, ..LinkConfig::default() };
        Joybus::new(Box::new(mock), config)
    }

    #[test]
    fn test_read_decodes_little_endian() {
        let mock = MockLink::new(vec![Some(vec![0x11, 0x22, 0x33, 0x44, 0x08])], vec![vec![CMD_READ]]);
        let mut bus = bus(mock, TimeoutPolicy::Abort);

        let reply = bus.read().unwrap();
        assert_eq!(reply.value, 0x4433_2211);
        assert!(reply.has_data());
    }

    #[test]
    fn test_write_encodes_little_endian() {
        let mock = MockLink::new(vec![Some(vec![0x00])], vec![vec![CMD_WRITE, 0xD9, 0xCF, 0xE1, 0xCB]]);
        let mut bus = bus(mock, TimeoutPolicy::Abort);

        bus.write(0xCBE1_CFD9).unwrap();
    }

    #[test]
    fn test_reset_and_status_frames() {
        let mock = MockLink::new(
            vec![Some(vec![0, 0, 0]), Some(vec![0x00, 0x04, 0x10])],
            vec![vec![CMD_RESET], vec![CMD_STATUS]],
        );
        let mut bus = bus(mock, TimeoutPolicy::Abort);

        bus.reset().unwrap();
        assert_eq!(bus.status().unwrap(), [0x00, 0x04, 0x10]);
    }

    #[test]
    fn test_timeout_aborts_by_default() {
        let mock = MockLink::new(vec![None], vec![vec![CMD_READ]]);
        let mut bus = bus(mock, TimeoutPolicy::Abort);

        let err = bus.read().unwrap_err();
        assert!(matches!(err, LinkError::Timeout { command: CMD_READ }));
    }

    #[test]
    fn test_timeout_continues_with_zeroes() {
        let mock = MockLink::new(vec![None, None], vec![vec![CMD_READ], write_frame(7)]);
        let mut bus = bus(mock, TimeoutPolicy::Continue);

        assert_eq!(bus.read().unwrap(), ReadReply { value: 0, flags: 0 });
        assert_eq!(bus.write(7).unwrap(), 0);
    }
}
