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

#[cfg(test)]
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::{Duration, Instant};
use serialport::{SerialPort as SerialPortTrait, DataBits, Parity, StopBits};
use thiserror::Error;
use crate::clock::Clock;
use crate::protocol::{CMD_STATUS, PROBE_NO_RESPONSE, STATUS_REPLY_LEN};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("exchange timed out (command 0x{command:02X})")]
    Timeout { command: u8 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl LinkError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LinkError::Timeout { .. })
    }
}

// ============================================================================
// LinkPort Trait
// ============================================================================

/// Transport needed by the multiboot protocol: one synchronous exchange at a time.
pub trait LinkPort: Send {
    /// Sends `send` and fills `recv` with the peer's reply, waiting at most `timeout`.
    fn exchange(&mut self, send: &[u8], recv: &mut [u8], timeout: Duration) -> Result<(), LinkError>;

    /// Raw peripheral status: low byte is an error code, upper half the peer type.
    fn probe(&mut self) -> Result<u32, LinkError>;
}

// ============================================================================
// Serial Bridge Implementation
// ============================================================================

/// Byte stream the bridge talks over
pub trait Wire: Read + Write + Send {
    fn set_timeout(&mut self, timeout: Duration) -> std::io::Result<()>;
}

impl Wire for Box<dyn SerialPortTrait> {
    fn set_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        SerialPortTrait::set_timeout(self.as_mut(), timeout)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

/// Joybus adapter attached over a USB serial port.
///
/// Each exchange is framed as `[tx_len, rx_len, tx...]`; the adapter answers
/// `[status]` and, when `status` is zero, the `rx_len` reply bytes.
pub struct SerialBridge<W: Wire> {
    wire: W,
    clock: Box<dyn Clock>,
    exchange_delay: Duration,
    probe_timeout: Duration,
    last_exchange: Option<Instant>,
}

impl SerialBridge<Box<dyn SerialPortTrait>> {
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        clock: Box<dyn Clock>,
        exchange_delay: Duration,
        probe_timeout: Duration,
    ) -> Result<Self, LinkError> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(probe_timeout)
            .open()?;

        Ok(SerialBridge::new(port, clock, exchange_delay, probe_timeout))
    }
}

impl<W: Wire> SerialBridge<W> {
    pub fn new(wire: W, clock: Box<dyn Clock>, exchange_delay: Duration, probe_timeout: Duration) -> Self {
        SerialBridge { wire, clock, exchange_delay, probe_timeout, last_exchange: None }
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_exchange {
            let elapsed = self.clock.now().saturating_duration_since(last);
            if elapsed < self.exchange_delay {
                self.clock.sleep(self.exchange_delay - elapsed);
            }
        }
    }

    fn read_reply(&mut self, buf: &mut [u8], command: u8) -> Result<(), LinkError> {
        match self.wire.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Err(LinkError::Timeout { command }),
            Err(e) => Err(e.into()),
        }
    }

    /// Runs one framed exchange and returns the adapter's status byte.
    fn transact(&mut self, send: &[u8], recv: &mut [u8], timeout: Duration) -> Result<u8, LinkError> {
        let command = send.first().copied().unwrap_or(CMD_STATUS);
        self.pace();

        let mut frame = Vec::with_capacity(send.len() + 2);
        frame.push(send.len() as u8);
        frame.push(recv.len() as u8);
        frame.extend_from_slice(send);
        self.wire.write_all(&frame)?;
        self.wire.flush()?;
        self.wire.set_timeout(timeout)?;

        let result = self.read_status(recv, command);
        self.last_exchange = Some(self.clock.now());
        result
    }

    fn read_status(&mut self, recv: &mut [u8], command: u8) -> Result<u8, LinkError> {
        let mut status = [0u8; 1];
        self.read_reply(&mut status, command)?;
        if status[0] == 0 {
            self.read_reply(recv, command)?;
        }
        Ok(status[0])
    }
}

impl<W: Wire> LinkPort for SerialBridge<W> {
    fn exchange(&mut self, send: &[u8], recv: &mut [u8], timeout: Duration) -> Result<(), LinkError> {
        let command = send.first().copied().unwrap_or(CMD_STATUS);
        match self.transact(send, recv, timeout)? {
            0 => Ok(()),
            status => {
                log::debug!("adapter status 0x{:02X} for command 0x{:02X}", status, command);
                Err(LinkError::Timeout { command })
            }
        }
    }

    fn probe(&mut self) -> Result<u32, LinkError> {
        let mut reply = [0u8; STATUS_REPLY_LEN];
        let timeout = self.probe_timeout;
        match self.transact(&[CMD_STATUS], &mut reply, timeout) {
            Ok(0) => Ok(u32::from_be_bytes([reply[0], reply[1], reply[2], 0])),
            Ok(error) => Ok(error as u32),
            Err(LinkError::Timeout { .. }) => Ok(PROBE_NO_RESPONSE as u32),
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// Mock Link for Testing
// ============================================================================

#[cfg(test)]
pub struct MockLink {
    // Reply to each exchange in order (None = timeout)
    replies: VecDeque<Option<Vec<u8>>>,
    replies_total: usize,
    // Probe results in order, then `idle_probe` forever
    probes: VecDeque<u32>,
    idle_probe: u32,
    // Track what was sent
    send_log: Vec<Vec<u8>>,
    // Expected sends for verification
    expected_sends: Vec<Vec<u8>>,
}

#[cfg(test)]
impl MockLink {
    pub fn new(replies: Vec<Option<Vec<u8>>>, expected_sends: Vec<Vec<u8>>) -> Self {
        MockLink {
            replies_total: replies.len(),
            replies: replies.into(),
            probes: VecDeque::new(),
            idle_probe: crate::protocol::PEER_TYPE_HANDHELD,
            send_log: Vec::new(),
            expected_sends,
        }
    }

    pub fn with_probes(mut self, probes: Vec<u32>, idle_probe: u32) -> Self {
        self.probes = probes.into();
        self.idle_probe = idle_probe;
        self
    }
}

#[cfg(test)]
impl LinkPort for MockLink {
    fn exchange(&mut self, send: &[u8], recv: &mut [u8], _timeout: Duration) -> Result<(), LinkError> {
        self.send_log.push(send.to_vec());
        match self.replies.pop_front() {
            Some(Some(reply)) => {
                let n = reply.len().min(recv.len());
                recv[..n].copy_from_slice(&reply[..n]);
                Ok(())
            }
            // Out of replies or scripted None = timeout
            _ => Err(LinkError::Timeout { command: send[0] }),
        }
    }

    fn probe(&mut self) -> Result<u32, LinkError> {
        Ok(self.probes.pop_front().unwrap_or(self.idle_probe))
    }
}

#[cfg(test)]
impl Drop for MockLink {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }

        assert!(
            self.replies.is_empty(),
            "MockLink dropped with {} unconsumed replies (used {} of {})",
            self.replies.len(),
            self.replies_total - self.replies.len(),
            self.replies_total
        );

        assert_eq!(
            &self.send_log,
            &self.expected_sends,
            "MockLink send log mismatch!\nExpected {} exchanges:\n{:02X?}\nGot {} exchanges:\n{:02X?}",
            self.expected_sends.len(),
            self.expected_sends,
            self.send_log.len(),
            self.send_log
        );
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::io::Cursor;

    /// In-memory adapter: replays `input`, records what the host wrote.
    struct FakeWire {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for FakeWire {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.input.read(buf)?;
            if n == 0 && !buf.is_empty() {
                return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "Fake timeout"));
            }
            Ok(n)
        }
    }

    impl Write for FakeWire {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Wire for FakeWire {
        fn set_timeout(&mut self, _timeout: Duration) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn bridge(input: Vec<u8>, clock: &ManualClock) -> SerialBridge<FakeWire> {
        let wire = FakeWire { input: Cursor::new(input), output: Vec::new() };
        SerialBridge::new(wire, Box::new(clock.clone()), Duration::from_micros(50), Duration::from_millis(20))
    }

    #[test]
    fn test_bridge_frames_exchange() {
        let clock = ManualClock::new();
        let mut link = bridge(vec![0x00, 0x11, 0x22, 0x33, 0x44, 0x08], &clock);

        let mut recv = [0u8; 5];
        link.exchange(&[0x14], &mut recv, Duration::from_secs(5)).unwrap();

        assert_eq!(recv, [0x11, 0x22, 0x33, 0x44, 0x08]);
        assert_eq!(link.wire.output, vec![1, 5, 0x14]);
    }

    #[test]
    fn test_bridge_error_status_is_timeout() {
        let clock = ManualClock::new();
        let mut link = bridge(vec![PROBE_NO_RESPONSE], &clock);

        let mut recv = [0u8; 1];
        let err = link.exchange(&[0x15, 1, 2, 3, 4], &mut recv, Duration::from_secs(5)).unwrap_err();

        assert!(matches!(err, LinkError::Timeout { command: 0x15 }));
        assert_eq!(link.wire.output, vec![5, 1, 0x15, 1, 2, 3, 4]);
    }

    #[test]
    fn test_bridge_silent_adapter_is_timeout() {
        let clock = ManualClock::new();
        let mut link = bridge(vec![], &clock);

        let mut recv = [0u8; 3];
        let err = link.exchange(&[0xFF], &mut recv, Duration::from_secs(5)).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_bridge_probe() {
        let clock = ManualClock::new();
        let mut link = bridge(vec![0x00, 0x00, 0x04, 0x10, 0x80], &clock);

        assert_eq!(link.probe().unwrap(), 0x0004_1000);
        assert_eq!(link.probe().unwrap(), 0x80);
        // Adapter stopped answering
        assert_eq!(link.probe().unwrap(), PROBE_NO_RESPONSE as u32);
    }

    #[test]
    fn test_bridge_honours_exchange_delay() {
        let clock = ManualClock::new();
        let mut link = bridge(vec![0x00; 6], &clock);

        let mut recv = [0u8; 1];
        link.exchange(&[0x15, 0, 0, 0, 0], &mut recv, Duration::from_secs(5)).unwrap();
        clock.advance(Duration::from_micros(20));
        link.exchange(&[0x15, 0, 0, 0, 0], &mut recv, Duration::from_secs(5)).unwrap();
        clock.advance(Duration::from_micros(80));
        link.exchange(&[0x15, 0, 0, 0, 0], &mut recv, Duration::from_secs(5)).unwrap();

        assert_eq!(clock.slept(), vec![Duration::from_micros(30)]);
    }
}
