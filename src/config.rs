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

use std::time::Duration;

/// What the command layer does when an exchange times out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Report the timeout to the caller
    #[default]
    Abort,
    /// Log it and carry on with a zero-filled reply
    Continue,
}

/// Link and session tuning
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Wall-clock budget of a single exchange
    pub exchange_timeout: Duration,
    /// Minimum gap between two exchanges
    pub exchange_delay: Duration,
    /// Length of one control-loop frame
    pub frame_interval: Duration,
    /// Inconclusive probes tolerated before the peer counts as gone
    pub debounce_frames: u32,
    pub timeout_policy: TimeoutPolicy,
    /// Start the upload as soon as the peer is ready
    pub auto_start: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            exchange_timeout: Duration::from_secs(5),
            exchange_delay: Duration::from_micros(50),
            frame_interval: Duration::from_micros(16_667),
            debounce_frames: 60,
            timeout_policy: TimeoutPolicy::Abort,
            auto_start: false,
        }
    }
}
