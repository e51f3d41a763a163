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

use std::time::{Duration, Instant};

// ============================================================================
// Clock Trait
// ============================================================================

/// Time source shared by the link and the frame loop
pub trait Clock: Send {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ============================================================================
// Frame Ticker
// ============================================================================

/// Paces the control loop to a fixed frame interval, like waiting for vblank.
pub struct FrameTicker {
    clock: Box<dyn Clock>,
    interval: Duration,
    next: Instant,
    frame: u64,
}

impl FrameTicker {
    pub fn new(clock: Box<dyn Clock>, interval: Duration) -> Self {
        let next = clock.now() + interval;
        FrameTicker { clock, interval, next, frame: 0 }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Blocks until the next frame boundary. An overrun frame does not sleep
    /// and the schedule restarts from now.
    pub fn wait(&mut self) {
        let now = self.clock.now();
        if now < self.next {
            self.clock.sleep(self.next - now);
            self.next += self.interval;
        } else {
            self.next = now + self.interval;
        }
        self.frame += 1;
    }
}

// ============================================================================
// Manual Clock for Testing
// ============================================================================

#[cfg(test)]
#[derive(Clone)]
pub struct ManualClock {
    now: std::sync::Arc<std::sync::Mutex<Instant>>,
    slept: std::sync::Arc<std::sync::Mutex<Vec<Duration>>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            now: std::sync::Arc::new(std::sync::Mutex::new(Instant::now())),
            slept: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.now.lock().unwrap() += duration;
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_sleeps_remaining_time() {
        let clock = ManualClock::new();
        let mut ticker = FrameTicker::new(Box::new(clock.clone()), Duration::from_millis(16));

        clock.advance(Duration::from_millis(6));
        ticker.wait();
        clock.advance(Duration::from_millis(4));
        ticker.wait();

        assert_eq!(clock.slept(), vec![Duration::from_millis(10), Duration::from_millis(12)]);
        assert_eq!(ticker.frame(), 2);
    }

    #[test]
    fn test_ticker_does_not_sleep_after_overrun() {
        let clock = ManualClock::new();
        let mut ticker = FrameTicker::new(Box::new(clock.clone()), Duration::from_millis(16));

        clock.advance(Duration::from_millis(40));
        ticker.wait();
        assert!(clock.slept().is_empty());

        clock.advance(Duration::from_millis(1));
        ticker.wait();
        assert_eq!(clock.slept(), vec![Duration::from_millis(15)]);
    }
}
