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

use std::io::BufRead;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use log::warn;

/// User actions, fed to the session once per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Start,
    Increment,
    Decrement,
    Send,
    Disconnect,
    Exit,
}

impl Trigger {
    fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl FromStr for Trigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "start" | "a" => Ok(Trigger::Start),
            "up" | "+" => Ok(Trigger::Increment),
            "down" | "-" => Ok(Trigger::Decrement),
            "send" | "s" => Ok(Trigger::Send),
            "disconnect" | "z" => Ok(Trigger::Disconnect),
            "exit" | "quit" | "q" => Ok(Trigger::Exit),
            other => Err(format!("Unknown command: '{}'", other)),
        }
    }
}

/// Triggers pressed during one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInput {
    pressed: u8,
}

impl FrameInput {
    pub fn with(triggers: &[Trigger]) -> Self {
        let mut input = FrameInput::default();
        for &trigger in triggers {
            input.press(trigger);
        }
        input
    }

    pub fn press(&mut self, trigger: Trigger) {
        self.pressed |= trigger.bit();
    }

    pub fn pressed(&self, trigger: Trigger) -> bool {
        self.pressed & trigger.bit() != 0
    }
}

pub trait InputSource {
    fn poll(&mut self) -> FrameInput;
}

// ============================================================================
// Stdin Input
// ============================================================================

/// Reads one command per line from stdin on a background thread.
pub struct StdinInput {
    rx: Receiver<Trigger>,
    closed: bool,
}

impl StdinInput {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Trigger>() {
                    Ok(trigger) => {
                        if tx.send(trigger).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("{}", e),
                }
            }
        });
        StdinInput { rx, closed: false }
    }
}

impl InputSource for StdinInput {
    fn poll(&mut self) -> FrameInput {
        let mut input = FrameInput::default();
        loop {
            match self.rx.try_recv() {
                Ok(trigger) => input.press(trigger),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // End of input leaves the loop like an explicit exit
                    if !self.closed {
                        self.closed = true;
                        warn!("stdin closed, exiting");
                    }
                    input.press(Trigger::Exit);
                    break;
                }
            }
        }
        input
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_triggers() {
        assert_eq!("start".parse::<Trigger>(), Ok(Trigger::Start));
        assert_eq!(" UP ".parse::<Trigger>(), Ok(Trigger::Increment));
        assert_eq!("-".parse::<Trigger>(), Ok(Trigger::Decrement));
        assert_eq!("z".parse::<Trigger>(), Ok(Trigger::Disconnect));
        assert_eq!("quit".parse::<Trigger>(), Ok(Trigger::Exit));
        assert!("jump".parse::<Trigger>().is_err());
    }

    #[test]
    fn test_frame_input() {
        let input = FrameInput::with(&[Trigger::Send, Trigger::Exit]);
        assert!(input.pressed(Trigger::Send));
        assert!(input.pressed(Trigger::Exit));
        assert!(!input.pressed(Trigger::Start));
        assert_eq!(FrameInput::default(), FrameInput::with(&[]));
    }
}
