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

use std::marker::PhantomData;
use log::{debug, error, warn};
use thiserror::Error;
use crate::handshake::{Handshake, HandshakeState};
use crate::image::ProgramImage;
use crate::input::{FrameInput, Trigger};
use crate::joybus::Joybus;
use crate::link::LinkError;
use crate::monitor::{LinkMonitor, LinkStatus};
use crate::uploader::{TransferFailure, Uploader};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("transfer failed: {0}")]
    Transfer(TransferFailure),
    #[error("exit requested")]
    Exit,
}

// ============================================================================
// States
// ============================================================================

pub struct WaitingForPeer;
pub struct PeerReady;
pub struct Idle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    WaitingForPeer,
    PeerReady,
    Idle,
}

// ============================================================================
// FSM Structure
// ============================================================================

pub struct SessionFsm<State> {
    state: PhantomData<State>,
    bus: Joybus,
    monitor: LinkMonitor,
    handshake: Handshake,
    image: ProgramImage,
    send_value: u32,
}

// ============================================================================
// Trait
// ============================================================================

pub trait SessionState: Send {
    fn step(self: Box<Self>, input: &FrameInput) -> Result<Box<dyn SessionState>, SessionError>;

    fn upload_state(&self) -> UploadState;
}

// ============================================================================
// Helpers shared by all states
// ============================================================================

impl<S> SessionFsm<S> {
    fn transition<T>(self) -> Box<SessionFsm<T>> {
        Box::new(SessionFsm {
            state: PhantomData,
            bus: self.bus,
            monitor: self.monitor,
            handshake: self.handshake,
            image: self.image,
            send_value: self.send_value,
        })
    }

    /// Start of every frame: honour an exit request, then probe the link.
    fn begin_frame(&mut self, input: &FrameInput) -> Result<LinkStatus, SessionError> {
        if input.pressed(Trigger::Exit) {
            return Err(SessionError::Exit);
        }
        Ok(self.monitor.poll(&mut self.bus)?)
    }

    fn wait_for_peer(mut self) -> Box<dyn SessionState> {
        self.handshake.restart();
        print_connect_text();
        self.transition::<WaitingForPeer>()
    }

    fn lost_peer(self, status: LinkStatus) -> Box<dyn SessionState> {
        println!("Lost connection with handheld ({}).", status);
        self.wait_for_peer()
    }
}

fn print_connect_text() {
    println!(
        "Please connect a handheld to the link adapter and turn\n\
         the power on while holding the Start and Select buttons."
    );
}

// ============================================================================
// State Implementations
// ============================================================================

impl SessionState for SessionFsm<WaitingForPeer> {
    fn step(self: Box<Self>, input: &FrameInput) -> Result<Box<dyn SessionState>, SessionError> {
        let mut fsm = *self;
        if fsm.begin_frame(input)? != LinkStatus::Connected {
            return Ok(Box::new(fsm) as Box<dyn SessionState>);
        }

        match fsm.handshake.attempt(&mut fsm.bus)? {
            HandshakeState::Ready => {
                println!("Handheld ready! Type 'start' to transfer the program.");
                let next = fsm.transition::<PeerReady>();
                Ok(next as Box<dyn SessionState>)
            }
            HandshakeState::AwaitingBios => Ok(Box::new(fsm) as Box<dyn SessionState>),
        }
    }

    fn upload_state(&self) -> UploadState {
        UploadState::WaitingForPeer
    }
}

impl SessionState for SessionFsm<PeerReady> {
    fn step(self: Box<Self>, input: &FrameInput) -> Result<Box<dyn SessionState>, SessionError> {
        let mut fsm = *self;
        let status = fsm.begin_frame(input)?;
        if status != LinkStatus::Connected {
            return Ok(fsm.lost_peer(status));
        }

        if !input.pressed(Trigger::Start) && !fsm.bus.config().auto_start {
            return Ok(Box::new(fsm) as Box<dyn SessionState>);
        }

        println!("Transferring program ({} bytes)", fsm.image.len());
        let result = Uploader::new(&mut fsm.bus, &mut fsm.monitor, &mut fsm.handshake).upload(&fsm.image);
        match result {
            Ok(ack) => {
                println!("Program transfer done! (reply 0x{:08X})", ack.value);
                let next = fsm.transition::<Idle>();
                Ok(next as Box<dyn SessionState>)
            }
            Err(TransferFailure::PeerLost(status)) => Ok(fsm.lost_peer(status)),
            Err(e) if e.is_fatal() => Err(SessionError::Transfer(e)),
            Err(e) => {
                error!("upload aborted: {}", e);
                Ok(fsm.wait_for_peer())
            }
        }
    }

    fn upload_state(&self) -> UploadState {
        UploadState::PeerReady
    }
}

impl SessionState for SessionFsm<Idle> {
    fn step(self: Box<Self>, input: &FrameInput) -> Result<Box<dyn SessionState>, SessionError> {
        let mut fsm = *self;
        let status = fsm.begin_frame(input)?;
        if status != LinkStatus::Connected {
            return Ok(fsm.lost_peer(status));
        }

        match fsm.bus.read() {
            Ok(reply) if reply.has_data() => println!("<<< recv 0x{:08X}", reply.value),
            Ok(_) => {}
            Err(e) if e.is_timeout() => debug!("idle read: {}", e),
            Err(e) => return Err(e.into()),
        }

        if input.pressed(Trigger::Increment) {
            fsm.send_value = fsm.send_value.wrapping_add(1);
            debug!("send value 0x{:08X}", fsm.send_value);
        } else if input.pressed(Trigger::Decrement) {
            fsm.send_value = fsm.send_value.wrapping_sub(1);
            debug!("send value 0x{:08X}", fsm.send_value);
        } else if input.pressed(Trigger::Send) {
            match fsm.bus.write(fsm.send_value) {
                Ok(_) => println!(">>> send 0x{:08X}", fsm.send_value),
                Err(e) if e.is_timeout() => warn!("send 0x{:08X}: {}", fsm.send_value, e),
                Err(e) => return Err(e.into()),
            }
        } else if input.pressed(Trigger::Disconnect) {
            println!("Disconnecting handheld");
            fsm.monitor.force_disconnect();
            return Ok(fsm.wait_for_peer());
        }

        Ok(Box::new(fsm) as Box<dyn SessionState>)
    }

    fn upload_state(&self) -> UploadState {
        UploadState::Idle
    }
}

// ============================================================================
// Constructor
// ============================================================================

impl SessionFsm<WaitingForPeer> {
    pub fn new(bus: Joybus, image: ProgramImage) -> Box<dyn SessionState> {
        let monitor = LinkMonitor::new(bus.config().debounce_frames);
        print_connect_text();
        Box::new(SessionFsm {
            state: PhantomData::<WaitingForPeer>,
            bus,
            monitor,
            handshake: Handshake::new(),
            image,
            send_value: 0,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
