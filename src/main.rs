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

// Joybus multiboot uploader
mod checksum;
mod clock;
mod config;
mod crypto;
mod handshake;
mod image;
mod input;
mod joybus;
mod link;
mod monitor;
mod protocol;
mod session;
mod uploader;

use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;
use std::time::Duration;
use clock::{FrameTicker, SystemClock};
use config::{LinkConfig, TimeoutPolicy};
use image::ProgramImage;
use input::{InputSource, StdinInput};
use joybus::Joybus;
use link::SerialBridge;
use session::{SessionError, SessionFsm, SessionState};

#[derive(Parser)]
#[command(name = "joyboot")]
#[command(about = "Uploads a multiboot program to a handheld over a joybus link adapter", long_about = None)]
struct Cli {
    /// Serial port of the link adapter (e.g., /dev/ttyACM0 or COM3)
    #[arg(short, long)]
    port: String,

    /// Baud rate of the link adapter
    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// Time allowed for a single exchange
    #[arg(long, default_value = "5000", value_name = "MS")]
    timeout_ms: u64,

    /// Minimum delay between two exchanges
    #[arg(long, default_value = "50", value_name = "US")]
    delay_us: u64,

    /// Keep going after a timed-out exchange instead of aborting the upload
    #[arg(long)]
    lenient: bool,

    /// Start the upload as soon as the handheld is ready
    #[arg(long)]
    auto_start: bool,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    /// Program image to upload (length must be a multiple of 4)
    image: PathBuf,
}

impl Cli {
    fn link_config(&self) -> LinkConfig {
        LinkConfig {
            exchange_timeout: Duration::from_millis(self.timeout_ms),
            exchange_delay: Duration::from_micros(self.delay_us),
            timeout_policy: if self.lenient { TimeoutPolicy::Continue } else { TimeoutPolicy::Abort },
            auto_start: self.auto_start,
            ..LinkConfig::default()
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let image = match ProgramImage::load(&cli.image) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Invalid program image {}: {}", cli.image.display(), e);
            std::process::exit(1);
        }
    };

    let config = cli.link_config();

    println!("Opening serial port: {}", cli.port);
    println!("Settings: {} baud, {:?} timeout, {:?} exchange delay", cli.baud, config.exchange_timeout, config.exchange_delay);

    let bridge = match SerialBridge::open(&cli.port, cli.baud, Box::new(SystemClock), config.exchange_delay, config.frame_interval) {
        Ok(bridge) => bridge,
        Err(e) => {
            eprintln!("Failed to open serial port: {}", e);
            std::process::exit(1);
        }
    };

    println!("\nProgram: {} ({} bytes)", cli.image.display(), image.len());
    println!("Commands: start, up, down, send, disconnect, quit\n");

    if let Err(e) = run_session(Joybus::new(Box::new(bridge), config), image) {
        eprintln!("Session failed: {}", e);
        std::process::exit(1);
    }
    println!("exiting");
}

fn run_session(bus: Joybus, image: ProgramImage) -> Result<(), SessionError> {
    let mut ticker = FrameTicker::new(Box::new(SystemClock), bus.config().frame_interval);
    let mut input = StdinInput::spawn();
    let mut state: Box<dyn SessionState> = SessionFsm::new(bus, image);

    loop {
        let before = state.upload_state();
        match state.step(&input.poll()) {
            Ok(next_state) => {
                if next_state.upload_state() != before {
                    log::debug!("session {:?} -> {:?}", before, next_state.upload_state());
                }
                state = next_state;
            }
            Err(SessionError::Exit) => {
                log::debug!("exit after {} frames", ticker.frame());
                return Ok(());
            }
            Err(e) => {
                return Err(e);
            }
        }
        ticker.wait();
    }
}
