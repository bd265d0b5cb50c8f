//! # slipdfu
//!
//! A library for flashing nRF52 boards over the legacy serial DFU
//! bootloader.
//!
//! This crate provides the core functionality for talking to the
//! bootloader via serial port, including:
//!
//! - SLIP/HCI packet framing with CRC16 integrity
//! - Lockstep mod-8 ACK sequencing
//! - DFU firmware package (ZIP) parsing
//! - Update orchestration with flash-timing pacing
//! - Bootloader entry (1200-baud touch, DTR/RTS reset)
//! - Serial monitor line framing
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via the `serialport` crate
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//!
//! ## Example
//!
//! ```rust,no_run
//! use slipdfu::{DfuFlasher, DfuPackage};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Parse the firmware package
//!     let package = DfuPackage::from_zip_file("firmware.zip")?;
//!
//!     // Put the application into bootloader mode, then flash
//!     slipdfu::boot::force_bootloader("/dev/ttyACM0")?;
//!     let mut flasher = DfuFlasher::open("/dev/ttyACM0")?;
//!     flasher.update(&package, |sent, total| {
//!         println!("Flashing: {sent}/{total}");
//!     })?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod boot;
pub mod error;
pub mod flasher;
pub mod image;
pub mod monitor;
pub mod port;
pub mod protocol;

// Re-exports for convenience
// Native-specific re-exports
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
#[cfg(feature = "native")]
pub use monitor::MonitorSession;
pub use {
    error::{Error, Result},
    flasher::DfuFlasher,
    image::{DfuPackage, Manifest},
    monitor::{LineReader, MonitorEvent},
    port::{Port, PortEnumerator, PortInfo, SerialConfig},
    protocol::{AckLink, HciPacket, LinkConfig, Opcode, SequenceNumber},
};
