//! Lockstep ACK/sequence state machine.
//!
//! The bootloader acknowledges every frame with a mod-8 sequence
//! number; no frame may be sent before the previous frame's ACK has
//! resolved. `AckLink` owns the session's sequence counter and the
//! last acknowledged number, and enforces both sides of the
//! contract.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::hci::{HciPacket, SequenceNumber, ack_sequence};
use crate::protocol::slip;

/// Base serial read timeout; the ACK deadline is five times this.
pub const SERIAL_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Link configuration options.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Wall-clock deadline for receiving one complete ACK frame.
    pub ack_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ack_timeout: SERIAL_READ_TIMEOUT * 5,
        }
    }
}

/// Lockstep send/acknowledge state for one DFU session.
#[derive(Debug, Default)]
pub struct AckLink {
    sequence: SequenceNumber,
    last_ack: Option<u8>,
    config: LinkConfig,
}

impl AckLink {
    /// Create a link with the default ACK deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a link with a custom configuration.
    pub fn with_config(config: LinkConfig) -> Self {
        Self {
            sequence: SequenceNumber::new(),
            last_ack: None,
            config,
        }
    }

    /// The frame sequence counter, for building packets.
    pub fn sequence_mut(&mut self) -> &mut SequenceNumber {
        &mut self.sequence
    }

    /// Last acknowledged sequence number, if any ACK arrived yet.
    pub fn last_ack(&self) -> Option<u8> {
        self.last_ack
    }

    /// Forget ACK history at the start of a session. The sequence
    /// counter is not touched; it only resets at fault points.
    pub fn reset_acks(&mut self) {
        self.last_ack = None;
    }

    /// Write one frame and block until its ACK resolves.
    ///
    /// Returns the acknowledged sequence number. On timeout or an
    /// out-of-order ACK the sequence counter is reset to 0 so a
    /// later attempt starts clean.
    pub fn send<P: Read + Write>(&mut self, port: &mut P, packet: &HciPacket) -> Result<u8> {
        port.write_all(packet.as_bytes())?;
        port.flush()?;
        trace!("sent frame: {} bytes", packet.len());

        self.read_ack(port)
    }

    /// Accumulate bytes until one complete SLIP frame (two `0xC0`
    /// delimiters) has been observed, then validate its sequence.
    fn read_ack<P: Read>(&mut self, port: &mut P) -> Result<u8> {
        let deadline = Instant::now() + self.config.ack_timeout;
        let mut buffer = Vec::new();
        let mut delimiters = 0usize;
        let mut scratch = [0u8; 64];

        while delimiters < 2 {
            if Instant::now() > deadline {
                self.sequence.reset();
                return Err(Error::Timeout("no ACK frame before deadline".into()));
            }

            match port.read(&mut scratch) {
                Ok(0) => {
                    return Err(Error::TransportUnavailable(
                        "stream closed before full ACK".into(),
                    ));
                },
                Ok(n) => {
                    for &byte in &scratch[..n] {
                        buffer.push(byte);
                        if byte == slip::END {
                            delimiters += 1;
                        }
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {},
                Err(e) => return Err(Error::Io(e)),
            }
        }

        let decoded = slip::unescape(&buffer)?;
        let ack = ack_sequence(&decoded)?;

        if let Some(last) = self.last_ack {
            let expected = (last + 1) % 8;
            if ack != expected {
                debug!("bad ACK: expected {expected}, got {ack}");
                self.sequence.reset();
                return Err(Error::SequenceMismatch {
                    expected,
                    actual: ack,
                });
            }
        }
        self.last_ack = Some(ack);
        trace!("ACK {ack}");

        Ok(ack)
    }
}
