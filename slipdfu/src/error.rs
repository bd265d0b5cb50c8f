//! Error types for slipdfu.

use std::io;
use thiserror::Error;

/// Result type for slipdfu operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for slipdfu operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Transport not open, or closed mid-operation.
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Protocol error (malformed SLIP escape, incomplete ACK).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// ACK arrived out of sequence.
    #[error("ACK sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch {
        /// Sequence number the link expected.
        expected: u8,
        /// Sequence number the device reported.
        actual: u8,
    },

    /// Communication timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The firmware package has no `manifest.json` entry.
    #[error("manifest.json not found in firmware package")]
    MissingManifest,

    /// A file referenced by the manifest is absent from the package.
    #[error("firmware file {0:?} not found in package")]
    MissingFirmwareFile(String),

    /// An update is already running on this session.
    #[error("DFU update already in progress")]
    AlreadyInProgress,

    /// Caller passed data that violates a protocol contract.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid firmware package container or manifest.
    #[error("Invalid package: {0}")]
    Package(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Package(format!("malformed manifest.json: {err}"))
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Package(err.to_string())
    }
}
