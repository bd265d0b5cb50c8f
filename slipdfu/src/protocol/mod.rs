//! Protocol implementations.

pub mod crc;
pub mod hci;
pub mod link;
pub mod slip;

// Re-export common types
pub use hci::{HciPacket, Opcode, SequenceNumber};
pub use link::{AckLink, LinkConfig};
