//! Command implementations.
//!
//! Each subcommand is implemented in its own module for clean separation.

pub(crate) mod device;
pub(crate) mod flash;
pub(crate) mod monitor;
