//! Firmware package handling.

pub mod package;

pub use package::{Archive, DfuPackage, Manifest, ZipArchiveReader};
