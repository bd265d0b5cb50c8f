//! DFU firmware package format.
//!
//! A firmware package is a ZIP container holding a `manifest.json`
//! plus the files it references: the application image (`.bin`) and
//! its signed init data (`.dat`):
//!
//! ```json
//! {
//!   "manifest": {
//!     "application": {
//!       "bin_file": "firmware.bin",
//!       "dat_file": "firmware.dat"
//!     }
//!   }
//! }
//! ```
//!
//! The loader itself is container-agnostic: it consumes anything
//! implementing [`Archive`], with [`ZipArchiveReader`] as the
//! standard backing.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Name of the manifest entry inside the package.
pub const MANIFEST_NAME: &str = "manifest.json";

/// Read access to a firmware package container.
pub trait Archive {
    /// List all entry names in the archive.
    fn entry_names(&mut self) -> Result<Vec<String>>;

    /// Read one entry's raw bytes.
    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>>;
}

/// ZIP-backed [`Archive`] implementation.
pub struct ZipArchiveReader<R: Read + Seek> {
    archive: zip::ZipArchive<R>,
}

impl ZipArchiveReader<BufReader<File>> {
    /// Open a package file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> ZipArchiveReader<R> {
    /// Wrap any seekable reader holding ZIP data.
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            archive: zip::ZipArchive::new(reader)?,
        })
    }
}

impl<R: Read + Seek> Archive for ZipArchiveReader<R> {
    fn entry_names(&mut self) -> Result<Vec<String>> {
        Ok(self.archive.file_names().map(String::from).collect())
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut entry = self.archive.by_name(name)?;
        let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// Package manifest naming the application files.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Manifest body.
    pub manifest: ManifestBody,
}

/// Inner manifest object.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestBody {
    /// Application image entry.
    pub application: ApplicationManifest,
}

/// Filenames of the application image and its init data.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationManifest {
    /// Application binary filename inside the package.
    pub bin_file: String,
    /// Init-data filename inside the package.
    pub dat_file: String,
}

/// Loaded firmware package: the application image and its init data.
#[derive(Debug)]
pub struct DfuPackage {
    /// Application image bytes.
    pub application: Vec<u8>,
    /// Init-data bytes (sent as the init packet).
    pub init_data: Vec<u8>,
}

impl DfuPackage {
    /// Load a package from any [`Archive`].
    ///
    /// The entry named exactly `manifest.json` is parsed as the
    /// manifest; `.bin`/`.dat` entries are captured by filename.
    /// Fails with [`Error::MissingManifest`] when no manifest exists
    /// and [`Error::MissingFirmwareFile`] when a referenced file is
    /// absent.
    pub fn load<A: Archive + ?Sized>(archive: &mut A) -> Result<Self> {
        let mut manifest: Option<Manifest> = None;
        let mut firmware_files: HashMap<String, Vec<u8>> = HashMap::new();

        for name in archive.entry_names()? {
            debug!("package entry: {name}");
            if name == MANIFEST_NAME {
                let raw = archive.read_entry(&name)?;
                manifest = Some(serde_json::from_slice(&raw)?);
            } else if name.ends_with(".bin") || name.ends_with(".dat") {
                let data = archive.read_entry(&name)?;
                firmware_files.insert(name, data);
            }
        }

        let manifest = manifest.ok_or(Error::MissingManifest)?;
        let application_entry = &manifest.manifest.application;

        let application = firmware_files
            .remove(&application_entry.bin_file)
            .ok_or_else(|| Error::MissingFirmwareFile(application_entry.bin_file.clone()))?;
        let init_data = firmware_files
            .remove(&application_entry.dat_file)
            .ok_or_else(|| Error::MissingFirmwareFile(application_entry.dat_file.clone()))?;

        debug!(
            "loaded package: {} byte application, {} byte init data",
            application.len(),
            init_data.len()
        );

        Ok(Self {
            application,
            init_data,
        })
    }

    /// Load a package from a ZIP file on disk.
    pub fn from_zip_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut archive = ZipArchiveReader::open(path)?;
        Self::load(&mut archive)
    }

    /// Total application image size in bytes.
    pub fn app_size(&self) -> usize {
        self.application.len()
    }
}
