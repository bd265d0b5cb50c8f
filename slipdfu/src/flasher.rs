//! DFU update orchestrator.
//!
//! Drives a complete firmware update over an open serial port: an
//! optional page-by-page erase, the Start/Init announcement, the
//! paced data transfer, and the final Stop frame. Timing between
//! frames matters as much as the frames themselves; the bootloader
//! has no flow control beyond the lockstep ACKs, so the orchestrator
//! sleeps long enough for each flash page operation to finish.
//!
//! Generic over the `Port` trait, so the same code runs against a
//! native serial port or a test double.

use crate::error::{Error, Result};
use crate::image::DfuPackage;
use crate::port::Port;
use crate::protocol::hci::{DFU_MODE_APP, HciPacket};
use crate::protocol::link::{AckLink, LinkConfig};
use log::{debug, info, trace};
use std::thread;
use std::time::Duration;

/// Baud rate the DFU bootloader listens at.
pub const DFU_BAUD: u32 = 115_200;

/// nRF52 flash page size in bytes.
pub const FLASH_PAGE_SIZE: usize = 4096;

/// Maximum firmware payload per data frame.
pub const PACKET_MAX_SIZE: usize = 512;

/// nRF52840 worst-case page erase time.
const PAGE_ERASE_TIME: Duration = Duration::from_micros(89_700);

/// Worst-case time to write one full page, one word at a time.
const PAGE_WRITE_TIME: Duration = Duration::from_micros(102_400);

/// Floor for the post-Start erase wait.
const MIN_START_WAIT: Duration = Duration::from_millis(500);

/// DFU flasher for the legacy serial bootloader.
///
/// Generic over the port type `P`, which must implement the `Port`
/// trait.
pub struct DfuFlasher<P: Port> {
    port: P,
    link: AckLink,
    erase_before_update: bool,
    transfer_in_progress: bool,
}

impl<P: Port> DfuFlasher<P> {
    /// Create a flasher over an already-open port.
    pub fn new(port: P) -> Self {
        Self {
            port,
            link: AckLink::new(),
            erase_before_update: false,
            transfer_in_progress: false,
        }
    }

    /// Enable or disable the explicit page erase before updating.
    #[must_use]
    pub fn with_erase(mut self, erase: bool) -> Self {
        self.erase_before_update = erase;
        self
    }

    /// Override the link configuration (ACK deadline).
    #[must_use]
    pub fn with_link_config(mut self, config: LinkConfig) -> Self {
        self.link = AckLink::with_config(config);
        self
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Get a mutable reference to the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Run a complete firmware update.
    ///
    /// `progress` is called after every data frame with the payload
    /// bytes sent so far and the total image size. The port is closed
    /// when the update finishes, whether it succeeded or not; errors
    /// during that teardown are logged and swallowed so they never
    /// mask the update's own outcome.
    pub fn update<F>(&mut self, package: &DfuPackage, mut progress: F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        if self.transfer_in_progress {
            return Err(Error::AlreadyInProgress);
        }
        self.transfer_in_progress = true;
        self.link.reset_acks();

        let result = self.run_update(package, &mut progress);

        self.teardown();
        self.transfer_in_progress = false;

        result
    }

    fn run_update<F>(&mut self, package: &DfuPackage, progress: &mut F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        let app_size = package.app_size();
        if app_size == 0 {
            return Err(Error::InvalidInput("application image is empty".into()));
        }

        info!("Starting DFU update ({app_size} bytes)");

        if self.erase_before_update {
            self.erase_flash(app_size)?;
        }

        self.send_start(app_size)?;
        self.send_init(&package.init_data)?;
        self.send_firmware(&package.application, progress)?;

        info!("DFU update complete");
        Ok(())
    }

    /// Erase every page the application image will occupy, starting
    /// at address 0.
    fn erase_flash(&mut self, app_size: usize) -> Result<()> {
        let num_pages = app_size.div_ceil(FLASH_PAGE_SIZE);
        info!("Erasing {num_pages} flash pages");

        for page in 0..num_pages {
            let address = (page * FLASH_PAGE_SIZE) as u32;
            debug!("Erasing page {page} at 0x{address:08X}");
            let packet = HciPacket::erase_page(self.link.sequence_mut(), address)?;
            self.link.send(&mut self.port, &packet)?;
            thread::sleep(PAGE_ERASE_TIME);
        }

        debug!("Flash erase complete");
        Ok(())
    }

    /// Announce the update, then wait out the bootloader's own bank
    /// erase. The wait scales with the image size; the bootloader
    /// sends no completion signal.
    #[allow(clippy::cast_possible_truncation)]
    fn send_start(&mut self, app_size: usize) -> Result<()> {
        debug!("Sending start frame");
        let packet =
            HciPacket::start_dfu(self.link.sequence_mut(), DFU_MODE_APP, 0, 0, app_size as u32)?;
        self.link.send(&mut self.port, &packet)?;

        let wait = start_erase_wait(app_size);
        trace!("Waiting {}ms for bank erase", wait.as_millis());
        thread::sleep(wait);

        Ok(())
    }

    fn send_init(&mut self, init_data: &[u8]) -> Result<()> {
        debug!("Sending init frame ({} bytes)", init_data.len());
        let packet = HciPacket::init_packet(self.link.sequence_mut(), init_data)?;
        self.link.send(&mut self.port, &packet)?;
        Ok(())
    }

    /// Send the firmware image in 512-byte chunks, pausing after
    /// every eighth frame (one flash page) and after the last one,
    /// then terminate the transfer with a Stop frame.
    fn send_firmware<F>(&mut self, firmware: &[u8], progress: &mut F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        let total = firmware.len();
        let mut sent = 0usize;

        for (index, chunk) in firmware.chunks(PACKET_MAX_SIZE).enumerate() {
            let packet = HciPacket::data_packet(self.link.sequence_mut(), chunk)?;
            self.link.send(&mut self.port, &packet)?;

            sent += chunk.len();
            progress(sent, total);

            if (index + 1) % 8 == 0 {
                thread::sleep(PAGE_WRITE_TIME);
            }
        }

        // Last page may still be in flight
        thread::sleep(PAGE_WRITE_TIME);

        debug!("Sending stop frame");
        let packet = HciPacket::stop_data(self.link.sequence_mut())?;
        self.link.send(&mut self.port, &packet)?;

        Ok(())
    }

    /// Best-effort port teardown after an update attempt.
    fn teardown(&mut self) {
        if let Err(e) = self.port.clear_buffers() {
            debug!("Error clearing buffers during teardown: {e}");
        }
        if let Err(e) = self.port.close() {
            debug!("Error closing port during teardown: {e}");
        }
    }

    #[cfg(test)]
    fn set_in_progress(&mut self, value: bool) {
        self.transfer_in_progress = value;
    }
}

/// Post-Start wait covering the bank erase, one page-erase time per
/// page the image touches (partial pages count) plus one, never less
/// than [`MIN_START_WAIT`].
#[allow(clippy::cast_possible_truncation)]
fn start_erase_wait(app_size: usize) -> Duration {
    let pages = app_size.div_ceil(FLASH_PAGE_SIZE) + 1;
    (PAGE_ERASE_TIME * pages as u32).max(MIN_START_WAIT)
}

// Native-specific convenience functions
#[cfg(feature = "native")]
mod native_impl {
    use super::{DFU_BAUD, DfuFlasher, Result};
    use crate::port::{NativePort, SerialConfig};
    use crate::protocol::link::SERIAL_READ_TIMEOUT;

    impl DfuFlasher<NativePort> {
        /// Open a serial port at the bootloader baud rate and wrap it
        /// in a flasher.
        ///
        /// # Arguments
        ///
        /// * `port_name` - Serial port name (e.g., "/dev/ttyACM0" or "COM3")
        pub fn open(port_name: &str) -> Result<Self> {
            let config =
                SerialConfig::new(port_name, DFU_BAUD).with_timeout(SERIAL_READ_TIMEOUT);
            let port = NativePort::open(&config)?;
            Ok(Self::new(port))
        }
    }
}
