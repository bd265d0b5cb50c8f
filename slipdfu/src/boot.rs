//! Bootloader entry helpers.
//!
//! Two ways to get an application out of the way so the DFU
//! bootloader answers on the port: the 1200-baud "touch" (open the
//! port at 1200 baud and close it again, an Arduino-style convention
//! the application firmware watches for) and a DTR/RTS pulse for
//! boards whose reset line is wired to the serial adapter.

use crate::error::Result;
use crate::port::Port;
use log::info;
use std::thread;
use std::time::Duration;

/// Baud rate that signals the touch reset.
pub const TOUCH_BAUD: u32 = 1200;

/// How long the port stays open during the touch.
#[cfg(feature = "native")]
const TOUCH_OPEN_TIME: Duration = Duration::from_millis(100);

/// How long to wait after the touch for the bootloader to come up.
#[cfg(feature = "native")]
const TOUCH_SETTLE_TIME: Duration = Duration::from_millis(1500);

/// How long the reset pulse holds RTS asserted.
const RESET_PULSE_TIME: Duration = Duration::from_millis(250);

/// How long to wait after releasing the reset lines.
const RESET_SETTLE_TIME: Duration = Duration::from_millis(1250);

/// Perform the 1200-baud touch on a named port.
///
/// Opens the port at 1200 baud, holds it briefly, closes it and then
/// waits for the device to re-enumerate in bootloader mode. The port
/// must be re-opened afterwards at the DFU baud rate.
#[cfg(feature = "native")]
pub fn force_bootloader(port_name: &str) -> Result<()> {
    use crate::port::{NativePort, SerialConfig};
    use log::debug;

    info!("Touching {port_name} at {TOUCH_BAUD} baud");
    let config = SerialConfig::new(port_name, TOUCH_BAUD);
    let mut port = NativePort::open(&config)?;
    thread::sleep(TOUCH_OPEN_TIME);
    port.close()?;
    drop(port);

    debug!("Waiting for bootloader to enumerate");
    thread::sleep(TOUCH_SETTLE_TIME);
    Ok(())
}

/// Pulse the DTR/RTS lines to reset the device.
///
/// Asserts RTS with DTR deasserted, holds the pulse, releases both
/// lines and waits for the device to boot.
pub fn reset_device<P: Port>(port: &mut P) -> Result<()> {
    info!("Resetting device via DTR/RTS");
    port.set_dtr(false)?;
    port.set_rts(true)?;
    thread::sleep(RESET_PULSE_TIME);

    port.set_dtr(false)?;
    port.set_rts(false)?;
    thread::sleep(RESET_SETTLE_TIME);

    Ok(())
}
