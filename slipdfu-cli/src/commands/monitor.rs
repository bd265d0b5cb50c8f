//! Serial monitor command implementation.
//!
//! Line-oriented monitor: a reader thread frames device output into
//! lines, while the main thread forwards stdin lines to the device.
//! Ctrl+C stops the monitor cleanly.

use anyhow::{Context, Result};
use console::style;
use log::debug;
use slipdfu::{LineReader, MonitorEvent, MonitorSession};
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Cli;

/// Run the serial monitor.
pub(crate) fn cmd_monitor(cli: &Cli, port: &str, baud: u32) -> Result<()> {
    if !cli.quiet {
        eprintln!(
            "{} Opening monitor on {} at {} baud",
            style("📡").cyan(),
            style(port).green(),
            baud
        );
        eprintln!("{}", style("Press Ctrl+C to exit").dim());
    }

    let session = MonitorSession::open(port, baud)
        .with_context(|| format!("Failed to open port {port}"))?;
    let reader_port = session
        .try_clone_reader()
        .context("Failed to clone serial port for reading")?;
    let mut writer = session;

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_handler = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        cancel_handler.store(true, Ordering::Relaxed);
    })
    .context("Failed to install Ctrl+C handler")?;

    // Reader thread: serial → terminal
    let cancel_reader = Arc::clone(&cancel);
    let reader_handle = std::thread::spawn(move || {
        let mut lines = LineReader::new(reader_port, cancel_reader);
        loop {
            match lines.next_event() {
                Ok(MonitorEvent::Line(line)) => println!("{line}"),
                Ok(MonitorEvent::Cancelled) => break,
                Ok(MonitorEvent::Disconnected) => {
                    eprintln!("{}", style("*** Terminal disconnected").yellow());
                    break;
                },
                Err(e) => {
                    debug!("Monitor read error: {e}");
                    eprintln!("{}", style("*** Terminal disconnected").yellow());
                    break;
                },
            }
        }
    });

    // Main thread: stdin lines → serial
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        match line {
            Ok(line) => {
                if let Err(e) = writer.send_line(&line) {
                    debug!("Monitor write error: {e}");
                    break;
                }
            },
            Err(_) => break,
        }
    }

    cancel.store(true, Ordering::Relaxed);
    let _ = reader_handle.join();

    if !cli.quiet {
        eprintln!("{} Monitor closed", style("👋").cyan());
    }

    Ok(())
}
