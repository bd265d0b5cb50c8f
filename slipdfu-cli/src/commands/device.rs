//! Reset and port-listing command implementations.

use anyhow::{Context, Result};
use console::style;
use slipdfu::{NativePort, NativePortEnumerator, Port, PortEnumerator, SerialConfig, boot};

use crate::Cli;

/// Reset command implementation.
pub(crate) fn cmd_reset(cli: &Cli, port_name: &str) -> Result<()> {
    let config = SerialConfig::new(port_name, 115_200);
    let mut port = NativePort::open(&config)
        .with_context(|| format!("Failed to open port {port_name}"))?;

    boot::reset_device(&mut port)?;
    port.close()?;

    if !cli.quiet {
        eprintln!("{} Device reset", style("🔄").cyan());
    }
    Ok(())
}

/// List ports command implementation.
pub(crate) fn cmd_list_ports() {
    let ports = NativePortEnumerator::list_ports().unwrap_or_default();

    eprintln!("{}", style("Available serial ports:").bold().underlined());

    if ports.is_empty() {
        eprintln!("  {}", style("(none found)").dim());
        return;
    }

    for port in &ports {
        let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            format!(" ({vid:04X}:{pid:04X})")
        } else {
            String::new()
        };
        let product = port
            .product
            .as_deref()
            .map(|p| format!(" - {}", style(p).dim()))
            .unwrap_or_default();

        eprintln!(
            "  {} {}{}{}",
            style("•").green(),
            style(&port.name).cyan(),
            vid_pid,
            product
        );
    }
}
