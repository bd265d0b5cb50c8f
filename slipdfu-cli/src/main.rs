//! slipdfu CLI - Command-line tool for flashing nRF52 boards over
//! the legacy serial DFU bootloader.
//!
//! ## Features
//!
//! - Flash DFU ZIP firmware packages
//! - 1200-baud touch to enter the bootloader
//! - DTR/RTS device reset
//! - Serial monitor
//! - Environment variable support

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use console::style;
use env_logger::Env;
use log::debug;
use slipdfu::{NativePortEnumerator, PortEnumerator};
use std::path::PathBuf;

mod commands;

use commands::device::{cmd_list_ports, cmd_reset};
use commands::flash::cmd_flash;
use commands::monitor::cmd_monitor;

/// slipdfu - Flash nRF52 boards over the legacy serial DFU bootloader.
///
/// Environment variables:
///   SLIPDFU_PORT   - Default serial port
#[derive(Parser)]
#[command(name = "slipdfu")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port to use (auto-detected if exactly one is present).
    #[arg(short, long, global = true, env = "SLIPDFU_PORT")]
    port: Option<String>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Flash a DFU firmware package (ZIP).
    Flash {
        /// Path to the firmware ZIP package.
        package: PathBuf,

        /// Erase the application flash pages before updating.
        #[arg(long)]
        erase: bool,

        /// Skip the 1200-baud touch (device is already in bootloader mode).
        #[arg(long)]
        no_touch: bool,

        /// Open serial monitor after flashing.
        #[arg(long)]
        monitor: bool,
    },

    /// Open serial monitor.
    Monitor {
        /// Baud rate for monitoring.
        #[arg(long, default_value = "115200")]
        baud: u32,
    },

    /// Reset the device via the DTR/RTS lines.
    Reset,

    /// List available serial ports.
    ListPorts,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "slipdfu v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match &cli.command {
        Commands::Flash {
            package,
            erase,
            no_touch,
            monitor,
        } => {
            let port = get_port(&cli)?;
            cmd_flash(&cli, &port, package, *erase, *no_touch)?;
            if *monitor {
                eprintln!();
                cmd_monitor(&cli, &port, 115_200)?;
            }
        },
        Commands::Monitor { baud } => {
            let port = get_port(&cli)?;
            cmd_monitor(&cli, &port, *baud)?;
        },
        Commands::Reset => {
            let port = get_port(&cli)?;
            cmd_reset(&cli, &port)?;
        },
        Commands::ListPorts => {
            cmd_list_ports();
        },
    }

    Ok(())
}

/// Get the serial port from CLI args, or auto-pick when exactly one
/// port is available.
fn get_port(cli: &Cli) -> Result<String> {
    if let Some(ref port) = cli.port {
        return Ok(port.clone());
    }

    let ports = NativePortEnumerator::list_ports().context("Failed to enumerate serial ports")?;
    match ports.as_slice() {
        [] => bail!("No serial ports found. Specify one with --port."),
        [only] => {
            if !cli.quiet {
                eprintln!(
                    "{} Using the only available port: {}",
                    style("→").green(),
                    style(&only.name).cyan()
                );
            }
            Ok(only.name.clone())
        },
        many => {
            eprintln!("{}", style("Multiple serial ports found:").bold());
            for p in many {
                eprintln!("  {} {}", style("•").green(), style(&p.name).cyan());
            }
            bail!("Specify one with --port.")
        },
    }
}
