//! Flash command implementation.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use slipdfu::{DfuFlasher, DfuPackage, boot};
use std::path::Path;

use crate::Cli;

/// Flash command implementation.
pub(crate) fn cmd_flash(
    cli: &Cli,
    port: &str,
    package_path: &Path,
    erase: bool,
    no_touch: bool,
) -> Result<()> {
    if !cli.quiet {
        eprintln!(
            "{} Loading firmware package {}",
            style("📦").cyan(),
            style(package_path.display()).cyan()
        );
    }

    let package = DfuPackage::from_zip_file(package_path).with_context(|| {
        format!("Failed to load firmware package {}", package_path.display())
    })?;

    if !cli.quiet {
        eprintln!(
            "{} Application image: {} bytes, init data: {} bytes",
            style("ℹ").blue(),
            package.app_size(),
            package.init_data.len()
        );
    }

    // Kick the application into bootloader mode
    if !no_touch {
        if !cli.quiet {
            eprintln!("{} Entering bootloader (1200-baud touch)", style("⏳").yellow());
        }
        boot::force_bootloader(port)
            .with_context(|| format!("Failed to touch {port} into bootloader mode"))?;
    }

    if !cli.quiet {
        eprintln!(
            "{} Using port {} at {} baud",
            style("🔌").cyan(),
            style(port).cyan(),
            slipdfu::flasher::DFU_BAUD
        );
    }

    let mut flasher = DfuFlasher::open(port)
        .with_context(|| format!("Failed to open port {port}"))?
        .with_erase(erase);

    // Create progress bar
    let pb = if cli.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(100);
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.set_message("Flashing");
        pb
    };

    flasher.update(&package, |sent, total| {
        if total > 0 {
            pb.set_position((sent * 100 / total) as u64);
        }
    })?;

    pb.finish_with_message("complete");

    if !cli.quiet {
        eprintln!("\n{} Update complete", style("🎉").green().bold());
    }

    Ok(())
}
