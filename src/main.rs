//! Main entry point for the espfs CLI application.
//!
//! Opens a file inside an EspFs image on disk and streams its content to
//! stdout or to an output file.

use anyhow::{Context, Result};
use clap::Parser;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use tracing_subscriber::{EnvFilter, fmt};

use espfs::{Cli, EspFs, EspFsFile, LocalFileReader, ReadAt, Whence};

/// Application entry point.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let reader = LocalFileReader::new(&cli.image)
        .with_context(|| format!("cannot open {}", cli.image.display()))?;
    let fs = EspFs::with_config(reader, cli.config())
        .with_context(|| format!("{} is not an EspFs image", cli.image.display()))?;

    let mut file = fs
        .open(&cli.path)
        .with_context(|| format!("cannot open {} in {}", cli.path, cli.image.display()))?;

    if cli.show_flags {
        print_info(&file)?;
    } else {
        extract(&mut file, &cli)?;
    }

    file.close();
    Ok(())
}

/// Install a stderr subscriber; `RUST_LOG` overrides the verbosity flags.
fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Print the entry's header fields.
fn print_info<R: ReadAt>(file: &EspFsFile<'_, R>) -> Result<()> {
    let flags = file.flags()?;
    let ratio = if file.len() > 0 {
        format!(
            "{:>4}%",
            100 - (file.compressed_len() * 100 / file.len()) as i64
        )
    } else {
        "  0%".to_string()
    };

    println!(
        "{:>10}  {:>10}  {:>5}  {:>11}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Compression", "Flags"
    );
    println!("{}", "-".repeat(60));
    println!(
        "{:>10}  {:>10}  {}  {:>11}  {:#04x}  {}",
        file.len(),
        file.compressed_len(),
        ratio,
        format!("{:?}", file.compression()),
        flags,
        file.name()
    );
    Ok(())
}

/// Stream the file's content to the selected output.
///
/// Handles:
/// - Output file (`-o`) or stdout
/// - Starting offset (`--offset`)
/// - Gzip decoding of precompressed entries (`-z`)
fn extract<R: ReadAt>(file: &mut EspFsFile<'_, R>, cli: &Cli) -> Result<()> {
    if cli.offset != 0 {
        file.seek(cli.offset, Whence::Start)
            .with_context(|| format!("cannot seek {} to {}", cli.path, cli.offset))?;
    }

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let gunzip = cli.gunzip && file.is_gzip()?;
    let copied = if gunzip {
        io::copy(&mut GzDecoder::new(&mut *file), &mut out)?
    } else {
        io::copy(file, &mut out)?
    };
    out.flush()?;

    if !cli.quiet
        && let Some(path) = &cli.output
    {
        eprintln!(
            "  extracted: {} -> {} ({})",
            file.name(),
            path.display(),
            format_size(copied)
        );
    }
    Ok(())
}

/// Format a byte size into a human-readable string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
