//! freezer CLI - inspect encoded value streams.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use freezer::{disassemble, fingerprint, DecodeOptions, Decoder};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Inspect freezer-encoded value streams.
#[derive(Parser)]
#[command(name = "freezer", version, author, about = "Inspect freezer-encoded value streams")]
struct Cli {
    /// Verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the entry-by-entry listing of a stream
    Dump {
        /// Encoded file
        path: PathBuf,
    },

    /// Decode a stream and print the fingerprint of the value
    Fingerprint {
        /// Encoded file
        path: PathBuf,
    },

    /// Report whether a stream decodes
    Check {
        /// Encoded file
        path: PathBuf,

        /// Fail when programs are left unfinished
        #[arg(long)]
        strict: bool,

        /// Reject streams without the magic prefix
        #[arg(long)]
        no_legacy: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Dump { path } => cmd_dump(&path),
        Commands::Fingerprint { path } => cmd_fingerprint(&path),
        Commands::Check {
            path,
            strict,
            no_legacy,
        } => cmd_check(&path, strict, no_legacy),
    }
}

/// Log filter for a `-v` count; without flags `RUST_LOG` decides.
fn log_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    debug!(path = %path.display(), len = bytes.len(), "read input");
    Ok(bytes)
}

fn cmd_dump(path: &Path) -> Result<()> {
    let bytes = read_input(path)?;
    let listing = disassemble(&bytes, None)
        .with_context(|| format!("Failed to disassemble {}", path.display()))?;
    print!("{}", listing);
    Ok(())
}

fn cmd_fingerprint(path: &Path) -> Result<()> {
    let bytes = read_input(path)?;
    let value = Decoder::new()
        .decode(&bytes, None)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    let fp = fingerprint(&value).context("Value has no canonical encoding")?;
    println!("{}", fp);
    Ok(())
}

fn cmd_check(path: &Path, strict: bool, no_legacy: bool) -> Result<()> {
    let bytes = read_input(path)?;
    let options = if strict {
        DecodeOptions::strict()
    } else {
        DecodeOptions::new()
    }
    .with_legacy(!no_legacy);
    let value = Decoder::with_options(options)
        .decode(&bytes, None)
        .with_context(|| format!("{} does not decode", path.display()))?;
    info!(kind = value.type_name(), "decoded");
    println!("{}: ok ({})", path.display(), value.type_name());
    Ok(())
}
