//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! `s3-mirror`: copy missing or changed objects from one bucket to another.
//!
//! Examples:
//! ```bash
//! s3-mirror --config config.toml
//! s3-mirror --config config.toml --dry-run -v
//! s3-mirror --config config.toml -w 32 -vv
//! ```
//!
//! Exits with status 1 when any object failed to copy.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use s3mirror::{store_for_config, MirrorConfig, MirrorService, MirrorStats};

/// Macro to safely print with broken pipe handling
macro_rules! safe_println {
    ($($arg:tt)*) => {
        match writeln!(io::stdout(), $($arg)*) {
            Ok(_) => {},
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                std::process::exit(0);
            }
            Err(e) => return Err(e.into())
        }
    };
}

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Number of concurrent workers (overrides config when > 0)
    #[arg(short, long, default_value_t = 0)]
    workers: usize,

    /// Report what would be copied without transferring anything
    #[arg(long)]
    dry_run: bool,

    #[arg(
        short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity: -v = per-object lines, -vv = Debug",
    )]
    verbose: u8,
}

fn print_summary(stats: &MirrorStats) -> Result<()> {
    safe_println!("\n=== Mirror Summary ===");
    safe_println!("Total objects processed: {}", stats.total_objects);
    safe_println!("Objects copied: {}", stats.copied_objects);
    safe_println!("Objects skipped: {}", stats.skipped_objects);
    safe_println!("Errors: {}", stats.errors);
    safe_println!(
        "Total bytes transferred: {} ({:.2} MB)",
        stats.bytes_transferred,
        stats.bytes_transferred as f64 / (1024.0 * 1024.0)
    );
    safe_println!(
        "Elapsed: {:.2}s ({:.2} MB/s)",
        stats.elapsed.as_secs_f64(),
        stats.throughput_mib_per_sec()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Loads any variables from .env file that are not already set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut cfg = MirrorConfig::load_from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    cfg.apply_overrides(cli.workers, cli.dry_run, cli.verbose > 0);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.log_filter(cli.verbose))),
        )
        .with_target(false)
        .init();

    cfg.validate().context("Configuration error")?;

    let source = store_for_config(&cfg.source)
        .await
        .context("Failed to create source storage client")?;
    let target = store_for_config(&cfg.target)
        .await
        .context("Failed to create target storage client")?;
    info!(
        "Source: {} ({}), target: {} ({})",
        cfg.source.bucket, cfg.source.storage_type, cfg.target.bucket, cfg.target.storage_type
    );

    let service = MirrorService::new(Arc::from(source), Arc::from(target), cfg);

    let token = service.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling in-flight transfers");
            token.cancel();
        }
    });

    let stats = service.mirror().await.context("Mirror operation failed")?;
    print_summary(&stats)?;

    if stats.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}
