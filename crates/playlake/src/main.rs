//! Playlake CLI: runs the song and log stages once and exits.

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use playlake::{CliArgs, Config, StoragePool, init_tracing, run_pipeline};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing("info");

    let args = CliArgs::parse();

    match &args.config {
        Some(path) => info!("Loading config from {}", path.display()),
        None => info!("No config file given, using defaults"),
    }

    let config = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    let pool = Arc::new(StoragePool::new(config.storage_options.clone()));

    match run_pipeline(config, pool).await {
        Ok(summary) => {
            for table in summary.tables() {
                info!(
                    table = %table.table,
                    url = %table.url,
                    rows = table.rows,
                    files = table.files,
                    partitions = table.partitions,
                    "Wrote table"
                );
            }
            info!(
                plays = summary.log.plays,
                unmatched = summary.log.unmatched_plays,
                ambiguous = summary.log.ambiguous_plays,
                malformed_timestamps = summary.log.malformed_timestamps,
                duration_ms = summary.duration.as_millis(),
                "Run completed"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(kind = %e.kind(), "Run failed: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
