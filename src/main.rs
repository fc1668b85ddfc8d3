//! # Paperboy
//!
//! Binary entry point. All pipeline logic lives in the library crate; this
//! file only wires up tracing, parses the CLI, and reports the outcome of a
//! single daily run.
//!
//! ## Usage
//!
//! ```sh
//! paperboy --config paperboy.yaml --db paperboy.db --bootstrap
//! ```

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

use paperboy::cli::Cli;
use paperboy::run;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("paperboy starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.config, ?args.db, ?args.build_dir, "Parsed CLI arguments");

    match run::run(&args).await {
        Ok(report) => {
            let elapsed = start_time.elapsed();
            info!(
                ?elapsed,
                secs = elapsed.as_secs(),
                millis = elapsed.subsec_millis(),
                staged = report.staged,
                editions = report.persisted,
                "Execution complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            Err(e.into())
        }
    }
}
