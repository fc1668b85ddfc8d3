//! Command-line interface definitions for the digest pipeline.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! The database path can also be provided via the `PAPERBOY_DB` environment
//! variable, which is how the scheduled deployment passes it.

use chrono::NaiveDate;
use clap::Parser;

/// Command-line arguments for a pipeline run.
///
/// One invocation performs one full daily run: fetch every configured
/// source, compact the staged records, render and persist the editions.
///
/// # Examples
///
/// ```sh
/// # Daily run with defaults (yesterday's articles)
/// paperboy --config paperboy.yaml --db data/paperboy.db
///
/// # First run against a fresh database
/// paperboy --bootstrap
///
/// # Re-run a specific day, keeping the build files for inspection
/// paperboy --date 2026-08-20 --keep-build
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the pipeline configuration file
    #[arg(short, long, default_value = "paperboy.yaml")]
    pub config: String,

    /// Path to the shared SQLite database
    #[arg(short, long, env = "PAPERBOY_DB", default_value = "data/paperboy.db")]
    pub db: String,

    /// Directory for transient edition files
    #[arg(short, long, default_value = "build")]
    pub build_dir: String,

    /// Target publication date (YYYY-MM-DD); defaults to yesterday
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Override the configured extraction worker count
    #[arg(long)]
    pub workers: Option<usize>,

    /// Create the shared tables on a fresh database before running
    #[arg(long)]
    pub bootstrap: bool,

    /// Keep transient build files after a successful run
    #[arg(long)]
    pub keep_build: bool,

    /// Write the run report as JSON to this path
    #[arg(long)]
    pub report_json: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["paperboy"]);
        assert_eq!(cli.config, "paperboy.yaml");
        assert_eq!(cli.db, "data/paperboy.db");
        assert_eq!(cli.build_dir, "build");
        assert_eq!(cli.date, None);
        assert!(!cli.bootstrap);
        assert!(!cli.keep_build);
    }

    #[test]
    fn test_cli_full_invocation() {
        let cli = Cli::parse_from([
            "paperboy",
            "--config",
            "/etc/paperboy.yaml",
            "--db",
            "/var/lib/paperboy.db",
            "--build-dir",
            "/tmp/build",
            "--date",
            "2026-08-20",
            "--workers",
            "2",
            "--bootstrap",
            "--keep-build",
        ]);

        assert_eq!(cli.config, "/etc/paperboy.yaml");
        assert_eq!(cli.db, "/var/lib/paperboy.db");
        assert_eq!(cli.build_dir, "/tmp/build");
        assert_eq!(cli.date, NaiveDate::from_ymd_opt(2026, 8, 20));
        assert_eq!(cli.workers, Some(2));
        assert!(cli.bootstrap);
        assert!(cli.keep_build);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["paperboy", "-c", "a.yaml", "-d", "b.db", "-b", "out"]);
        assert_eq!(cli.config, "a.yaml");
        assert_eq!(cli.db, "b.db");
        assert_eq!(cli.build_dir, "out");
    }

    #[test]
    fn test_cli_rejects_bad_date() {
        let result = Cli::try_parse_from(["paperboy", "--date", "not-a-date"]);
        assert!(result.is_err());
    }
}
