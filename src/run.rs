//! Run orchestration: one invocation, one full daily run.
//!
//! Phases, strictly in order:
//!
//! 1. Setup: load config, open the database, check the shared schema,
//!    mirror configured sources, check the build directory is writable.
//! 2. Fetch: one job per source, run concurrently; `join_all` is the
//!    barrier the compactor relies on.
//! 3. Compaction: drain staging, fold into per-source digests.
//! 4. Render and persist: bind each digest, file it in the edition
//!    store, drop a transient copy in the build directory.
//! 5. Cleanup: clear staging and the build directory, but only when
//!    every edition made it through. A failed edition keeps its staged
//!    records for the next run.

use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, Utc};
use futures::future;
use itertools::Itertools;
use rand::{Rng, rng};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::cli::Cli;
use crate::compact::compact;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::extract::ArticleExtractor;
use crate::feed::FeedScanner;
use crate::job::{SourceReport, run_source};
use crate::models::Digest;
use crate::render::{DigestRenderer, EditionRenderer, RenderedEdition};
use crate::store::Storage;
use crate::store::editions::{EditionStore, NewEdition};
use crate::store::sources::SourceDirectory;
use crate::store::staging::StagingStore;
use crate::utils::{clear_dir_files, ensure_writable_dir};

/// Base delay before the single persist retry; jitter is added on top.
const PERSIST_RETRY_BASE_MS: u64 = 200;

/// Summary of a whole run, logged at the end and optionally written as
/// JSON for the scheduler to pick up.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Day the pipeline ran.
    pub run_date: NaiveDate,
    /// Day the fetched articles were published.
    pub target_date: NaiveDate,
    /// Per-source fetch outcomes, in directory order.
    pub sources: Vec<SourceReport>,
    /// Records read back from staging at compaction.
    pub staged: usize,
    /// Digests the compactor produced.
    pub digests: usize,
    /// Editions rendered and filed.
    pub persisted: usize,
    /// Digests that could not be rendered or filed.
    pub failed: usize,
    /// Whether the staging pen was cleared at the end.
    pub staging_cleared: bool,
}

/// Execute one full daily run.
///
/// # Errors
///
/// Only setup problems are fatal: unreadable configuration, an
/// unreachable database, or missing shared tables
/// ([`crate::error::PipelineError::ConfigMissing`]). Everything after
/// setup degrades to "fewer results this run" and is reported instead.
#[instrument(level = "info", skip_all)]
pub async fn run(args: &Cli) -> Result<RunReport> {
    let config = PipelineConfig::load(&args.config)?;
    info!(
        path = %args.config,
        sources = config.sources.len(),
        "Configuration loaded"
    );

    let storage = Storage::connect(&args.db).await?;
    if args.bootstrap {
        storage.bootstrap().await?;
    }
    storage.setup_check().await?;

    let directory = SourceDirectory::new(storage.pool());
    directory.load_config(&config.sources).await?;
    let sources = directory.list().await?;

    ensure_writable_dir(&args.build_dir).await?;

    let run_date = Utc::now().date_naive();
    let target_date = args.date.unwrap_or_else(|| run_date - Duration::days(1));
    info!(%run_date, %target_date, "Starting daily run");

    let mut extraction = config.extraction.clone();
    if let Some(workers) = args.workers {
        extraction.workers = workers;
    }
    let scanner = FeedScanner::new()?;
    let extractor = ArticleExtractor::new(&extraction)?;

    // Fetch phase. Jobs write disjoint records, so they can run
    // concurrently; nothing reads staging until join_all returns.
    let fetch_jobs = sources.iter().map(|source| {
        let staging = StagingStore::new(storage.pool());
        let scanner = &scanner;
        let extractor = &extractor;
        let exclusions = &config.title_exclusions;
        async move {
            run_source(
                source,
                scanner,
                extractor,
                &staging,
                exclusions,
                target_date,
            )
            .await
        }
    });
    let source_reports = future::join_all(fetch_jobs).await;

    // Compaction phase.
    let staging = StagingStore::new(storage.pool());
    let records = staging.read_all().await?;
    let staged = records.len();
    let digests = compact(
        records,
        &sources,
        &config.categories,
        config.trailing_category_id,
        target_date,
        run_date,
    );

    // Render and persist phase.
    let renderer = EditionRenderer::new();
    let editions = EditionStore::new(storage.pool());
    let mut persisted_titles: Vec<&str> = Vec::new();
    let mut failed = 0usize;
    for digest in &digests {
        match render_and_persist(&renderer, &editions, digest, &args.build_dir).await {
            Ok(()) => persisted_titles.push(digest.title.as_str()),
            Err(e) => {
                error!(
                    source = %digest.title,
                    error = %e,
                    "Edition failed; its staged records are kept for a retry"
                );
                failed += 1;
            }
        }
    }
    if !persisted_titles.is_empty() {
        info!(editions = %persisted_titles.iter().join(", "), "Editions filed");
    }

    // Cleanup phase, gated on the whole run making it through.
    let staging_cleared = failed == 0;
    if staging_cleared {
        let removed = staging.clear_all().await?;
        info!(removed, "Staging cleared");
        if !args.keep_build
            && let Err(e) = clear_dir_files(&args.build_dir).await
        {
            warn!(path = %args.build_dir, error = %e, "Could not clear the build directory");
        }
    } else {
        warn!(failed, "Staging kept for a retry run");
    }

    let report = RunReport {
        run_date,
        target_date,
        sources: source_reports,
        staged,
        digests: digests.len(),
        persisted: digests.len() - failed,
        failed,
        staging_cleared,
    };
    if let Some(path) = &args.report_json {
        write_report_json(&report, path).await;
    }
    info!(
        sources = report.sources.len(),
        staged = report.staged,
        digests = report.digests,
        persisted = report.persisted,
        failed = report.failed,
        "Run complete"
    );
    Ok(report)
}

/// Render one digest, drop transient copies in the build directory, and
/// file the edition.
async fn render_and_persist(
    renderer: &EditionRenderer,
    editions: &EditionStore<'_>,
    digest: &Digest,
    build_dir: &str,
) -> Result<()> {
    let edition = renderer.render(digest)?;

    // Transient copies for operators; the durable copy is the database.
    if let Err(e) = write_build_files(build_dir, &edition).await {
        warn!(source = %digest.title, error = %e, "Could not write build files");
    }

    let new_edition = NewEdition {
        title: &digest.title,
        file_name: &edition.file_name,
        source_id: digest.source_id,
        content_date: digest.content_date,
        run_date: digest.run_date,
        epub: &edition.primary,
        epub_content_type: &edition.primary_content_type,
        print: &edition.derived,
        print_content_type: &edition.derived_content_type,
    };
    persist_with_retry(editions, &new_edition).await
}

/// Write the EPUB and its print rendition next to each other in the
/// build directory (`daily-echo.epub`, `daily-echo.html`).
async fn write_build_files(build_dir: &str, edition: &RenderedEdition) -> Result<()> {
    let base = build_dir.trim_end_matches('/');
    let epub_path = format!("{base}/{}", edition.file_name);
    tokio::fs::write(&epub_path, &edition.primary).await?;

    let print_name = match edition.file_name.strip_suffix(".epub") {
        Some(stem) => format!("{stem}.html"),
        None => format!("{}.html", edition.file_name),
    };
    tokio::fs::write(format!("{base}/{print_name}"), &edition.derived).await?;
    Ok(())
}

/// File an edition, retrying once after a short jittered delay.
async fn persist_with_retry(
    editions: &EditionStore<'_>,
    edition: &NewEdition<'_>,
) -> Result<()> {
    match editions.persist(edition).await {
        Ok(()) => Ok(()),
        Err(first) => {
            let jitter_ms: u64 = rng().random_range(0..=250);
            let delay = StdDuration::from_millis(PERSIST_RETRY_BASE_MS + jitter_ms);
            warn!(error = %first, ?delay, "Edition persist failed; retrying once");
            sleep(delay).await;
            editions.persist(edition).await
        }
    }
}

async fn write_report_json(report: &RunReport, path: &str) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => match tokio::fs::write(path, json).await {
            Ok(()) => info!(path = %path, "Run report written"),
            Err(e) => warn!(path = %path, error = %e, "Could not write run report"),
        },
        Err(e) => warn!(error = %e, "Could not serialize run report"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use clap::Parser;

    #[tokio::test]
    async fn test_write_build_files_pairs_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let edition = RenderedEdition {
            file_name: "daily-echo.epub".to_string(),
            primary: b"epub-bytes".to_vec(),
            primary_content_type: "application/epub+zip".to_string(),
            derived: b"<html></html>".to_vec(),
            derived_content_type: "text/html".to_string(),
        };

        write_build_files(dir.path().to_str().unwrap(), &edition)
            .await
            .unwrap();

        assert!(dir.path().join("daily-echo.epub").exists());
        assert!(dir.path().join("daily-echo.html").exists());
    }

    #[tokio::test]
    async fn test_run_with_no_sources_completes() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("paperboy.yaml");
        std::fs::write(&config_path, "sources: []\n").unwrap();
        let db_path = dir.path().join("data").join("paperboy.db");
        let build_dir = dir.path().join("build");

        let args = Cli::parse_from([
            "paperboy",
            "--config",
            config_path.to_str().unwrap(),
            "--db",
            db_path.to_str().unwrap(),
            "--build-dir",
            build_dir.to_str().unwrap(),
            "--bootstrap",
        ]);

        let report = run(&args).await.unwrap();
        assert!(report.sources.is_empty());
        assert_eq!(report.staged, 0);
        assert_eq!(report.digests, 0);
        assert!(report.staging_cleared);
    }

    #[tokio::test]
    async fn test_run_fails_setup_check_without_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("paperboy.yaml");
        std::fs::write(&config_path, "sources: []\n").unwrap();
        let db_path = dir.path().join("fresh.db");

        let args = Cli::parse_from([
            "paperboy",
            "--config",
            config_path.to_str().unwrap(),
            "--db",
            db_path.to_str().unwrap(),
            "--build-dir",
            dir.path().join("build").to_str().unwrap(),
        ]);

        let err = run(&args).await.unwrap_err();
        assert!(matches!(err, PipelineError::ConfigMissing(_)));
    }

    #[tokio::test]
    async fn test_run_writes_report_json() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("paperboy.yaml");
        std::fs::write(&config_path, "sources: []\n").unwrap();
        let report_path = dir.path().join("report.json");

        let args = Cli::parse_from([
            "paperboy",
            "--config",
            config_path.to_str().unwrap(),
            "--db",
            dir.path().join("run.db").to_str().unwrap(),
            "--build-dir",
            dir.path().join("build").to_str().unwrap(),
            "--bootstrap",
            "--report-json",
            report_path.to_str().unwrap(),
        ]);

        run(&args).await.unwrap();

        let raw = std::fs::read_to_string(&report_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["digests"], 0);
        assert_eq!(parsed["staging_cleared"], true);
    }
}
