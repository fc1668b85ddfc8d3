//! Source fetch job: one source, one target date, staged records out.
//!
//! The job chains scan -> extract -> filter -> stage for a single source
//! and contains every failure at the narrowest scope that can absorb it:
//!
//! - no feed URL: the source is skipped, not an error
//! - feed unavailable: the source yields zero records this run
//! - one article failing extraction: its siblings are unaffected
//! - one staging write failing: retried once with jitter, then dropped
//!
//! Jobs for different sources run concurrently; each writes only its own
//! records, so they never contend over data.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rand::{Rng, rng};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::config::PRIMARY_CATEGORY_ID;
use crate::error::Result;
use crate::extract::ArticleExtractor;
use crate::feed::FeedScanner;
use crate::models::{ArticleRecord, Source};
use crate::store::staging::StagingStore;
use crate::utils::{normalize_body, pad_title, title_is_excluded, truncate_for_log};

/// Base delay before the single staging retry; jitter is added on top.
const STAGE_RETRY_BASE_MS: u64 = 200;

/// What one source fetch job did, for the run summary.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    /// The source's id.
    pub source_id: i64,
    /// The source's display name.
    pub source: String,
    /// URLs the feed scan returned for the target date.
    pub scanned: usize,
    /// Candidates that survived extraction.
    pub extracted: usize,
    /// Candidates dropped by the headline exclusion markers.
    pub filtered: usize,
    /// Candidates dropped for an empty body after normalization.
    pub dropped_empty: usize,
    /// Records written to staging.
    pub staged: usize,
    /// The feed could not be fetched or parsed.
    pub feed_error: bool,
    /// The source has no feed URL and was never scanned.
    pub skipped: bool,
}

impl SourceReport {
    fn new(source: &Source) -> Self {
        Self {
            source_id: source.id,
            source: source.display_name.clone(),
            scanned: 0,
            extracted: 0,
            filtered: 0,
            dropped_empty: 0,
            staged: 0,
            feed_error: false,
            skipped: false,
        }
    }
}

/// Fetch, filter, and stage one source's articles for the target date.
///
/// Never returns an error: every failure mode is folded into the report
/// so sibling sources keep running.
#[instrument(level = "info", skip_all, fields(source = %source.display_name))]
pub async fn run_source(
    source: &Source,
    scanner: &FeedScanner,
    extractor: &ArticleExtractor,
    staging: &StagingStore<'_>,
    title_exclusions: &[String],
    target_date: NaiveDate,
) -> SourceReport {
    let mut report = SourceReport::new(source);

    if !source.has_feed() {
        info!("No feed URL configured; skipping source");
        report.skipped = true;
        return report;
    }
    let feed_url = source.feed_url.as_deref().unwrap_or_default();

    let urls = match scanner.scan(feed_url, target_date).await {
        Ok(urls) => urls,
        Err(e) => {
            error!(error = %e, "Feed scan failed; source yields nothing this run");
            report.feed_error = true;
            return report;
        }
    };
    report.scanned = urls.len();
    if urls.is_empty() {
        info!(%target_date, "Nothing published on the target date");
        return report;
    }

    let category_id = source.default_category_id.unwrap_or(PRIMARY_CATEGORY_ID);
    let candidates = extractor.extract_batch(&urls).await;
    for candidate in candidates.into_iter().flatten() {
        report.extracted += 1;

        let raw_title = candidate.title.as_deref().unwrap_or("");
        if title_is_excluded(raw_title, title_exclusions) {
            debug!(
                title = %truncate_for_log(raw_title, 80),
                "Headline carries an exclusion marker; dropped"
            );
            report.filtered += 1;
            continue;
        }

        let body = normalize_body(&candidate.body);
        if body.is_empty() {
            warn!(url = %candidate.url, "Empty body after normalization; dropped");
            report.dropped_empty += 1;
            continue;
        }

        let record = ArticleRecord {
            source_id: source.id,
            category_id,
            title: pad_title(candidate.title.as_deref()),
            body,
            lead_image_url: candidate.lead_image_url,
            staged_at: Utc::now(),
        };
        match stage_with_retry(staging, &record).await {
            Ok(()) => report.staged += 1,
            Err(e) => {
                error!(url = %candidate.url, error = %e, "Staging write failed twice; record dropped");
            }
        }
    }

    info!(
        scanned = report.scanned,
        extracted = report.extracted,
        filtered = report.filtered,
        dropped_empty = report.dropped_empty,
        staged = report.staged,
        "Source fetch complete"
    );
    report
}

/// Stage a record, retrying once after a short jittered delay.
///
/// Staging has no dedup key, so a retry of the same record is safe; the
/// pen is drained wholesale at compaction.
async fn stage_with_retry(staging: &StagingStore<'_>, record: &ArticleRecord) -> Result<()> {
    match staging.stage(record).await {
        Ok(()) => Ok(()),
        Err(first) => {
            let jitter_ms: u64 = rng().random_range(0..=250);
            let delay = Duration::from_millis(STAGE_RETRY_BASE_MS + jitter_ms);
            warn!(error = %first, ?delay, "Staging write failed; retrying once");
            sleep(delay).await;
            staging.stage(record).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;
    use crate::error::PipelineError;
    use crate::store::Storage;

    fn source(id: i64, feed_url: Option<&str>) -> Source {
        Source {
            id,
            display_name: "Daily Echo".to_string(),
            site_url: "https://echo.example".to_string(),
            feed_url: feed_url.map(|s| s.to_string()),
            country: "HR".to_string(),
            language: "hr".to_string(),
            default_category_id: Some(1),
            image: None,
        }
    }

    fn record() -> ArticleRecord {
        ArticleRecord {
            source_id: 1,
            category_id: 1,
            title: " Headline".to_string(),
            body: " Body text.".to_string(),
            lead_image_url: None,
            staged_at: Utc::now(),
        }
    }

    async fn setup() -> Storage {
        let storage = Storage::connect_memory().await.unwrap();
        storage.bootstrap().await.unwrap();
        storage
    }

    fn target_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 24).unwrap()
    }

    #[tokio::test]
    async fn test_source_without_feed_short_circuits() {
        let storage = setup().await;
        let staging = StagingStore::new(storage.pool());
        let scanner = FeedScanner::new().unwrap();
        let extractor = ArticleExtractor::new(&ExtractionConfig::default()).unwrap();

        let report = run_source(
            &source(1, None),
            &scanner,
            &extractor,
            &staging,
            &[],
            target_date(),
        )
        .await;

        assert!(report.skipped);
        assert_eq!(report.staged, 0);
        assert!(staging.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_feed_url_counts_as_missing() {
        let storage = setup().await;
        let staging = StagingStore::new(storage.pool());
        let scanner = FeedScanner::new().unwrap();
        let extractor = ArticleExtractor::new(&ExtractionConfig::default()).unwrap();

        let report = run_source(
            &source(1, Some("   ")),
            &scanner,
            &extractor,
            &staging,
            &[],
            target_date(),
        )
        .await;

        assert!(report.skipped);
        assert_eq!(report.staged, 0);
    }

    #[tokio::test]
    async fn test_unreachable_feed_yields_zero() {
        let storage = setup().await;
        let staging = StagingStore::new(storage.pool());
        let scanner = FeedScanner::new().unwrap();
        let extractor = ArticleExtractor::new(&ExtractionConfig::default()).unwrap();

        // Discard port; nothing listens there.
        let report = run_source(
            &source(1, Some("http://127.0.0.1:9/feed")),
            &scanner,
            &extractor,
            &staging,
            &[],
            target_date(),
        )
        .await;

        assert!(report.feed_error);
        assert!(!report.skipped);
        assert_eq!(report.staged, 0);
        assert!(staging.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stage_with_retry_happy_path() {
        let storage = setup().await;
        let staging = StagingStore::new(storage.pool());

        stage_with_retry(&staging, &record()).await.unwrap();
        assert_eq!(staging.read_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stage_with_retry_surfaces_second_failure() {
        let storage = setup().await;
        sqlx::query("DROP TABLE staging")
            .execute(storage.pool())
            .await
            .unwrap();
        let staging = StagingStore::new(storage.pool());

        let err = stage_with_retry(&staging, &record()).await.unwrap_err();
        assert!(matches!(err, PipelineError::StagingWrite(_)));
    }
}
