//! Syndication feed scanning.
//!
//! One scan fetches a source's RSS/Atom feed and returns the article URLs
//! published on the target date, in feed order. The calendar comparison is
//! done in UTC; entries without a parseable publish timestamp are skipped
//! rather than guessed at.
//!
//! A failed fetch or parse surfaces as [`PipelineError::Feed`], which the
//! fetch job treats as "zero articles today" instead of a run failure.

use chrono::NaiveDate;
use feed_rs::parser;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{PipelineError, Result};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Total timeout in seconds.
const TOTAL_TIMEOUT_SECS: u64 = 30;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Maximum accepted feed size in bytes.
const MAX_FEED_SIZE: u64 = 5 * 1024 * 1024;

/// User agent string for feed fetching.
const USER_AGENT: &str = concat!("paperboy/", env!("CARGO_PKG_VERSION"), " (feed scanner)");

/// Feed fetcher with explicit timeouts and a feed size cap.
pub struct FeedScanner {
    client: Client,
}

impl FeedScanner {
    /// Create a new scanner with default settings.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(TOTAL_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PipelineError::Feed(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Fetch a feed and return the entry URLs published on `target_date`.
    ///
    /// # Returns
    ///
    /// Article URLs in feed order. An empty vector is a normal outcome
    /// (nothing published that day), not an error.
    #[instrument(level = "info", skip(self), fields(%feed_url, %target_date))]
    pub async fn scan(&self, feed_url: &str, target_date: NaiveDate) -> Result<Vec<String>> {
        let response = self
            .client
            .get(feed_url)
            .send()
            .await
            .map_err(|e| PipelineError::Feed(format!("failed to fetch {feed_url}: {e}")))?;

        if !response.status().is_success() {
            return Err(PipelineError::Feed(format!(
                "HTTP {} from {feed_url}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_FEED_SIZE {
                return Err(PipelineError::Feed(format!(
                    "feed too large: {content_length} bytes from {feed_url}"
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Feed(format!("failed to read {feed_url}: {e}")))?;

        if bytes.len() as u64 > MAX_FEED_SIZE {
            return Err(PipelineError::Feed(format!(
                "feed too large: {} bytes from {feed_url}",
                bytes.len()
            )));
        }

        let urls = entries_for_date(&bytes, target_date)?;
        info!(count = urls.len(), "Scanned feed");
        Ok(urls)
    }
}

/// Parse raw feed bytes and keep the entry links published on `target_date`.
///
/// An entry's publish timestamp is its `published` element, falling back to
/// `updated` (Atom feeds often carry only the latter). The comparison uses
/// the UTC calendar date, ignoring time of day. Feed order is preserved.
pub fn entries_for_date(bytes: &[u8], target_date: NaiveDate) -> Result<Vec<String>> {
    let feed = parser::parse(bytes)
        .map_err(|e| PipelineError::Feed(format!("failed to parse feed: {e}")))?;

    let mut urls = Vec::new();
    for entry in feed.entries {
        let Some(published) = entry.published.or(entry.updated) else {
            debug!(entry_id = %entry.id, "Entry has no publish timestamp; skipping");
            continue;
        };
        if published.date_naive() != target_date {
            continue;
        }
        match entry.links.first() {
            Some(link) => urls.push(link.href.clone()),
            None => warn!(entry_id = %entry.id, "Entry has no link; skipping"),
        }
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 24).unwrap()
    }

    #[test]
    fn test_entries_for_date_rss() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Daily Echo</title>
    <link>https://echo.example</link>
    <item>
      <title>First</title>
      <link>https://echo.example/articles/1</link>
      <pubDate>Mon, 24 Aug 2026 06:30:00 +0000</pubDate>
    </item>
    <item>
      <title>Stale</title>
      <link>https://echo.example/articles/2</link>
      <pubDate>Sun, 23 Aug 2026 22:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Second</title>
      <link>https://echo.example/articles/3</link>
      <pubDate>Mon, 24 Aug 2026 18:05:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

        let urls = entries_for_date(rss.as_bytes(), target()).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://echo.example/articles/1".to_string(),
                "https://echo.example/articles/3".to_string(),
            ]
        );
    }

    #[test]
    fn test_entries_for_date_skips_undated() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Daily Echo</title>
    <item>
      <title>No date</title>
      <link>https://echo.example/articles/1</link>
    </item>
    <item>
      <title>Dated</title>
      <link>https://echo.example/articles/2</link>
      <pubDate>Mon, 24 Aug 2026 09:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

        let urls = entries_for_date(rss.as_bytes(), target()).unwrap();
        assert_eq!(urls, vec!["https://echo.example/articles/2".to_string()]);
    }

    #[test]
    fn test_entries_for_date_atom_updated_fallback() {
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Echo</title>
  <entry>
    <id>urn:uuid:1</id>
    <title>Only updated</title>
    <link href="https://echo.example/atom/1"/>
    <updated>2026-08-24T10:00:00Z</updated>
  </entry>
  <entry>
    <id>urn:uuid:2</id>
    <title>Wrong day</title>
    <link href="https://echo.example/atom/2"/>
    <updated>2026-08-22T10:00:00Z</updated>
  </entry>
</feed>"#;

        let urls = entries_for_date(atom.as_bytes(), target()).unwrap();
        assert_eq!(urls, vec!["https://echo.example/atom/1".to_string()]);
    }

    #[test]
    fn test_entries_for_date_skips_linkless_entries() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Daily Echo</title>
    <item>
      <title>No link</title>
      <pubDate>Mon, 24 Aug 2026 09:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

        let urls = entries_for_date(rss.as_bytes(), target()).unwrap();
        assert!(urls.is_empty());
    }

    #[test]
    fn test_entries_for_date_invalid_feed() {
        let err = entries_for_date(b"this is not XML", target()).unwrap_err();
        assert!(matches!(err, PipelineError::Feed(_)));
    }
}
