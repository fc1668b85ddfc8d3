//! Data models shared across the pipeline stages.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Source`]: A configured publication with an optional syndication feed
//! - [`ArticleRecord`]: One cleaned article, as written to and read from staging
//! - [`Digest`]: All of one source's articles for a day, ready for rendering
//! - [`Section`]: A category block inside a digest
//!
//! Records move through the stages by value; nothing here talks to the
//! network or the database.

use chrono::{DateTime, NaiveDate, Utc};

/// A configured publication, as stored in the shared source directory.
///
/// Sources are loaded once at run start and treated as immutable for the
/// rest of the run. A source without a feed URL is skipped by the fetch
/// phase but still participates in name resolution during compaction.
#[derive(Debug, Clone)]
pub struct Source {
    /// Row id in the shared `sources` table.
    pub id: i64,
    /// Human-readable publication name, also the digest title.
    pub display_name: String,
    /// The publication's homepage.
    pub site_url: String,
    /// Syndication feed URL, if the source has one.
    pub feed_url: Option<String>,
    /// ISO country the publication reports from.
    pub country: String,
    /// Language of the publication's articles.
    pub language: String,
    /// Category applied to records that carry no explicit category.
    pub default_category_id: Option<i64>,
    /// Optional logo/banner URL; carried for downstream readers.
    pub image: Option<String>,
}

impl Source {
    /// Whether the fetch phase has anything to do for this source.
    pub fn has_feed(&self) -> bool {
        self.feed_url
            .as_deref()
            .map(|u| !u.trim().is_empty())
            .unwrap_or(false)
    }
}

/// One cleaned article, in the exact shape it is staged and later compacted.
///
/// By the time a record exists, the title and body have been
/// whitespace-normalized and prefix-padded with a single leading space, and
/// the body is guaranteed non-empty. Titles that could not be extracted use
/// the `" (untitled)"` sentinel rather than an empty string.
#[derive(Debug, Clone)]
pub struct ArticleRecord {
    /// The source this article came from.
    pub source_id: i64,
    /// Category the record was staged under.
    pub category_id: i64,
    /// Padded headline (or the untitled sentinel).
    pub title: String,
    /// Padded, whitespace-collapsed article text. Never empty.
    pub body: String,
    /// Lead image, resolved to an absolute URL.
    pub lead_image_url: Option<String>,
    /// When the record was written to staging.
    pub staged_at: DateTime<Utc>,
}

/// A category block inside a digest.
///
/// Articles keep their staging read order; sections never re-sort.
#[derive(Debug, Clone)]
pub struct Section {
    /// Category id all (or most) of this section's records carry.
    pub category_id: i64,
    /// Human-readable heading from the category directory.
    pub heading: String,
    /// The section's articles, in staging read order.
    pub articles: Vec<ArticleRecord>,
}

/// Everything one source published on the target date, partitioned into
/// sections and ready for the renderer.
#[derive(Debug, Clone)]
pub struct Digest {
    /// The source the digest belongs to.
    pub source_id: i64,
    /// Digest title: the source's display name.
    pub title: String,
    /// Language tag carried from the source into the rendered artifact.
    pub language: String,
    /// Day the pipeline ran (shown on the masthead).
    pub run_date: NaiveDate,
    /// Day the articles were published.
    pub content_date: NaiveDate,
    /// Ordered sections: body categories ascending, trailing category last.
    pub sections: Vec<Section>,
}

impl Digest {
    /// Total articles across all sections.
    pub fn article_count(&self) -> usize {
        self.sections.iter().map(|s| s.articles.len()).sum()
    }

    /// Stable identifier for the edition, e.g. `Daily Echo_2026_08_24`.
    pub fn identifier(&self) -> String {
        format!("{}_{}", self.title, self.run_date.format("%Y_%m_%d"))
    }
}
