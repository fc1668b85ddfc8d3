//! Pipeline configuration loaded from a YAML file.
//!
//! The file lists the sources to fetch, the category directory used to
//! partition digests, and the extraction knobs. Everything except the
//! source list has a default, so a minimal config is just `sources:`.
//!
//! ```yaml
//! sources:
//!   - name: Daily Echo
//!     site_url: https://echo.example
//!     rss_url: https://echo.example/rss
//!     country: HR
//!     language: hr
//! categories:
//!   - { id: 1, heading: News }
//!   - { id: 5, heading: Sport }
//! trailing_category_id: 5
//! extraction:
//!   workers: 4
//!   min_sentences: 20
//! title_exclusions: [VIDEO, ANKETA, UŽIVO, LIVE]
//! ```

use serde::Deserialize;

use crate::error::{PipelineError, Result};

/// Category applied to staged records when the source declares no default.
pub const PRIMARY_CATEGORY_ID: i64 = 1;

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Publications to fetch, one fetch job each.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Category directory: known ids and their section headings.
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryConfig>,
    /// Category rendered as the final section of every digest.
    #[serde(default = "default_trailing_category_id")]
    pub trailing_category_id: i64,
    /// Article extraction settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,
    /// Headline prefixes that mark non-article entries.
    #[serde(default = "default_title_exclusions")]
    pub title_exclusions: Vec<String>,
}

/// One publication entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Display name; also the idempotency key in the source directory.
    pub name: String,
    /// Publication homepage.
    pub site_url: String,
    /// Feed URL. A source without one is listed but never fetched.
    #[serde(default)]
    pub rss_url: Option<String>,
    /// Country the publication reports from.
    pub country: String,
    /// Language of the articles.
    pub language: String,
    /// Category for records that carry no explicit category.
    #[serde(default)]
    pub default_category_id: Option<i64>,
    /// Optional logo/banner URL.
    #[serde(default)]
    pub image: Option<String>,
}

/// A category the layout knows by name.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    /// Category id as staged on records.
    pub id: i64,
    /// Section heading shown in rendered digests.
    pub heading: String,
}

/// Article extraction settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// Parallel extraction width inside one fetch job.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Minimum sentence count for a plausible article body.
    #[serde(default = "default_min_sentences")]
    pub min_sentences: usize,
    /// Per-request timeout for article downloads, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_categories() -> Vec<CategoryConfig> {
    vec![
        CategoryConfig {
            id: 1,
            heading: "News".to_string(),
        },
        CategoryConfig {
            id: 5,
            heading: "Sport".to_string(),
        },
    ]
}

fn default_trailing_category_id() -> i64 {
    5
}

fn default_title_exclusions() -> Vec<String> {
    ["VIDEO", "ANKETA", "UŽIVO", "LIVE"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_workers() -> usize {
    4
}

fn default_min_sentences() -> usize {
    20
}

fn default_request_timeout() -> u64 {
    20
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            min_sentences: default_min_sentences(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            categories: default_categories(),
            trailing_category_id: default_trailing_category_id(),
            extraction: ExtractionConfig::default(),
            title_exclusions: default_title_exclusions(),
        }
    }
}

impl PipelineConfig {
    /// Load and parse the configuration file.
    pub fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("cannot read {path}: {e}")))?;
        let config: PipelineConfig = serde_yaml::from_str(&raw)
            .map_err(|e| PipelineError::Config(format!("cannot parse {path}: {e}")))?;
        Ok(config)
    }

    /// Heading for a category id, if the directory knows it.
    pub fn category_heading(&self, id: i64) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.heading.as_str())
    }
}
