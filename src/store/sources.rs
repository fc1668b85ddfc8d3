//! Source directory: the shared registry of configured publications.
//!
//! Configured sources are mirrored into the `sources` table at run start
//! with an insert keyed by name, so re-running the pipeline (or running it
//! from two hosts against the same database) never duplicates a
//! publication. Existing rows are left untouched; the table is also read
//! by the downstream edition browser.

use sqlx::SqlitePool;
use tracing::{debug, info, instrument};

use crate::config::SourceConfig;
use crate::error::{PipelineError, Result};
use crate::models::Source;

/// Row type for a source from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SourceRow {
    id: i64,
    name: String,
    site_url: String,
    rss_url: Option<String>,
    country: String,
    language: String,
    default_category_id: Option<i64>,
    image: Option<String>,
}

impl From<SourceRow> for Source {
    fn from(row: SourceRow) -> Self {
        Source {
            id: row.id,
            display_name: row.name,
            site_url: row.site_url,
            feed_url: row.rss_url,
            country: row.country,
            language: row.language,
            default_category_id: row.default_category_id,
            image: row.image,
        }
    }
}

/// Repository over the shared `sources` table.
pub struct SourceDirectory<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SourceDirectory<'a> {
    /// Create a new directory instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Mirror the configured sources into the directory.
    ///
    /// Each entry is inserted only if no row with that name exists yet;
    /// loading the same configuration twice leaves exactly one row per
    /// name.
    ///
    /// # Returns
    ///
    /// The number of newly inserted sources.
    #[instrument(level = "info", skip_all, fields(count = entries.len()))]
    pub async fn load_config(&self, entries: &[SourceConfig]) -> Result<usize> {
        let mut inserted = 0usize;
        for entry in entries {
            if self.id_by_name(&entry.name).await?.is_some() {
                debug!(name = %entry.name, "Source already present");
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO sources (name, site_url, rss_url, country, language,
                                     default_category_id, image)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(&entry.name)
            .bind(&entry.site_url)
            .bind(&entry.rss_url)
            .bind(&entry.country)
            .bind(&entry.language)
            .bind(entry.default_category_id)
            .bind(&entry.image)
            .execute(self.pool)
            .await
            .map_err(|e| PipelineError::Database(e.to_string()))?;
            inserted += 1;
        }
        info!(inserted, "Source directory loaded");
        Ok(inserted)
    }

    /// All sources, in registration order.
    pub async fn list(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT id, name, site_url, rss_url, country, language,
                   default_category_id, image
            FROM sources
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool)
        .await
        .map_err(|e| PipelineError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Source::from).collect())
    }

    /// Display name for a source id, if the directory knows it.
    pub async fn resolve_name(&self, source_id: i64) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT name FROM sources WHERE id = $1")
            .bind(source_id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        Ok(row.map(|(name,)| name))
    }

    async fn id_by_name(&self, name: &str) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM sources WHERE name = $1")
            .bind(name)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        Ok(row.map(|(id,)| id))
    }
}
