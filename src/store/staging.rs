//! Staging store: the holding pen between extraction and compaction.
//!
//! Every accepted article lands here first, one row per article, in the
//! order the fetch phase produced them. Compaction reads the whole pen
//! back in that order and the run clears it only after every edition has
//! been rendered and persisted, so a failed run leaves its articles in
//! place for the next attempt.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::{PipelineError, Result};
use crate::models::ArticleRecord;

/// Row type for a staged article from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct StagedRow {
    source_id: i64,
    category_id: i64,
    title: String,
    body: String,
    lead_image_url: Option<String>,
    staged_at: DateTime<Utc>,
}

impl From<StagedRow> for ArticleRecord {
    fn from(row: StagedRow) -> Self {
        ArticleRecord {
            source_id: row.source_id,
            category_id: row.category_id,
            title: row.title,
            body: row.body,
            lead_image_url: row.lead_image_url,
            staged_at: row.staged_at,
        }
    }
}

/// Repository over the `staging` table.
pub struct StagingStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StagingStore<'a> {
    /// Create a new staging store instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one article to the pen.
    pub async fn stage(&self, record: &ArticleRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO staging (source_id, category_id, title, body,
                                 lead_image_url, staged_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.source_id)
        .bind(record.category_id)
        .bind(&record.title)
        .bind(&record.body)
        .bind(&record.lead_image_url)
        .bind(record.staged_at)
        .execute(self.pool)
        .await
        .map_err(|e| PipelineError::StagingWrite(e.to_string()))?;
        Ok(())
    }

    /// Every staged article, oldest first.
    pub async fn read_all(&self) -> Result<Vec<ArticleRecord>> {
        let rows = sqlx::query_as::<_, StagedRow>(
            r#"
            SELECT source_id, category_id, title, body, lead_image_url, staged_at
            FROM staging
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool)
        .await
        .map_err(|e| PipelineError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(ArticleRecord::from).collect())
    }

    /// Empty the pen.
    ///
    /// # Returns
    ///
    /// The number of rows removed.
    pub async fn clear_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM staging")
            .execute(self.pool)
            .await
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
