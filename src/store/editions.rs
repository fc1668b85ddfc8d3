//! Edition store: finished digests, bound and filed.
//!
//! Each rendered digest is kept as one row holding both artifact blobs
//! (the EPUB and its print rendition). Rows are keyed by title, file
//! name, source, content date and run date; persisting the same edition
//! again replaces the blobs in place, so re-running a day never piles up
//! duplicates.

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::error::{PipelineError, Result};

/// A finished edition ready to be filed, borrowing its artifact bytes.
#[derive(Debug)]
pub struct NewEdition<'a> {
    pub title: &'a str,
    pub file_name: &'a str,
    pub source_id: i64,
    pub content_date: NaiveDate,
    pub run_date: NaiveDate,
    pub epub: &'a [u8],
    pub epub_content_type: &'a str,
    pub print: &'a [u8],
    pub print_content_type: &'a str,
}

/// A stored edition read back out of the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredEdition {
    pub id: i64,
    pub title: String,
    pub file_name: String,
    pub source_id: i64,
    pub content_date: NaiveDate,
    pub run_date: NaiveDate,
    pub epub_file: Vec<u8>,
    pub epub_content_type: String,
    pub print_file: Vec<u8>,
    pub print_content_type: String,
}

/// Repository over the shared `editions` table.
pub struct EditionStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EditionStore<'a> {
    /// Create a new edition store instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// File an edition, replacing any existing row with the same key.
    pub async fn persist(&self, edition: &NewEdition<'_>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO editions (title, file_name, source_id, content_date, run_date,
                                  epub_file, epub_content_type,
                                  print_file, print_content_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (title, file_name, source_id, content_date, run_date) DO UPDATE SET
                epub_file = excluded.epub_file,
                epub_content_type = excluded.epub_content_type,
                print_file = excluded.print_file,
                print_content_type = excluded.print_content_type,
                updated_at = datetime('now')
            "#,
        )
        .bind(edition.title)
        .bind(edition.file_name)
        .bind(edition.source_id)
        .bind(edition.content_date)
        .bind(edition.run_date)
        .bind(edition.epub)
        .bind(edition.epub_content_type)
        .bind(edition.print)
        .bind(edition.print_content_type)
        .execute(self.pool)
        .await
        .map_err(|e| PipelineError::Persist(e.to_string()))?;
        Ok(())
    }

    /// Look up a source's edition for a given run date.
    pub async fn find(&self, source_id: i64, run_date: NaiveDate) -> Result<Option<StoredEdition>> {
        let row = sqlx::query_as::<_, StoredEdition>(
            r#"
            SELECT id, title, file_name, source_id, content_date, run_date,
                   epub_file, epub_content_type, print_file, print_content_type
            FROM editions
            WHERE source_id = $1 AND run_date = $2
            "#,
        )
        .bind(source_id)
        .bind(run_date)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| PipelineError::Database(e.to_string()))?;
        Ok(row)
    }

    /// Total number of filed editions.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM editions")
            .fetch_one(self.pool)
            .await
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Storage;

    fn edition<'a>(epub: &'a [u8], print: &'a [u8]) -> NewEdition<'a> {
        NewEdition {
            title: "Daily Echo",
            file_name: "daily_echo.epub",
            source_id: 1,
            content_date: NaiveDate::from_ymd_opt(2026, 8, 24).unwrap(),
            run_date: NaiveDate::from_ymd_opt(2026, 8, 25).unwrap(),
            epub,
            epub_content_type: "application/epub+zip",
            print,
            print_content_type: "text/html",
        }
    }

    async fn setup() -> Storage {
        let storage = Storage::connect_memory().await.unwrap();
        storage.bootstrap().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_persist_files_an_edition() {
        let storage = setup().await;
        let store = EditionStore::new(storage.pool());

        store.persist(&edition(b"epub-bytes", b"print-bytes")).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let run_date = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        let stored = store.find(1, run_date).await.unwrap().unwrap();
        assert_eq!(stored.title, "Daily Echo");
        assert_eq!(stored.epub_file, b"epub-bytes");
        assert_eq!(stored.print_file, b"print-bytes");
        assert_eq!(stored.epub_content_type, "application/epub+zip");
        assert_eq!(
            stored.content_date,
            NaiveDate::from_ymd_opt(2026, 8, 24).unwrap()
        );
    }

    #[tokio::test]
    async fn test_persist_same_key_replaces_blobs() {
        let storage = setup().await;
        let store = EditionStore::new(storage.pool());

        store.persist(&edition(b"old-epub", b"old-print")).await.unwrap();
        store.persist(&edition(b"new-epub", b"new-print")).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let run_date = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        let stored = store.find(1, run_date).await.unwrap().unwrap();
        assert_eq!(stored.epub_file, b"new-epub");
        assert_eq!(stored.print_file, b"new-print");
    }

    #[tokio::test]
    async fn test_persist_new_run_date_adds_a_row() {
        let storage = setup().await;
        let store = EditionStore::new(storage.pool());

        store.persist(&edition(b"epub", b"print")).await.unwrap();
        let mut next_day = edition(b"epub", b"print");
        next_day.content_date = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        next_day.run_date = NaiveDate::from_ymd_opt(2026, 8, 26).unwrap();
        store.persist(&next_day).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_find_misses_other_dates() {
        let storage = setup().await;
        let store = EditionStore::new(storage.pool());

        store.persist(&edition(b"epub", b"print")).await.unwrap();

        let other = NaiveDate::from_ymd_opt(2026, 8, 26).unwrap();
        assert!(store.find(1, other).await.unwrap().is_none());
        let run_date = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        assert!(store.find(2, run_date).await.unwrap().is_none());
    }
}
