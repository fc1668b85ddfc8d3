//! SQLite-backed stores shared by the pipeline stages.
//!
//! One [`Storage`] handle is opened at run start and dropped when the run
//! ends; the stage-specific stores ([`sources::SourceDirectory`],
//! [`staging::StagingStore`], [`editions::EditionStore`]) borrow its pool.
//!
//! # Schema ownership
//!
//! The `sources` and `editions` tables belong to the downstream reader
//! that serves finished editions; this pipeline only checks they exist
//! and refuses to run without them. The `staging` table is the pipeline's
//! own scratch space and is created on demand. `--bootstrap` creates all
//! of it for fresh deployments and tests.

pub mod editions;
pub mod sources;
pub mod staging;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;
use tracing::{info, instrument};

use crate::error::{PipelineError, Result};

/// Pool size for the on-disk database.
const MAX_CONNECTIONS: u32 = 5;

/// Shared database handle for one pipeline run.
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Open the database file, creating it (and its parent directory) if
    /// missing, and apply the connection pragmas.
    #[instrument(level = "info", skip_all, fields(path = %db_path))]
    pub async fn connect(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db_url = format!("sqlite://{db_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;
        configure(&pool).await?;
        info!("Opened database");
        Ok(Self { pool })
    }

    /// Open an in-memory database.
    ///
    /// SQLite gives every connection its own memory database, so the pool
    /// is pinned to a single connection.
    pub async fn connect_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        configure(&pool).await?;
        Ok(Self { pool })
    }

    /// The underlying pool, for the stage-specific stores.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Verify the shared tables exist and create the staging table.
    ///
    /// # Errors
    ///
    /// [`PipelineError::ConfigMissing`] when `sources` or `editions` is
    /// absent. Those tables are owned by the downstream reader; creating
    /// them here behind its back would hide a broken deployment.
    pub async fn setup_check(&self) -> Result<()> {
        for table in ["sources", "editions"] {
            if !self.table_exists(table).await? {
                return Err(PipelineError::ConfigMissing(format!(
                    "required table '{table}' not found (run with --bootstrap on a fresh database)"
                )));
            }
        }
        create_staging_table(&self.pool).await?;
        Ok(())
    }

    /// Create every table and index the pipeline touches.
    ///
    /// Idempotent; used by `--bootstrap` on fresh deployments and by tests.
    pub async fn bootstrap(&self) -> Result<()> {
        create_sources_table(&self.pool).await?;
        create_editions_table(&self.pool).await?;
        create_editions_key_index(&self.pool).await?;
        create_staging_table(&self.pool).await?;
        info!("Bootstrapped database schema");
        Ok(())
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }
}

async fn configure(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_sources_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            site_url TEXT NOT NULL,
            rss_url TEXT,
            country TEXT NOT NULL,
            language TEXT NOT NULL,
            default_category_id INTEGER,
            image TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_editions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS editions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            file_name TEXT NOT NULL,
            source_id INTEGER NOT NULL,
            content_date TEXT NOT NULL,
            run_date TEXT NOT NULL,
            epub_file BLOB NOT NULL,
            epub_content_type TEXT NOT NULL,
            print_file BLOB NOT NULL,
            print_content_type TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

// The upsert in EditionStore::persist conflicts on exactly these columns.
async fn create_editions_key_index(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_editions_key
        ON editions (title, file_name, source_id, content_date, run_date)
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_staging_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS staging (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            lead_image_url TEXT,
            staged_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
