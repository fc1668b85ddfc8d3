//! Utility functions for text normalization, naming, and file system operations.
//!
//! This module provides helper functions used throughout the pipeline:
//! - Whitespace normalization and title padding for staged records
//! - Headline exclusion matching for non-article entries
//! - String truncation and slugification for logging and file names
//! - Build-directory validation and cleanup

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;

/// Headline used when a page yields no usable title.
pub const UNTITLED: &str = "(untitled)";

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalize an article body for staging.
///
/// Collapses every whitespace run (newlines, tabs, repeated spaces) to a
/// single space, trims the ends, and prefixes the result with one leading
/// space. Historical digest layouts expect that pad on every
/// staged field.
///
/// # Returns
///
/// The padded, collapsed body, or an empty string when nothing but
/// whitespace survives. Callers must drop records with an empty result
/// rather than stage them.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_body("Hello\n\n  world\tfoo"), " Hello world foo");
/// assert_eq!(normalize_body("  \n\t "), "");
/// ```
pub fn normalize_body(raw: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(raw, " ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(" {trimmed}")
    }
}

/// Pad a headline for staging.
///
/// Trims the title and prefixes it with one leading space. A missing or
/// whitespace-only title becomes the padded [`UNTITLED`] sentinel so a
/// record never carries an empty headline.
pub fn pad_title(raw: Option<&str>) -> String {
    let trimmed = raw.unwrap_or("").trim();
    if trimmed.is_empty() {
        format!(" {UNTITLED}")
    } else {
        format!(" {trimmed}")
    }
}

/// Check a headline against the configured exclusion markers.
///
/// Feeds routinely mix live tickers, polls, and video posts in with real
/// articles; their headlines start with a marker word. Matching is
/// case-insensitive and prefix-based on the trimmed title.
pub fn title_is_excluded(title: &str, markers: &[String]) -> bool {
    let lowered = title.trim().to_lowercase();
    markers
        .iter()
        .any(|marker| lowered.starts_with(&marker.to_lowercase()))
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut near `max` bytes, never splitting a character
/// (headlines here are full of two-byte letters), with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
    }
}

/// Convert a display name to a file-name-friendly slug.
///
/// Lowercases the text, removes special characters, and replaces spaces
/// with hyphens. Used to derive artifact file names from source names.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify_title("Daily Echo"), "daily-echo");
/// assert_eq!(slugify_title("24sata!"), "24sata");
/// ```
pub fn slugify_title(title: &str) -> String {
    title
        .to_lowercase()
        .replace(|c: char| !c.is_alphanumeric() && c != ' ' && c != '-', "")
        .replace(' ', "-")
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a scratch file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.).
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<()> {
    fs::create_dir_all(path).await?;
    // Small sync scratch write using std fs (simpler error surface)
    let scratch_path = format!("{}/..__write_test__", path.trim_end_matches('/'));
    stdfs::File::create(&scratch_path)?;
    let _ = stdfs::remove_file(&scratch_path);
    info!("Build directory is writable");
    Ok(())
}

/// Delete every regular file directly under `path`.
///
/// Used to drop transient edition files after a fully successful run.
/// Subdirectories and their contents are left alone.
///
/// # Returns
///
/// The number of files removed.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn clear_dir_files(path: &str) -> Result<usize> {
    let mut removed = 0usize;
    let mut entries = fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    info!(removed, "Cleared transient files");
    Ok(removed)
}
