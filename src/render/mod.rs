//! Digest rendering: a digest in, a bound edition out.
//!
//! The primary artifact is an EPUB laid out like a small newspaper: a
//! masthead on the front page, three-column sections, and a dividing
//! band before every section after the first. The derived print
//! rendition is flattened from the finished EPUB rather than from the
//! digest, so the two artifacts can never disagree about content.

pub mod epub;
pub mod print;

use crate::error::Result;
use crate::models::Digest;
use crate::utils::slugify_title;

/// Media type of the primary artifact.
pub const EPUB_MEDIA_TYPE: &str = "application/epub+zip";

/// Media type of the derived print artifact.
pub const PRINT_MEDIA_TYPE: &str = "text/html";

/// A digest rendered into its binary artifacts.
#[derive(Debug, Clone)]
pub struct RenderedEdition {
    /// File name the edition is filed under, e.g. `daily-echo.epub`.
    pub file_name: String,
    /// The bound EPUB.
    pub primary: Vec<u8>,
    /// Media type of `primary`.
    pub primary_content_type: String,
    /// The flattened print rendition.
    pub derived: Vec<u8>,
    /// Media type of `derived`.
    pub derived_content_type: String,
}

/// Anything that can turn a digest into a rendered edition.
pub trait DigestRenderer {
    /// Render one digest into its artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PipelineError::Render`] when either
    /// artifact cannot be produced. The caller keeps the staged records
    /// so a later run can retry.
    fn render(&self, digest: &Digest) -> Result<RenderedEdition>;
}

/// The shipped renderer: EPUB first, print rendition flattened from it.
#[derive(Debug, Default)]
pub struct EditionRenderer;

impl EditionRenderer {
    /// Create a new renderer.
    pub fn new() -> Self {
        Self
    }
}

impl DigestRenderer for EditionRenderer {
    fn render(&self, digest: &Digest) -> Result<RenderedEdition> {
        let primary = epub::build(digest)?;
        let derived = print::flatten_epub(&primary)?;
        Ok(RenderedEdition {
            file_name: format!("{}.epub", slugify_title(&digest.title)),
            primary,
            primary_content_type: EPUB_MEDIA_TYPE.to_string(),
            derived: derived.into_bytes(),
            derived_content_type: PRINT_MEDIA_TYPE.to_string(),
        })
    }
}
