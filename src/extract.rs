//! Article extraction.
//!
//! Turns an article URL into a cleaned candidate: fetch the page, refuse
//! obvious non-articles (video, audio, PDF), then pull the headline, body
//! paragraphs, and lead image out of the HTML. A body with fewer sentences
//! than the configured floor is rejected as well; index pages and stub
//! posts routinely pass every other check.
//!
//! Extraction is fan-out friendly: [`ArticleExtractor::extract_batch`] runs
//! a bounded number of downloads in parallel while keeping results in input
//! order, and a failed URL never takes its siblings down.

use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::ExtractionConfig;
use crate::error::{PipelineError, Result};

/// User agent string for article fetching.
const USER_AGENT: &str = concat!("paperboy/", env!("CARGO_PKG_VERSION"), " (article fetcher)");

/// Content types that never carry an article body.
const SKIPPED_CONTENT_TYPES: &[&str] = &[
    "video/mp4",
    "video/mpeg",
    "video/ogg",
    "video/quicktime",
    "video/webm",
    "video/x-ms-wmv",
    "audio/mpeg",
    "audio/ogg",
    "audio/wav",
    "application/pdf",
    "application/x-pdf",
    "application/x-bzpdf",
    "application/x-gzpdf",
];

static OG_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static PAGE_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static FIRST_HEADING: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static ARTICLE_PARAGRAPHS: Lazy<Selector> = Lazy::new(|| Selector::parse("article p").unwrap());
static ALL_PARAGRAPHS: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static OG_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).unwrap());

/// A cleaned article before filtering and staging.
#[derive(Debug)]
pub struct ArticleCandidate {
    /// The article URL.
    pub url: String,
    /// Raw headline, if the page had one.
    pub title: Option<String>,
    /// Raw body text, paragraphs joined by newlines.
    pub body: String,
    /// Lead image resolved to an absolute URL.
    pub lead_image_url: Option<String>,
}

/// Downloads article pages and extracts candidates from them.
pub struct ArticleExtractor {
    client: Client,
    min_sentences: usize,
    workers: usize,
}

impl ArticleExtractor {
    /// Create an extractor from the configured settings.
    pub fn new(settings: &ExtractionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PipelineError::Extraction(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            min_sentences: settings.min_sentences,
            workers: settings.workers.max(1),
        })
    }

    /// Fetch one URL and extract an article candidate from it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Extraction`] for transport failures,
    /// non-success statuses, skipped content types, PDF payloads, and
    /// bodies below the sentence floor.
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn extract(&self, url: &str) -> Result<ArticleCandidate> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::Extraction(format!("failed to fetch {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(PipelineError::Extraction(format!(
                "HTTP {} from {url}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if skipped_content_type(&content_type) {
            return Err(PipelineError::Extraction(format!(
                "non-article content type {content_type} at {url}"
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| PipelineError::Extraction(format!("failed to read {url}: {e}")))?;

        // Servers lie about content types; catch PDFs by their magic bytes too.
        if html.starts_with("%PDF-") {
            return Err(PipelineError::Extraction(format!("PDF payload at {url}")));
        }

        parse_article(url, &html, self.min_sentences)
    }

    /// Extract many URLs with bounded parallelism, preserving input order.
    ///
    /// Failed URLs are logged and yield `None`; they never abort the batch.
    /// The result vector lines up index-for-index with `urls`.
    #[instrument(level = "info", skip_all, fields(count = urls.len()))]
    pub async fn extract_batch(&self, urls: &[String]) -> Vec<Option<ArticleCandidate>> {
        let results: Vec<Option<ArticleCandidate>> = stream::iter(urls.iter().cloned())
            .map(|url| async move {
                match self.extract(&url).await {
                    Ok(candidate) => {
                        debug!(%url, bytes = candidate.body.len(), "Extracted article");
                        Some(candidate)
                    }
                    Err(e) => {
                        warn!(%url, error = %e, "Extraction failed; skipping article");
                        None
                    }
                }
            })
            .buffered(self.workers)
            .collect()
            .await;

        info!(
            total = urls.len(),
            extracted = results.iter().filter(|r| r.is_some()).count(),
            "Extraction batch complete"
        );
        results
    }
}

/// True for content types that never carry an article body, ignoring
/// case and any parameters after the media type.
fn skipped_content_type(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    SKIPPED_CONTENT_TYPES.iter().any(|t| lowered.starts_with(t))
}

/// Parse a fetched page into a candidate.
fn parse_article(url: &str, html: &str, min_sentences: usize) -> Result<ArticleCandidate> {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let body = extract_body(&document);

    let sentences = sentence_count(&body);
    if sentences < min_sentences {
        return Err(PipelineError::Extraction(format!(
            "body too short ({sentences} sentences, need {min_sentences}) at {url}"
        )));
    }

    let lead_image_url = extract_lead_image(&document, url);

    Ok(ArticleCandidate {
        url: url.to_string(),
        title,
        body,
        lead_image_url,
    })
}

/// Headline, by preference: `og:title`, the document title, the first `<h1>`.
fn extract_title(document: &Html) -> Option<String> {
    if let Some(meta) = document.select(&OG_TITLE).next() {
        if let Some(content) = meta.value().attr("content") {
            let trimmed = content.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    for selector in [&PAGE_TITLE, &FIRST_HEADING] {
        if let Some(element) = document.select(selector).next() {
            let text = element.text().collect::<Vec<_>>().join(" ");
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// Body paragraphs, preferring those inside an `<article>` element.
fn extract_body(document: &Html) -> String {
    let mut paragraphs: Vec<String> = document
        .select(&ARTICLE_PARAGRAPHS)
        .map(|p| p.text().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.trim().is_empty())
        .collect();

    if paragraphs.is_empty() {
        paragraphs = document
            .select(&ALL_PARAGRAPHS)
            .map(|p| p.text().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.trim().is_empty())
            .collect();
    }

    paragraphs.join("\n")
}

/// Lead image from `og:image`, resolved against the article URL.
fn extract_lead_image(document: &Html, article_url: &str) -> Option<String> {
    let content = document
        .select(&OG_IMAGE)
        .next()
        .and_then(|meta| meta.value().attr("content"))?;
    let base = Url::parse(article_url).ok()?;
    base.join(content.trim()).ok().map(|u| u.to_string())
}

/// Rough sentence counter: terminator characters, with runs like `...`
/// counted once.
fn sentence_count(text: &str) -> usize {
    let mut count = 0usize;
    let mut prev_terminator = false;
    for c in text.chars() {
        let terminator = matches!(c, '.' | '!' | '?');
        if terminator && !prev_terminator {
            count += 1;
        }
        prev_terminator = terminator;
    }
    count
}
