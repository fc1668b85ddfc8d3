//! Print rendition: flatten a bound EPUB into one self-contained page.
//!
//! Works from the finished archive, not the digest: the chapter files
//! are pulled back out, their `<body>` content concatenated in spine
//! order, and the result wrapped in a single HTML document with the
//! newspaper stylesheet inlined. Anything that can open the EPUB gets
//! exactly what the print rendition shows.

use std::io::{Cursor, Read as _};

use crate::error::{PipelineError, Result};
use crate::render::epub::STYLE_CSS;

/// Flatten EPUB bytes into a print-ready HTML document.
///
/// Chapter names carry their spine position (`sec01`, `sec02`, ...), so
/// ordering by the embedded number recovers spine order without parsing
/// the package manifest, however many chapters the edition holds.
///
/// # Errors
///
/// Returns [`PipelineError::Render`] if the bytes are not a readable
/// EPUB or a chapter is malformed.
pub fn flatten_epub(epub: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(epub))
        .map_err(|e| PipelineError::Render(format!("cannot reopen epub: {e}")))?;

    let mut chapter_names: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("OEBPS/sec") && name.ends_with(".xhtml"))
        .map(|name| name.to_string())
        .collect();
    chapter_names.sort_by_key(|name| chapter_number(name));
    if chapter_names.is_empty() {
        return Err(PipelineError::Render("epub has no chapters".to_string()));
    }

    let mut title = String::new();
    let mut bodies = Vec::with_capacity(chapter_names.len());
    for name in &chapter_names {
        let mut file = archive
            .by_name(name)
            .map_err(|e| PipelineError::Render(format!("cannot open {name}: {e}")))?;
        let mut xhtml = String::new();
        file.read_to_string(&mut xhtml)
            .map_err(|e| PipelineError::Render(format!("cannot read {name}: {e}")))?;

        if title.is_empty()
            && let Some(t) = tag_content(&xhtml, "title")
        {
            title = t.to_string();
        }
        let body = tag_content(&xhtml, "body")
            .ok_or_else(|| PipelineError::Render(format!("chapter {name} has no body")))?;
        bodies.push(body.to_string());
    }

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n");
    out.push_str("<html>\n");
    out.push_str("<head>\n");
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str(&format!("  <title>{title}</title>\n"));
    out.push_str("  <style>\n");
    out.push_str(STYLE_CSS);
    out.push_str("  </style>\n");
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    for body in &bodies {
        out.push_str(body);
    }
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    Ok(out)
}

/// Spine position encoded in a chapter name (`OEBPS/sec12.xhtml` -> 12);
/// names that do not parse sort last.
fn chapter_number(name: &str) -> u32 {
    name.trim_start_matches("OEBPS/sec")
        .trim_end_matches(".xhtml")
        .parse()
        .unwrap_or(u32::MAX)
}

/// Content between `<tag>` and `</tag>`, exclusive. The chapter writer
/// emits plain unattributed tags, so a string scan is enough.
fn tag_content<'a>(html: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = html.find(&open)? + open.len();
    let end = html.rfind(&close)?;
    html.get(start..end)
}
