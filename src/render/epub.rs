//! EPUB writer: bind a digest into a small newspaper.
//!
//! Archive layout, in order:
//!
//! - `mimetype` (stored, never compressed; readers sniff it at a fixed
//!   offset)
//! - `META-INF/container.xml`
//! - `OEBPS/content.opf`, `OEBPS/nav.xhtml`, `OEBPS/toc.ncx`,
//!   `OEBPS/style.css`
//! - one `OEBPS/secNN.xhtml` chapter per digest section
//!
//! The front chapter opens with the masthead (title over the dated
//! band); every later chapter opens with the same band carrying its
//! upper-cased section heading. Chapter names encode their spine
//! position, starting at `sec01` for the front page.

use std::io::{Cursor, Write as _};

use chrono::{SecondsFormat, Utc};
use zip::write::SimpleFileOptions;

use crate::error::{PipelineError, Result};
use crate::models::{ArticleRecord, Digest, Section};

/// The newspaper stylesheet: centered masthead, Roboto Mono date bands,
/// and three-column justified sections.
pub(crate) const STYLE_CSS: &str = r#"@namespace epub "http://www.idpf.org/2007/ops";

img {
    width: 100%;
}

.date {
    font: 1em "Roboto Mono", monospace;
    text-align: center;
    width: 280px;
    margin: auto;
    margin-top: 10px;
    border-left: 1px solid black;
    border-right: 1px solid black;
}

header {
    font-size: 3em;
    color: #111;
    font-weight: bold;
    text-align: center;
    margin-top: 30px;
    padding-bottom: 15px;
    text-shadow: -1px 1px 0 white, -2px 2px 0 #111;
}

hr {
    margin-bottom: 50px;
    font: 1em "Roboto Mono", monospace;
    text-align: center;
    margin: auto;
    margin-top: 10px;
    border-left: 1px solid black;
    border-right: 1px solid black;
}

section {
    margin-top: 50px;
    -webkit-column-count: 3;
    -webkit-column-gap: 20px;
    -webkit-column-rule: 1px solid #A1A1A1;
    -moz-column-count: 3;
    -moz-column-gap: 20px;
    -moz-column-rule: 1px solid #A1A1A1;
    column-count: 3;
    column-gap: 20px;
    column-rule: 1px solid #A1A1A1;
    text-align: justify;
}

h1 {
    margin-top: 0;
    text-align: center;
}
"#;

/// Bind a digest into EPUB bytes.
///
/// # Errors
///
/// Returns [`PipelineError::Render`] if any archive entry cannot be
/// written.
pub fn build(digest: &Digest) -> Result<Vec<u8>> {
    let lang = language_tag(&digest.language);
    let modified = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));

    // `mimetype` MUST be the first entry and MUST be stored uncompressed.
    let stored = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    zip.start_file("mimetype", stored).map_err(render_err)?;
    zip.write_all(b"application/epub+zip").map_err(render_err)?;

    let deflated = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    zip.start_file("META-INF/container.xml", deflated)
        .map_err(render_err)?;
    zip.write_all(render_container_xml().as_bytes())
        .map_err(render_err)?;

    zip.start_file("OEBPS/content.opf", deflated)
        .map_err(render_err)?;
    zip.write_all(render_content_opf(digest, lang, &modified).as_bytes())
        .map_err(render_err)?;

    zip.start_file("OEBPS/nav.xhtml", deflated)
        .map_err(render_err)?;
    zip.write_all(render_nav_xhtml(digest, lang).as_bytes())
        .map_err(render_err)?;

    zip.start_file("OEBPS/toc.ncx", deflated)
        .map_err(render_err)?;
    zip.write_all(render_toc_ncx(digest).as_bytes())
        .map_err(render_err)?;

    zip.start_file("OEBPS/style.css", deflated)
        .map_err(render_err)?;
    zip.write_all(STYLE_CSS.as_bytes()).map_err(render_err)?;

    for (index, section) in digest.sections.iter().enumerate() {
        let xhtml = render_section_xhtml(digest, section, index, lang);
        zip.start_file(format!("OEBPS/{}", chapter_file(index)), deflated)
            .map_err(render_err)?;
        zip.write_all(xhtml.as_bytes()).map_err(render_err)?;
    }

    let cursor = zip.finish().map_err(render_err)?;
    Ok(cursor.into_inner())
}

fn render_err<E: std::fmt::Display>(e: E) -> PipelineError {
    PipelineError::Render(e.to_string())
}

fn language_tag(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.is_empty() { "und" } else { trimmed }
}

fn chapter_file(index: usize) -> String {
    format!("sec{:02}.xhtml", index + 1)
}

fn chapter_id(index: usize) -> String {
    format!("sec{:02}", index + 1)
}

/// Navigation label: the front chapter goes by the paper's name, later
/// chapters by their section heading.
fn chapter_label<'a>(digest: &'a Digest, section: &'a Section, index: usize) -> &'a str {
    if index == 0 {
        &digest.title
    } else {
        &section.heading
    }
}

fn render_container_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#
    .to_string()
}

fn render_content_opf(digest: &Digest, lang: &str, modified: &str) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(&format!(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"bookid\" version=\"3.0\" xml:lang=\"{}\">\n",
        xml_escape(lang)
    ));
    out.push_str("  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n");
    out.push_str(&format!(
        "    <dc:identifier id=\"bookid\">{}</dc:identifier>\n",
        xml_escape(&digest.identifier())
    ));
    out.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        xml_escape(&digest.title)
    ));
    out.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        xml_escape(lang)
    ));
    out.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        xml_escape(modified)
    ));
    out.push_str("  </metadata>\n");
    out.push_str("  <manifest>\n");
    out.push_str(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\" />\n",
    );
    out.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\" />\n",
    );
    out.push_str("    <item id=\"css\" href=\"style.css\" media-type=\"text/css\" />\n");
    for index in 0..digest.sections.len() {
        out.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\" />\n",
            chapter_id(index),
            chapter_file(index)
        ));
    }
    out.push_str("  </manifest>\n");
    out.push_str("  <spine toc=\"ncx\">\n");
    for index in 0..digest.sections.len() {
        out.push_str(&format!(
            "    <itemref idref=\"{}\" />\n",
            chapter_id(index)
        ));
    }
    out.push_str("  </spine>\n");
    out.push_str("</package>\n");
    out
}

fn render_nav_xhtml(digest: &Digest, lang: &str) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" lang=\"{}\" xml:lang=\"{}\">\n",
        xml_escape(lang),
        xml_escape(lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!(
        "  <title>{}</title>\n",
        xml_escape(&digest.title)
    ));
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str("  <link rel=\"stylesheet\" type=\"text/css\" href=\"style.css\" />\n");
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str("  <nav epub:type=\"toc\" id=\"toc\">\n");
    out.push_str("    <ol>\n");
    for (index, section) in digest.sections.iter().enumerate() {
        out.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            chapter_file(index),
            xml_escape(chapter_label(digest, section, index))
        ));
    }
    out.push_str("    </ol>\n");
    out.push_str("  </nav>\n");
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

fn render_toc_ncx(digest: &Digest) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(
        "<!DOCTYPE ncx PUBLIC \"-//NISO//DTD ncx 2005-1//EN\" \"http://www.daisy.org/z3986/2005/ncx-2005-1.dtd\">\n",
    );
    out.push_str("<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n");
    out.push_str("  <head>\n");
    out.push_str(&format!(
        "    <meta name=\"dtb:uid\" content=\"{}\" />\n",
        xml_escape(&digest.identifier())
    ));
    out.push_str("    <meta name=\"dtb:depth\" content=\"1\" />\n");
    out.push_str("    <meta name=\"dtb:totalPageCount\" content=\"0\" />\n");
    out.push_str("    <meta name=\"dtb:maxPageNumber\" content=\"0\" />\n");
    out.push_str("  </head>\n");
    out.push_str("  <docTitle><text>");
    out.push_str(&xml_escape(&digest.title));
    out.push_str("</text></docTitle>\n");
    out.push_str("  <navMap>\n");
    for (index, section) in digest.sections.iter().enumerate() {
        let play = index + 1;
        out.push_str(&format!(
            "    <navPoint id=\"navPoint-{play}\" playOrder=\"{play}\">\n"
        ));
        out.push_str("      <navLabel><text>");
        out.push_str(&xml_escape(chapter_label(digest, section, index)));
        out.push_str("</text></navLabel>\n");
        out.push_str(&format!(
            "      <content src=\"{}\" />\n",
            chapter_file(index)
        ));
        out.push_str("    </navPoint>\n");
    }
    out.push_str("  </navMap>\n");
    out.push_str("</ncx>\n");
    out
}

fn render_section_xhtml(digest: &Digest, section: &Section, index: usize, lang: &str) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" lang=\"{}\" xml:lang=\"{}\">\n",
        xml_escape(lang),
        xml_escape(lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!(
        "  <title>{}</title>\n",
        xml_escape(chapter_label(digest, section, index))
    ));
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str("  <link rel=\"stylesheet\" type=\"text/css\" href=\"style.css\" />\n");
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    if index == 0 {
        out.push_str(&format!(
            "  <header>{}</header>\n",
            xml_escape(&digest.title)
        ));
        out.push_str("  <hr />\n");
        out.push_str(&format!(
            "  <div class=\"date\">{}</div>\n",
            digest.run_date.format("%d/%m/%Y")
        ));
        out.push_str("  <hr />\n");
    } else {
        out.push_str("  <hr />\n");
        out.push_str(&format!(
            "  <div class=\"date\">{}</div>\n",
            xml_escape(&section.heading.to_uppercase())
        ));
        out.push_str("  <hr />\n");
    }
    out.push_str("  <section>\n");
    for article in &section.articles {
        out.push_str(&render_article(article));
    }
    out.push_str("  </section>\n");
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

fn render_article(article: &ArticleRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("    <h1>{}</h1>\n", xml_escape(&article.title)));
    if let Some(image) = &article.lead_image_url {
        out.push_str(&format!(
            "    <img src=\"{}\" alt=\"image\" />\n",
            xml_escape(image)
        ));
    }
    out.push_str(&format!("    <p>{}</p>\n", xml_escape(&article.body)));
    out
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
