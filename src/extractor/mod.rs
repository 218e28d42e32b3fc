pub mod language;
pub mod model;
pub mod plaintext;
pub mod reader;

#[cfg(test)]
mod tests;

pub use model::ExtractedRecord;

use tracing::warn;
use url::Url;

use crate::entities::ContentKind;
use crate::sanitizer;

/// Produce a normalized record for a fetched document. Total over every
/// content kind and infallible: when nothing can be extracted the raw input
/// survives under a placeholder title.
pub fn extract(url: &Url, kind: ContentKind, raw: &str) -> ExtractedRecord {
    match kind {
        ContentKind::Article | ContentKind::Html => extract_page(url, raw),
        ContentKind::Markdown => plaintext::markdown(url, raw),
        ContentKind::Json => plaintext::json(url, raw),
        ContentKind::Csv => plaintext::csv(url, raw),
        ContentKind::Xml => plaintext::xml(url, raw),
        ContentKind::Text => plaintext::text(url, raw),
        ContentKind::Pdf => plaintext::pdf(url, raw),
    }
}

fn extract_page(url: &Url, raw: &str) -> ExtractedRecord {
    // 1. Readable content: readability first, meta-tag heuristics behind it
    let Some(page) = reader::extract(raw, url) else {
        warn!(url = %url, "no usable page content, keeping raw document");
        return ExtractedRecord::fallback(raw);
    };

    // 2. Sanitize the reading view and resolve relative links
    let html = sanitizer::sanitize_html(&page.html);
    let html = sanitizer::resolve_urls(&html, url);

    // 3. Reading metrics and language from the text body
    let text = model::normalize_whitespace(&page.text);
    let words = model::count_words(&text);

    ExtractedRecord {
        title: page.title,
        excerpt: page.excerpt,
        thumbnail: page.thumbnail,
        reading_time: model::reading_time(words),
        word_count: (words > 0).then_some(words),
        language: language::detect_language(&text),
        content: html,
    }
}
