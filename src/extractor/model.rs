use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_TITLE: &str = "Untitled Document";

const WORDS_PER_MINUTE: u32 = 200;
const EXCERPT_MAX_CHARS: usize = 200;

/// Normalized metadata produced for every fetched document, regardless of
/// kind. `content` is what gets stored and rendered later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub title: String,
    pub excerpt: String,
    pub thumbnail: Option<String>,
    pub reading_time: Option<u32>,
    pub word_count: Option<u32>,
    pub language: Option<String>,
    pub content: String,
}

impl ExtractedRecord {
    /// Degraded record used when nothing could be extracted. The raw input
    /// is kept so the save still succeeds.
    pub fn fallback(raw: &str) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            excerpt: String::new(),
            thumbnail: None,
            reading_time: None,
            word_count: None,
            language: None,
            content: raw.to_string(),
        }
    }
}

pub fn count_words(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Estimated minutes at 200 words per minute, rounded up and never zero.
/// Empty content has no estimate at all.
pub fn reading_time(word_count: u32) -> Option<u32> {
    if word_count == 0 {
        return None;
    }
    Some(word_count.div_ceil(WORDS_PER_MINUTE).max(1))
}

/// Human-readable title derived from the last URL path segment: extension
/// stripped, `-` and `_` turned into spaces.
pub fn title_from_url(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    let stem = decoded
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&decoded);
    let title = stem.replace(['-', '_'], " ").trim().to_string();

    if !title.is_empty() {
        return title;
    }
    match url.host_str() {
        Some(host) => host.to_string(),
        None => DEFAULT_TITLE.to_string(),
    }
}

/// Clip text to excerpt length on a character boundary, whitespace
/// normalized.
pub fn clip_excerpt(text: &str) -> String {
    normalize_whitespace(text)
        .chars()
        .take(EXCERPT_MAX_CHARS)
        .collect()
}

pub fn normalize_whitespace(text: &str) -> String {
    let text = text.trim();

    // Collapse runs of spaces and tabs, then squeeze blank-line runs down to
    // a single paragraph break
    let space_regex = regex::Regex::new(r"[ \t]+").unwrap();
    let spaced = space_regex.replace_all(text, " ");

    let newline_regex = regex::Regex::new(r"\n\s*\n+").unwrap();
    newline_regex.replace_all(&spaced, "\n\n").to_string()
}
