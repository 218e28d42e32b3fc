use serde_json::Value;
use url::Url;

use crate::extractor::language;
use crate::extractor::model::{
    ExtractedRecord, clip_excerpt, count_words, reading_time, title_from_url,
};

/// Markdown: the first top-level heading names the document, the first
/// non-heading lines make the excerpt.
pub fn markdown(url: &Url, raw: &str) -> ExtractedRecord {
    let title = raw
        .lines()
        .find_map(|line| line.trim().strip_prefix("# "))
        .map(|heading| heading.trim().to_string())
        .filter(|heading| !heading.is_empty())
        .unwrap_or_else(|| title_from_url(url));

    let body = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join(" ");

    record(title, clip_excerpt(&body), raw)
}

/// JSON: `title` key when present; the excerpt reports the top-level
/// property count, or a generic label when the document does not parse.
pub fn json(url: &Url, raw: &str) -> ExtractedRecord {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => {
            let title = value
                .get("title")
                .and_then(Value::as_str)
                .map(|title| title.trim().to_string())
                .filter(|title| !title.is_empty())
                .unwrap_or_else(|| title_from_url(url));

            let excerpt = match &value {
                Value::Object(map) => format!("JSON data with {} properties", map.len()),
                Value::Array(entries) => format!("JSON data with {} properties", entries.len()),
                _ => "JSON document".to_string(),
            };

            record(title, excerpt, raw)
        }
        Err(_) => record(title_from_url(url), "JSON document".to_string(), raw),
    }
}

pub fn csv(url: &Url, raw: &str) -> ExtractedRecord {
    let columns = raw
        .lines()
        .next()
        .map(|header| header.split(',').count())
        .unwrap_or(0);
    let excerpt = if columns > 0 {
        format!("CSV data with {columns} columns")
    } else {
        String::new()
    };
    record(title_from_url(url), excerpt, raw)
}

pub fn xml(url: &Url, raw: &str) -> ExtractedRecord {
    record(title_from_url(url), String::new(), raw)
}

pub fn text(url: &Url, raw: &str) -> ExtractedRecord {
    record(title_from_url(url), clip_excerpt(raw), raw)
}

/// PDF bodies are binary; only the URL-derived title carries information.
pub fn pdf(url: &Url, raw: &str) -> ExtractedRecord {
    ExtractedRecord {
        title: title_from_url(url),
        excerpt: String::new(),
        thumbnail: None,
        reading_time: None,
        word_count: None,
        language: None,
        content: raw.to_string(),
    }
}

fn record(title: String, excerpt: String, raw: &str) -> ExtractedRecord {
    let words = count_words(raw);
    ExtractedRecord {
        title,
        excerpt,
        thumbnail: None,
        reading_time: reading_time(words),
        word_count: (words > 0).then_some(words),
        language: language::detect_language(raw),
        content: raw.to_string(),
    }
}
