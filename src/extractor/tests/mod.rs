use std::fs;

use url::Url;

use crate::entities::ContentKind;
use crate::extractor::{extract, model::DEFAULT_TITLE};

fn parse(url: &str) -> Url {
    Url::parse(url).unwrap()
}

#[test]
fn article_fixture_extracts_clean_reading_view() {
    let html = fs::read_to_string("src/extractor/tests/fixtures/article.html")
        .expect("failed to read test fixture");

    let url = parse("https://example.com/article");
    let record = extract(&url, ContentKind::Article, &html);

    assert!(record.title.contains("Sample Article"));
    assert_eq!(record.excerpt, "A sample article used in extraction tests.");
    assert_eq!(
        record.thumbnail.as_deref(),
        Some("https://example.com/images/cover.png")
    );

    assert!(record.content.contains("first paragraph"));
    assert!(!record.content.contains("<script"));
    assert!(!record.content.contains("<style"));
    assert!(!record.content.contains("analytics"));

    // Relative links resolve against the page URL
    assert!(record.content.contains("https://example.com/related"));
    assert!(record.content.contains("https://example.com/images/sample.jpg"));

    assert_eq!(record.reading_time, Some(1));
    assert!(record.word_count.unwrap() > 50);
    assert_eq!(record.language.as_deref(), Some("en"));
}

#[test]
fn social_fixture_takes_the_meta_path() {
    let html = fs::read_to_string("src/extractor/tests/fixtures/thread.html")
        .expect("failed to read test fixture");

    let url = parse("https://x.com/someone/status/123");
    let record = extract(&url, ContentKind::Article, &html);

    assert_eq!(record.title, "Thread: why caches lie");
    assert_eq!(
        record.excerpt,
        "A short thread about cache coherence in the wild."
    );
    assert_eq!(
        record.thumbnail.as_deref(),
        Some("https://pbs.example.org/media/abc123.jpg")
    );
    assert!(record.content.contains("why caches lie"));
}

#[test]
fn json_document_reports_its_shape() {
    let raw = r#"{"title": "Service Inventory", "services": [], "updated": "2024-05-01"}"#;
    let record = extract(&parse("https://example.com/inventory.json"), ContentKind::Json, raw);

    assert_eq!(record.title, "Service Inventory");
    assert_eq!(record.excerpt, "JSON data with 3 properties");
    assert_eq!(record.content, raw);
}

#[test]
fn empty_page_degrades_to_the_default_record() {
    let raw = "<html><body></body></html>";
    let record = extract(&parse("https://example.com/void"), ContentKind::Article, raw);

    assert_eq!(record.title, DEFAULT_TITLE);
    assert_eq!(record.excerpt, "");
    assert_eq!(record.thumbnail, None);
    assert_eq!(record.reading_time, None);
    assert_eq!(record.content, raw);
}

#[test]
fn malformed_html_never_panics() {
    let raw = "<html><head><title>Broken</title><body><p>Unclosed tags<div>More content";
    let record = extract(&parse("https://example.com/broken"), ContentKind::Article, raw);

    assert!(!record.title.is_empty());
    assert!(record.content.contains("Unclosed tags") || record.content == raw);
}

#[test]
fn dispatch_is_total_over_every_kind() {
    let url = parse("https://example.com/file.bin");
    for kind in [
        ContentKind::Article,
        ContentKind::Pdf,
        ContentKind::Text,
        ContentKind::Markdown,
        ContentKind::Html,
        ContentKind::Json,
        ContentKind::Xml,
        ContentKind::Csv,
    ] {
        let record = extract(&url, kind, "some raw content here");
        assert!(!record.title.is_empty(), "{kind}");
    }
}

#[cfg(feature = "fuzz")]
mod fuzz {
    use super::*;
    use proptest::prelude::*;

    fn any_kind() -> impl Strategy<Value = ContentKind> {
        prop_oneof![
            Just(ContentKind::Article),
            Just(ContentKind::Pdf),
            Just(ContentKind::Text),
            Just(ContentKind::Markdown),
            Just(ContentKind::Html),
            Just(ContentKind::Json),
            Just(ContentKind::Xml),
            Just(ContentKind::Csv),
        ]
    }

    proptest! {
        #[test]
        fn extract_never_panics(
            raw in ".*",
            path in "[a-z0-9./-]{0,24}",
            kind in any_kind(),
        ) {
            let url = Url::parse(&format!("https://fuzz.example/{path}")).unwrap();
            let record = extract(&url, kind, &raw);
            prop_assert!(!record.title.is_empty());
        }

        #[test]
        fn reading_time_and_word_count_agree(
            raw in "[ a-zA-Z\n]{0,400}",
        ) {
            let url = Url::parse("https://fuzz.example/notes.txt").unwrap();
            let record = extract(&url, ContentKind::Text, &raw);
            prop_assert_eq!(record.reading_time.is_some(), record.word_count.is_some());
        }
    }
}
