#![no_main]

use libfuzzer_sys::fuzz_target;
use url::Url;

use satchel::entities::ContentKind;
use satchel::extractor::extract;

const KINDS: &[ContentKind] = &[
    ContentKind::Article,
    ContentKind::Pdf,
    ContentKind::Text,
    ContentKind::Markdown,
    ContentKind::Html,
    ContentKind::Json,
    ContentKind::Xml,
    ContentKind::Csv,
];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, body)) = data.split_first() else {
        return;
    };
    let kind = KINDS[selector as usize % KINDS.len()];
    let raw = String::from_utf8_lossy(body);

    let url = Url::parse("https://example.com/document").unwrap();
    // Extraction is total: no input may panic it
    let _ = extract(&url, kind, &raw);
});
