use std::collections::{HashMap, HashSet};

use ammonia::Builder;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Shared cleaner configured with the reading-view allow-list. Everything
/// outside it is stripped; text inside removed wrapper tags survives, while
/// script and style bodies are dropped entirely.
static CLEANER: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();
    builder.tags(HashSet::from([
        "p", "h1", "h2", "h3", "h4", "h5", "h6", "strong", "em", "b", "i", "ul", "ol", "li", "a",
        "img", "blockquote", "br",
    ]));
    builder.tag_attributes(HashMap::from([
        ("a", HashSet::from(["href"])),
        ("img", HashSet::from(["src", "alt"])),
    ]));
    builder.generic_attributes(HashSet::new());
    builder
});

/// Reduce HTML to the storage-safe subset. Infallible: malformed markup is
/// parsed leniently and cleaned on a best-effort basis, and cleaning already
/// clean HTML returns it unchanged.
pub fn sanitize_html(html: &str) -> String {
    CLEANER.clean(html).to_string()
}

/// Rewrite relative `href` and `src` attributes against the page URL so
/// stored content renders outside its origin. Attributes that fail to join
/// are left as they were.
pub fn resolve_urls(html: &str, base_url: &Url) -> String {
    let href_regex = Regex::new(r#"href="([^"]+)""#).unwrap();
    let html = href_regex.replace_all(html, |caps: &regex::Captures| {
        let url_str = &caps[1];
        if let Ok(absolute_url) = base_url.join(url_str) {
            format!(r#"href="{}""#, absolute_url)
        } else {
            caps[0].to_string()
        }
    });

    let src_regex = Regex::new(r#"src="([^"]+)""#).unwrap();
    let html = src_regex.replace_all(&html, |caps: &regex::Captures| {
        let url_str = &caps[1];
        if let Ok(absolute_url) = base_url.join(url_str) {
            format!(r#"src="{}""#, absolute_url)
        } else {
            caps[0].to_string()
        }
    });

    html.to_string()
}
