use readability::extractor;
use scraper::{Html, Selector};
use url::Url;

use crate::extractor::model::{clip_excerpt, title_from_url};

/// Hosts whose pages are short-form or heavily scripted, where readability
/// does more harm than good. These go straight to the meta-tag path.
const SOCIAL_HOSTS: &[&str] = &[
    "twitter.com",
    "x.com",
    "reddit.com",
    "news.ycombinator.com",
    "mastodon.social",
    "bsky.app",
];

/// Raw page content before sanitization, with the metadata the reading list
/// shows in its cards.
#[derive(Debug)]
pub struct PageContent {
    pub title: String,
    pub excerpt: String,
    pub thumbnail: Option<String>,
    pub text: String,
    pub html: String,
}

pub fn extract(html: &str, url: &Url) -> Option<PageContent> {
    if is_social_host(url) {
        return meta_extract(html, url);
    }

    // Try readability first
    if let Ok(article) = extractor::extract(&mut html.as_bytes(), url)
        && !article.text.trim().is_empty()
    {
        let document = Html::parse_document(html);
        let title = if article.title.trim().is_empty() {
            extract_title(&document).unwrap_or_else(|| title_from_url(url))
        } else {
            article.title
        };
        return Some(PageContent {
            title,
            excerpt: extract_excerpt(&document),
            thumbnail: extract_thumbnail(&document, url),
            text: article.text,
            html: article.content,
        });
    }

    // Fallback to basic scraping if readability fails
    meta_extract(html, url)
}

pub fn is_social_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.strip_prefix("www.").unwrap_or(host);
    SOCIAL_HOSTS
        .iter()
        .any(|social| host == *social || host.ends_with(&format!(".{social}")))
}

/// Meta-tag driven extraction: page metadata plus the densest content block
/// the selectors can find. Used for social hosts and as the readability
/// fallback.
fn meta_extract(html: &str, url: &Url) -> Option<PageContent> {
    let document = Html::parse_document(html);

    let (text, html_content) = extract_main_content(&document);
    if text.trim().is_empty() {
        return None;
    }

    Some(PageContent {
        title: extract_title(&document).unwrap_or_else(|| title_from_url(url)),
        excerpt: extract_excerpt(&document),
        thumbnail: extract_thumbnail(&document, url),
        text,
        html: html_content,
    })
}

fn extract_title(document: &Html) -> Option<String> {
    // Try og:title first
    if let Ok(selector) = Selector::parse("meta[property='og:title']") {
        for element in document.select(&selector) {
            if let Some(content) = element.value().attr("content")
                && !content.trim().is_empty()
            {
                return Some(content.trim().to_string());
            }
        }
    }

    // Then the document title
    if let Ok(selector) = Selector::parse("title") {
        for element in document.select(&selector) {
            let title = element.text().collect::<String>().trim().to_string();
            if !title.is_empty() {
                return Some(title);
            }
        }
    }

    // Then the first heading
    for heading in ["h1", "h2"] {
        if let Ok(selector) = Selector::parse(heading) {
            for element in document.select(&selector) {
                let title = element.text().collect::<String>().trim().to_string();
                if !title.is_empty() {
                    return Some(title);
                }
            }
        }
    }

    None
}

fn extract_excerpt(document: &Html) -> String {
    // Meta description wins, else the first non-empty paragraph
    if let Ok(selector) = Selector::parse("meta[name='description']")
        && let Some(element) = document.select(&selector).next()
        && let Some(content) = element.value().attr("content")
        && !content.trim().is_empty()
    {
        return clip_excerpt(content);
    }

    if let Ok(selector) = Selector::parse("p") {
        for element in document.select(&selector) {
            let text = element.text().collect::<String>();
            if !text.trim().is_empty() {
                return clip_excerpt(&text);
            }
        }
    }

    String::new()
}

fn extract_thumbnail(document: &Html, base_url: &Url) -> Option<String> {
    for selector_str in ["meta[property='og:image']", "meta[name='twitter:image']"] {
        if let Ok(selector) = Selector::parse(selector_str)
            && let Some(element) = document.select(&selector).next()
            && let Some(content) = element.value().attr("content")
            && !content.trim().is_empty()
        {
            return absolutize(content.trim(), base_url);
        }
    }

    if let Ok(selector) = Selector::parse("img")
        && let Some(element) = document.select(&selector).next()
        && let Some(src) = element.value().attr("src")
        && !src.trim().is_empty()
    {
        return absolutize(src.trim(), base_url);
    }

    None
}

fn absolutize(candidate: &str, base_url: &Url) -> Option<String> {
    base_url.join(candidate).ok().map(|url| url.to_string())
}

fn extract_main_content(document: &Html) -> (String, String) {
    let content_selectors = vec![
        "article",
        "main",
        "[role='main']",
        ".content",
        ".post",
        ".article",
        "#content",
        "#main",
        ".entry-content",
    ];

    for selector_str in content_selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in document.select(&selector) {
                let text = element.text().collect::<String>();
                let html = element.html();
                if text.trim().len() > 100 {
                    return (text, html);
                }
            }
        }
    }

    // Last resort: the whole body
    if let Ok(body_selector) = Selector::parse("body")
        && let Some(body) = document.select(&body_selector).next()
    {
        let text = body.text().collect::<String>();
        let html = body.html();
        return (text, html);
    }

    (String::new(), String::new())
}
