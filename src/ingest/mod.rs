use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::cache::AssetCache;
use crate::entities::{ContentKind, Item, dedup_tags};
use crate::extractor::{self, ExtractedRecord, language, model};
use crate::fetcher::{self, FetchError, Fetcher};
use crate::sanitizer;
use crate::store::UnifiedStore;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("content unavailable")]
    FetchUnavailable(#[source] FetchError),

    #[error("store rejected the item")]
    StoreRejected,
}

/// Turns a URL or pasted text into a stored item: normalize, fetch,
/// extract, sanitize, persist, and warm the offline cache.
pub struct SavePipeline {
    fetcher: Fetcher,
    store: Arc<UnifiedStore>,
    cache: Option<Arc<AssetCache>>,
}

impl SavePipeline {
    pub fn new(fetcher: Fetcher, store: Arc<UnifiedStore>) -> Self {
        Self {
            fetcher,
            store,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<AssetCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Save whatever lives at `raw_url`. The kind is fixed from the URL
    /// before fetching, so even an unreachable PDF stays a PDF.
    #[instrument(skip_all, fields(url = raw_url))]
    pub async fn save_url(&self, raw_url: &str, tags: Vec<String>) -> Result<Item, IngestError> {
        let url = fetcher::normalize_url(raw_url)
            .map_err(|err| IngestError::InvalidInput(err.to_string()))?;
        let kind = ContentKind::detect(&url);

        let doc = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(IngestError::FetchUnavailable)?;

        let record = extractor::extract(&doc.url_final, kind, &doc.body_utf8);
        let item = assemble(kind, doc.url_final.to_string(), record, tags);

        if !self.store.save_item(item.clone()).await {
            return Err(IngestError::StoreRejected);
        }

        // Keep the original bytes readable offline. Best effort; the save
        // already succeeded.
        if let Some(cache) = &self.cache {
            cache.put_document(&doc.url_final, doc.status, &doc.content_type, &doc.body_raw);
        }

        info!(id = %item.id, kind = %item.kind, via = %doc.via, "item saved");
        Ok(item)
    }

    /// Save pasted or typed content directly, no network involved.
    pub async fn save_manual(
        &self,
        title: &str,
        content: &str,
        kind: ContentKind,
        tags: Vec<String>,
    ) -> Result<Item, IngestError> {
        if content.trim().is_empty() {
            return Err(IngestError::InvalidInput("content is empty".to_string()));
        }

        let stored = if kind.is_markup() {
            sanitizer::sanitize_html(content)
        } else {
            content.to_string()
        };

        let text = if kind.is_markup() {
            let fragment = scraper::Html::parse_fragment(&stored);
            fragment.root_element().text().collect::<Vec<_>>().join(" ")
        } else {
            stored.clone()
        };
        let text = model::normalize_whitespace(&text);
        let words = model::count_words(&text);

        let title = title.trim();
        let record = ExtractedRecord {
            title: if title.is_empty() {
                model::DEFAULT_TITLE.to_string()
            } else {
                title.to_string()
            },
            excerpt: model::clip_excerpt(&text),
            thumbnail: None,
            reading_time: model::reading_time(words),
            word_count: (words > 0).then_some(words),
            language: language::detect_language(&text),
            content: stored,
        };

        let item = assemble(kind, String::new(), record, tags);
        if !self.store.save_item(item.clone()).await {
            return Err(IngestError::StoreRejected);
        }

        info!(id = %item.id, kind = %item.kind, "manual item saved");
        Ok(item)
    }
}

fn assemble(kind: ContentKind, url: String, record: ExtractedRecord, tags: Vec<String>) -> Item {
    let content = if kind.is_markup() {
        // Extraction sanitizes the readable path, but degraded saves keep
        // the raw document; markup never lands unsanitized
        sanitizer::sanitize_html(&record.content)
    } else {
        record.content
    };

    Item {
        id: Uuid::new_v4().to_string(),
        url,
        kind,
        title: record.title,
        excerpt: record.excerpt,
        thumbnail: record.thumbnail,
        reading_time: record.reading_time,
        word_count: record.word_count,
        content,
        language: record.language,
        tags: dedup_tags(&tags),
        notes: String::new(),
        is_favorite: false,
        is_archived: false,
        is_read: false,
        read_progress: 0,
        created_at: Utc::now(),
        last_read: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;

    fn pipeline() -> (SavePipeline, Arc<UnifiedStore>) {
        let local = Arc::new(LocalStore::open_in_memory().unwrap());
        let store = Arc::new(UnifiedStore::anonymous(local));
        (
            SavePipeline::new(Fetcher::default(), store.clone()),
            store,
        )
    }

    #[tokio::test]
    async fn garbage_urls_are_rejected_before_any_fetch() {
        let (pipeline, _) = pipeline();
        assert!(matches!(
            pipeline.save_url("", vec![]).await,
            Err(IngestError::InvalidInput(_))
        ));
        assert!(matches!(
            pipeline.save_url("javascript:alert(1)", vec![]).await,
            Err(IngestError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn manual_save_sanitizes_and_measures() {
        let (pipeline, store) = pipeline();

        let item = pipeline
            .save_manual(
                "Note",
                "<p>hello <script>evil()</script>world</p>",
                ContentKind::Html,
                vec!["web".to_string(), "web".to_string(), "read".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(item.title, "Note");
        assert!(!item.content.contains("script"));
        assert!(item.content.contains("hello"));
        assert_eq!(item.word_count, Some(2));
        assert_eq!(item.reading_time, Some(1));
        assert_eq!(item.tags, vec!["web".to_string(), "read".to_string()]);
        assert!(item.url.is_empty());

        let stored = store.get_item(&item.id).await.unwrap();
        assert_eq!(stored.content, item.content);
    }

    #[tokio::test]
    async fn manual_save_requires_content() {
        let (pipeline, _) = pipeline();
        assert!(matches!(
            pipeline
                .save_manual("Title", "   ", ContentKind::Text, vec![])
                .await,
            Err(IngestError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn manual_save_defaults_the_title() {
        let (pipeline, _) = pipeline();
        let item = pipeline
            .save_manual("  ", "plain words here", ContentKind::Text, vec![])
            .await
            .unwrap();
        assert_eq!(item.title, model::DEFAULT_TITLE);
        assert_eq!(item.kind, ContentKind::Text);
        assert_eq!(item.word_count, Some(3));
    }
}
