use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Closed set of content kinds a saved item can have. Assigned once at
/// creation from the URL and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    Article,
    #[serde(rename = "PDF")]
    Pdf,
    Text,
    Markdown,
    #[serde(rename = "HTML")]
    Html,
    #[serde(rename = "JSON")]
    Json,
    #[serde(rename = "XML")]
    Xml,
    #[serde(rename = "CSV")]
    Csv,
}

impl ContentKind {
    /// Derive the kind from a URL's file extension. Anything without a
    /// recognized extension is treated as an article.
    pub fn detect(url: &Url) -> Self {
        let extension = url
            .path()
            .rsplit('/')
            .next()
            .and_then(|segment| segment.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("txt") => Self::Text,
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("json") => Self::Json,
            Some("xml") => Self::Xml,
            Some("csv") => Self::Csv,
            _ => Self::Article,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Article => "Article",
            Self::Pdf => "PDF",
            Self::Text => "Text",
            Self::Markdown => "Markdown",
            Self::Html => "HTML",
            Self::Json => "JSON",
            Self::Xml => "XML",
            Self::Csv => "CSV",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Article" => Some(Self::Article),
            "PDF" => Some(Self::Pdf),
            "Text" => Some(Self::Text),
            "Markdown" => Some(Self::Markdown),
            "HTML" => Some(Self::Html),
            "JSON" => Some(Self::Json),
            "XML" => Some(Self::Xml),
            "CSV" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Kinds whose content is rendered as markup and therefore must pass
    /// through the sanitizer before storage.
    pub fn is_markup(&self) -> bool {
        matches!(self, Self::Article | Self::Html)
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One saved piece of content with its reading-state metadata.
///
/// Fields serialize in the camelCase wire shape (`readingTime`,
/// `isFavorite`, ...) so exports, imports, and stored records share one
/// format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub reading_time: Option<u32>,
    #[serde(default)]
    pub word_count: Option<u32>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub read_progress: u8,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_read: Option<DateTime<Utc>>,
}

impl Item {
    /// Apply a partial update in place. Progress is clamped and tags are
    /// deduplicated so no patch can break the item invariants.
    pub fn apply(&mut self, patch: &ItemPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(excerpt) = &patch.excerpt {
            self.excerpt = excerpt.clone();
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
        if let Some(tags) = &patch.tags {
            self.tags = dedup_tags(tags);
        }
        if let Some(favorite) = patch.is_favorite {
            self.is_favorite = favorite;
        }
        if let Some(archived) = patch.is_archived {
            self.is_archived = archived;
        }
        if let Some(read) = patch.is_read {
            self.is_read = read;
        }
        if let Some(progress) = patch.read_progress {
            self.read_progress = progress.min(100);
        }
        if let Some(last_read) = patch.last_read {
            self.last_read = Some(last_read);
        }
    }
}

/// Partial update for a stored item. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_favorite: Option<bool>,
    pub is_archived: Option<bool>,
    pub is_read: Option<bool>,
    pub read_progress: Option<u8>,
    pub last_read: Option<DateTime<Utc>>,
}

impl ItemPatch {
    /// Composite progress update: clamp to [0, 100], derive the read flag
    /// from the 90% threshold, and stamp the read timestamp. One logical
    /// write, never three.
    pub fn progress(progress: i32) -> Self {
        let clamped = progress.clamp(0, 100) as u8;
        Self {
            read_progress: Some(clamped),
            is_read: Some(clamped >= 90),
            last_read: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn mark_read() -> Self {
        Self::progress(100)
    }

    /// Start-over reset. Unlike a progress write this does not stamp
    /// `last_read`.
    pub fn mark_unread() -> Self {
        Self {
            read_progress: Some(0),
            is_read: Some(false),
            ..Self::default()
        }
    }

    pub fn favorite(on: bool) -> Self {
        Self {
            is_favorite: Some(on),
            ..Self::default()
        }
    }

    pub fn archived(on: bool) -> Self {
        Self {
            is_archived: Some(on),
            ..Self::default()
        }
    }

    pub fn tags(tags: Vec<String>) -> Self {
        Self {
            tags: Some(tags),
            ..Self::default()
        }
    }
}

/// Remove duplicate tags while keeping first-occurrence order. Tags are
/// case-sensitive.
pub fn dedup_tags(tags: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.iter()
        .filter(|tag| seen.insert(tag.as_str()))
        .cloned()
        .collect()
}

/// Aggregate counts over a library of items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryStats {
    pub total_items: u64,
    pub articles: u64,
    pub pdfs: u64,
    pub favorites: u64,
    pub archived: u64,
    pub read_items: u64,
}

impl LibraryStats {
    /// Client-side recomputation, used when no server aggregate is
    /// available.
    pub fn compute(items: &[Item]) -> Self {
        let mut stats = Self {
            total_items: items.len() as u64,
            ..Self::default()
        };
        for item in items {
            if item.kind == ContentKind::Pdf {
                stats.pdfs += 1;
            } else {
                stats.articles += 1;
            }
            if item.is_favorite {
                stats.favorites += 1;
            }
            if item.is_archived {
                stats.archived += 1;
            }
            if item.is_read {
                stats.read_items += 1;
            }
        }
        stats
    }
}

pub const EXPORT_VERSION: &str = "1.0";

/// Backup envelope written by export and accepted by import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEnvelope {
    pub version: String,
    #[serde(rename = "exportDate")]
    pub export_date: DateTime<Utc>,
    pub items: Vec<Item>,
}

impl ExportEnvelope {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            version: EXPORT_VERSION.to_string(),
            export_date: Utc::now(),
            items,
        }
    }

    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string_pretty(self).ok()
    }
}

/// Parse an import payload, accepting it only when `items` is present and
/// array-typed. Returns `None` otherwise so callers reject the payload
/// without partial application.
pub fn parse_import(json: &str) -> Option<Vec<Item>> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    let items = value.get("items")?;
    if !items.is_array() {
        return None;
    }
    serde_json::from_value(items.clone()).ok()
}
