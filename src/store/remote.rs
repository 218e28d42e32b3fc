use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::entities::{ContentKind, Item, ItemPatch, LibraryStats};

/// Hosted item store, scoped per user. Unlike the local store, errors here
/// surface to the caller so the dual-mode layer can decide to fall back.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteItemStore: Send + Sync {
    async fn get_all(&self, user_id: Uuid) -> Result<Vec<Item>>;
    async fn get(&self, user_id: Uuid, id: String) -> Result<Option<Item>>;
    /// Insert or overwrite, returning the stored row.
    async fn upsert(&self, user_id: Uuid, item: Item) -> Result<Item>;
    /// Patch an existing item; `None` when the id is unknown.
    async fn update(&self, user_id: Uuid, id: String, patch: ItemPatch) -> Result<Option<Item>>;
    /// `true` when a row was removed.
    async fn delete(&self, user_id: Uuid, id: String) -> Result<bool>;
    async fn favorites(&self, user_id: Uuid) -> Result<Vec<Item>>;
    async fn archived(&self, user_id: Uuid) -> Result<Vec<Item>>;
    async fn unread(&self, user_id: Uuid) -> Result<Vec<Item>>;
    /// Case-insensitive substring match over title, excerpt, and content.
    async fn search(&self, user_id: Uuid, query: String) -> Result<Vec<Item>>;
    /// Server-side aggregate counts.
    async fn stats(&self, user_id: Uuid) -> Result<LibraryStats>;
}

const ITEM_COLUMNS: &str = "id, url, item_type, title, excerpt, thumbnail, reading_time, \
     word_count, content, language, tags, notes, is_favorite, is_archived, is_read, \
     read_progress, created_at, last_read";

/// Postgres-backed `RemoteItemStore`. Queries are checked at runtime against
/// the `saved_items` schema from the migrations.
#[derive(Clone)]
pub struct PgRemoteStore {
    pool: PgPool,
}

impl PgRemoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_listing(&self, source: &str, user_id: Uuid) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM {source} WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ItemRow::into_item).collect())
    }
}

#[async_trait]
impl RemoteItemStore for PgRemoteStore {
    async fn get_all(&self, user_id: Uuid) -> Result<Vec<Item>> {
        self.fetch_listing("saved_items", user_id).await
    }

    async fn get(&self, user_id: Uuid, id: String) -> Result<Option<Item>> {
        let sql =
            format!("SELECT {ITEM_COLUMNS} FROM saved_items WHERE user_id = $1 AND id = $2");
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(user_id)
            .bind(&id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ItemRow::into_item))
    }

    async fn upsert(&self, user_id: Uuid, item: Item) -> Result<Item> {
        let sql = format!(
            r#"INSERT INTO saved_items
                   (user_id, id, url, item_type, title, excerpt, thumbnail, reading_time,
                    word_count, content, language, tags, notes, is_favorite, is_archived,
                    is_read, read_progress, created_at, last_read)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                       $16, $17, $18, $19)
               ON CONFLICT (user_id, id) DO UPDATE SET
                   url = EXCLUDED.url,
                   item_type = EXCLUDED.item_type,
                   title = EXCLUDED.title,
                   excerpt = EXCLUDED.excerpt,
                   thumbnail = EXCLUDED.thumbnail,
                   reading_time = EXCLUDED.reading_time,
                   word_count = EXCLUDED.word_count,
                   content = EXCLUDED.content,
                   language = EXCLUDED.language,
                   tags = EXCLUDED.tags,
                   notes = EXCLUDED.notes,
                   is_favorite = EXCLUDED.is_favorite,
                   is_archived = EXCLUDED.is_archived,
                   is_read = EXCLUDED.is_read,
                   read_progress = EXCLUDED.read_progress,
                   last_read = EXCLUDED.last_read
               RETURNING {ITEM_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(user_id)
            .bind(&item.id)
            .bind(&item.url)
            .bind(item.kind.as_str())
            .bind(&item.title)
            .bind(&item.excerpt)
            .bind(&item.thumbnail)
            .bind(item.reading_time.map(|v| v as i32))
            .bind(item.word_count.map(|v| v as i32))
            .bind(&item.content)
            .bind(&item.language)
            .bind(&item.tags)
            .bind(&item.notes)
            .bind(item.is_favorite)
            .bind(item.is_archived)
            .bind(item.is_read)
            .bind(i16::from(item.read_progress))
            .bind(item.created_at)
            .bind(item.last_read)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into_item())
    }

    async fn update(&self, user_id: Uuid, id: String, patch: ItemPatch) -> Result<Option<Item>> {
        // Read-modify-write under one transaction; concurrent writers get
        // last-write-wins, which is the accepted model here.
        let mut tx = self.pool.begin().await?;

        let sql =
            format!("SELECT {ITEM_COLUMNS} FROM saved_items WHERE user_id = $1 AND id = $2");
        let Some(row) = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(user_id)
            .bind(&id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let mut item = row.into_item();
        item.apply(&patch);

        let sql = format!(
            r#"UPDATE saved_items SET
                   title = $3, excerpt = $4, content = $5, notes = $6, tags = $7,
                   is_favorite = $8, is_archived = $9, is_read = $10,
                   read_progress = $11, last_read = $12
               WHERE user_id = $1 AND id = $2
               RETURNING {ITEM_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(user_id)
            .bind(&id)
            .bind(&item.title)
            .bind(&item.excerpt)
            .bind(&item.content)
            .bind(&item.notes)
            .bind(&item.tags)
            .bind(item.is_favorite)
            .bind(item.is_archived)
            .bind(item.is_read)
            .bind(i16::from(item.read_progress))
            .bind(item.last_read)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(row.into_item()))
    }

    async fn delete(&self, user_id: Uuid, id: String) -> Result<bool> {
        let result = sqlx::query("DELETE FROM saved_items WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(&id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn favorites(&self, user_id: Uuid) -> Result<Vec<Item>> {
        self.fetch_listing("favorite_items", user_id).await
    }

    async fn archived(&self, user_id: Uuid) -> Result<Vec<Item>> {
        self.fetch_listing("archived_items", user_id).await
    }

    async fn unread(&self, user_id: Uuid) -> Result<Vec<Item>> {
        self.fetch_listing("unread_items", user_id).await
    }

    async fn search(&self, user_id: Uuid, query: String) -> Result<Vec<Item>> {
        let escaped = query
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");

        let sql = format!(
            r#"SELECT {ITEM_COLUMNS} FROM saved_items
               WHERE user_id = $1
                 AND (title ILIKE $2 OR excerpt ILIKE $2 OR content ILIKE $2)
               ORDER BY created_at DESC"#
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(user_id)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ItemRow::into_item).collect())
    }

    async fn stats(&self, user_id: Uuid) -> Result<LibraryStats> {
        let row = sqlx::query_as::<_, StatsRow>(
            r#"SELECT
                   COUNT(*) AS total_items,
                   COUNT(*) FILTER (WHERE item_type <> 'PDF') AS articles,
                   COUNT(*) FILTER (WHERE item_type = 'PDF') AS pdfs,
                   COUNT(*) FILTER (WHERE is_favorite) AS favorites,
                   COUNT(*) FILTER (WHERE is_archived) AS archived,
                   COUNT(*) FILTER (WHERE is_read) AS read_items
               FROM saved_items WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_stats())
    }
}

/// Wire row for `saved_items`. Sole translation point between the hosted
/// snake_case schema and the camelCase item model; every column maps to a
/// field and back.
#[derive(Debug, FromRow)]
struct ItemRow {
    id: String,
    url: String,
    item_type: String,
    title: String,
    excerpt: String,
    thumbnail: Option<String>,
    reading_time: Option<i32>,
    word_count: Option<i32>,
    content: String,
    language: Option<String>,
    tags: Vec<String>,
    notes: String,
    is_favorite: bool,
    is_archived: bool,
    is_read: bool,
    read_progress: i16,
    created_at: DateTime<Utc>,
    last_read: Option<DateTime<Utc>>,
}

impl ItemRow {
    fn into_item(self) -> Item {
        Item {
            id: self.id,
            url: self.url,
            kind: ContentKind::parse(&self.item_type).unwrap_or(ContentKind::Article),
            title: self.title,
            excerpt: self.excerpt,
            thumbnail: self.thumbnail,
            reading_time: self.reading_time.map(|v| v.max(0) as u32),
            word_count: self.word_count.map(|v| v.max(0) as u32),
            content: self.content,
            language: self.language,
            tags: self.tags,
            notes: self.notes,
            is_favorite: self.is_favorite,
            is_archived: self.is_archived,
            is_read: self.is_read,
            read_progress: self.read_progress.clamp(0, 100) as u8,
            created_at: self.created_at,
            last_read: self.last_read,
        }
    }
}

#[derive(Debug, FromRow)]
struct StatsRow {
    total_items: i64,
    articles: i64,
    pdfs: i64,
    favorites: i64,
    archived: i64,
    read_items: i64,
}

impl StatsRow {
    fn into_stats(self) -> LibraryStats {
        LibraryStats {
            total_items: self.total_items.max(0) as u64,
            articles: self.articles.max(0) as u64,
            pdfs: self.pdfs.max(0) as u64,
            favorites: self.favorites.max(0) as u64,
            archived: self.archived.max(0) as u64,
            read_items: self.read_items.max(0) as u64,
        }
    }
}
