use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use satchel::entities::{ContentKind, Item, ItemPatch, LibraryStats};
use satchel::store::RemoteItemStore;

/// In-memory stand-in for the hosted store. Unlike a mock it keeps real
/// per-user state, so multi-step flows (save, promote, fall back, recover)
/// can be asserted end to end. `set_failing` switches every operation into
/// returning errors to exercise the offline paths.
pub struct InMemoryRemoteStore {
    rows: Mutex<HashMap<Uuid, Vec<Item>>>,
    failing: AtomicBool,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Direct inspection of stored rows, bypassing the trait.
    pub fn items_for(&self, user_id: Uuid) -> Vec<Item> {
        self.rows
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    fn guard(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("remote store offline");
        }
        Ok(())
    }
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteItemStore for InMemoryRemoteStore {
    async fn get_all(&self, user_id: Uuid) -> Result<Vec<Item>> {
        self.guard()?;
        let mut items = self.items_for(user_id);
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn get(&self, user_id: Uuid, id: String) -> Result<Option<Item>> {
        self.guard()?;
        Ok(self
            .items_for(user_id)
            .into_iter()
            .find(|item| item.id == id))
    }

    async fn upsert(&self, user_id: Uuid, item: Item) -> Result<Item> {
        self.guard()?;
        let mut rows = self.rows.lock().unwrap();
        let items = rows.entry(user_id).or_default();
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => items.push(item.clone()),
        }
        Ok(item)
    }

    async fn update(&self, user_id: Uuid, id: String, patch: ItemPatch) -> Result<Option<Item>> {
        self.guard()?;
        let mut rows = self.rows.lock().unwrap();
        let Some(item) = rows
            .entry(user_id)
            .or_default()
            .iter_mut()
            .find(|item| item.id == id)
        else {
            return Ok(None);
        };
        item.apply(&patch);
        Ok(Some(item.clone()))
    }

    async fn delete(&self, user_id: Uuid, id: String) -> Result<bool> {
        self.guard()?;
        let mut rows = self.rows.lock().unwrap();
        let items = rows.entry(user_id).or_default();
        let before = items.len();
        items.retain(|item| item.id != id);
        Ok(items.len() < before)
    }

    async fn favorites(&self, user_id: Uuid) -> Result<Vec<Item>> {
        Ok(self
            .get_all(user_id)
            .await?
            .into_iter()
            .filter(|item| item.is_favorite)
            .collect())
    }

    async fn archived(&self, user_id: Uuid) -> Result<Vec<Item>> {
        Ok(self
            .get_all(user_id)
            .await?
            .into_iter()
            .filter(|item| item.is_archived)
            .collect())
    }

    async fn unread(&self, user_id: Uuid) -> Result<Vec<Item>> {
        Ok(self
            .get_all(user_id)
            .await?
            .into_iter()
            .filter(|item| !item.is_read)
            .collect())
    }

    async fn search(&self, user_id: Uuid, query: String) -> Result<Vec<Item>> {
        let needle = query.to_lowercase();
        Ok(self
            .get_all(user_id)
            .await?
            .into_iter()
            .filter(|item| {
                item.title.to_lowercase().contains(&needle)
                    || item.excerpt.to_lowercase().contains(&needle)
                    || item.content.to_lowercase().contains(&needle)
            })
            .collect())
    }

    async fn stats(&self, user_id: Uuid) -> Result<LibraryStats> {
        self.guard()?;
        Ok(LibraryStats::compute(&self.items_for(user_id)))
    }
}

pub fn sample_item(id: &str) -> Item {
    Item {
        id: id.to_string(),
        url: format!("https://example.com/{id}"),
        kind: ContentKind::Article,
        title: format!("Item {id}"),
        excerpt: String::new(),
        thumbnail: None,
        reading_time: Some(1),
        word_count: Some(100),
        content: "<p>body</p>".to_string(),
        language: None,
        tags: vec![],
        notes: String::new(),
        is_favorite: false,
        is_archived: false,
        is_read: false,
        read_progress: 0,
        created_at: Utc::now(),
        last_read: None,
    }
}
