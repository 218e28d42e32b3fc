use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::{ExportEnvelope, Item, ItemPatch, LibraryStats, dedup_tags, parse_import};
use crate::store::local::LocalStore;
use crate::store::remote::RemoteItemStore;
use crate::store::ANONYMOUS_SCOPE;

enum Mode {
    Anonymous,
    Authenticated {
        user_id: Uuid,
        remote: Arc<dyn RemoteItemStore>,
    },
}

/// Dual-mode persistence facade. Signed out, everything lives in the local
/// store under the anonymous scope. Signed in, the remote store is
/// authoritative, every successful write is mirrored locally under the user
/// scope, and remote failures fall back to that mirror so reads keep working
/// and writes are never dropped on the floor.
pub struct UnifiedStore {
    local: Arc<LocalStore>,
    mode: Mode,
}

impl UnifiedStore {
    pub fn anonymous(local: Arc<LocalStore>) -> Self {
        Self {
            local,
            mode: Mode::Anonymous,
        }
    }

    pub fn authenticated(
        user_id: Uuid,
        local: Arc<LocalStore>,
        remote: Arc<dyn RemoteItemStore>,
    ) -> Self {
        Self {
            local,
            mode: Mode::Authenticated { user_id, remote },
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.mode, Mode::Authenticated { .. })
    }

    /// Local partition all operations in the current mode read and write.
    pub fn scope(&self) -> String {
        match &self.mode {
            Mode::Anonymous => ANONYMOUS_SCOPE.to_string(),
            Mode::Authenticated { user_id, .. } => user_id.to_string(),
        }
    }

    pub async fn save_item(&self, item: Item) -> bool {
        match &self.mode {
            Mode::Anonymous => self.local.save(ANONYMOUS_SCOPE, &item),
            Mode::Authenticated { user_id, remote } => {
                match remote.upsert(*user_id, item.clone()).await {
                    Ok(saved) => {
                        self.mirror(&saved);
                        true
                    }
                    Err(err) => {
                        warn!(error = %err, id = %item.id, "remote save failed, keeping item locally");
                        self.local.save(&self.scope(), &item)
                    }
                }
            }
        }
    }

    pub async fn get_item(&self, id: &str) -> Option<Item> {
        match &self.mode {
            Mode::Anonymous => self.local.get(ANONYMOUS_SCOPE, id),
            Mode::Authenticated { user_id, remote } => {
                match remote.get(*user_id, id.to_string()).await {
                    Ok(found) => found,
                    Err(err) => {
                        warn!(error = %err, id, "remote read failed, serving local mirror");
                        self.local.get(&self.scope(), id)
                    }
                }
            }
        }
    }

    pub async fn get_all_items(&self) -> Vec<Item> {
        match &self.mode {
            Mode::Anonymous => self.local.get_all(ANONYMOUS_SCOPE),
            Mode::Authenticated { user_id, remote } => match remote.get_all(*user_id).await {
                Ok(items) => items,
                Err(err) => {
                    warn!(error = %err, "remote listing failed, serving local mirror");
                    self.local.get_all(&self.scope())
                }
            },
        }
    }

    pub async fn update_item(&self, id: &str, patch: ItemPatch) -> Option<Item> {
        match &self.mode {
            Mode::Anonymous => self.local.update(ANONYMOUS_SCOPE, id, &patch),
            Mode::Authenticated { user_id, remote } => {
                match remote.update(*user_id, id.to_string(), patch.clone()).await {
                    Ok(Some(updated)) => {
                        self.mirror(&updated);
                        Some(updated)
                    }
                    Ok(None) => None,
                    Err(err) => {
                        warn!(error = %err, id, "remote update failed, patching local mirror");
                        self.local.update(&self.scope(), id, &patch)
                    }
                }
            }
        }
    }

    pub async fn delete_item(&self, id: &str) -> bool {
        match &self.mode {
            Mode::Anonymous => self.local.delete(ANONYMOUS_SCOPE, id),
            Mode::Authenticated { user_id, remote } => {
                match remote.delete(*user_id, id.to_string()).await {
                    Ok(_) => {
                        self.local.delete(&self.scope(), id);
                        true
                    }
                    Err(err) => {
                        warn!(error = %err, id, "remote delete failed, removing from local mirror");
                        self.local.delete(&self.scope(), id)
                    }
                }
            }
        }
    }

    /// Composite progress write: clamp, derive the read flag at the 90%
    /// threshold, stamp the read timestamp. Always one patch, so no
    /// intermediate state is ever visible.
    pub async fn update_progress(&self, id: &str, progress: i32) -> Option<Item> {
        self.update_item(id, ItemPatch::progress(progress)).await
    }

    pub async fn mark_as_read(&self, id: &str) -> Option<Item> {
        self.update_item(id, ItemPatch::mark_read()).await
    }

    pub async fn mark_as_unread(&self, id: &str) -> Option<Item> {
        self.update_item(id, ItemPatch::mark_unread()).await
    }

    pub async fn toggle_favorite(&self, id: &str) -> Option<Item> {
        let current = self.get_item(id).await?;
        self.update_item(id, ItemPatch::favorite(!current.is_favorite))
            .await
    }

    pub async fn toggle_archive(&self, id: &str) -> Option<Item> {
        let current = self.get_item(id).await?;
        self.update_item(id, ItemPatch::archived(!current.is_archived))
            .await
    }

    /// Add a tag unless the item already carries it.
    pub async fn add_tag(&self, id: &str, tag: &str) -> Option<Item> {
        let current = self.get_item(id).await?;
        if current.tags.iter().any(|existing| existing == tag) {
            return Some(current);
        }
        let mut tags = current.tags;
        tags.push(tag.to_string());
        self.update_item(id, ItemPatch::tags(dedup_tags(&tags))).await
    }

    pub async fn remove_tag(&self, id: &str, tag: &str) -> Option<Item> {
        let current = self.get_item(id).await?;
        let tags: Vec<String> = current
            .tags
            .into_iter()
            .filter(|existing| existing != tag)
            .collect();
        self.update_item(id, ItemPatch::tags(tags)).await
    }

    /// Library counts: server aggregate when signed in, recomputed from the
    /// reachable item set when the aggregate is unavailable.
    pub async fn get_stats(&self) -> LibraryStats {
        match &self.mode {
            Mode::Anonymous => self.local.stats(ANONYMOUS_SCOPE),
            Mode::Authenticated { user_id, remote } => match remote.stats(*user_id).await {
                Ok(stats) => stats,
                Err(err) => {
                    warn!(error = %err, "remote stats failed, recomputing client-side");
                    LibraryStats::compute(&self.get_all_items().await)
                }
            },
        }
    }

    pub async fn export_data(&self) -> Option<String> {
        ExportEnvelope::new(self.get_all_items().await).to_json()
    }

    /// Import a backup envelope. Signed out this replaces the anonymous
    /// scope wholesale; signed in each item is upserted remotely (and
    /// mirrored), since the hosted set cannot be swapped atomically.
    pub async fn import_data(&self, json: &str) -> bool {
        match &self.mode {
            Mode::Anonymous => self.local.import_data(ANONYMOUS_SCOPE, json),
            Mode::Authenticated { .. } => {
                let Some(items) = parse_import(json) else {
                    return false;
                };
                let mut all_ok = true;
                for item in items {
                    if !self.save_item(item).await {
                        all_ok = false;
                    }
                }
                all_ok
            }
        }
    }

    pub async fn clear_all(&self) -> bool {
        match &self.mode {
            Mode::Anonymous => self.local.clear(ANONYMOUS_SCOPE),
            Mode::Authenticated { user_id, remote } => {
                match remote.get_all(*user_id).await {
                    Ok(items) => {
                        for item in items {
                            if let Err(err) = remote.delete(*user_id, item.id.clone()).await {
                                warn!(error = %err, id = %item.id, "remote clear skipped an item");
                            }
                        }
                        self.local.clear(&self.scope());
                        true
                    }
                    Err(err) => {
                        warn!(error = %err, "remote clear failed");
                        false
                    }
                }
            }
        }
    }

    /// One-shot promotion of anonymous items into the signed-in account.
    /// Idempotent: existing ids are skipped, per-item failures are logged
    /// and skipped, and the anonymous scope is cleared afterwards so the
    /// pass never repeats. Returns `false` when signed out.
    pub async fn sync_to_remote(&self) -> bool {
        let Mode::Authenticated { user_id, remote } = &self.mode else {
            return false;
        };

        let staged = self.local.get_all(ANONYMOUS_SCOPE);
        if staged.is_empty() {
            return true;
        }

        info!(count = staged.len(), "promoting anonymous items to the signed-in account");
        for item in staged {
            let id = item.id.clone();
            match remote.get(*user_id, id.clone()).await {
                Ok(Some(_)) => continue,
                Ok(None) => match remote.upsert(*user_id, item).await {
                    Ok(saved) => self.mirror(&saved),
                    Err(err) => warn!(error = %err, id, "migration skipped an item"),
                },
                Err(err) => warn!(error = %err, id, "migration existence check failed"),
            }
        }

        self.local.clear(ANONYMOUS_SCOPE);
        true
    }

    /// Best-effort write-through to the local mirror.
    fn mirror(&self, item: &Item) {
        if !self.local.save(&self.scope(), item) {
            warn!(id = %item.id, "local mirror write failed");
        }
    }
}
