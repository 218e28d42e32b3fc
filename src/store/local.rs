use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::error;

use crate::entities::{ExportEnvelope, Item, ItemPatch, LibraryStats, parse_import};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    scope TEXT NOT NULL,
    id TEXT NOT NULL,
    record TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (scope, id)
);

CREATE INDEX IF NOT EXISTS idx_items_scope_created ON items(scope, created_at DESC);
"#;

/// On-disk item store, one row per (scope, item). Records are stored as the
/// wire JSON so exports read back byte-compatible.
///
/// Every operation is best-effort: failures are logged and reported through
/// the return value (`false` / `None` / empty), never raised. Callers treat
/// this store as the layer that must not take the process down.
pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// All items in a scope, newest first. An unreadable store yields an
    /// empty list.
    pub fn get_all(&self, scope: &str) -> Vec<Item> {
        let Ok(conn) = self.conn.lock() else {
            return Vec::new();
        };
        let result = (|| -> rusqlite::Result<Vec<Item>> {
            let mut stmt = conn.prepare(
                "SELECT record FROM items WHERE scope = ?1 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt.query_map(params![scope], |row| row.get::<_, String>(0))?;

            let mut items = Vec::new();
            for record in rows {
                match serde_json::from_str::<Item>(&record?) {
                    Ok(item) => items.push(item),
                    Err(err) => error!(error = %err, scope, "skipping undecodable local record"),
                }
            }
            Ok(items)
        })();

        match result {
            Ok(items) => items,
            Err(err) => {
                error!(error = %err, scope, "local read failed");
                Vec::new()
            }
        }
    }

    pub fn get(&self, scope: &str, id: &str) -> Option<Item> {
        let conn = self.conn.lock().ok()?;
        let record = conn
            .query_row(
                "SELECT record FROM items WHERE scope = ?1 AND id = ?2",
                params![scope, id],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|err| error!(error = %err, scope, id, "local read failed"))
            .ok()??;
        serde_json::from_str(&record).ok()
    }

    /// Insert or overwrite one item. Returns whether the write landed.
    pub fn save(&self, scope: &str, item: &Item) -> bool {
        let record = match serde_json::to_string(item) {
            Ok(record) => record,
            Err(err) => {
                error!(error = %err, scope, id = %item.id, "local encode failed");
                return false;
            }
        };
        let Ok(conn) = self.conn.lock() else {
            return false;
        };
        let result = conn.execute(
            r#"INSERT INTO items (scope, id, record, created_at)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT (scope, id) DO UPDATE SET
                   record = excluded.record,
                   created_at = excluded.created_at"#,
            params![scope, item.id, record, item.created_at.to_rfc3339()],
        );
        match result {
            Ok(_) => true,
            Err(err) => {
                error!(error = %err, scope, id = %item.id, "local save failed");
                false
            }
        }
    }

    /// Apply a patch to a stored item. `None` when the item is missing or
    /// the write failed.
    pub fn update(&self, scope: &str, id: &str, patch: &ItemPatch) -> Option<Item> {
        let mut item = self.get(scope, id)?;
        item.apply(patch);
        self.save(scope, &item).then_some(item)
    }

    /// Delete by id. `true` means the operation ran; deleting an absent id
    /// is not an error.
    pub fn delete(&self, scope: &str, id: &str) -> bool {
        let Ok(conn) = self.conn.lock() else {
            return false;
        };
        match conn.execute(
            "DELETE FROM items WHERE scope = ?1 AND id = ?2",
            params![scope, id],
        ) {
            Ok(_) => true,
            Err(err) => {
                error!(error = %err, scope, id, "local delete failed");
                false
            }
        }
    }

    pub fn clear(&self, scope: &str) -> bool {
        let Ok(conn) = self.conn.lock() else {
            return false;
        };
        match conn.execute("DELETE FROM items WHERE scope = ?1", params![scope]) {
            Ok(_) => true,
            Err(err) => {
                error!(error = %err, scope, "local clear failed");
                false
            }
        }
    }

    pub fn stats(&self, scope: &str) -> LibraryStats {
        LibraryStats::compute(&self.get_all(scope))
    }

    /// Serialize a scope into the backup envelope.
    pub fn export_data(&self, scope: &str) -> Option<String> {
        ExportEnvelope::new(self.get_all(scope)).to_json()
    }

    /// Replace a scope with the items from a backup payload. The payload is
    /// validated first and applied in one transaction, so a rejected import
    /// leaves the scope untouched.
    pub fn import_data(&self, scope: &str, json: &str) -> bool {
        let Some(items) = parse_import(json) else {
            return false;
        };
        let Ok(mut conn) = self.conn.lock() else {
            return false;
        };

        let result = (|| -> Result<()> {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM items WHERE scope = ?1", params![scope])?;
            for item in &items {
                let record = serde_json::to_string(item)?;
                tx.execute(
                    "INSERT OR REPLACE INTO items (scope, id, record, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![scope, item.id, record, item.created_at.to_rfc3339()],
                )?;
            }
            tx.commit()?;
            Ok(())
        })();

        match result {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, scope, "local import failed");
                false
            }
        }
    }
}
