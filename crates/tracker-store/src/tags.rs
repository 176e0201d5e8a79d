use serde::{Deserialize, Serialize};
use tracing::instrument;

use tracker_core::ids::{TagId, TaskId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TagRow {
    pub id: TagId,
    pub name: String,
}

pub struct TagRepo {
    db: Database,
}

impl TagRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get or create a tag by its unique, case-sensitive name.
    #[instrument(skip(self), fields(name))]
    pub fn get_or_create(&self, name: &str) -> Result<TagRow, StoreError> {
        self.db.with_conn(|conn| {
            let existing = conn
                .query_row("SELECT id, name FROM tags WHERE name = ?1", [name], |row| {
                    Ok(TagRow {
                        id: TagId::from_raw(row.get::<_, String>(0)?),
                        name: row.get(1)?,
                    })
                })
                .ok();

            if let Some(tag) = existing {
                return Ok(tag);
            }

            let id = TagId::new();
            conn.execute(
                "INSERT INTO tags (id, name) VALUES (?1, ?2)",
                rusqlite::params![id.as_str(), name],
            )?;

            Ok(TagRow {
                id,
                name: name.to_string(),
            })
        })
    }

    /// Link a tag to a task. Idempotent.
    #[instrument(skip(self), fields(task_id = %task_id, tag_id = %tag_id))]
    pub fn attach(&self, task_id: &TaskId, tag_id: &TagId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?1, ?2)",
                rusqlite::params![task_id.as_str(), tag_id.as_str()],
            )?;
            Ok(())
        })
    }

    /// Tags attached to a task, by name.
    #[instrument(skip(self), fields(task_id = %task_id))]
    pub fn for_task(&self, task_id: &TaskId) -> Result<Vec<TagRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.name FROM tags t
                 JOIN task_tags tt ON tt.tag_id = t.id
                 WHERE tt.task_id = ?1
                 ORDER BY t.name ASC",
            )?;
            let mut rows = stmt.query([task_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(TagRow {
                    id: TagId::from_raw(row_helpers::get::<String>(row, 0, "tags", "id")?),
                    name: row_helpers::get(row, 1, "tags", "name")?,
                });
            }
            Ok(results)
        })
    }
}
