use serde::{Deserialize, Serialize};
use tracing::instrument;

use tracker_core::ids::{SubtaskId, TaskId};
use tracker_core::time;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubtaskRow {
    pub id: SubtaskId,
    pub task_id: TaskId,
    pub title: String,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct SubtaskRepo {
    db: Database,
}

impl SubtaskRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(task_id = %task_id, title))]
    pub fn create(&self, task_id: &TaskId, title: &str) -> Result<SubtaskRow, StoreError> {
        let id = SubtaskId::new();
        let now = time::now_ts();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO subtasks (id, task_id, title, completed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?5)",
                rusqlite::params![id.as_str(), task_id.as_str(), title, now, now],
            )?;

            Ok(SubtaskRow {
                id: id.clone(),
                task_id: task_id.clone(),
                title: title.to_string(),
                completed: false,
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    #[instrument(skip(self), fields(subtask_id = %id))]
    pub fn get(&self, id: &SubtaskId) -> Result<SubtaskRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, title, completed, created_at, updated_at
                 FROM subtasks WHERE id = ?1",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_subtask(row),
                None => Err(StoreError::NotFound(format!("subtask {id}"))),
            }
        })
    }

    /// All subtasks of a task in creation order (UUIDv7 ids sort by time).
    #[instrument(skip(self), fields(task_id = %task_id))]
    pub fn list_for_task(&self, task_id: &TaskId) -> Result<Vec<SubtaskRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, title, completed, created_at, updated_at
                 FROM subtasks WHERE task_id = ?1 ORDER BY id ASC",
            )?;
            let mut rows = stmt.query([task_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_subtask(row)?);
            }
            Ok(results)
        })
    }

    /// Apply the supplied fields; absent fields are left unchanged.
    #[instrument(skip(self), fields(subtask_id = %id))]
    pub fn update(
        &self,
        id: &SubtaskId,
        title: Option<&str>,
        completed: Option<bool>,
    ) -> Result<SubtaskRow, StoreError> {
        let mut row = self.get(id)?;
        if let Some(t) = title {
            row.title = t.to_string();
        }
        if let Some(c) = completed {
            row.completed = c;
        }
        let now = time::now_ts();

        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE subtasks SET title = ?1, completed = ?2, updated_at = ?3 WHERE id = ?4",
                rusqlite::params![row.title, row.completed, now, id.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("subtask {id}")));
            }
            row.updated_at = now.clone();
            Ok(row.clone())
        })
    }

    #[instrument(skip(self), fields(subtask_id = %id))]
    pub fn delete(&self, id: &SubtaskId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM subtasks WHERE id = ?1", [id.as_str()])?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("subtask {id}")));
            }
            Ok(())
        })
    }
}

fn row_to_subtask(row: &rusqlite::Row<'_>) -> Result<SubtaskRow, StoreError> {
    Ok(SubtaskRow {
        id: SubtaskId::from_raw(row_helpers::get::<String>(row, 0, "subtasks", "id")?),
        task_id: TaskId::from_raw(row_helpers::get::<String>(row, 1, "subtasks", "task_id")?),
        title: row_helpers::get(row, 2, "subtasks", "title")?,
        completed: row_helpers::get(row, 3, "subtasks", "completed")?,
        created_at: row_helpers::get(row, 4, "subtasks", "created_at")?,
        updated_at: row_helpers::get(row, 5, "subtasks", "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{NewTask, TaskRepo};
    use crate::users::UserRepo;
    use tracker_core::ids::UserId;
    use tracker_core::task::{Priority, TaskStatus};

    fn setup() -> (Database, TaskId) {
        let db = Database::in_memory().unwrap();
        let users = UserRepo::new(db.clone());
        let user = users.create("owner@example.com").unwrap();
        let tasks = TaskRepo::new(db.clone());
        let task = tasks
            .create(&NewTask {
                owner_id: user.id,
                title: "parent".into(),
                description: String::new(),
                due_date: "2026-08-14T12:00:00.000Z".into(),
                priority: Priority::Medium,
                status: TaskStatus::Pending,
                ..Default::default()
            })
            .unwrap();
        (db, task.id)
    }

    #[test]
    fn create_subtask() {
        let (db, task_id) = setup();
        let repo = SubtaskRepo::new(db);
        let sub = repo.create(&task_id, "step 1").unwrap();
        assert!(sub.id.as_str().starts_with("sub_"));
        assert!(!sub.completed);
        assert_eq!(sub.task_id, task_id);
    }

    #[test]
    fn list_in_creation_order() {
        let (db, task_id) = setup();
        let repo = SubtaskRepo::new(db);
        repo.create(&task_id, "first").unwrap();
        repo.create(&task_id, "second").unwrap();
        repo.create(&task_id, "third").unwrap();

        let subs = repo.list_for_task(&task_id).unwrap();
        let titles: Vec<&str> = subs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["first", "second", "third"]);
    }

    #[test]
    fn update_only_supplied_fields() {
        let (db, task_id) = setup();
        let repo = SubtaskRepo::new(db);
        let sub = repo.create(&task_id, "step").unwrap();

        let updated = repo.update(&sub.id, None, Some(true)).unwrap();
        assert!(updated.completed);
        assert_eq!(updated.title, "step");

        let renamed = repo.update(&sub.id, Some("renamed"), None).unwrap();
        assert_eq!(renamed.title, "renamed");
        assert!(renamed.completed);
    }

    #[test]
    fn update_missing_fails() {
        let (db, _) = setup();
        let repo = SubtaskRepo::new(db);
        let result = repo.update(&SubtaskId::from_raw("sub_nonexistent"), Some("x"), None);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_subtask() {
        let (db, task_id) = setup();
        let repo = SubtaskRepo::new(db);
        let sub = repo.create(&task_id, "step").unwrap();
        repo.delete(&sub.id).unwrap();
        assert!(repo.get(&sub.id).is_err());
        assert!(matches!(repo.delete(&sub.id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn subtasks_scoped_to_task() {
        let (db, task_id) = setup();
        let users = UserRepo::new(db.clone());
        let other_user = users.create("other@example.com").unwrap();
        let tasks = TaskRepo::new(db.clone());
        let other_task = tasks
            .create(&NewTask {
                owner_id: UserId::from_raw(other_user.id.as_str()),
                title: "other".into(),
                description: String::new(),
                due_date: "2026-08-14T12:00:00.000Z".into(),
                priority: Priority::Medium,
                status: TaskStatus::Pending,
                ..Default::default()
            })
            .unwrap();

        let repo = SubtaskRepo::new(db);
        repo.create(&task_id, "mine").unwrap();
        repo.create(&other_task.id, "theirs").unwrap();

        assert_eq!(repo.list_for_task(&task_id).unwrap().len(), 1);
        assert_eq!(repo.list_for_task(&other_task.id).unwrap().len(), 1);
    }
}
