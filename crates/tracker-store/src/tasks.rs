use serde::{Deserialize, Serialize};
use tracing::instrument;

use tracker_core::ids::{TaskId, UserId};
use tracker_core::task::{Priority, TaskStatus};
use tracker_core::time;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const TASK_COLUMNS: &str = "id, owner_id, title, description, suggested_description, due_date, \
     priority, suggested_priority, status, status_note, ai_updated_at, deleted_at, \
     created_at, updated_at";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: TaskId,
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    pub suggested_description: Option<String>,
    pub due_date: String,
    pub priority: Priority,
    pub suggested_priority: Option<Priority>,
    pub status: TaskStatus,
    pub status_note: Option<String>,
    pub ai_updated_at: Option<String>,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRow {
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Fields for a fresh task. The advisor is consulted before the insert,
/// so AI-suggested fields land in the same write as the caller's own.
#[derive(Clone, Debug, Default)]
pub struct NewTask {
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub suggested_description: Option<String>,
    pub suggested_priority: Option<Priority>,
}

pub struct TaskRepo {
    db: Database,
}

impl TaskRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, new), fields(owner_id = %new.owner_id))]
    pub fn create(&self, new: &NewTask) -> Result<TaskRow, StoreError> {
        let id = TaskId::new();
        let now = time::now_ts();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, owner_id, title, description, suggested_description,
                        due_date, priority, suggested_priority, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    id.as_str(),
                    new.owner_id.as_str(),
                    new.title,
                    new.description,
                    new.suggested_description,
                    new.due_date,
                    new.priority.to_string(),
                    new.suggested_priority.map(|p| p.to_string()),
                    new.status.to_string(),
                    now,
                    now,
                ],
            )?;

            Ok(TaskRow {
                id: id.clone(),
                owner_id: new.owner_id.clone(),
                title: new.title.clone(),
                description: new.description.clone(),
                suggested_description: new.suggested_description.clone(),
                due_date: new.due_date.clone(),
                priority: new.priority,
                suggested_priority: new.suggested_priority,
                status: new.status,
                status_note: None,
                ai_updated_at: None,
                deleted_at: None,
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    /// Get a task by id, trashed or not.
    #[instrument(skip(self), fields(task_id = %id))]
    pub fn get(&self, id: &TaskId) -> Result<TaskRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_task(row),
                None => Err(StoreError::NotFound(format!("task {id}"))),
            }
        })
    }

    /// Active (non-trashed) tasks for an owner, due date ascending.
    #[instrument(skip(self), fields(owner_id = %owner_id, include_completed))]
    pub fn list_active(
        &self,
        owner_id: &UserId,
        include_completed: bool,
    ) -> Result<Vec<TaskRow>, StoreError> {
        let sql = if include_completed {
            format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE owner_id = ?1 AND deleted_at IS NULL
                 ORDER BY due_date ASC"
            )
        } else {
            format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE owner_id = ?1 AND deleted_at IS NULL AND status != 'COMPLETED'
                 ORDER BY due_date ASC"
            )
        };

        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([owner_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_task(row)?);
            }
            Ok(results)
        })
    }

    /// Active tasks for an owner whose due date falls in [lo, hi],
    /// due date ascending. Bounds are canonical timestamps (see core::time).
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub fn list_due_between(
        &self,
        owner_id: &UserId,
        lo: &str,
        hi: &str,
    ) -> Result<Vec<TaskRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE owner_id = ?1 AND deleted_at IS NULL
                   AND due_date >= ?2 AND due_date <= ?3
                 ORDER BY due_date ASC"
            ))?;
            let mut rows = stmt.query(rusqlite::params![owner_id.as_str(), lo, hi])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_task(row)?);
            }
            Ok(results)
        })
    }

    /// Write back every mutable field of a task. Stamps updated_at.
    #[instrument(skip(self, row), fields(task_id = %row.id))]
    pub fn save(&self, row: &TaskRow) -> Result<TaskRow, StoreError> {
        let now = time::now_ts();
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET title = ?1, description = ?2, suggested_description = ?3,
                        due_date = ?4, priority = ?5, suggested_priority = ?6, status = ?7,
                        status_note = ?8, ai_updated_at = ?9, updated_at = ?10
                 WHERE id = ?11",
                rusqlite::params![
                    row.title,
                    row.description,
                    row.suggested_description,
                    row.due_date,
                    row.priority.to_string(),
                    row.suggested_priority.map(|p| p.to_string()),
                    row.status.to_string(),
                    row.status_note,
                    row.ai_updated_at,
                    now,
                    row.id.as_str(),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("task {}", row.id)));
            }
            let mut saved = row.clone();
            saved.updated_at = now.clone();
            Ok(saved)
        })
    }

    /// Status-only write, used by the derived-completion rule.
    #[instrument(skip(self), fields(task_id = %id, status = %status))]
    pub fn set_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
        note: Option<&str>,
    ) -> Result<(), StoreError> {
        let now = time::now_ts();
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET status = ?1, status_note = ?2, updated_at = ?3 WHERE id = ?4",
                rusqlite::params![status.to_string(), note, now, id.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("task {id}")));
            }
            Ok(())
        })
    }

    /// Move a task to trash: stamp deleted_at and archive it. Reversible.
    #[instrument(skip(self), fields(task_id = %id))]
    pub fn soft_delete(&self, id: &TaskId) -> Result<(), StoreError> {
        let now = time::now_ts();
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET deleted_at = ?1, status = 'ARCHIVED', updated_at = ?2 WHERE id = ?3",
                rusqlite::params![now, now, id.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("task {id}")));
            }
            Ok(())
        })
    }

    /// Clear the trash stamp and set the restored status.
    #[instrument(skip(self), fields(task_id = %id, status = %status))]
    pub fn restore(&self, id: &TaskId, status: TaskStatus) -> Result<(), StoreError> {
        let now = time::now_ts();
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET deleted_at = NULL, status = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![status.to_string(), now, id.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("task {id}")));
            }
            Ok(())
        })
    }

    /// Permanently remove a task, its subtasks, and its tag links.
    /// Irreversible.
    #[instrument(skip(self), fields(task_id = %id))]
    pub fn hard_delete(&self, id: &TaskId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM subtasks WHERE task_id = ?1", [id.as_str()])?;
            tx.execute("DELETE FROM task_tags WHERE task_id = ?1", [id.as_str()])?;
            tx.execute("DELETE FROM tasks WHERE id = ?1", [id.as_str()])?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Trashed tasks for an owner, most recently trashed first.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub fn list_trash(&self, owner_id: &UserId) -> Result<Vec<TaskRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE owner_id = ?1 AND deleted_at IS NOT NULL
                 ORDER BY deleted_at DESC"
            ))?;
            let mut rows = stmt.query([owner_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_task(row)?);
            }
            Ok(results)
        })
    }

    /// Permanently remove every trashed task for an owner, cascading
    /// subtasks and tag links. Returns the number of tasks removed.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub fn empty_trash(&self, owner_id: &UserId) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "DELETE FROM subtasks WHERE task_id IN
                    (SELECT id FROM tasks WHERE owner_id = ?1 AND deleted_at IS NOT NULL)",
                [owner_id.as_str()],
            )?;
            tx.execute(
                "DELETE FROM task_tags WHERE task_id IN
                    (SELECT id FROM tasks WHERE owner_id = ?1 AND deleted_at IS NOT NULL)",
                [owner_id.as_str()],
            )?;
            let removed = tx.execute(
                "DELETE FROM tasks WHERE owner_id = ?1 AND deleted_at IS NOT NULL",
                [owner_id.as_str()],
            )?;
            tx.commit()?;
            Ok(removed)
        })
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> Result<TaskRow, StoreError> {
    let priority_str: String = row_helpers::get(row, 6, "tasks", "priority")?;
    let suggested_str: Option<String> =
        row_helpers::get_opt(row, 7, "tasks", "suggested_priority")?;
    let status_str: String = row_helpers::get(row, 8, "tasks", "status")?;

    Ok(TaskRow {
        id: TaskId::from_raw(row_helpers::get::<String>(row, 0, "tasks", "id")?),
        owner_id: UserId::from_raw(row_helpers::get::<String>(row, 1, "tasks", "owner_id")?),
        title: row_helpers::get(row, 2, "tasks", "title")?,
        description: row_helpers::get(row, 3, "tasks", "description")?,
        suggested_description: row_helpers::get_opt(row, 4, "tasks", "suggested_description")?,
        due_date: row_helpers::get(row, 5, "tasks", "due_date")?,
        priority: row_helpers::parse_enum(&priority_str, "tasks", "priority")?,
        suggested_priority: row_helpers::parse_enum_opt(suggested_str, "tasks", "suggested_priority")?,
        status: row_helpers::parse_enum(&status_str, "tasks", "status")?,
        status_note: row_helpers::get_opt(row, 9, "tasks", "status_note")?,
        ai_updated_at: row_helpers::get_opt(row, 10, "tasks", "ai_updated_at")?,
        deleted_at: row_helpers::get_opt(row, 11, "tasks", "deleted_at")?,
        created_at: row_helpers::get(row, 12, "tasks", "created_at")?,
        updated_at: row_helpers::get(row, 13, "tasks", "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtasks::SubtaskRepo;
    use crate::users::UserRepo;

    fn setup() -> (Database, UserId) {
        let db = Database::in_memory().unwrap();
        let users = UserRepo::new(db.clone());
        let user = users.create("owner@example.com").unwrap();
        (db, user.id)
    }

    fn new_task(owner: &UserId, title: &str, due: &str) -> NewTask {
        NewTask {
            owner_id: owner.clone(),
            title: title.to_string(),
            description: String::new(),
            due_date: due.to_string(),
            priority: Priority::Medium,
            status: TaskStatus::Pending,
            ..Default::default()
        }
    }

    #[test]
    fn create_task() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        let task = repo.create(&new_task(&owner, "Write report", "2026-08-14T12:00:00.000Z")).unwrap();
        assert!(task.id.as_str().starts_with("task_"));
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.suggested_priority.is_none());
        assert!(task.deleted_at.is_none());
    }

    #[test]
    fn get_task() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        let task = repo.create(&new_task(&owner, "A", "2026-08-14T12:00:00.000Z")).unwrap();
        let fetched = repo.get(&task.id).unwrap();
        assert_eq!(fetched.title, "A");
        assert_eq!(fetched.owner_id, owner);
    }

    #[test]
    fn get_nonexistent_fails() {
        let (db, _) = setup();
        let repo = TaskRepo::new(db);
        assert!(matches!(
            repo.get(&TaskId::from_raw("task_nonexistent")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn list_active_orders_by_due_date() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        repo.create(&new_task(&owner, "later", "2026-09-01T00:00:00.000Z")).unwrap();
        repo.create(&new_task(&owner, "sooner", "2026-08-10T00:00:00.000Z")).unwrap();
        let tasks = repo.list_active(&owner, true).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "sooner");
        assert_eq!(tasks[1].title, "later");
    }

    #[test]
    fn list_active_excludes_completed_by_default() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        let t = repo.create(&new_task(&owner, "done", "2026-08-10T00:00:00.000Z")).unwrap();
        repo.set_status(&t.id, TaskStatus::Completed, None).unwrap();
        repo.create(&new_task(&owner, "open", "2026-08-11T00:00:00.000Z")).unwrap();

        let without = repo.list_active(&owner, false).unwrap();
        assert_eq!(without.len(), 1);
        assert_eq!(without[0].title, "open");

        let with = repo.list_active(&owner, true).unwrap();
        assert_eq!(with.len(), 2);
    }

    #[test]
    fn list_active_excludes_trashed() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        let t = repo.create(&new_task(&owner, "gone", "2026-08-10T00:00:00.000Z")).unwrap();
        repo.soft_delete(&t.id).unwrap();
        assert!(repo.list_active(&owner, true).unwrap().is_empty());
    }

    #[test]
    fn save_writes_merged_fields() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        let mut task = repo.create(&new_task(&owner, "A", "2026-08-14T12:00:00.000Z")).unwrap();
        task.title = "B".into();
        task.priority = Priority::High;
        task.suggested_priority = Some(Priority::Critical);
        task.suggested_description = Some("do it sooner".into());
        task.ai_updated_at = Some(tracker_core::time::now_ts());
        repo.save(&task).unwrap();

        let fetched = repo.get(&task.id).unwrap();
        assert_eq!(fetched.title, "B");
        assert_eq!(fetched.priority, Priority::High);
        assert_eq!(fetched.suggested_priority, Some(Priority::Critical));
        assert_eq!(fetched.suggested_description.as_deref(), Some("do it sooner"));
        assert!(fetched.ai_updated_at.is_some());
    }

    #[test]
    fn save_missing_task_fails() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        let task = repo.create(&new_task(&owner, "A", "2026-08-14T12:00:00.000Z")).unwrap();
        repo.hard_delete(&task.id).unwrap();
        assert!(matches!(repo.save(&task), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn soft_delete_then_restore() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        let task = repo.create(&new_task(&owner, "A", "2026-08-14T12:00:00.000Z")).unwrap();

        repo.soft_delete(&task.id).unwrap();
        let trashed = repo.get(&task.id).unwrap();
        assert!(trashed.is_trashed());
        assert_eq!(trashed.status, TaskStatus::Archived);

        repo.restore(&task.id, TaskStatus::InProgress).unwrap();
        let restored = repo.get(&task.id).unwrap();
        assert!(!restored.is_trashed());
        assert_eq!(restored.status, TaskStatus::InProgress);
    }

    #[test]
    fn hard_delete_cascades_subtasks() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db.clone());
        let subs = SubtaskRepo::new(db);
        let task = repo.create(&new_task(&owner, "A", "2026-08-14T12:00:00.000Z")).unwrap();
        let sub = subs.create(&task.id, "step 1").unwrap();

        repo.hard_delete(&task.id).unwrap();
        assert!(repo.get(&task.id).is_err());
        assert!(subs.get(&sub.id).is_err());
    }

    #[test]
    fn list_trash_most_recent_first() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        let a = repo.create(&new_task(&owner, "first", "2026-08-10T00:00:00.000Z")).unwrap();
        let b = repo.create(&new_task(&owner, "second", "2026-08-11T00:00:00.000Z")).unwrap();
        repo.soft_delete(&a.id).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        repo.soft_delete(&b.id).unwrap();

        let trash = repo.list_trash(&owner).unwrap();
        assert_eq!(trash.len(), 2);
        assert_eq!(trash[0].title, "second");
    }

    #[test]
    fn empty_trash_removes_only_trashed() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db.clone());
        let subs = SubtaskRepo::new(db);
        let keep = repo.create(&new_task(&owner, "keep", "2026-08-10T00:00:00.000Z")).unwrap();
        let toss = repo.create(&new_task(&owner, "toss", "2026-08-11T00:00:00.000Z")).unwrap();
        let sub = subs.create(&toss.id, "step").unwrap();
        repo.soft_delete(&toss.id).unwrap();

        let removed = repo.empty_trash(&owner).unwrap();
        assert_eq!(removed, 1);
        assert!(repo.get(&keep.id).is_ok());
        assert!(repo.get(&toss.id).is_err());
        assert!(subs.get(&sub.id).is_err());

        // Second call is a no-op, not an error
        assert_eq!(repo.empty_trash(&owner).unwrap(), 0);
    }

    #[test]
    fn empty_trash_scoped_to_owner() {
        let (db, owner) = setup();
        let users = UserRepo::new(db.clone());
        let other = users.create("other@example.com").unwrap();
        let repo = TaskRepo::new(db);

        let mine = repo.create(&new_task(&owner, "mine", "2026-08-10T00:00:00.000Z")).unwrap();
        let theirs = repo.create(&new_task(&other.id, "theirs", "2026-08-10T00:00:00.000Z")).unwrap();
        repo.soft_delete(&mine.id).unwrap();
        repo.soft_delete(&theirs.id).unwrap();

        assert_eq!(repo.empty_trash(&owner).unwrap(), 1);
        assert!(repo.get(&theirs.id).is_ok());
    }

    #[test]
    fn list_due_between_filters_window() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        repo.create(&new_task(&owner, "before", "2026-07-01T00:00:00.000Z")).unwrap();
        repo.create(&new_task(&owner, "inside", "2026-08-10T00:00:00.000Z")).unwrap();
        repo.create(&new_task(&owner, "after", "2026-10-01T00:00:00.000Z")).unwrap();

        let tasks = repo
            .list_due_between(&owner, "2026-08-01T00:00:00.000Z", "2026-09-01T00:00:00.000Z")
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "inside");
    }

    #[test]
    fn invalid_status_returns_corrupt_row() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db.clone());
        let task = repo.create(&new_task(&owner, "A", "2026-08-14T12:00:00.000Z")).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE tasks SET status = 'BOGUS' WHERE id = ?1",
                [task.id.as_str()],
            )?;
            Ok(())
        })
        .unwrap();
        assert!(matches!(repo.get(&task.id), Err(StoreError::CorruptRow { .. })));
    }
}
