use serde::{Deserialize, Serialize};
use tracing::instrument;

use tracker_core::ids::{AuditId, TaskId, UserId};
use tracker_core::task::AuditKind;
use tracker_core::time;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// One AI-suggestion audit record. Append-only: the store offers no
/// update or delete for this table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRow {
    pub id: AuditId,
    pub user_id: UserId,
    pub task_id: TaskId,
    pub kind: AuditKind,
    pub suggestion: serde_json::Value,
    pub created_at: String,
}

pub struct AuditRepo {
    db: Database,
}

impl AuditRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append an audit record carrying the raw suggestion payload.
    #[instrument(skip(self, suggestion), fields(user_id = %user_id, task_id = %task_id, kind = %kind))]
    pub fn append(
        &self,
        user_id: &UserId,
        task_id: &TaskId,
        kind: AuditKind,
        suggestion: &serde_json::Value,
    ) -> Result<AuditRow, StoreError> {
        let id = AuditId::new();
        let now = time::now_ts();
        let payload = serde_json::to_string(suggestion)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audit_log (id, user_id, task_id, kind, suggestion, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id.as_str(),
                    user_id.as_str(),
                    task_id.as_str(),
                    kind.to_string(),
                    payload,
                    now,
                ],
            )?;

            Ok(AuditRow {
                id: id.clone(),
                user_id: user_id.clone(),
                task_id: task_id.clone(),
                kind,
                suggestion: suggestion.clone(),
                created_at: now.clone(),
            })
        })
    }

    /// Audit trail for a task, oldest first.
    #[instrument(skip(self), fields(task_id = %task_id))]
    pub fn list_for_task(&self, task_id: &TaskId) -> Result<Vec<AuditRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, task_id, kind, suggestion, created_at
                 FROM audit_log WHERE task_id = ?1 ORDER BY id ASC",
            )?;
            let mut rows = stmt.query([task_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_audit(row)?);
            }
            Ok(results)
        })
    }
}

fn row_to_audit(row: &rusqlite::Row<'_>) -> Result<AuditRow, StoreError> {
    let kind_str: String = row_helpers::get(row, 3, "audit_log", "kind")?;
    let raw: String = row_helpers::get(row, 4, "audit_log", "suggestion")?;
    let suggestion = serde_json::from_str(&raw).map_err(|e| StoreError::CorruptRow {
        table: "audit_log",
        column: "suggestion",
        detail: format!("invalid JSON: {e}"),
    })?;

    Ok(AuditRow {
        id: AuditId::from_raw(row_helpers::get::<String>(row, 0, "audit_log", "id")?),
        user_id: UserId::from_raw(row_helpers::get::<String>(row, 1, "audit_log", "user_id")?),
        task_id: TaskId::from_raw(row_helpers::get::<String>(row, 2, "audit_log", "task_id")?),
        kind: row_helpers::parse_enum(&kind_str, "audit_log", "kind")?,
        suggestion,
        created_at: row_helpers::get(row, 5, "audit_log", "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{NewTask, TaskRepo};
    use crate::users::UserRepo;
    use tracker_core::task::{Priority, TaskStatus};

    fn setup() -> (Database, UserId, TaskId) {
        let db = Database::in_memory().unwrap();
        let users = UserRepo::new(db.clone());
        let user = users.create("owner@example.com").unwrap();
        let tasks = TaskRepo::new(db.clone());
        let task = tasks
            .create(&NewTask {
                owner_id: user.id.clone(),
                title: "parent".into(),
                description: String::new(),
                due_date: "2026-08-14T12:00:00.000Z".into(),
                priority: Priority::Medium,
                status: TaskStatus::Pending,
                ..Default::default()
            })
            .unwrap();
        (db, user.id, task.id)
    }

    #[test]
    fn append_and_list() {
        let (db, user_id, task_id) = setup();
        let repo = AuditRepo::new(db);
        let payload = serde_json::json!({"priority": "HIGH", "subtasks": ["a", "b"]});
        let row = repo
            .append(&user_id, &task_id, AuditKind::TaskCreation, &payload)
            .unwrap();
        assert!(row.id.as_str().starts_with("aud_"));

        let trail = repo.list_for_task(&task_id).unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].kind, AuditKind::TaskCreation);
        assert_eq!(trail[0].suggestion["priority"], "HIGH");
    }

    #[test]
    fn trail_is_oldest_first() {
        let (db, user_id, task_id) = setup();
        let repo = AuditRepo::new(db);
        repo.append(&user_id, &task_id, AuditKind::TaskCreation, &serde_json::json!({"n": 1}))
            .unwrap();
        repo.append(&user_id, &task_id, AuditKind::TaskUpdate, &serde_json::json!({"n": 2}))
            .unwrap();

        let trail = repo.list_for_task(&task_id).unwrap();
        assert_eq!(trail[0].suggestion["n"], 1);
        assert_eq!(trail[1].suggestion["n"], 2);
        assert_eq!(trail[1].kind, AuditKind::TaskUpdate);
    }

    #[test]
    fn empty_trail() {
        let (db, _, task_id) = setup();
        let repo = AuditRepo::new(db);
        assert!(repo.list_for_task(&task_id).unwrap().is_empty());
    }
}
