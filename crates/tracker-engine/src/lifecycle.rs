use std::sync::Arc;

use serde::{Deserialize, Serialize};

use tracker_advisor::AdvisorGateway;
use tracker_core::ids::{TaskId, UserId};
use tracker_core::time;
use tracker_store::audit::AuditRepo;
use tracker_store::subtasks::{SubtaskRepo, SubtaskRow};
use tracker_store::tags::{TagRepo, TagRow};
use tracker_store::tasks::{TaskRepo, TaskRow};
use tracker_store::users::UserRepo;
use tracker_store::Database;

use crate::error::EngineError;

/// Owns the task/subtask lifecycle: creation, mutation, ownership
/// enforcement, status derivation, trash semantics, and the audit trail
/// of AI suggestions. All advisory calls go through the gateway, so a
/// failing advisor can degrade an operation but never abort it.
pub struct LifecycleEngine {
    pub(crate) users: UserRepo,
    pub(crate) tasks: TaskRepo,
    pub(crate) subtasks: SubtaskRepo,
    pub(crate) tags: TagRepo,
    pub(crate) audit: AuditRepo,
    pub(crate) advisor: Arc<AdvisorGateway>,
}

impl LifecycleEngine {
    pub fn new(db: Database, advisor: Arc<AdvisorGateway>) -> Self {
        Self {
            users: UserRepo::new(db.clone()),
            tasks: TaskRepo::new(db.clone()),
            subtasks: SubtaskRepo::new(db.clone()),
            tags: TagRepo::new(db.clone()),
            audit: AuditRepo::new(db),
            advisor,
        }
    }

    /// Resolve the caller to a known owner. Resolution failure is
    /// NotFound; authentication happened upstream.
    pub(crate) fn resolve_owner(&self, owner_id: &UserId) -> Result<(), EngineError> {
        self.users.get(owner_id)?;
        Ok(())
    }

    /// Fetch a task and enforce ownership, strictly before any mutation.
    /// A task that exists but belongs to someone else is Forbidden,
    /// never NotFound and never silently skipped.
    pub(crate) fn owned_task(
        &self,
        owner_id: &UserId,
        task_id: &TaskId,
    ) -> Result<TaskRow, EngineError> {
        let task = self.tasks.get(task_id)?;
        if task.owner_id != *owner_id {
            return Err(EngineError::Forbidden(format!(
                "task {task_id} belongs to another user"
            )));
        }
        Ok(task)
    }

    /// Attach tags and subtasks to a task row.
    pub(crate) fn hydrate(&self, task: TaskRow) -> Result<TaskDetail, EngineError> {
        let tags = self.tags.for_task(&task.id)?;
        let subtasks = self.subtasks.list_for_task(&task.id)?;
        Ok(TaskDetail { task, tags, subtasks })
    }

    pub(crate) fn require_title(title: &str) -> Result<String, EngineError> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(EngineError::InvalidArgument("title must not be empty".into()));
        }
        Ok(trimmed.to_string())
    }

    /// Normalize a caller-supplied due date into the canonical storage
    /// format, rejecting anything unparsable.
    pub(crate) fn require_due_date(raw: &str) -> Result<String, EngineError> {
        match time::parse_ts(raw) {
            Some(t) => Ok(time::fmt_ts(t)),
            None => Err(EngineError::InvalidArgument(format!(
                "due date is not a valid RFC3339 timestamp: {raw}"
            ))),
        }
    }
}

/// A task with its tags and subtasks, the shape every task-returning
/// operation hands back.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: TaskRow,
    pub tags: Vec<TagRow>,
    pub subtasks: Vec<SubtaskRow>,
}
