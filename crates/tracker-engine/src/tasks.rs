use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use tracker_core::advisor::{DetailRequest, DetailSuggestion, TaskDigest, UpdateRequest, UpdateSuggestion};
use tracker_core::ids::{TaskId, UserId};
use tracker_core::task::{AuditKind, Priority, TaskStatus};
use tracker_core::time;
use tracker_store::audit::AuditRow;
use tracker_store::tasks::NewTask;

use crate::error::EngineError;
use crate::lifecycle::{LifecycleEngine, TaskDetail};

/// Snake_case is canonical on the wire; camelCase aliases keep clients
/// of the old API working.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    #[serde(alias = "dueDate")]
    pub due_date: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
    #[serde(alias = "useAi")]
    pub use_ai: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "dueDate")]
    pub due_date: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    #[serde(alias = "useAi", alias = "useAiSuggestions")]
    pub use_ai: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreatedTask {
    pub task: TaskDetail,
    pub suggestion: Option<DetailSuggestion>,
}

#[derive(Clone, Debug, Serialize)]
pub struct UpdatedTask {
    pub task: TaskDetail,
    pub suggestion: Option<UpdateSuggestion>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Prioritization {
    pub order: Vec<TaskId>,
    pub reasoning: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TaskListing {
    pub tasks: Vec<TaskDetail>,
    pub prioritization: Option<Prioritization>,
}

impl LifecycleEngine {
    /// Create a task. With `use_ai`, the advisor's detail suggestion is
    /// stored alongside (never over) the caller's fields; candidate
    /// subtasks become real subtasks and the full suggestion payload is
    /// written to the audit trail.
    #[instrument(skip(self, req), fields(owner_id = %owner_id, use_ai = req.use_ai))]
    pub async fn create_task(
        &self,
        owner_id: &UserId,
        req: CreateTask,
    ) -> Result<CreatedTask, EngineError> {
        let title = Self::require_title(&req.title)?;
        let due_raw = req
            .due_date
            .as_deref()
            .ok_or_else(|| EngineError::InvalidArgument("due date is required".into()))?;
        let due_date = Self::require_due_date(due_raw)?;
        self.resolve_owner(owner_id)?;

        let suggestion = if req.use_ai {
            Some(
                self.advisor
                    .suggest_details(&DetailRequest {
                        title: title.clone(),
                        description: req.description.clone(),
                        due_date: due_date.clone(),
                    })
                    .await,
            )
        } else {
            None
        };

        let task = self.tasks.create(&NewTask {
            owner_id: owner_id.clone(),
            title,
            description: req.description.unwrap_or_default(),
            due_date,
            priority: req.priority.unwrap_or_default(),
            status: TaskStatus::Pending,
            suggested_description: suggestion.as_ref().map(|s| s.description.clone()),
            suggested_priority: suggestion.as_ref().map(|s| s.priority),
        })?;

        for name in &req.tags {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let tag = self.tags.get_or_create(name)?;
            self.tags.attach(&task.id, &tag.id)?;
        }

        if let Some(ref s) = suggestion {
            if !s.subtasks.is_empty() {
                for idea in &s.subtasks {
                    self.subtasks.create(&task.id, &idea.title)?;
                }
                let payload = serde_json::to_value(s)
                    .map_err(|e| EngineError::Internal(e.to_string()))?;
                self.audit
                    .append(owner_id, &task.id, AuditKind::TaskCreation, &payload)?;
            }
        }

        Ok(CreatedTask {
            task: self.hydrate(task)?,
            suggestion,
        })
    }

    /// Active tasks for an owner, due date ascending. With
    /// `include_prioritization`, the advisor's ordering is applied and
    /// any task it omitted keeps its original position at the end, so the
    /// result is always a permutation of the plain listing.
    #[instrument(skip(self), fields(owner_id = %owner_id, include_completed, include_prioritization))]
    pub async fn list_tasks(
        &self,
        owner_id: &UserId,
        include_completed: bool,
        include_prioritization: bool,
    ) -> Result<TaskListing, EngineError> {
        self.resolve_owner(owner_id)?;
        let rows = self.tasks.list_active(owner_id, include_completed)?;
        let mut details = rows
            .into_iter()
            .map(|t| self.hydrate(t))
            .collect::<Result<Vec<_>, _>>()?;

        if !include_prioritization || details.is_empty() {
            return Ok(TaskListing {
                tasks: details,
                prioritization: None,
            });
        }

        let digests: Vec<TaskDigest> = details
            .iter()
            .map(|d| TaskDigest {
                id: d.task.id.clone(),
                title: d.task.title.clone(),
                due_date: d.task.due_date.clone(),
                priority: d.task.priority,
                status: d.task.status,
            })
            .collect();

        let plan = self.advisor.prioritize(&digests).await;

        // Advisor ids first, in its order; ids it never mentioned keep
        // their due-date order behind them (sort is stable). Ids the
        // advisor invented match nothing and drop out naturally.
        let mut rank: HashMap<String, usize> = HashMap::new();
        for (i, id) in plan.task_ids.iter().enumerate() {
            rank.entry(id.as_str().to_string()).or_insert(i);
        }
        details.sort_by_key(|d| rank.get(d.task.id.as_str()).copied().unwrap_or(usize::MAX));

        let order = details.iter().map(|d| d.task.id.clone()).collect();
        Ok(TaskListing {
            tasks: details,
            prioritization: Some(Prioritization {
                order,
                reasoning: plan.reasoning,
            }),
        })
    }

    /// Update a task field-by-field; unset fields stay as they are.
    /// With `use_ai`, the advisor is seeded with the merged values and
    /// its suggestion is stored with an AI-update stamp and audited.
    #[instrument(skip(self, req), fields(owner_id = %owner_id, task_id = %task_id, use_ai = req.use_ai))]
    pub async fn update_task(
        &self,
        owner_id: &UserId,
        task_id: &TaskId,
        req: UpdateTask,
    ) -> Result<UpdatedTask, EngineError> {
        self.resolve_owner(owner_id)?;
        let mut task = self.owned_task(owner_id, task_id)?;

        if let Some(ref t) = req.title {
            task.title = Self::require_title(t)?;
        }
        if let Some(ref d) = req.description {
            task.description = d.clone();
        }
        if let Some(ref d) = req.due_date {
            task.due_date = Self::require_due_date(d)?;
        }
        if let Some(p) = req.priority {
            task.priority = p;
        }
        if let Some(s) = req.status {
            task.status = s;
            // A user-chosen status supersedes any derived-transition note.
            task.status_note = None;
        }

        let suggestion = if req.use_ai {
            let s = self
                .advisor
                .suggest_update(&UpdateRequest {
                    title: task.title.clone(),
                    description: task.description.clone(),
                    priority: task.priority,
                    status: task.status,
                })
                .await;
            task.suggested_priority = Some(s.priority);
            task.suggested_description = Some(s.description.clone());
            task.ai_updated_at = Some(time::now_ts());
            Some(s)
        } else {
            None
        };

        let saved = self.tasks.save(&task)?;

        if let Some(ref s) = suggestion {
            let payload =
                serde_json::to_value(s).map_err(|e| EngineError::Internal(e.to_string()))?;
            self.audit
                .append(owner_id, task_id, AuditKind::TaskUpdate, &payload)?;
        }

        Ok(UpdatedTask {
            task: self.hydrate(saved)?,
            suggestion,
        })
    }

    /// Soft delete by default (reversible trash); `hard` permanently
    /// removes the task and cascades its subtasks.
    #[instrument(skip(self), fields(owner_id = %owner_id, task_id = %task_id, hard))]
    pub async fn delete_task(
        &self,
        owner_id: &UserId,
        task_id: &TaskId,
        hard: bool,
    ) -> Result<(), EngineError> {
        self.resolve_owner(owner_id)?;
        self.owned_task(owner_id, task_id)?;

        if hard {
            self.tasks.hard_delete(task_id)?;
        } else {
            self.tasks.soft_delete(task_id)?;
        }
        Ok(())
    }

    /// Bring a task back from trash. Only valid for trashed tasks;
    /// ARCHIVED is promoted to IN_PROGRESS, any other status survives
    /// the round trip untouched.
    #[instrument(skip(self), fields(owner_id = %owner_id, task_id = %task_id))]
    pub async fn restore_task(
        &self,
        owner_id: &UserId,
        task_id: &TaskId,
    ) -> Result<TaskDetail, EngineError> {
        self.resolve_owner(owner_id)?;
        let task = self.owned_task(owner_id, task_id)?;

        if !task.is_trashed() {
            return Err(EngineError::InvalidState(format!(
                "task {task_id} is not in trash"
            )));
        }

        let status = if task.status == TaskStatus::Archived {
            TaskStatus::InProgress
        } else {
            task.status
        };
        self.tasks.restore(task_id, status)?;

        let restored = self.tasks.get(task_id)?;
        self.hydrate(restored)
    }

    /// Trashed tasks, most recently trashed first.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn list_trash(&self, owner_id: &UserId) -> Result<Vec<TaskDetail>, EngineError> {
        self.resolve_owner(owner_id)?;
        let rows = self.tasks.list_trash(owner_id)?;
        rows.into_iter().map(|t| self.hydrate(t)).collect()
    }

    /// Permanently remove everything in the owner's trash. Returns the
    /// number of tasks removed; an empty trash is a no-op, not an error.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn empty_trash(&self, owner_id: &UserId) -> Result<usize, EngineError> {
        self.resolve_owner(owner_id)?;
        Ok(self.tasks.empty_trash(owner_id)?)
    }

    /// The AI-suggestion audit trail for a task, oldest first.
    #[instrument(skip(self), fields(owner_id = %owner_id, task_id = %task_id))]
    pub async fn audit_trail(
        &self,
        owner_id: &UserId,
        task_id: &TaskId,
    ) -> Result<Vec<AuditRow>, EngineError> {
        self.resolve_owner(owner_id)?;
        self.owned_task(owner_id, task_id)?;
        Ok(self.audit.list_for_task(task_id)?)
    }
}
