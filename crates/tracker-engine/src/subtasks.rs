use serde::Serialize;
use tracing::{info, instrument};

use tracker_core::advisor::{SubtaskIdea, SubtaskRequest};
use tracker_core::ids::{SubtaskId, TaskId, UserId};
use tracker_core::task::{AuditKind, TaskStatus};
use tracker_store::subtasks::SubtaskRow;

use crate::error::EngineError;
use crate::lifecycle::LifecycleEngine;

const AUTO_COMPLETE_NOTE: &str = "completed automatically (all subtasks done)";

#[derive(Clone, Debug, Serialize)]
pub struct CreatedSubtasks {
    pub subtasks: Vec<SubtaskRow>,
    pub suggestion: Option<Vec<SubtaskIdea>>,
}

impl LifecycleEngine {
    /// Add subtasks to a task. Manual mode takes one non-empty title;
    /// AI mode asks the advisor for a breakdown seeded with the parent's
    /// fields and creates one subtask per idea. Zero ideas is a domain
    /// error, not an advisor failure.
    #[instrument(skip(self, title), fields(owner_id = %owner_id, task_id = %task_id, generate_with_ai))]
    pub async fn create_subtask(
        &self,
        owner_id: &UserId,
        task_id: &TaskId,
        title: Option<String>,
        generate_with_ai: bool,
    ) -> Result<CreatedSubtasks, EngineError> {
        self.resolve_owner(owner_id)?;
        let task = self.owned_task(owner_id, task_id)?;

        if generate_with_ai {
            let ideas = self
                .advisor
                .suggest_subtasks(&SubtaskRequest {
                    title: task.title.clone(),
                    description: task.description.clone(),
                    due_date: task.due_date.clone(),
                    priority: task.priority,
                })
                .await;

            if ideas.is_empty() {
                return Err(EngineError::InvalidArgument(
                    "advisor was unable to generate subtasks for this task".into(),
                ));
            }

            let mut created = Vec::with_capacity(ideas.len());
            for idea in &ideas {
                created.push(self.subtasks.create(task_id, &idea.title)?);
            }

            let payload = serde_json::to_value(&ideas)
                .map_err(|e| EngineError::Internal(e.to_string()))?;
            self.audit
                .append(owner_id, task_id, AuditKind::SubtaskGeneration, &payload)?;

            return Ok(CreatedSubtasks {
                subtasks: created,
                suggestion: Some(ideas),
            });
        }

        let title = title
            .as_deref()
            .map(Self::require_title)
            .transpose()?
            .ok_or_else(|| EngineError::InvalidArgument("subtask title is required".into()))?;

        let subtask = self.subtasks.create(task_id, &title)?;
        Ok(CreatedSubtasks {
            subtasks: vec![subtask],
            suggestion: None,
        })
    }

    /// Subtasks of an owned task, in creation order.
    #[instrument(skip(self), fields(owner_id = %owner_id, task_id = %task_id))]
    pub async fn list_subtasks(
        &self,
        owner_id: &UserId,
        task_id: &TaskId,
    ) -> Result<Vec<SubtaskRow>, EngineError> {
        self.resolve_owner(owner_id)?;
        self.owned_task(owner_id, task_id)?;
        Ok(self.subtasks.list_for_task(task_id)?)
    }

    /// Update a subtask's title and/or completion. Marking one completed
    /// re-reads the parent's full subtask set; if every subtask of a
    /// non-empty set is now done, the parent transitions to COMPLETED
    /// with a note that the transition was derived, not user-chosen.
    #[instrument(skip(self, title), fields(owner_id = %owner_id, task_id = %task_id, subtask_id = %subtask_id))]
    pub async fn update_subtask(
        &self,
        owner_id: &UserId,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
        title: Option<String>,
        completed: Option<bool>,
    ) -> Result<SubtaskRow, EngineError> {
        self.resolve_owner(owner_id)?;
        self.owned_task(owner_id, task_id)?;
        let subtask = self.checked_subtask(task_id, subtask_id)?;

        let title = title.as_deref().map(Self::require_title).transpose()?;
        let updated = self.subtasks.update(&subtask.id, title.as_deref(), completed)?;

        // Evaluated strictly after the triggering write, from a fresh
        // read, so concurrent completions converge on the same answer.
        if completed == Some(true) {
            self.derive_parent_completion(task_id)?;
        }

        Ok(updated)
    }

    /// Remove a single subtask. Deleting the last incomplete subtask
    /// deliberately does NOT auto-complete the parent.
    #[instrument(skip(self), fields(owner_id = %owner_id, task_id = %task_id, subtask_id = %subtask_id))]
    pub async fn delete_subtask(
        &self,
        owner_id: &UserId,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
    ) -> Result<(), EngineError> {
        self.resolve_owner(owner_id)?;
        self.owned_task(owner_id, task_id)?;
        let subtask = self.checked_subtask(task_id, subtask_id)?;
        self.subtasks.delete(&subtask.id)?;
        Ok(())
    }

    /// A subtask addressed through the wrong parent is Forbidden: the
    /// row exists, but not in the caller's scope.
    fn checked_subtask(
        &self,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
    ) -> Result<SubtaskRow, EngineError> {
        let subtask = self.subtasks.get(subtask_id)?;
        if subtask.task_id != *task_id {
            return Err(EngineError::Forbidden(format!(
                "subtask {subtask_id} does not belong to task {task_id}"
            )));
        }
        Ok(subtask)
    }

    fn derive_parent_completion(&self, task_id: &TaskId) -> Result<(), EngineError> {
        let all = self.subtasks.list_for_task(task_id)?;
        if all.is_empty() || !all.iter().all(|s| s.completed) {
            return Ok(());
        }
        let parent = self.tasks.get(task_id)?;
        if parent.status == TaskStatus::Completed {
            return Ok(());
        }
        self.tasks
            .set_status(task_id, TaskStatus::Completed, Some(AUTO_COMPLETE_NOTE))?;
        info!(task_id = %task_id, "task auto-completed, all subtasks done");
        Ok(())
    }
}
