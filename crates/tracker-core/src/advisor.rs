use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AdvisorError;
use crate::ids::TaskId;
use crate::task::{Priority, TaskStatus};

/// Advisory capability. Implementations may fail; callers go through the
/// gateway wrapper, which turns every failure into the deterministic
/// fallback for that operation.
#[async_trait]
pub trait Advisor: Send + Sync {
    fn name(&self) -> &str;

    async fn suggest_details(&self, req: &DetailRequest) -> Result<DetailSuggestion, AdvisorError>;

    async fn suggest_update(&self, req: &UpdateRequest) -> Result<UpdateSuggestion, AdvisorError>;

    async fn prioritize(&self, tasks: &[TaskDigest]) -> Result<PrioritizationPlan, AdvisorError>;

    async fn suggest_subtasks(&self, req: &SubtaskRequest) -> Result<Vec<SubtaskIdea>, AdvisorError>;

    async fn analyze_workload(&self, stats: &WorkloadStats) -> Result<WorkloadInsight, AdvisorError>;
}

// ── Requests ──

#[derive(Clone, Debug, Serialize)]
pub struct DetailRequest {
    pub title: String,
    pub description: Option<String>,
    pub due_date: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct UpdateRequest {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
}

/// Minimal view of a task handed to the prioritizer.
#[derive(Clone, Debug, Serialize)]
pub struct TaskDigest {
    pub id: TaskId,
    pub title: String,
    pub due_date: String,
    pub priority: Priority,
    pub status: TaskStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubtaskRequest {
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub priority: Priority,
}

/// Aggregated numbers the workload analyzer computes before asking for
/// narrative. Also embedded verbatim in the narrative prompt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkloadStats {
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub overdue_tasks: u32,
    pub high_priority: u32,
    pub medium_priority: u32,
    pub low_priority: u32,
    pub upcoming_tasks: u32,
    pub completion_rate: f64,
}

// ── Suggestions ──

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetailSuggestion {
    pub priority: Priority,
    pub description: String,
    pub estimated_time: Option<f64>,
    pub subtasks: Vec<SubtaskIdea>,
}

impl DetailSuggestion {
    /// Deterministic fallback: MEDIUM priority, the caller's own
    /// description (or empty), no subtask candidates.
    pub fn fallback(req: &DetailRequest) -> Self {
        Self {
            priority: Priority::Medium,
            description: req.description.clone().unwrap_or_default(),
            estimated_time: None,
            subtasks: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateSuggestion {
    pub priority: Priority,
    pub status: TaskStatus,
    pub description: String,
}

impl UpdateSuggestion {
    /// Deterministic fallback: echo the merged input unchanged.
    pub fn fallback(req: &UpdateRequest) -> Self {
        Self {
            priority: req.priority,
            status: req.status,
            description: req.description.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrioritizationPlan {
    pub task_ids: Vec<TaskId>,
    pub reasoning: String,
}

impl PrioritizationPlan {
    /// Deterministic fallback: empty ordering. The engine appends the
    /// original order afterwards, so nothing is dropped.
    pub fn fallback() -> Self {
        Self {
            task_ids: Vec::new(),
            reasoning: "No tasks to prioritize".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubtaskIdea {
    pub title: String,
    pub estimated_minutes: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkloadInsight {
    pub analysis: String,
    pub recommendations: Vec<String>,
    pub overloaded_dates: Vec<String>,
    pub estimated_total_hours: f64,
}

impl WorkloadInsight {
    pub fn fallback() -> Self {
        Self {
            analysis: "Error analyzing workload".to_string(),
            recommendations: Vec::new(),
            overloaded_dates: Vec::new(),
            estimated_total_hours: 0.0,
        }
    }
}
