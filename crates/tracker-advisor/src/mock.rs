use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use tracker_core::advisor::{
    Advisor, DetailRequest, DetailSuggestion, PrioritizationPlan, SubtaskIdea, SubtaskRequest,
    TaskDigest, UpdateRequest, UpdateSuggestion, WorkloadInsight, WorkloadStats,
};
use tracker_core::errors::AdvisorError;

/// Pre-programmed advisor for deterministic tests without network calls.
/// Each operation pops its queue; an empty queue yields a network error,
/// which the gateway turns into the operation's fallback.
#[derive(Default)]
pub struct MockAdvisor {
    details: Mutex<VecDeque<Result<DetailSuggestion, AdvisorError>>>,
    updates: Mutex<VecDeque<Result<UpdateSuggestion, AdvisorError>>>,
    plans: Mutex<VecDeque<Result<PrioritizationPlan, AdvisorError>>>,
    subtasks: Mutex<VecDeque<Result<Vec<SubtaskIdea>, AdvisorError>>>,
    insights: Mutex<VecDeque<Result<WorkloadInsight, AdvisorError>>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl MockAdvisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_details(&self, r: Result<DetailSuggestion, AdvisorError>) {
        self.details.lock().push_back(r);
    }

    pub fn push_update(&self, r: Result<UpdateSuggestion, AdvisorError>) {
        self.updates.lock().push_back(r);
    }

    pub fn push_plan(&self, r: Result<PrioritizationPlan, AdvisorError>) {
        self.plans.lock().push_back(r);
    }

    pub fn push_subtasks(&self, r: Result<Vec<SubtaskIdea>, AdvisorError>) {
        self.subtasks.lock().push_back(r);
    }

    pub fn push_insight(&self, r: Result<WorkloadInsight, AdvisorError>) {
        self.insights.lock().push_back(r);
    }

    /// Sleep before answering, for timeout tests.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Total calls across all operations.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    async fn answer<T>(&self, queued: Option<Result<T, AdvisorError>>) -> Result<T, AdvisorError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let delay = *self.delay.lock();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        queued.unwrap_or_else(|| Err(AdvisorError::Network("no programmed response".into())))
    }
}

#[async_trait]
impl Advisor for MockAdvisor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn suggest_details(&self, _req: &DetailRequest) -> Result<DetailSuggestion, AdvisorError> {
        let next = self.details.lock().pop_front();
        self.answer(next).await
    }

    async fn suggest_update(&self, _req: &UpdateRequest) -> Result<UpdateSuggestion, AdvisorError> {
        let next = self.updates.lock().pop_front();
        self.answer(next).await
    }

    async fn prioritize(&self, _tasks: &[TaskDigest]) -> Result<PrioritizationPlan, AdvisorError> {
        let next = self.plans.lock().pop_front();
        self.answer(next).await
    }

    async fn suggest_subtasks(&self, _req: &SubtaskRequest) -> Result<Vec<SubtaskIdea>, AdvisorError> {
        let next = self.subtasks.lock().pop_front();
        self.answer(next).await
    }

    async fn analyze_workload(&self, _stats: &WorkloadStats) -> Result<WorkloadInsight, AdvisorError> {
        let next = self.insights.lock().pop_front();
        self.answer(next).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::task::Priority;

    #[tokio::test]
    async fn pops_programmed_responses_in_order() {
        let mock = MockAdvisor::new();
        mock.push_subtasks(Ok(vec![SubtaskIdea { title: "one".into(), estimated_minutes: None }]));
        mock.push_subtasks(Ok(vec![]));

        let req = SubtaskRequest {
            title: "T".into(),
            description: String::new(),
            due_date: "2026-08-14T12:00:00.000Z".into(),
            priority: Priority::Medium,
        };
        let first = mock.suggest_subtasks(&req).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = mock.suggest_subtasks(&req).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn empty_queue_errors() {
        let mock = MockAdvisor::new();
        let req = DetailRequest {
            title: "T".into(),
            description: None,
            due_date: "2026-08-14T12:00:00.000Z".into(),
        };
        let result = mock.suggest_details(&req).await;
        assert!(matches!(result, Err(AdvisorError::Network(_))));
    }
}
