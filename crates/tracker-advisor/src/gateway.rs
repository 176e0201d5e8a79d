use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use tracker_core::advisor::{
    Advisor, DetailRequest, DetailSuggestion, PrioritizationPlan, SubtaskIdea, SubtaskRequest,
    TaskDigest, UpdateRequest, UpdateSuggestion, WorkloadInsight, WorkloadStats,
};
use tracker_core::errors::AdvisorError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Total facade over an Advisor. Every call is bounded by a timeout and
/// any failure (network, bad status, unparsable reply, timeout) is
/// absorbed into the operation's deterministic fallback. Degradations
/// are logged and counted, never surfaced.
pub struct AdvisorGateway {
    inner: Arc<dyn Advisor>,
    timeout: Duration,
    degraded_calls: AtomicU64,
}

impl AdvisorGateway {
    pub fn new(inner: Arc<dyn Advisor>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            degraded_calls: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(inner: Arc<dyn Advisor>) -> Self {
        Self::new(inner, DEFAULT_TIMEOUT)
    }

    /// How many calls have degraded to their fallback since startup.
    pub fn degraded_calls(&self) -> u64 {
        self.degraded_calls.load(Ordering::Relaxed)
    }

    async fn call<T, F>(&self, op: &'static str, fut: F, fallback: impl FnOnce() -> T) -> T
    where
        F: Future<Output = Result<T, AdvisorError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                self.degraded_calls.fetch_add(1, Ordering::Relaxed);
                warn!(op, kind = e.kind(), error = %e, "advisor degraded, using fallback");
                fallback()
            }
            Err(_) => {
                self.degraded_calls.fetch_add(1, Ordering::Relaxed);
                warn!(op, timeout_secs = self.timeout.as_secs(), "advisor timed out, using fallback");
                fallback()
            }
        }
    }

    pub async fn suggest_details(&self, req: &DetailRequest) -> DetailSuggestion {
        self.call(
            "suggest_details",
            self.inner.suggest_details(req),
            || DetailSuggestion::fallback(req),
        )
        .await
    }

    pub async fn suggest_update(&self, req: &UpdateRequest) -> UpdateSuggestion {
        self.call(
            "suggest_update",
            self.inner.suggest_update(req),
            || UpdateSuggestion::fallback(req),
        )
        .await
    }

    pub async fn prioritize(&self, tasks: &[TaskDigest]) -> PrioritizationPlan {
        self.call("prioritize", self.inner.prioritize(tasks), PrioritizationPlan::fallback)
            .await
    }

    pub async fn suggest_subtasks(&self, req: &SubtaskRequest) -> Vec<SubtaskIdea> {
        self.call("suggest_subtasks", self.inner.suggest_subtasks(req), Vec::new)
            .await
    }

    pub async fn analyze_workload(&self, stats: &WorkloadStats) -> WorkloadInsight {
        self.call(
            "analyze_workload",
            self.inner.analyze_workload(stats),
            WorkloadInsight::fallback,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockAdvisor;
    use tracker_core::task::{Priority, TaskStatus};

    fn detail_req() -> DetailRequest {
        DetailRequest {
            title: "Write report".into(),
            description: Some("numbers".into()),
            due_date: "2026-08-14T12:00:00.000Z".into(),
        }
    }

    #[tokio::test]
    async fn success_passes_through() {
        let mock = Arc::new(MockAdvisor::new());
        mock.push_details(Ok(DetailSuggestion {
            priority: Priority::High,
            description: "enhanced".into(),
            estimated_time: Some(2.0),
            subtasks: vec![],
        }));
        let gateway = AdvisorGateway::with_defaults(mock);

        let s = gateway.suggest_details(&detail_req()).await;
        assert_eq!(s.priority, Priority::High);
        assert_eq!(s.description, "enhanced");
        assert_eq!(gateway.degraded_calls(), 0);
    }

    #[tokio::test]
    async fn error_degrades_to_fallback() {
        let mock = Arc::new(MockAdvisor::new());
        mock.push_details(Err(AdvisorError::Network("refused".into())));
        let gateway = AdvisorGateway::with_defaults(mock);

        let s = gateway.suggest_details(&detail_req()).await;
        assert_eq!(s.priority, Priority::Medium);
        assert_eq!(s.description, "numbers");
        assert_eq!(gateway.degraded_calls(), 1);
    }

    #[tokio::test]
    async fn timeout_degrades_to_fallback() {
        let mock = Arc::new(MockAdvisor::new());
        mock.set_delay(Duration::from_secs(60));
        mock.push_update(Ok(UpdateSuggestion {
            priority: Priority::High,
            status: TaskStatus::InProgress,
            description: "never arrives".into(),
        }));
        let gateway = AdvisorGateway::new(mock, Duration::from_millis(20));

        let req = UpdateRequest {
            title: "T".into(),
            description: "original".into(),
            priority: Priority::Low,
            status: TaskStatus::Pending,
        };
        let s = gateway.suggest_update(&req).await;
        assert_eq!(s.description, "original");
        assert_eq!(s.priority, Priority::Low);
        assert_eq!(gateway.degraded_calls(), 1);
    }

    #[tokio::test]
    async fn prioritize_fallback_is_empty_plan() {
        let mock = Arc::new(MockAdvisor::new());
        // No programmed response: mock errors, gateway falls back.
        let gateway = AdvisorGateway::with_defaults(mock);
        let plan = gateway.prioritize(&[]).await;
        assert!(plan.task_ids.is_empty());
    }

    #[tokio::test]
    async fn workload_fallback_message() {
        let mock = Arc::new(MockAdvisor::new());
        let gateway = AdvisorGateway::with_defaults(mock);
        let stats = WorkloadStats {
            total_tasks: 0,
            completed_tasks: 0,
            overdue_tasks: 0,
            high_priority: 0,
            medium_priority: 0,
            low_priority: 0,
            upcoming_tasks: 0,
            completion_rate: 0.0,
        };
        let insight = gateway.analyze_workload(&stats).await;
        assert_eq!(insight.analysis, "Error analyzing workload");
    }
}
