use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::instrument;

use tracker_advisor::AdvisorGateway;
use tracker_core::advisor::{WorkloadInsight, WorkloadStats};
use tracker_core::ids::{TaskId, UserId};
use tracker_core::task::{Priority, TaskStatus, Timeframe};
use tracker_core::time;
use tracker_store::subtasks::SubtaskRepo;
use tracker_store::tags::TagRepo;
use tracker_store::tasks::{TaskRepo, TaskRow};
use tracker_store::users::UserRepo;
use tracker_store::Database;

use crate::error::EngineError;

/// Windowed workload statistics over an owner's active tasks, with a
/// best-effort AI narrative. The numeric report never depends on the
/// advisor answering.
pub struct WorkloadAnalyzer {
    users: UserRepo,
    tasks: TaskRepo,
    subtasks: SubtaskRepo,
    tags: TagRepo,
    advisor: Arc<AdvisorGateway>,
}

#[derive(Clone, Debug, Serialize)]
pub struct WorkloadSummary {
    pub timeframe: Timeframe,
    pub overview: Overview,
    pub tasks_by_priority: PriorityBuckets,
    pub tasks_by_tag: BTreeMap<String, u32>,
    pub subtasks: SubtaskOverview,
    pub upcoming_tasks: Vec<UpcomingTask>,
    pub insight: WorkloadInsight,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct Overview {
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub overdue_tasks: u32,
    pub completion_rate: f64,
    pub upcoming_deadlines: u32,
}

/// CRITICAL tasks count toward totals but have no bucket of their own.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct PriorityBuckets {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct SubtaskOverview {
    pub total: u32,
    pub completed: u32,
    pub completion_rate: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct UpcomingTask {
    pub id: TaskId,
    pub title: String,
    pub due_date: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub subtask_count: u32,
    pub completed_subtasks: u32,
}

impl WorkloadAnalyzer {
    pub fn new(db: Database, advisor: Arc<AdvisorGateway>) -> Self {
        Self {
            users: UserRepo::new(db.clone()),
            tasks: TaskRepo::new(db.clone()),
            subtasks: SubtaskRepo::new(db.clone()),
            tags: TagRepo::new(db),
            advisor,
        }
    }

    /// Aggregate the owner's active tasks due within the window
    /// [now - lookback, now + 30d] and merge in the advisor's narrative.
    #[instrument(skip(self), fields(owner_id = %owner_id, timeframe = %timeframe))]
    pub async fn analyze(
        &self,
        owner_id: &UserId,
        timeframe: Timeframe,
    ) -> Result<WorkloadSummary, EngineError> {
        self.users.get(owner_id)?;

        let now = Utc::now();
        let lo = time::fmt_ts(now - Duration::days(timeframe.lookback_days()));
        let hi = time::fmt_ts(now + Duration::days(Timeframe::LOOKAHEAD_DAYS));
        let now_s = time::fmt_ts(now);
        let week_ahead = time::fmt_ts(now + Duration::days(7));

        let rows = self.tasks.list_due_between(owner_id, &lo, &hi)?;

        let total_tasks = rows.len() as u32;
        let completed_tasks =
            rows.iter().filter(|t| t.status == TaskStatus::Completed).count() as u32;
        let overdue_tasks = rows
            .iter()
            .filter(|t| t.status != TaskStatus::Completed && t.due_date < now_s)
            .count() as u32;

        let mut buckets = PriorityBuckets::default();
        for task in &rows {
            match task.priority {
                Priority::High => buckets.high += 1,
                Priority::Medium => buckets.medium += 1,
                Priority::Low => buckets.low += 1,
                Priority::Critical => {}
            }
        }

        let mut tasks_by_tag: BTreeMap<String, u32> = BTreeMap::new();
        for task in &rows {
            for tag in self.tags.for_task(&task.id)? {
                *tasks_by_tag.entry(tag.name).or_insert(0) += 1;
            }
        }

        let mut total_subtasks = 0u32;
        let mut completed_subtasks = 0u32;
        let mut upcoming = Vec::new();
        for task in &rows {
            let subs = self.subtasks.list_for_task(&task.id)?;
            let done = subs.iter().filter(|s| s.completed).count() as u32;
            total_subtasks += subs.len() as u32;
            completed_subtasks += done;

            if is_upcoming(task, &now_s, &week_ahead) {
                upcoming.push(UpcomingTask {
                    id: task.id.clone(),
                    title: task.title.clone(),
                    due_date: task.due_date.clone(),
                    priority: task.priority,
                    status: task.status,
                    subtask_count: subs.len() as u32,
                    completed_subtasks: done,
                });
            }
        }

        let completion_rate = rate(completed_tasks, total_tasks);
        let stats = WorkloadStats {
            total_tasks,
            completed_tasks,
            overdue_tasks,
            high_priority: buckets.high,
            medium_priority: buckets.medium,
            low_priority: buckets.low,
            upcoming_tasks: upcoming.len() as u32,
            completion_rate,
        };

        // Narrative is best-effort; the numbers above stand regardless.
        let insight = self.advisor.analyze_workload(&stats).await;

        Ok(WorkloadSummary {
            timeframe,
            overview: Overview {
                total_tasks,
                completed_tasks,
                overdue_tasks,
                completion_rate,
                upcoming_deadlines: upcoming.len() as u32,
            },
            tasks_by_priority: buckets,
            tasks_by_tag,
            subtasks: SubtaskOverview {
                total: total_subtasks,
                completed: completed_subtasks,
                completion_rate: rate(completed_subtasks, total_subtasks),
            },
            upcoming_tasks: upcoming,
            insight,
        })
    }
}

fn is_upcoming(task: &TaskRow, now: &str, week_ahead: &str) -> bool {
    task.status != TaskStatus::Completed
        && task.due_date.as_str() >= now
        && task.due_date.as_str() <= week_ahead
}

/// completed/total as a percentage, rounded to 2 decimals; 0 when empty.
fn rate(completed: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = f64::from(completed) / f64::from(total) * 100.0;
    (pct * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_advisor::{AdvisorGateway, MockAdvisor};
    use tracker_core::task::{Priority, TaskStatus};
    use tracker_store::tasks::NewTask;

    struct Fixture {
        analyzer: WorkloadAnalyzer,
        tasks: TaskRepo,
        subtasks: SubtaskRepo,
        tags: TagRepo,
        mock: Arc<MockAdvisor>,
        owner: UserId,
    }

    fn fixture() -> Fixture {
        let db = Database::in_memory().unwrap();
        let mock = Arc::new(MockAdvisor::new());
        let gateway = Arc::new(AdvisorGateway::with_defaults(mock.clone()));
        let users = UserRepo::new(db.clone());
        let owner = users.create("owner@example.com").unwrap().id;
        Fixture {
            analyzer: WorkloadAnalyzer::new(db.clone(), gateway),
            tasks: TaskRepo::new(db.clone()),
            subtasks: SubtaskRepo::new(db.clone()),
            tags: TagRepo::new(db),
            mock,
            owner,
        }
    }

    fn due_in(days: i64) -> String {
        time::fmt_ts(Utc::now() + Duration::days(days))
    }

    fn make_task(f: &Fixture, title: &str, due: String, priority: Priority) -> TaskRow {
        f.tasks
            .create(&NewTask {
                owner_id: f.owner.clone(),
                title: title.into(),
                due_date: due,
                priority,
                status: TaskStatus::Pending,
                ..Default::default()
            })
            .unwrap()
    }

    #[tokio::test]
    async fn empty_window_is_all_zeros() {
        let f = fixture();
        let summary = f.analyzer.analyze(&f.owner, Timeframe::Default).await.unwrap();
        assert_eq!(summary.overview.total_tasks, 0);
        assert_eq!(summary.overview.completion_rate, 0.0);
        assert_eq!(summary.subtasks.completion_rate, 0.0);
        assert!(summary.upcoming_tasks.is_empty());
        // Advisor had nothing queued: narrative degraded to the fallback.
        assert_eq!(summary.insight.analysis, "Error analyzing workload");
    }

    #[tokio::test]
    async fn unknown_owner_is_not_found() {
        let f = fixture();
        let result = f.analyzer.analyze(&UserId::from_raw("user_ghost"), Timeframe::Week).await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn all_completed_rate_is_exactly_100() {
        let f = fixture();
        for i in 0..3 {
            let t = make_task(&f, &format!("t{i}"), due_in(i + 1), Priority::Medium);
            f.tasks.set_status(&t.id, TaskStatus::Completed, None).unwrap();
        }
        let summary = f.analyzer.analyze(&f.owner, Timeframe::Default).await.unwrap();
        assert_eq!(summary.overview.total_tasks, 3);
        assert_eq!(summary.overview.completion_rate, 100.0);
        // Completed tasks are never "upcoming".
        assert_eq!(summary.overview.upcoming_deadlines, 0);
    }

    #[tokio::test]
    async fn rate_rounds_to_two_decimals() {
        let f = fixture();
        let done = make_task(&f, "done", due_in(1), Priority::Medium);
        f.tasks.set_status(&done.id, TaskStatus::Completed, None).unwrap();
        make_task(&f, "open1", due_in(2), Priority::Medium);
        make_task(&f, "open2", due_in(3), Priority::Medium);

        let summary = f.analyzer.analyze(&f.owner, Timeframe::Default).await.unwrap();
        assert_eq!(summary.overview.completion_rate, 33.33);
    }

    #[tokio::test]
    async fn overdue_and_upcoming_counting() {
        let f = fixture();
        make_task(&f, "overdue", due_in(-2), Priority::High);
        make_task(&f, "soon", due_in(3), Priority::Medium);
        make_task(&f, "later", due_in(20), Priority::Low);
        let done = make_task(&f, "done late", due_in(-1), Priority::Medium);
        f.tasks.set_status(&done.id, TaskStatus::Completed, None).unwrap();

        let summary = f.analyzer.analyze(&f.owner, Timeframe::Week).await.unwrap();
        assert_eq!(summary.overview.total_tasks, 4);
        // A completed task past its due date is not overdue.
        assert_eq!(summary.overview.overdue_tasks, 1);
        assert_eq!(summary.overview.upcoming_deadlines, 1);
        assert_eq!(summary.upcoming_tasks[0].title, "soon");
    }

    #[tokio::test]
    async fn window_excludes_out_of_range_and_trashed() {
        let f = fixture();
        make_task(&f, "inside", due_in(5), Priority::Medium);
        make_task(&f, "too far", due_in(60), Priority::Medium);
        make_task(&f, "long gone", due_in(-40), Priority::Medium);
        let trashed = make_task(&f, "trashed", due_in(5), Priority::Medium);
        f.tasks.soft_delete(&trashed.id).unwrap();

        let summary = f.analyzer.analyze(&f.owner, Timeframe::Default).await.unwrap();
        assert_eq!(summary.overview.total_tasks, 1);
    }

    #[tokio::test]
    async fn quarter_window_reaches_further_back() {
        let f = fixture();
        make_task(&f, "six weeks ago", due_in(-42), Priority::Medium);

        let fortnight = f.analyzer.analyze(&f.owner, Timeframe::Default).await.unwrap();
        assert_eq!(fortnight.overview.total_tasks, 0);

        let quarter = f.analyzer.analyze(&f.owner, Timeframe::Quarter).await.unwrap();
        assert_eq!(quarter.overview.total_tasks, 1);
    }

    #[tokio::test]
    async fn priority_buckets_skip_critical() {
        let f = fixture();
        make_task(&f, "h", due_in(1), Priority::High);
        make_task(&f, "m", due_in(2), Priority::Medium);
        make_task(&f, "l", due_in(3), Priority::Low);
        make_task(&f, "c", due_in(4), Priority::Critical);

        let summary = f.analyzer.analyze(&f.owner, Timeframe::Default).await.unwrap();
        assert_eq!(summary.overview.total_tasks, 4);
        assert_eq!(summary.tasks_by_priority.high, 1);
        assert_eq!(summary.tasks_by_priority.medium, 1);
        assert_eq!(summary.tasks_by_priority.low, 1);
    }

    #[tokio::test]
    async fn tag_grouping_counts_tasks() {
        let f = fixture();
        let a = make_task(&f, "a", due_in(1), Priority::Medium);
        let b = make_task(&f, "b", due_in(2), Priority::Medium);
        let work = f.tags.get_or_create("work").unwrap();
        let home = f.tags.get_or_create("home").unwrap();
        f.tags.attach(&a.id, &work.id).unwrap();
        f.tags.attach(&b.id, &work.id).unwrap();
        f.tags.attach(&b.id, &home.id).unwrap();

        let summary = f.analyzer.analyze(&f.owner, Timeframe::Default).await.unwrap();
        assert_eq!(summary.tasks_by_tag["work"], 2);
        assert_eq!(summary.tasks_by_tag["home"], 1);
    }

    #[tokio::test]
    async fn subtask_rates_and_upcoming_detail() {
        let f = fixture();
        let t = make_task(&f, "t", due_in(2), Priority::Medium);
        let s1 = f.subtasks.create(&t.id, "one").unwrap();
        f.subtasks.create(&t.id, "two").unwrap();
        f.subtasks.update(&s1.id, None, Some(true)).unwrap();

        let summary = f.analyzer.analyze(&f.owner, Timeframe::Default).await.unwrap();
        assert_eq!(summary.subtasks.total, 2);
        assert_eq!(summary.subtasks.completed, 1);
        assert_eq!(summary.subtasks.completion_rate, 50.0);
        assert_eq!(summary.upcoming_tasks[0].subtask_count, 2);
        assert_eq!(summary.upcoming_tasks[0].completed_subtasks, 1);
    }

    #[tokio::test]
    async fn narrative_merged_when_advisor_answers() {
        let f = fixture();
        make_task(&f, "t", due_in(2), Priority::Medium);
        f.mock.push_insight(Ok(WorkloadInsight {
            analysis: "light week".into(),
            recommendations: vec!["batch the small tasks".into()],
            overloaded_dates: vec![],
            estimated_total_hours: 4.5,
        }));

        let summary = f.analyzer.analyze(&f.owner, Timeframe::Week).await.unwrap();
        assert_eq!(summary.insight.analysis, "light week");
        assert_eq!(summary.insight.estimated_total_hours, 4.5);
    }
}
