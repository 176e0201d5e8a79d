pub mod error;
pub mod lifecycle;
pub mod subtasks;
pub mod tasks;
pub mod workload;

pub use error::EngineError;
pub use lifecycle::{LifecycleEngine, TaskDetail};
pub use workload::{WorkloadAnalyzer, WorkloadSummary};
