use serde::{Deserialize, Serialize};

pub mod aggregator;
pub mod orchestrator;
pub mod scheduler;
pub mod virtual_user;

pub use aggregator::{AggregatorSnapshot, MetricsAggregator};
pub use orchestrator::{run_test, EngineConfig, EngineEvent, EngineHandle, Orchestrator};
pub use scheduler::RampScheduler;
pub use virtual_user::{HttpGetIteration, Iteration, ThinkTime, VirtualUserPool};

/// Lifecycle of a run: `Idle -> Running -> Draining -> Done`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// Run is configured but has not started.
    #[default]
    Idle,
    /// Scheduler is ticking and the pool follows its target.
    Running,
    /// Target is 0; waiting for every virtual user to finish.
    Draining,
    /// All users stopped and the summary has been produced.
    Done,
    /// The run hit an internal error.
    Error,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EngineStatus::Idle => "idle",
            EngineStatus::Running => "running",
            EngineStatus::Draining => "draining",
            EngineStatus::Done => "done",
            EngineStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}
