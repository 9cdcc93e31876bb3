use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::engine::aggregator::{AggregatorSnapshot, MetricsAggregator};
use crate::engine::scheduler::RampScheduler;
use crate::engine::virtual_user::{HttpGetIteration, Iteration, ThinkTime, VirtualUserPool};
use crate::engine::EngineStatus;
use crate::error::SurgeError;
use crate::http::HttpExecutorBuilder;
use crate::results::RunSummary;
use crate::scenario::model::ScenarioConfig;
use crate::scenario::validation::ensure_valid;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// An event emitted by the engine during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Engine lifecycle status changed.
    StatusChange { status: EngineStatus },

    /// Snapshot taken on every scheduler tick.
    Progress {
        elapsed_ms: u64,
        stage: Option<usize>,
        target_users: u32,
        active_users: u32,
        completed_requests: u64,
        total_errors: u64,
        current_rps: f64,
        mean_ms: f64,
        p95_ms: f64,
    },

    /// Run finished; the final summary is attached.
    Complete { summary: RunSummary },
}

/// Configuration passed to [`run_test`].
pub struct EngineConfig {
    pub scenario: ScenarioConfig,
    /// Optional channel receiving [`EngineEvent`]s.
    pub event_tx: Option<mpsc::Sender<EngineEvent>>,
    /// Replaces the default GET iteration when set.
    pub iteration: Option<Arc<dyn Iteration>>,
}

impl EngineConfig {
    pub fn new(scenario: ScenarioConfig) -> Self {
        Self {
            scenario,
            event_tx: None,
            iteration: None,
        }
    }
}

/// A handle to a run executing on a background task.
pub struct EngineHandle {
    /// Cancel token; `.cancel()` forces the run into draining.
    pub cancel_token: CancellationToken,
    status: Arc<RwLock<EngineStatus>>,
    aggregator: Arc<MetricsAggregator>,
    task: JoinHandle<Result<RunSummary, SurgeError>>,
}

impl EngineHandle {
    pub fn run_id(&self) -> Uuid {
        self.aggregator.run_id()
    }

    /// Ask the run to stop. In-flight requests still complete.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    pub async fn status(&self) -> EngineStatus {
        self.status.read().await.clone()
    }

    /// Live statistics of the run so far.
    pub async fn snapshot(&self) -> AggregatorSnapshot {
        self.aggregator.snapshot().await
    }

    /// Wait for the run to finish and return its summary.
    pub async fn wait(self) -> Result<RunSummary, SurgeError> {
        self.task
            .await
            .map_err(|e| SurgeError::Internal(format!("engine task failed: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Validate the scenario and start the run on a background Tokio task.
///
/// Configuration errors are returned before any request is sent.
pub async fn run_test(config: EngineConfig) -> Result<EngineHandle, SurgeError> {
    let mut orchestrator = match config.iteration {
        Some(iteration) => Orchestrator::with_iteration(config.scenario, iteration)?,
        None => Orchestrator::new(config.scenario)?,
    };
    if let Some(tx) = config.event_tx {
        orchestrator = orchestrator.with_events(tx);
    }

    let cancel_token = CancellationToken::new();
    let status = orchestrator.status_handle();
    let aggregator = orchestrator.aggregator();
    let run_cancel = cancel_token.clone();
    let task = tokio::spawn(async move { orchestrator.run(run_cancel).await });

    Ok(EngineHandle {
        cancel_token,
        status,
        aggregator,
        task,
    })
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives one run through `Idle -> Running -> Draining -> Done`.
pub struct Orchestrator {
    scenario: Arc<ScenarioConfig>,
    scheduler: RampScheduler,
    iteration: Arc<dyn Iteration>,
    aggregator: Arc<MetricsAggregator>,
    status: Arc<RwLock<EngineStatus>>,
    events: Option<mpsc::Sender<EngineEvent>>,
}

impl Orchestrator {
    /// Validate `scenario` and prepare a run issuing GET requests.
    pub fn new(scenario: ScenarioConfig) -> Result<Self, SurgeError> {
        ensure_valid(&scenario)?;
        let executor = HttpExecutorBuilder::from_settings(&scenario.settings, &scenario.check)
            .build()?;
        let iteration = Arc::new(HttpGetIteration::new(executor, scenario.url.clone()));
        Self::with_iteration(scenario, iteration)
    }

    /// Validate `scenario` and prepare a run using a custom iteration.
    pub fn with_iteration(
        scenario: ScenarioConfig,
        iteration: Arc<dyn Iteration>,
    ) -> Result<Self, SurgeError> {
        ensure_valid(&scenario)?;
        let scheduler =
            RampScheduler::new(scenario.stages.clone(), scenario.settings.start_target);
        let aggregator = Arc::new(MetricsAggregator::new(
            Uuid::new_v4(),
            scenario.name.clone(),
            scenario.url.clone(),
        ));
        Ok(Self {
            scenario: Arc::new(scenario),
            scheduler,
            iteration,
            aggregator,
            status: Arc::new(RwLock::new(EngineStatus::Idle)),
            events: None,
        })
    }

    pub fn with_events(mut self, tx: mpsc::Sender<EngineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn status_handle(&self) -> Arc<RwLock<EngineStatus>> {
        Arc::clone(&self.status)
    }

    pub fn aggregator(&self) -> Arc<MetricsAggregator> {
        Arc::clone(&self.aggregator)
    }

    /// Execute the run to completion.
    ///
    /// `cancel` forces an early transition to draining; the summary then
    /// covers everything recorded up to that point.
    pub async fn run(self, cancel: CancellationToken) -> Result<RunSummary, SurgeError> {
        let settings = &self.scenario.settings;
        let mut pool = VirtualUserPool::new(
            Arc::clone(&self.iteration),
            Arc::clone(&self.aggregator),
            ThinkTime::new(settings.think_time, settings.think_time_jitter),
            cancel.child_token(),
        );

        if cancel.is_cancelled() {
            tracing::info!("stop requested before start, no virtual users spawned");
        } else {
            self.drive(&mut pool, &cancel).await;
        }

        self.transition(EngineStatus::Draining).await;
        tracing::info!(active = pool.active_count(), "draining virtual users");
        let drained = pool.drain().await;
        self.aggregator.observe_virtual_users(pool.peak_active());
        if let Err(e) = drained {
            tracing::error!("run aborted: {e}");
            self.transition(EngineStatus::Error).await;
            return Err(e);
        }

        self.transition(EngineStatus::Done).await;
        let summary = self.aggregator.summarize().await;
        tracing::info!(
            total = summary.total_requests,
            failed = summary.failed_requests,
            p99_ms = summary.p99_ms,
            "run complete"
        );
        if let Some(tx) = &self.events {
            let _ = tx
                .send(EngineEvent::Complete {
                    summary: summary.clone(),
                })
                .await;
        }
        Ok(summary)
    }

    /// The Running phase: follow the scheduler until the timeline ends, the
    /// run is cancelled or a virtual user fails.
    async fn drive(&self, pool: &mut VirtualUserPool, cancel: &CancellationToken) {
        self.aggregator.mark_started().await;
        self.transition(EngineStatus::Running).await;
        tracing::info!(
            run_id = %self.aggregator.run_id(),
            scenario = %self.scenario.name,
            url = %self.scenario.url,
            stages = self.scenario.stages.len(),
            duration = ?self.scheduler.total_duration(),
            "run started"
        );

        let start = Instant::now();
        let end = start + self.scheduler.total_duration();
        let mut ticker = interval(self.scenario.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("stop requested, draining virtual users");
                    break;
                }
                _ = sleep_until(end) => break,
                _ = ticker.tick() => {}
            }

            let elapsed = start.elapsed();
            if self.scheduler.is_finished(elapsed) {
                break;
            }
            let target = self.scheduler.target_at(elapsed);
            pool.set_target(target);
            if let Err(e) = pool.check_health() {
                tracing::error!("{e}, aborting run");
                break;
            }
            self.aggregator.observe_virtual_users(pool.active_count());
            self.emit_progress(elapsed, target, pool.active_count()).await;
        }
    }

    async fn transition(&self, next: EngineStatus) {
        {
            let mut s = self.status.write().await;
            let previous = std::mem::replace(&mut *s, next.clone());
            tracing::debug!(from = %previous, to = %next, "engine status change");
        }
        if let Some(tx) = &self.events {
            let _ = tx.send(EngineEvent::StatusChange { status: next }).await;
        }
    }

    async fn emit_progress(&self, elapsed: Duration, target: u32, active: u32) {
        let Some(tx) = &self.events else {
            return;
        };
        let snap = self.aggregator.snapshot().await;
        let _ = tx
            .send(EngineEvent::Progress {
                elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                stage: self.scheduler.stage_index(elapsed),
                target_users: target,
                active_users: active,
                completed_requests: snap.total_requests,
                total_errors: snap.total_errors,
                current_rps: snap.current_rps,
                mean_ms: snap.mean_ms,
                p95_ms: snap.p95_ms,
            })
            .await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
