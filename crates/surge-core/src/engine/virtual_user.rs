use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::engine::aggregator::MetricsAggregator;
use crate::error::SurgeError;
use crate::http::HttpExecutor;
use crate::results::RequestResult;

// ---------------------------------------------------------------------------
// Iteration strategy
// ---------------------------------------------------------------------------

/// The work one virtual user performs per loop iteration.
#[async_trait]
pub trait Iteration: Send + Sync + 'static {
    async fn run(&self, user_id: u32) -> RequestResult;
}

/// Default iteration: a single GET against the scenario URL.
pub struct HttpGetIteration {
    executor: HttpExecutor,
    url: String,
}

impl HttpGetIteration {
    pub fn new(executor: HttpExecutor, url: impl Into<String>) -> Self {
        Self {
            executor,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Iteration for HttpGetIteration {
    async fn run(&self, user_id: u32) -> RequestResult {
        let mut result = self.executor.execute(&self.url).await;
        result.user_id = user_id;
        result
    }
}

// ---------------------------------------------------------------------------
// Think time
// ---------------------------------------------------------------------------

/// Idle delay between iterations, optionally with uniform random jitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThinkTime {
    pub base: Duration,
    pub jitter: Duration,
}

impl ThinkTime {
    pub fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    pub fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        let max = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = rand::thread_rng().gen_range(0..=max);
        self.base.saturating_add(Duration::from_millis(extra))
    }
}

// ---------------------------------------------------------------------------
// Virtual user loop
// ---------------------------------------------------------------------------

/// Run one virtual user until `stop` fires.
///
/// The stop signal is checked before every iteration and interrupts the
/// think-time sleep, but an iteration that has started always completes and
/// its result is recorded.
pub async fn run_virtual_user(
    user_id: u32,
    iteration: Arc<dyn Iteration>,
    aggregator: Arc<MetricsAggregator>,
    think_time: ThinkTime,
    stop: CancellationToken,
) {
    loop {
        if stop.is_cancelled() {
            return;
        }

        let result = iteration.run(user_id).await;
        aggregator.record(result).await;

        let pause = think_time.next_delay();
        if pause.is_zero() {
            tokio::task::yield_now().await;
            continue;
        }
        tokio::select! {
            _ = sleep(pause) => {}
            _ = stop.cancelled() => return,
        }
    }
}

// ---------------------------------------------------------------------------
// VirtualUserPool
// ---------------------------------------------------------------------------

struct VuSlot {
    user_id: u32,
    task_id: Id,
    stop: CancellationToken,
}

/// Spawns and retires virtual users to follow a target count.
pub struct VirtualUserPool {
    iteration: Arc<dyn Iteration>,
    aggregator: Arc<MetricsAggregator>,
    think_time: ThinkTime,
    run_token: CancellationToken,
    /// Users that have not been asked to stop, oldest first.
    live: Vec<VuSlot>,
    tasks: JoinSet<()>,
    next_user_id: u32,
    active: Arc<AtomicU32>,
    peak_active: u32,
    spawned_total: u64,
    stop_signals_total: u64,
    panicked: u64,
}

impl VirtualUserPool {
    /// Every user's stop token is a child of `run_token`, so cancelling the
    /// run reaches all of them at once.
    pub fn new(
        iteration: Arc<dyn Iteration>,
        aggregator: Arc<MetricsAggregator>,
        think_time: ThinkTime,
        run_token: CancellationToken,
    ) -> Self {
        Self {
            iteration,
            aggregator,
            think_time,
            run_token,
            live: Vec::new(),
            tasks: JoinSet::new(),
            next_user_id: 0,
            active: Arc::new(AtomicU32::new(0)),
            peak_active: 0,
            spawned_total: 0,
            stop_signals_total: 0,
            panicked: 0,
        }
    }

    /// Converge toward `target` live users.
    ///
    /// Missing users are spawned immediately; excess users (newest first) are
    /// told to stop after their current iteration.
    pub fn set_target(&mut self, target: u32) {
        self.reap_finished();

        let target = target as usize;
        let live = self.live.len();
        if live < target {
            for _ in live..target {
                self.spawn_user();
            }
            tracing::debug!(from = live, to = target, "scaled virtual users up");
        } else if live > target {
            for slot in self.live.drain(target..) {
                slot.stop.cancel();
                self.stop_signals_total += 1;
                tracing::trace!(user_id = slot.user_id, "virtual user signalled to stop");
            }
            tracing::debug!(from = live, to = target, "scaled virtual users down");
        }

        self.peak_active = self.peak_active.max(self.active_count());
    }

    /// Stop every user and wait until all of them have exited.
    pub async fn drain(&mut self) -> Result<(), SurgeError> {
        self.set_target(0);
        while let Some(joined) = self.tasks.join_next_with_id().await {
            self.note_exit(joined);
        }
        self.check_health()
    }

    /// Collect users that have exited since the last call and fail if any
    /// of them panicked.
    pub fn check_health(&mut self) -> Result<(), SurgeError> {
        self.reap_finished();
        if self.panicked > 0 {
            return Err(SurgeError::Internal(format!(
                "{} virtual user task(s) panicked",
                self.panicked
            )));
        }
        Ok(())
    }

    /// Users that are running and have not been asked to stop.
    pub fn live_count(&self) -> u32 {
        self.live.len() as u32
    }

    /// User tasks still running, including those finishing a last iteration.
    pub fn active_count(&self) -> u32 {
        self.active.load(Ordering::Relaxed)
    }

    /// Shared counter behind [`active_count`](Self::active_count).
    pub fn active_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.active)
    }

    pub fn peak_active(&self) -> u32 {
        self.peak_active
    }

    pub fn spawned_total(&self) -> u64 {
        self.spawned_total
    }

    pub fn stop_signals_total(&self) -> u64 {
        self.stop_signals_total
    }

    fn spawn_user(&mut self) {
        let user_id = self.next_user_id;
        self.next_user_id = self.next_user_id.wrapping_add(1);
        let stop = self.run_token.child_token();

        let iteration = Arc::clone(&self.iteration);
        let aggregator = Arc::clone(&self.aggregator);
        let active = Arc::clone(&self.active);
        let think_time = self.think_time;
        let user_stop = stop.clone();

        active.fetch_add(1, Ordering::Relaxed);
        let handle = self.tasks.spawn(async move {
            let _guard = ActiveGuard(active);
            run_virtual_user(user_id, iteration, aggregator, think_time, user_stop).await;
        });

        self.live.push(VuSlot {
            user_id,
            task_id: handle.id(),
            stop,
        });
        self.spawned_total += 1;
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.tasks.try_join_next_with_id() {
            self.note_exit(joined);
        }
    }

    /// A user that exits on its own (only possible by panicking) must not
    /// keep counting as live.
    fn note_exit(&mut self, joined: Result<(Id, ()), JoinError>) {
        let task_id = match joined {
            Ok((id, ())) => id,
            Err(e) => {
                if e.is_panic() {
                    self.panicked += 1;
                    tracing::error!("virtual user task panicked: {e}");
                }
                e.id()
            }
        };
        self.live.retain(|slot| slot.task_id != task_id);
    }
}

/// Decrements the active counter when a user task ends, panicking or not.
struct ActiveGuard(Arc<AtomicU32>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
