use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::results::{RequestResult, RunSummary, TimeBucketEntry};

/// Latencies above one hour are clamped into the top bucket.
const HISTOGRAM_MAX_MICROS: u64 = 3_600_000_000;
const HISTOGRAM_SIGFIG: u8 = 3;

// ---------------------------------------------------------------------------
// BucketStats: per-second statistics window
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct BucketStats {
    requests: u64,
    errors: u64,
    sum_us: u64,
    min_us: u64,
    max_us: u64,
}

impl BucketStats {
    fn empty() -> Self {
        Self {
            requests: 0,
            errors: 0,
            sum_us: 0,
            min_us: u64::MAX,
            max_us: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// AggregatorSnapshot: lightweight read for progress events
// ---------------------------------------------------------------------------

/// A point-in-time view of the aggregator, cheap enough to take every tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AggregatorSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub mean_ms: f64,
    pub p95_ms: f64,
    pub current_rps: f64,
    pub elapsed_ms: u64,
}

// ---------------------------------------------------------------------------
// State behind the lock
// ---------------------------------------------------------------------------

struct AggregatorState {
    total_requests: u64,
    total_errors: u64,
    latencies: Histogram<u64>,
    min_us: u64,
    max_us: u64,
    sum_us: u64,
    total_bytes: u64,
    status_codes: HashMap<u16, u64>,
    /// Per-second buckets keyed by seconds since the run clock started.
    time_buckets: BTreeMap<u64, BucketStats>,
    start_time: Instant,
    started_at: DateTime<Utc>,
}

impl AggregatorState {
    fn new() -> Self {
        Self {
            total_requests: 0,
            total_errors: 0,
            latencies: Histogram::new_with_bounds(1, HISTOGRAM_MAX_MICROS, HISTOGRAM_SIGFIG)
                .expect("constant histogram bounds are valid"),
            min_us: u64::MAX,
            max_us: 0,
            sum_us: 0,
            total_bytes: 0,
            status_codes: HashMap::new(),
            time_buckets: BTreeMap::new(),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    fn apply(&mut self, result: &RequestResult) {
        let bucket_key = self.start_time.elapsed().as_secs();
        let micros = u64::try_from(result.latency.as_micros()).unwrap_or(u64::MAX);

        self.total_requests += 1;
        if !result.success {
            self.total_errors += 1;
        }
        self.latencies.saturating_record(micros.max(1));
        self.sum_us = self.sum_us.saturating_add(micros);
        self.min_us = self.min_us.min(micros);
        self.max_us = self.max_us.max(micros);
        self.total_bytes += result.size_bytes;
        *self.status_codes.entry(result.status_code).or_insert(0) += 1;

        let bucket = self
            .time_buckets
            .entry(bucket_key)
            .or_insert_with(BucketStats::empty);
        bucket.requests += 1;
        if !result.success {
            bucket.errors += 1;
        }
        bucket.sum_us = bucket.sum_us.saturating_add(micros);
        bucket.min_us = bucket.min_us.min(micros);
        bucket.max_us = bucket.max_us.max(micros);
    }

    fn percentile_ms(&self, p: f64) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        micros_to_ms(self.latencies.value_at_quantile(p / 100.0))
    }

    fn mean_ms(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.sum_us as f64 / self.total_requests as f64 / 1000.0
    }

    fn time_series(&self) -> Vec<TimeBucketEntry> {
        self.time_buckets
            .iter()
            .map(|(&second, bucket)| TimeBucketEntry {
                second,
                requests: bucket.requests,
                errors: bucket.errors,
                avg_ms: if bucket.requests > 0 {
                    bucket.sum_us as f64 / bucket.requests as f64 / 1000.0
                } else {
                    0.0
                },
                min_ms: if bucket.min_us == u64::MAX {
                    0.0
                } else {
                    micros_to_ms(bucket.min_us)
                },
                max_ms: micros_to_ms(bucket.max_us),
            })
            .collect()
    }
}

fn micros_to_ms(us: u64) -> f64 {
    us as f64 / 1000.0
}

// ---------------------------------------------------------------------------
// MetricsAggregator
// ---------------------------------------------------------------------------

/// Collects every [`RequestResult`] of a run into summary statistics.
///
/// Shared behind an `Arc` by all virtual users. Each `record` call is applied
/// in full under a single lock, so `summarize` never observes a partial update.
pub struct MetricsAggregator {
    run_id: Uuid,
    scenario_name: String,
    url: String,
    peak_virtual_users: AtomicU32,
    state: Mutex<AggregatorState>,
}

impl MetricsAggregator {
    /// Create an aggregator. The run clock starts now and is restarted by
    /// [`mark_started`](Self::mark_started).
    pub fn new(run_id: Uuid, scenario_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            run_id,
            scenario_name: scenario_name.into(),
            url: url.into(),
            peak_virtual_users: AtomicU32::new(0),
            state: Mutex::new(AggregatorState::new()),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Restart the run clock. Called when the run actually begins, so time
    /// spent between construction and the first tick is not counted.
    pub async fn mark_started(&self) {
        let mut state = self.state.lock().await;
        state.start_time = Instant::now();
        state.started_at = Utc::now();
    }

    /// Record the result of a single completed request.
    pub async fn record(&self, result: RequestResult) {
        self.state.lock().await.apply(&result);
    }

    /// Remember the number of running virtual users if it is a new peak.
    pub fn observe_virtual_users(&self, active: u32) {
        self.peak_virtual_users.fetch_max(active, Ordering::Relaxed);
    }

    /// Build a [`RunSummary`] from everything recorded so far.
    ///
    /// With no results recorded every count and latency is zero.
    pub async fn summarize(&self) -> RunSummary {
        let state = self.state.lock().await;
        let finished_at = Utc::now();
        let elapsed = state.start_time.elapsed();
        let total = state.total_requests;
        let failed = state.total_errors;

        let error_rate = if total > 0 {
            failed as f64 / total as f64
        } else {
            0.0
        };
        let elapsed_secs = elapsed.as_secs_f64();
        let rps = if elapsed_secs > 0.0 {
            total as f64 / elapsed_secs
        } else {
            0.0
        };

        RunSummary {
            run_id: self.run_id,
            scenario_name: self.scenario_name.clone(),
            url: self.url.clone(),
            started_at: state.started_at,
            finished_at,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            total_requests: total,
            successful_requests: total.saturating_sub(failed),
            failed_requests: failed,
            error_rate,
            min_ms: if state.min_us == u64::MAX {
                0.0
            } else {
                micros_to_ms(state.min_us)
            },
            mean_ms: state.mean_ms(),
            max_ms: micros_to_ms(state.max_us),
            p50_ms: state.percentile_ms(50.0),
            p90_ms: state.percentile_ms(90.0),
            p95_ms: state.percentile_ms(95.0),
            p99_ms: state.percentile_ms(99.0),
            requests_per_second: rps,
            total_bytes_received: state.total_bytes,
            peak_virtual_users: self.peak_virtual_users.load(Ordering::Relaxed),
            status_codes: state.status_codes.iter().map(|(&k, &v)| (k, v)).collect(),
            time_series: state.time_series(),
        }
    }

    /// Return a lightweight snapshot suitable for progress events.
    pub async fn snapshot(&self) -> AggregatorSnapshot {
        let state = self.state.lock().await;
        let elapsed = state.start_time.elapsed();
        let elapsed_secs = elapsed.as_secs_f64();
        AggregatorSnapshot {
            total_requests: state.total_requests,
            total_errors: state.total_errors,
            mean_ms: state.mean_ms(),
            p95_ms: state.percentile_ms(95.0),
            current_rps: if elapsed_secs < 0.001 {
                0.0
            } else {
                state.total_requests as f64 / elapsed_secs
            },
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
