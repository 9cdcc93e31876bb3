pub mod export;

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one completed HTTP request.
///
/// Created by the executor and handed to the aggregator; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RequestResult {
    pub user_id: u32,
    pub timestamp: DateTime<Utc>,
    /// Time from just before sending until the body was fully received.
    pub latency: Duration,
    /// HTTP status, or 0 when no response was received.
    pub status_code: u16,
    /// Whether the status satisfied the scenario's check.
    pub success: bool,
    pub size_bytes: u64,
    /// Transport-level failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestResult {
    /// A result for a request that never produced a response.
    pub fn failed(user_id: u32, timestamp: DateTime<Utc>, latency: Duration, error: String) -> Self {
        Self {
            user_id,
            timestamp,
            latency,
            status_code: 0,
            success: false,
            size_bytes: 0,
            error: Some(error),
        }
    }
}

/// A single per-second time-series entry suitable for charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TimeBucketEntry {
    pub second: u64,
    pub requests: u64,
    pub errors: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Aggregated report of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub scenario_name: String,
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration of the run (ms).
    pub duration_ms: u64,
    pub total_requests: u64,
    /// Requests whose status satisfied the check.
    pub successful_requests: u64,
    /// Transport failures plus non-matching statuses.
    pub failed_requests: u64,
    /// `failed_requests / total_requests`, 0 when nothing was sent.
    pub error_rate: f64,
    pub min_ms: f64,
    pub mean_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub requests_per_second: f64,
    pub total_bytes_received: u64,
    /// Highest number of simultaneously running virtual users.
    pub peak_virtual_users: u32,
    /// Response count per status code; 0 collects transport failures.
    pub status_codes: BTreeMap<u16, u64>,
    pub time_series: Vec<TimeBucketEntry>,
}

impl RunSummary {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}
