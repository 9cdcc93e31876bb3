use std::time::{Duration, Instant};

use chrono::Utc;

use crate::check::StatusCheck;
use crate::error::SurgeError;
use crate::results::RequestResult;
use crate::scenario::model::RunSettings;

/// Issues single GET requests over a shared, pooled reqwest client and turns
/// every outcome, including transport failures, into a [`RequestResult`].
#[derive(Clone)]
pub struct HttpExecutor {
    inner: reqwest::Client,
    check: StatusCheck,
    timeout: Duration,
}

/// Builder for [`HttpExecutor`].
pub struct HttpExecutorBuilder {
    timeout: Duration,
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Duration,
    user_agent: String,
    check: StatusCheck,
}

impl Default for HttpExecutorBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 100,
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: format!("surge/{}", env!("CARGO_PKG_VERSION")),
            check: StatusCheck::default(),
        }
    }
}

impl HttpExecutorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preloaded from a scenario's settings and status check.
    pub fn from_settings(settings: &RunSettings, check: &StatusCheck) -> Self {
        Self::new()
            .timeout(settings.request_timeout)
            .pool_max_idle_per_host(settings.pool_max_idle_per_host)
            .user_agent(settings.user_agent.clone())
            .check(check.clone())
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn pool_max_idle_per_host(mut self, n: usize) -> Self {
        self.pool_max_idle_per_host = n;
        self
    }

    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn check(mut self, check: StatusCheck) -> Self {
        self.check = check;
        self
    }

    pub fn build(self) -> Result<HttpExecutor, SurgeError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_idle_timeout(self.pool_idle_timeout)
            .user_agent(self.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(HttpExecutor {
            inner: client,
            check: self.check,
            timeout: self.timeout,
        })
    }
}

impl HttpExecutor {
    /// Returns a builder for customising the executor.
    pub fn builder() -> HttpExecutorBuilder {
        HttpExecutorBuilder::new()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one GET request to `url` and describe what happened.
    ///
    /// Never returns an error: timeouts, refused connections, DNS failures
    /// and body read errors all produce a failed result with status 0.
    pub async fn execute(&self, url: &str) -> RequestResult {
        let timestamp = Utc::now();
        let start = Instant::now();

        let response = match self.inner.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                return RequestResult::failed(0, timestamp, start.elapsed(), self.describe(&e));
            }
        };

        let status_code = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                return RequestResult::failed(0, timestamp, start.elapsed(), self.describe(&e));
            }
        };
        let latency = start.elapsed();

        RequestResult {
            user_id: 0,
            timestamp,
            latency,
            status_code,
            success: self.check.matches(status_code),
            size_bytes: body.len() as u64,
            error: None,
        }
    }

    fn describe(&self, err: &reqwest::Error) -> String {
        if err.is_timeout() {
            format!("Request timed out after {:?}", self.timeout)
        } else if err.is_connect() {
            format!("Connection error: {err}")
        } else if err.is_body() || err.is_decode() {
            format!("Error reading response body: {err}")
        } else {
            format!("Network error: {err}")
        }
    }
}
