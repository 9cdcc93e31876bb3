use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::check::StatusCheck;
use crate::scenario::duration::serde_str;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One ramp interval: over `duration`, concurrency moves linearly from the
/// previous stage's target to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Stage {
    #[serde(with = "serde_str")]
    pub duration: Duration,
    pub target: u32,
}

impl Stage {
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }

    /// Parse the CLI form `<duration>:<target>`, e.g. `30s:5000`.
    pub fn parse(s: &str) -> Option<Self> {
        let (duration, target) = s.trim().rsplit_once(':')?;
        Some(Self {
            duration: crate::scenario::duration::parse_duration(duration)?,
            target: target.trim().parse().ok()?,
        })
    }
}

// ---------------------------------------------------------------------------
// RunSettings
// ---------------------------------------------------------------------------

/// Engine tuning knobs. Every field has a default so scenario files only
/// need to name what they change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct RunSettings {
    /// Idle delay between two iterations of the same virtual user.
    #[serde(with = "serde_str")]
    pub think_time: Duration,
    /// Upper bound of a random extra delay added to each think time.
    #[serde(with = "serde_str")]
    pub think_time_jitter: Duration,
    /// Per-request timeout covering connect, send and body receipt.
    #[serde(with = "serde_str")]
    pub request_timeout: Duration,
    /// Interval at which the scheduler is sampled and the pool resized.
    #[serde(with = "serde_str")]
    pub tick_interval: Duration,
    /// Concurrency the first stage ramps from.
    pub start_target: u32,
    pub user_agent: String,
    pub pool_max_idle_per_host: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            think_time: Duration::from_secs(1),
            think_time_jitter: Duration::ZERO,
            request_timeout: Duration::from_secs(30),
            tick_interval: Duration::from_secs(1),
            start_target: 0,
            user_agent: format!("surge/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// ScenarioConfig
// ---------------------------------------------------------------------------

/// A complete, static description of one load test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScenarioConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Target of every GET request.
    pub url: String,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub check: StatusCheck,
    #[serde(default)]
    pub settings: RunSettings,
}

fn default_name() -> String {
    "default".to_string()
}

impl ScenarioConfig {
    pub fn new(url: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self {
            name: default_name(),
            url: url.into(),
            stages,
            check: StatusCheck::default(),
            settings: RunSettings::default(),
        }
    }

    /// Sum of all stage durations.
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// Highest concurrency any stage asks for.
    pub fn peak_target(&self) -> u32 {
        self.stages
            .iter()
            .map(|s| s.target)
            .chain(std::iter::once(self.settings.start_target))
            .max()
            .unwrap_or(0)
    }

    /// The healthcheck scenario used by `surge init`: ramp to 5000 users,
    /// then to 10000, then back down, 30 seconds each.
    pub fn healthcheck_template() -> Self {
        let mut config = Self::new(
            "http://localhost:8080/",
            vec![
                Stage::new(Duration::from_secs(30), 5000),
                Stage::new(Duration::from_secs(30), 10000),
                Stage::new(Duration::from_secs(30), 0),
            ],
        );
        config.name = "healthcheck".to_string();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_parse_cli_form() {
        let stage = Stage::parse("30s:5000").expect("should parse");
        assert_eq!(stage, Stage::new(Duration::from_secs(30), 5000));
        let stage = Stage::parse("1.5m:10").expect("should parse");
        assert_eq!(stage.duration, Duration::from_secs(90));
    }

    #[test]
    fn stage_parse_rejects_malformed() {
        assert!(Stage::parse("30s").is_none());
        assert!(Stage::parse("30s:-1").is_none());
        assert!(Stage::parse("later:10").is_none());
        assert!(Stage::parse("1e30s:5").is_none());
    }

    #[test]
    fn oversized_stage_duration_is_a_parse_error() {
        let json = r#"{"url":"http://x/","stages":[{"duration":"99999999999999999999999h","target":5}]}"#;
        let err = serde_json::from_str::<ScenarioConfig>(json).unwrap_err();
        assert!(err.to_string().contains("invalid duration"));
    }

    #[test]
    fn minimal_json_gets_defaults() {
        let json = r#"{"url":"http://localhost:8080/","stages":[{"duration":"30s","target":5}]}"#;
        let config: ScenarioConfig = serde_json::from_str(json).expect("should parse");
        assert_eq!(config.name, "default");
        assert_eq!(config.check, StatusCheck::Equals { expected: 200 });
        assert_eq!(config.settings.think_time, Duration::from_secs(1));
        assert_eq!(config.settings.request_timeout, Duration::from_secs(30));
        assert_eq!(config.settings.tick_interval, Duration::from_secs(1));
        assert!(config.settings.user_agent.starts_with("surge/"));
    }

    #[test]
    fn partial_settings_keep_other_defaults() {
        let json = r#"{"url":"http://x/","settings":{"think_time":"250ms"}}"#;
        let config: ScenarioConfig = serde_json::from_str(json).expect("should parse");
        assert_eq!(config.settings.think_time, Duration::from_millis(250));
        assert_eq!(config.settings.request_timeout, Duration::from_secs(30));
        assert!(config.stages.is_empty());
    }

    #[test]
    fn total_duration_and_peak_target() {
        let config = ScenarioConfig::healthcheck_template();
        assert_eq!(config.total_duration(), Duration::from_secs(90));
        assert_eq!(config.peak_target(), 10000);
    }

    #[test]
    fn peak_target_of_empty_stages_is_start_target() {
        let mut config = ScenarioConfig::new("http://x/", Vec::new());
        assert_eq!(config.peak_target(), 0);
        config.settings.start_target = 3;
        assert_eq!(config.peak_target(), 3);
    }
}
