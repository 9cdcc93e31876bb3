use std::time::Duration;

use crate::error::SurgeError;
use crate::scenario::model::{RunSettings, ScenarioConfig};

/// Validate a [`ScenarioConfig`] and return a list of configuration errors.
///
/// An empty `Vec` means the scenario can be run.
pub fn validate_scenario(config: &ScenarioConfig) -> Vec<SurgeError> {
    let mut errors = Vec::new();

    if config.name.trim().is_empty() {
        errors.push(SurgeError::Config(
            "Scenario name must not be empty".to_string(),
        ));
    }

    if let Some(err) = validate_url(&config.url) {
        errors.push(err);
    }

    if config.stages.is_empty() {
        errors.push(SurgeError::Config(
            "Scenario must define at least one stage".to_string(),
        ));
    } else if config.total_duration().is_zero() {
        errors.push(SurgeError::Config(
            "Stages must add up to a non-zero duration".to_string(),
        ));
    }

    if let Some(problem) = config.check.problem() {
        errors.push(SurgeError::Config(format!("Status check: {problem}")));
    }

    errors.extend(validate_settings(&config.settings));
    errors
}

/// Validate and collapse all problems into a single error.
pub fn ensure_valid(config: &ScenarioConfig) -> Result<(), SurgeError> {
    let errors = validate_scenario(config);
    if errors.is_empty() {
        return Ok(());
    }
    let joined = errors
        .iter()
        .map(|e| match e {
            SurgeError::Config(msg) => msg.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ");
    Err(SurgeError::Config(joined))
}

fn validate_url(raw: &str) -> Option<SurgeError> {
    let url = match reqwest::Url::parse(raw.trim()) {
        Ok(url) => url,
        Err(e) => {
            return Some(SurgeError::Config(format!(
                "URL '{raw}' is malformed: {e}"
            )))
        }
    };
    if url.scheme() != "http" && url.scheme() != "https" {
        return Some(SurgeError::Config(format!(
            "URL must start with http:// or https:// (got: {raw})"
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Some(SurgeError::Config(format!("URL '{raw}' has no host")));
    }
    None
}

fn validate_settings(settings: &RunSettings) -> Vec<SurgeError> {
    let mut errors = Vec::new();

    if settings.request_timeout.is_zero() {
        errors.push(SurgeError::Config(
            "request_timeout must be greater than zero".to_string(),
        ));
    }

    if settings.tick_interval < Duration::from_millis(10) {
        errors.push(SurgeError::Config(
            "tick_interval must be at least 10ms".to_string(),
        ));
    }

    if settings.user_agent.trim().is_empty() {
        errors.push(SurgeError::Config(
            "user_agent must not be empty".to_string(),
        ));
    }

    errors
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
