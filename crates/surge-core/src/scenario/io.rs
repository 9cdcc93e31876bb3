use std::path::Path;

use crate::error::SurgeError;
use crate::scenario::model::ScenarioConfig;

/// Read a scenario file from disk.
///
/// The file format is a JSON serialized [`ScenarioConfig`].
pub async fn read_scenario(path: impl AsRef<Path>) -> Result<ScenarioConfig, SurgeError> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;
    let config: ScenarioConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Write a [`ScenarioConfig`] to disk as pretty-printed JSON.
pub async fn write_scenario(
    config: &ScenarioConfig,
    path: impl AsRef<Path>,
) -> Result<(), SurgeError> {
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path.as_ref(), content).await?;
    Ok(())
}
