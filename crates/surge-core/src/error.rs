use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum SurgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SurgeError {
    /// Whether this error was caused by the scenario rather than by the engine.
    ///
    /// Unreadable or unparsable scenario files count as configuration errors.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            SurgeError::Config(_) | SurgeError::Io(_) | SurgeError::Serde(_)
        )
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> u8 {
        if self.is_config() {
            1
        } else {
            2
        }
    }
}

impl Serialize for SurgeError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
