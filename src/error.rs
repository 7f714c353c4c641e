//! Error types for line-nav
//!
//! Sensing ambiguity and bounded-wait timeouts are absorbed where they are
//! detected and never show up here. What does show up is configuration
//! defects, which abort the run, and output I/O failures.

/// Result type alias
pub type Result<T> = std::result::Result<T, NavError>;

/// line-nav error types
#[derive(Debug, thiserror::Error)]
pub enum NavError {
    /// Track or tuning parameter that cannot be acted on
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        /// Path that was requested
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for the expected schema
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error while writing traces or summaries
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Summary serialisation failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NavError {
    /// Shorthand for an [`NavError::InvalidConfig`] with a formatted message.
    pub fn invalid(msg: impl Into<String>) -> Self {
        NavError::InvalidConfig(msg.into())
    }

    /// True for the error class that must halt the vehicle.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            NavError::InvalidConfig(_) | NavError::ConfigRead { .. } | NavError::ConfigParse(_)
        )
    }
}
