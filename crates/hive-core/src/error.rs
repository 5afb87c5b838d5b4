use thiserror::Error;

#[derive(Debug, Error)]
pub enum HiveError {
    // Configuration errors
    #[error("Invalid workflow configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Step errors
    #[error("Step failed: {step}: {message}")]
    StepFailure { step: String, message: String },

    #[error("Step timed out after {timeout_ms}ms: {step}")]
    Timeout { step: String, timeout_ms: u64 },

    // Control-flow signals
    #[error("Workflow interrupted: {reason}")]
    WorkflowInterrupted { reason: String },

    #[error("No route matched and no fallback branches declared")]
    NoRouteMatched,

    #[error("Workflow cancelled")]
    Cancelled,

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // TOML errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl HiveError {
    /// Wrap a delegate failure under the name of the step that ran it.
    pub fn step_failure(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StepFailure {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Whether this error is the deliberate interruption signal rather than
    /// an ordinary failure.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::WorkflowInterrupted { .. })
    }
}

pub type Result<T> = std::result::Result<T, HiveError>;
