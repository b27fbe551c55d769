//! Error types for Quizwright.

use thiserror::Error;

/// Library-level error type for Quizwright operations.
#[derive(Error, Debug)]
pub enum QuizError {
    #[error("No model access credential configured")]
    Credential,

    /// Message is the backend's own, passed through untouched.
    #[error("{0}")]
    Backend(String),

    #[error("Model returned a success status with no usable text")]
    EmptyResponse,

    #[error("Research incomplete: {0}")]
    ResearchIncomplete(String),

    #[error("Failed to recover questions ({reason}). Raw output start: {preview}")]
    Recovery { reason: String, preview: String },

    #[error("All {0} generation tasks failed")]
    AllTasksFailed(usize),

    #[error("Unsupported question type: {0}")]
    UnsupportedQuestion(String),

    #[error("Invalid pipeline transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Memory store error: {0}")]
    Memory(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl QuizError {
    /// Whether the generation stage may absorb this error as a task-local failure.
    pub fn is_task_local(&self) -> bool {
        !matches!(self, QuizError::Credential)
    }
}

/// Result type alias for Quizwright operations.
pub type Result<T> = std::result::Result<T, QuizError>;
