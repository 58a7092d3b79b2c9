//! Error types for spitch-core

use thiserror::Error;

/// Main error type for the spitch-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid regular expression in a rule or safety pattern
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Model backend error
    #[error("model error: {0}")]
    Model(String),

    /// No skill registered under this name
    #[error("unknown skill: {0}")]
    SkillNotFound(String),

    /// A skill handler failed
    #[error("{skill} failed: {message}")]
    Skill { skill: String, message: String },

    /// A skill was called with missing or malformed parameters
    #[error("invalid parameters for {skill}: {message}")]
    InvalidParams { skill: String, message: String },

    /// Refused by the safety sandbox
    #[error("blocked by safety policy: {0}")]
    Blocked(String),

    /// Persisted store could not be read or written
    #[error("store error at {path}: {message}")]
    Store { path: String, message: String },
}

impl Error {
    /// Shorthand for a skill failure.
    pub fn skill(skill: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Skill {
            skill: skill.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a parameter validation failure.
    pub fn invalid_params(skill: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidParams {
            skill: skill.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for spitch-core
pub type Result<T> = std::result::Result<T, Error>;
