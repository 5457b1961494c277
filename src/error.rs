use std::fmt;

use thiserror::Error;

/// Which summary an answer was grounded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Original,
    Intervened,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Original => f.write_str("original"),
            Side::Intervened => f.write_str("intervened"),
        }
    }
}

/// Failures surfaced by the consistency checker. Never retried.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("answering collaborator failed on the {side} summary: {cause:#}")]
    Answer { side: Side, cause: anyhow::Error },

    #[error("answering collaborator failed on both summaries: original: {original:#}; intervened: {intervened:#}")]
    BothAnswers {
        original: anyhow::Error,
        intervened: anyhow::Error,
    },

    #[error("embedding collaborator failed: {cause:#}")]
    Embedding { cause: anyhow::Error },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("failed to parse TOML in '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid { field: field.to_string(), message: message.into() }
    }
}
