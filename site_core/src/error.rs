//! Error types for the buddy and objective engines.

use thiserror::Error;

/// Buddy configuration and registry errors.
#[derive(Debug, Error)]
pub enum BuddyError {
    #[error("behavior rate must be positive, got {0}ms")]
    InvalidRate(i64),

    #[error("unknown behavior type `{0}`")]
    UnknownBehavior(String),

    #[error("buddy `{id}` uses an element behavior but names no element")]
    MissingAnchor { id: String },

    #[error("buddy `{id}` is already registered")]
    AlreadyRegistered { id: String },
}

/// Failure reported by a caller-supplied condition.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConditionError(pub String);

impl ConditionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Objective evaluation errors.
#[derive(Debug, Error)]
pub enum ObjectiveError {
    #[error("objective `{objective}` failed to evaluate: {source}")]
    Condition {
        objective: String,
        #[source]
        source: ConditionError,
    },
}

/// Errors loading buddy definitions.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed manifest: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Buddy(#[from] BuddyError),
}
