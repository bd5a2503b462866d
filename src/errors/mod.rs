//! Error type definitions for the job scheduler
//!
//! One enum covers the full taxonomy the lifecycle operations can surface:
//! validation failures, unknown identities, duplicate identities, store
//! failures and trigger-engine failures. Store errors are propagated, not
//! retried here; the caller decides the retry policy.

use thiserror::Error;

use crate::models::JobKey;

#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Malformed or conflicting schedule fields
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Unknown `(name, group)` identity
    #[error("Job not found: '{name}' in group '{group}'")]
    NotFound { name: String, group: String },

    /// Duplicate job identity on create
    #[error("Job already exists: '{name}' in group '{group}'")]
    Conflict { name: String, group: String },

    /// Durable store unavailable or rejected the operation
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// The underlying timer primitive rejected an arm request
    #[error("Trigger engine error: {message}")]
    Engine { message: String },
}

impl SchedulerError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(key: &JobKey) -> Self {
        Self::NotFound {
            name: key.name.clone(),
            group: key.group.clone(),
        }
    }

    pub fn conflict(key: &JobKey) -> Self {
        Self::Conflict {
            name: key.name.clone(),
            group: key.group.clone(),
        }
    }

    pub fn engine<S: Into<String>>(message: S) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }
}
