//! Error types for the swarm orchestrator.

use crate::models::config::ValidationError;
use thiserror::Error;

/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, SwarmError>;

/// Errors that can occur while planning or running a build.
#[derive(Debug, Error)]
pub enum SwarmError {
    /// Malformed or unreadable build request
    #[error("Input error: {0}")]
    Input(String),

    /// A task depends on an id that is not part of the plan
    #[error("Plan validation error: task '{task_id}' depends on unknown task '{missing}'")]
    PlanValidation { task_id: String, missing: String },

    /// Two tasks share the same id
    #[error("Plan validation error: duplicate task id '{0}'")]
    DuplicateTask(String),

    /// The dependency graph contains a cycle
    #[error("Circular dependency detected at task {task_id}")]
    CircularDependency { task_id: String },

    /// No executor is registered for the role of a task
    #[error("No executor registered for role '{role}' (task {task_id})")]
    UnknownRole { role: String, task_id: String },

    /// A task failed permanently after exhausting its retries
    #[error("Task {task_id} failed after {attempts} attempt(s): {message}")]
    TaskFailed {
        task_id: String,
        attempts: u32,
        message: String,
    },

    /// The security gate rejected the deliverables
    #[error("Security gate {task_id} failed: {message}")]
    SecurityGate { task_id: String, message: String },

    /// Artifact ledger error
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// File I/O error
    #[error("File error ({path}): {message}")]
    File { path: String, message: String },

    /// Configuration validation error with detailed context
    #[error("Configuration validation error: {0}")]
    ConfigValidation(#[from] ValidationError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SwarmError {
    /// Create an input error.
    pub fn input(msg: impl Into<String>) -> Self {
        SwarmError::Input(msg.into())
    }

    /// Create a file error.
    pub fn file(path: impl Into<String>, msg: impl Into<String>) -> Self {
        SwarmError::File {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a ledger error.
    pub fn ledger(msg: impl Into<String>) -> Self {
        SwarmError::Ledger(msg.into())
    }

    /// Create an unknown-role error for `task_id`.
    pub fn unknown_role(role: impl Into<String>, task_id: impl Into<String>) -> Self {
        SwarmError::UnknownRole {
            role: role.into(),
            task_id: task_id.into(),
        }
    }

    /// Id of the task this error concerns, when there is one.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            SwarmError::PlanValidation { task_id, .. }
            | SwarmError::CircularDependency { task_id }
            | SwarmError::TaskFailed { task_id, .. }
            | SwarmError::UnknownRole { task_id, .. }
            | SwarmError::SecurityGate { task_id, .. } => Some(task_id),
            SwarmError::DuplicateTask(task_id) => Some(task_id),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SwarmError {
    fn from(err: std::io::Error) -> Self {
        SwarmError::File {
            path: "unknown".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SwarmError {
    fn from(err: serde_json::Error) -> Self {
        SwarmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SwarmError::CircularDependency {
            task_id: "abc-mod-1".to_string(),
        };
        assert_eq!(err.to_string(), "Circular dependency detected at task abc-mod-1");

        let err = SwarmError::PlanValidation {
            task_id: "t1".to_string(),
            missing: "t9".to_string(),
        };
        assert!(err.to_string().contains("unknown task 't9'"));
    }

    #[test]
    fn test_task_id_extraction() {
        let err = SwarmError::TaskFailed {
            task_id: "t2".to_string(),
            attempts: 4,
            message: "boom".to_string(),
        };
        assert_eq!(err.task_id(), Some("t2"));
        assert_eq!(SwarmError::input("bad").task_id(), None);

        let err = SwarmError::unknown_role("ml", "abc-mod-1");
        assert_eq!(err.task_id(), Some("abc-mod-1"));
        assert_eq!(
            err.to_string(),
            "No executor registered for role 'ml' (task abc-mod-1)"
        );

        let err = SwarmError::SecurityGate {
            task_id: "abc-security-gate".to_string(),
            message: "rejected".to_string(),
        };
        assert_eq!(err.task_id(), Some("abc-security-gate"));
        assert_eq!(err.to_string(), "Security gate abc-security-gate failed: rejected");
    }
}
