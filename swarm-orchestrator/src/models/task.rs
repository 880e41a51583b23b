//! Task data structures.
//!
//! An [`AgentTask`] is the executable unit of a plan: one role, one
//! description, a set of prerequisite task ids and a status that only the
//! scheduler and phase controller mutate.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::str::FromStr;

/// Role responsible for executing a task.
///
/// The built-in roles cover the specialists the planner assigns. Any other
/// name parses into [`AgentRole::Custom`] so new roles only need an executor
/// registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgentRole {
    Architect,
    Frontend,
    Backend,
    Data,
    Qa,
    Security,
    Infra,
    Custom(String),
}

impl AgentRole {
    /// Every built-in role, in planning order.
    pub const BUILTIN: [AgentRole; 7] = [
        AgentRole::Architect,
        AgentRole::Frontend,
        AgentRole::Backend,
        AgentRole::Data,
        AgentRole::Qa,
        AgentRole::Security,
        AgentRole::Infra,
    ];

    /// Stable lowercase name used on disk and in logs.
    pub fn as_str(&self) -> &str {
        match self {
            AgentRole::Architect => "architect",
            AgentRole::Frontend => "frontend",
            AgentRole::Backend => "backend",
            AgentRole::Data => "data",
            AgentRole::Qa => "qa",
            AgentRole::Security => "security",
            AgentRole::Infra => "infra",
            AgentRole::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let role = match s.trim().to_lowercase().as_str() {
            "architect" => AgentRole::Architect,
            "frontend" => AgentRole::Frontend,
            "backend" => AgentRole::Backend,
            "data" => AgentRole::Data,
            "qa" => AgentRole::Qa,
            "security" => AgentRole::Security,
            "infra" => AgentRole::Infra,
            other => AgentRole::Custom(other.to_string()),
        };
        Ok(role)
    }
}

impl Serialize for AgentRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AgentRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let Ok(role) = raw.parse::<AgentRole>();
        Ok(role)
    }
}

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet dispatched
    #[default]
    Pending,
    /// Handed to an executor
    InProgress,
    /// Executor reported success
    Completed,
    /// Retries exhausted
    Failed,
    /// Completed but rejected by QA review
    ValidationRequired,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::ValidationRequired => write!(f, "validation_required"),
        }
    }
}

impl TaskStatus {
    /// Check if this status can no longer change through development.
    ///
    /// `Failed` and `ValidationRequired` never re-enter development.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::ValidationRequired
        )
    }
}

/// A single executable task in a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentTask {
    /// Unique identifier within the plan (e.g., "1a2b3c4d-mod-2")
    pub id: String,
    /// What the executor is asked to do
    pub description: String,
    /// Role whose executor runs this task
    pub assigned_role: AgentRole,
    /// Current status
    #[serde(default)]
    pub status: TaskStatus,
    /// Ids of tasks that must complete before this one
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Executor output on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Last failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failed attempts so far
    #[serde(default)]
    pub retry_count: u32,
}

impl AgentTask {
    /// Create a new pending task.
    pub fn new(id: impl Into<String>, description: impl Into<String>, role: AgentRole) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            assigned_role: role,
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            result: None,
            error: None,
            retry_count: 0,
        }
    }

    /// Set the dependencies, dropping duplicates.
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dep in deps {
            self.add_dependency(dep);
        }
        self
    }

    /// Add a dependency if it is not already present.
    pub fn add_dependency(&mut self, dep_id: impl Into<String>) {
        let dep_id = dep_id.into();
        if !self.dependencies.contains(&dep_id) {
            self.dependencies.push(dep_id);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Mark this task as handed to its executor.
    pub fn start(&mut self) {
        self.status = TaskStatus::InProgress;
    }

    /// Mark this task as completed with the executor's output.
    pub fn complete(&mut self, result: serde_json::Value) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.error = None;
    }

    /// Record a failed attempt without changing status.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.retry_count += 1;
        self.error = Some(error.into());
    }

    /// Mark this task as permanently failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
    }

    /// Flag a completed task after a rejected QA review.
    pub fn require_validation(&mut self, reason: impl Into<String>) {
        self.status = TaskStatus::ValidationRequired;
        self.error = Some(reason.into());
    }
}

/// Status counts over a set of tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub validation_required: usize,
}

impl TaskStats {
    /// Count tasks by status.
    pub fn from_tasks(tasks: &[AgentTask]) -> Self {
        let mut stats = TaskStats {
            total: tasks.len(),
            ..Default::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::ValidationRequired => stats.validation_required += 1,
            }
        }
        stats
    }
}

impl std::fmt::Display for TaskStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} completed, {} failed, {} flagged for validation",
            self.completed, self.total, self.failed, self.validation_required
        )
    }
}
