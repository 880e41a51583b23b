//! Workflow record for one orchestration run.

use super::task::{AgentTask, TaskStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of the build workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowPhase {
    #[default]
    Planning,
    Development,
    SecurityGate,
    QaReview,
    Deployment,
    Completed,
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowPhase::Planning => write!(f, "planning"),
            WorkflowPhase::Development => write!(f, "development"),
            WorkflowPhase::SecurityGate => write!(f, "security-gate"),
            WorkflowPhase::QaReview => write!(f, "qa-review"),
            WorkflowPhase::Deployment => write!(f, "deployment"),
            WorkflowPhase::Completed => write!(f, "completed"),
        }
    }
}

/// Outcome of the deployment call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentReport {
    pub success: bool,
    pub message: String,
}

/// Top-level record of a build, owned by the phase controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowState {
    pub request_id: String,
    pub user_prompt: String,
    pub tasks: Vec<AgentTask>,
    pub current_phase: WorkflowPhase,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub security_gate_passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentReport>,
}

impl WorkflowState {
    pub fn new(request_id: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            user_prompt: user_prompt.into(),
            tasks: Vec::new(),
            current_phase: WorkflowPhase::Planning,
            start_time: Utc::now(),
            end_time: None,
            security_gate_passed: false,
            deployment: None,
        }
    }

    pub fn stats(&self) -> TaskStats {
        TaskStats::from_tasks(&self.tasks)
    }

    pub fn is_complete(&self) -> bool {
        self.current_phase == WorkflowPhase::Completed
    }

    /// Find a task by id.
    pub fn task(&self, id: &str) -> Option<&AgentTask> {
        self.tasks.iter().find(|t| t.id == id)
    }
}
