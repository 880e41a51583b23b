//! Data models for the swarm orchestrator.
//!
//! This module contains:
//! - Build request input and planning mode
//! - Requirement modules produced by the parser
//! - Tasks, roles and status tracking
//! - Artifacts, handoffs and isolation scoping for the ledger
//! - The per-build workflow record
//! - Configuration

pub mod artifact;
pub mod config;
pub mod request;
pub mod requirement;
pub mod task;
pub mod workflow;

pub use artifact::{Artifact, ArtifactType, Handoff, IsolationContext, Manifest, NewArtifact};
pub use config::{
    BackoffStrategy, DebugLevel, DeployEnvironment, DeploymentConfig, MAX_BACKOFF_BASE_MS,
    MAX_RETRIES_LIMIT, MAX_TASK_TIMEOUT_SECS, RetrySettings, SwarmConfig, SwarmConfigBuilder,
    TelemetryConfig, ValidationError,
};
pub use request::{BuildRequest, PlanMode};
pub use requirement::{ModuleType, ParsedRequirement, Priority, RequirementModule};
pub use task::{AgentRole, AgentTask, TaskStats, TaskStatus};
pub use workflow::{DeploymentReport, WorkflowPhase, WorkflowState};
