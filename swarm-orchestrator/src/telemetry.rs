//! Telemetry instrumentation for the orchestrator.
//!
//! This module provides:
//! - Span helpers for planning, phases, task dispatch and ledger writes
//! - Metrics for tracking task outcomes, retries and published artifacts
//! - Structured event helpers under the `swarm.events` target
//!
//! ## Spans
//!
//! - `swarm.planning` - Requirement parsing and plan generation
//! - `swarm.phase` - One workflow phase
//! - `swarm.task_execution` - Dispatch of a single task (all attempts)
//! - `swarm.ledger` - Ledger persistence
//!
//! ## Metrics
//!
//! - `swarm_tasks_completed` - Tasks completed (counter)
//! - `swarm_tasks_failed` - Tasks failed permanently (counter)
//! - `swarm_task_retries` - Failed attempts that were retried (counter)
//! - `swarm_validation_flags` - Tasks flagged by QA review (counter)
//! - `swarm_artifacts_published` - Artifacts published to the ledger (counter)
//! - `swarm_task_duration_seconds` - Task dispatch duration (histogram)

use crate::models::{AgentRole, ArtifactType, TaskStats, WorkflowPhase};
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{Span, info_span};

static METRICS: OnceLock<SwarmMetrics> = OnceLock::new();

static OTEL_METRICS: OnceLock<SwarmOtelMetrics> = OnceLock::new();

/// Get or initialize the global metrics instance.
pub fn metrics() -> &'static SwarmMetrics {
    METRICS.get_or_init(SwarmMetrics::new)
}

/// Get or initialize the global OpenTelemetry metrics instance.
pub fn otel_metrics() -> &'static SwarmOtelMetrics {
    OTEL_METRICS.get_or_init(|| SwarmOtelMetrics::new(opentelemetry::global::meter("swarm")))
}

/// OpenTelemetry instruments.
pub struct SwarmOtelMetrics {
    pub tasks_completed_counter: Counter<u64>,
    pub tasks_failed_counter: Counter<u64>,
    pub task_retries_counter: Counter<u64>,
    pub validation_flags_counter: Counter<u64>,
    pub artifacts_published_counter: Counter<u64>,
    pub task_duration_histogram: Histogram<f64>,
}

impl SwarmOtelMetrics {
    pub fn new(meter: Meter) -> Self {
        Self {
            tasks_completed_counter: meter
                .u64_counter("swarm_tasks_completed")
                .with_description("Tasks completed successfully")
                .init(),
            tasks_failed_counter: meter
                .u64_counter("swarm_tasks_failed")
                .with_description("Tasks that failed after exhausting retries")
                .init(),
            task_retries_counter: meter
                .u64_counter("swarm_task_retries")
                .with_description("Failed task attempts")
                .init(),
            validation_flags_counter: meter
                .u64_counter("swarm_validation_flags")
                .with_description("Tasks flagged by QA review")
                .init(),
            artifacts_published_counter: meter
                .u64_counter("swarm_artifacts_published")
                .with_description("Artifacts published to the ledger")
                .init(),
            task_duration_histogram: meter
                .f64_histogram("swarm_task_duration_seconds")
                .with_description("Task dispatch duration in seconds")
                .init(),
        }
    }

    fn role_attr(role: &AgentRole) -> [KeyValue; 1] {
        [KeyValue::new("role", role.to_string())]
    }
}

/// Process-wide counters for local reporting.
#[derive(Debug, Default)]
pub struct SwarmMetrics {
    pub tasks_completed: AtomicU64,
    pub tasks_failed: AtomicU64,
    pub task_retries: AtomicU64,
    pub validation_flags: AtomicU64,
    pub artifacts_published: AtomicU64,
}

impl SwarmMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_tasks_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tasks_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_task_retries(&self, retries: u64) {
        self.task_retries.fetch_add(retries, Ordering::Relaxed);
    }

    pub fn inc_validation_flags(&self) {
        self.validation_flags.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_artifacts_published(&self) {
        self.artifacts_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_tasks_completed(&self) -> u64 {
        self.tasks_completed.load(Ordering::Relaxed)
    }

    pub fn get_tasks_failed(&self) -> u64 {
        self.tasks_failed.load(Ordering::Relaxed)
    }

    pub fn get_task_retries(&self) -> u64 {
        self.task_retries.load(Ordering::Relaxed)
    }

    pub fn get_validation_flags(&self) -> u64 {
        self.validation_flags.load(Ordering::Relaxed)
    }

    pub fn get_artifacts_published(&self) -> u64 {
        self.artifacts_published.load(Ordering::Relaxed)
    }

    /// Reset all counters (useful for testing).
    pub fn reset(&self) {
        self.tasks_completed.store(0, Ordering::Relaxed);
        self.tasks_failed.store(0, Ordering::Relaxed);
        self.task_retries.store(0, Ordering::Relaxed);
        self.validation_flags.store(0, Ordering::Relaxed);
        self.artifacts_published.store(0, Ordering::Relaxed);
    }
}

// ============================================================================
// Span Helpers
// ============================================================================

pub fn planning_span(request_id: &str, mode: &str) -> Span {
    info_span!(
        "swarm.planning",
        otel.name = "Planning",
        request_id = %request_id,
        mode = %mode
    )
}

pub fn phase_span(phase: WorkflowPhase, request_id: &str) -> Span {
    info_span!(
        "swarm.phase",
        otel.name = "Workflow Phase",
        phase = %phase,
        request_id = %request_id
    )
}

pub fn task_execution_span(task_id: &str, role: &AgentRole) -> Span {
    info_span!(
        "swarm.task_execution",
        otel.name = "Task Execution",
        task_id = %task_id,
        role = %role
    )
}

pub fn ledger_span(operation: &str) -> Span {
    info_span!("swarm.ledger", otel.name = "Ledger", operation = %operation)
}

// ============================================================================
// Timing Helpers
// ============================================================================

/// A guard that logs its duration when dropped.
pub struct TimingGuard {
    start: Instant,
    name: String,
}

impl TimingGuard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        tracing::debug!(
            target: "swarm.timing",
            name = %self.name,
            duration_ms = %self.start.elapsed().as_millis(),
            "Operation completed"
        );
    }
}

pub fn start_timing(name: impl Into<String>) -> TimingGuard {
    TimingGuard::new(name)
}

// ============================================================================
// Event Logging Helpers
// ============================================================================

pub fn log_phase_start(phase: WorkflowPhase, request_id: &str) {
    tracing::info!(
        target: "swarm.events",
        event = "phase_start",
        phase = %phase,
        request_id = %request_id,
        "Entering phase"
    );
}

/// Log a fatal error with its phase, task and time of occurrence.
pub fn log_phase_error(phase: WorkflowPhase, task_id: Option<&str>, error: &str) {
    tracing::error!(
        target: "swarm.events",
        event = "phase_error",
        phase = %phase,
        task_id = %task_id.unwrap_or("-"),
        timestamp = %chrono::Utc::now().to_rfc3339(),
        error = %error,
        "Workflow aborted"
    );
}

pub fn log_task_start(task_id: &str, role: &AgentRole) {
    tracing::info!(
        target: "swarm.events",
        event = "task_start",
        task_id = %task_id,
        role = %role,
        "Dispatching task"
    );
}

/// Log a task outcome and update task metrics.
pub fn log_task_complete(
    task_id: &str,
    role: &AgentRole,
    success: bool,
    retries: u32,
    duration_secs: f64,
) {
    let attrs = SwarmOtelMetrics::role_attr(role);
    otel_metrics()
        .task_duration_histogram
        .record(duration_secs, &attrs);
    if retries > 0 {
        metrics().add_task_retries(u64::from(retries));
        otel_metrics()
            .task_retries_counter
            .add(u64::from(retries), &attrs);
    }

    if success {
        metrics().inc_tasks_completed();
        otel_metrics().tasks_completed_counter.add(1, &attrs);
        tracing::info!(
            target: "swarm.events",
            event = "task_complete",
            task_id = %task_id,
            retries = retries,
            duration_ms = (duration_secs * 1000.0) as u64,
            "Task completed"
        );
    } else {
        metrics().inc_tasks_failed();
        otel_metrics().tasks_failed_counter.add(1, &attrs);
        tracing::warn!(
            target: "swarm.events",
            event = "task_failed",
            task_id = %task_id,
            retries = retries,
            duration_ms = (duration_secs * 1000.0) as u64,
            "Task failed"
        );
    }
}

pub fn log_validation_flag(task_id: &str, reason: &str) {
    metrics().inc_validation_flags();
    otel_metrics().validation_flags_counter.add(1, &[]);
    tracing::warn!(
        target: "swarm.events",
        event = "validation_required",
        task_id = %task_id,
        reason = %reason,
        "QA review flagged task"
    );
}

pub fn log_artifact_published(artifact_id: &str, artifact_type: ArtifactType, role: &AgentRole) {
    metrics().inc_artifacts_published();
    otel_metrics()
        .artifacts_published_counter
        .add(1, &[KeyValue::new("type", artifact_type.to_string())]);
    tracing::debug!(
        target: "swarm.events",
        event = "artifact_published",
        artifact_id = %artifact_id,
        artifact_type = %artifact_type,
        role = %role,
        "Artifact published"
    );
}

pub fn log_deployment(environment: &str, success: bool, message: &str) {
    if success {
        tracing::info!(
            target: "swarm.events",
            event = "deployment",
            environment = %environment,
            message = %message,
            "Deployment triggered"
        );
    } else {
        tracing::warn!(
            target: "swarm.events",
            event = "deployment_failed",
            environment = %environment,
            message = %message,
            "Deployment failed"
        );
    }
}

pub fn log_completion(request_id: &str, stats: &TaskStats) {
    tracing::info!(
        target: "swarm.events",
        event = "completion",
        request_id = %request_id,
        total = stats.total,
        completed = stats.completed,
        validation_required = stats.validation_required,
        "Build completed"
    );
}
