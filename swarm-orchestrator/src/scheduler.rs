//! Dependency ordering and task dispatch.
//!
//! [`topological_sort`] orders a plan so every task follows its
//! dependencies. [`Scheduler`] walks that order, hands each task to the
//! executor registered for its role and applies the retry policy.

use crate::executor::{ExecutionOutcome, ExecutorRegistry, TaskContext, TaskExecutor};
use crate::models::{AgentTask, TaskStatus};
use crate::retry::{AttemptError, RetryError, RetryPolicy, Retried, execute_with_retry};
use crate::telemetry;
use crate::{Result, SwarmError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InStack,
    Done,
}

/// Order task indices so that each task comes after all of its dependencies.
///
/// Depth-first, visiting roots and dependencies in declaration order. Uses
/// an explicit stack, so deep chains cannot overflow. Dependency ids that
/// name no task are skipped here; [`crate::planner::validate_plan`] rejects
/// them.
pub fn topological_sort(tasks: &[AgentTask]) -> Result<Vec<usize>> {
    let index: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| (task.id.as_str(), i))
        .collect();

    let mut marks = vec![Mark::Unvisited; tasks.len()];
    let mut order = Vec::with_capacity(tasks.len());
    // (task index, next dependency position)
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..tasks.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::InStack;
        stack.push((root, 0));

        while let Some(&(node, pos)) = stack.last() {
            let Some(dep) = tasks[node].dependencies.get(pos) else {
                marks[node] = Mark::Done;
                order.push(node);
                stack.pop();
                continue;
            };

            let top = stack.len() - 1;
            stack[top].1 += 1;

            let Some(&next) = index.get(dep.as_str()) else {
                continue;
            };
            match marks[next] {
                Mark::Done => {}
                Mark::InStack => {
                    return Err(SwarmError::CircularDependency {
                        task_id: tasks[next].id.clone(),
                    });
                }
                Mark::Unvisited => {
                    marks[next] = Mark::InStack;
                    stack.push((next, 0));
                }
            }
        }
    }

    Ok(order)
}

/// Summary of a completed development run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Task ids in dispatch order
    pub order: Vec<String>,
    /// Failed attempts across all tasks
    pub retries: u32,
}

/// Dispatches tasks to role executors with retries.
#[derive(Debug, Clone)]
pub struct Scheduler {
    registry: Arc<ExecutorRegistry>,
    retry: RetryPolicy,
    task_timeout: Option<Duration>,
}

impl Scheduler {
    pub fn new(registry: Arc<ExecutorRegistry>, retry: RetryPolicy) -> Self {
        Self {
            registry,
            retry,
            task_timeout: None,
        }
    }

    /// Bound each execution attempt; a timeout counts as a failed attempt.
    #[must_use]
    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run every task in dependency order.
    ///
    /// Nothing is dispatched when the graph has a cycle. The first task that
    /// fails permanently stops the run; tasks after it stay pending.
    pub async fn run(&self, tasks: &mut [AgentTask], ctx: &TaskContext) -> Result<ScheduleReport> {
        let order = topological_sort(tasks)?;
        let index: HashMap<String, usize> = tasks
            .iter()
            .enumerate()
            .map(|(i, task)| (task.id.clone(), i))
            .collect();

        let mut report = ScheduleReport::default();
        for idx in order {
            if let Some(blocked) = tasks[idx].dependencies.iter().find(|dep| {
                index
                    .get(dep.as_str())
                    .is_some_and(|&d| tasks[d].status != TaskStatus::Completed)
            }) {
                return Err(SwarmError::Internal(format!(
                    "task {} scheduled before dependency {} completed",
                    tasks[idx].id, blocked
                )));
            }

            let task = &mut tasks[idx];
            self.dispatch(task, ctx, &self.retry).await?;
            report.order.push(task.id.clone());
            report.retries += task.retry_count;
        }

        info!(
            tasks = report.order.len(),
            retries = report.retries,
            "All tasks completed"
        );
        Ok(report)
    }

    /// Execute one task under `policy` and record the outcome on it.
    ///
    /// An unknown role fails before the task is started. On success the task
    /// is completed with the executor's data (or message) and `retry_count`
    /// holds the number of failed attempts. When retries run out the task is
    /// marked failed and [`SwarmError::TaskFailed`] is returned.
    pub async fn dispatch(
        &self,
        task: &mut AgentTask,
        ctx: &TaskContext,
        policy: &RetryPolicy,
    ) -> Result<()> {
        let executor = self.registry.for_task(task)?;
        let span = telemetry::task_execution_span(&task.id, &task.assigned_role);
        let timing = telemetry::start_timing(format!("task:{}", task.id));

        task.start();
        telemetry::log_task_start(&task.id, &task.assigned_role);

        let snapshot = task.clone();
        let result = execute_with_retry(policy, |attempt| {
            let executor = Arc::clone(&executor);
            let ctx = ctx.for_attempt(attempt);
            let snapshot = &snapshot;
            async move { self.attempt(executor.as_ref(), snapshot, &ctx).await }
        })
        .instrument(span)
        .await;

        match result {
            Ok(Retried { value, failures }) => {
                for failure in failures {
                    task.record_failure(failure);
                }
                task.complete(value.into_result());
                telemetry::log_task_complete(
                    &task.id,
                    &task.assigned_role,
                    true,
                    task.retry_count,
                    timing.elapsed_secs(),
                );
                Ok(())
            }
            Err(RetryError::Exhausted { failures }) => {
                let attempts = failures.len() as u32;
                let message = failures.last().cloned().unwrap_or_default();
                for failure in failures {
                    task.record_failure(failure);
                }
                task.fail(message.clone());
                telemetry::log_task_complete(
                    &task.id,
                    &task.assigned_role,
                    false,
                    task.retry_count,
                    timing.elapsed_secs(),
                );
                Err(SwarmError::TaskFailed {
                    task_id: task.id.clone(),
                    attempts,
                    message,
                })
            }
            Err(RetryError::Fatal { error, failures }) => {
                for failure in failures {
                    task.record_failure(failure);
                }
                task.fail(error.to_string());
                telemetry::log_task_complete(
                    &task.id,
                    &task.assigned_role,
                    false,
                    task.retry_count,
                    timing.elapsed_secs(),
                );
                Err(error)
            }
        }
    }

    async fn attempt(
        &self,
        executor: &dyn TaskExecutor,
        task: &AgentTask,
        ctx: &TaskContext,
    ) -> std::result::Result<ExecutionOutcome, AttemptError<SwarmError>> {
        debug!(task_id = %task.id, attempt = ctx.attempt, "Executing task");
        let call = executor.execute(task, ctx);
        let outcome = match self.task_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(AttemptError::Retryable(format!(
                        "timed out after {}ms",
                        limit.as_millis()
                    )));
                }
            },
            None => call.await,
        };

        match outcome {
            Ok(outcome) if outcome.success => Ok(outcome),
            Ok(outcome) => Err(AttemptError::Retryable(outcome.failure_reason())),
            Err(error) => Err(AttemptError::Fatal(error)),
        }
    }
}
