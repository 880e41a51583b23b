//! Task executors and the role registry.
//!
//! An executor performs the work for one [`AgentRole`]. The scheduler looks
//! executors up by role in an [`ExecutorRegistry`]; registering an executor
//! for a new role is the only step needed to support it.

use crate::ledger::ArtifactLedger;
use crate::models::{AgentRole, AgentTask, ArtifactType, NewArtifact};
use crate::{Result, SwarmError};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of one execution attempt.
///
/// `success == false` is a retryable failure. Executors return `Err` only
/// for conditions no retry can fix, such as a broken workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub message: String,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            message: error.clone(),
            data: None,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Reason to record on the task for a failed attempt.
    pub fn failure_reason(&self) -> String {
        self.error.clone().unwrap_or_else(|| self.message.clone())
    }

    /// Value stored as the task result: `data` when present, else `message`.
    pub fn into_result(self) -> Value {
        self.data.unwrap_or(Value::String(self.message))
    }
}

/// What an executor can see besides its task.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub request_id: String,
    /// Build workspace root
    pub workspace: PathBuf,
    pub ledger: Arc<ArtifactLedger>,
    /// 1-based attempt number
    pub attempt: u32,
}

impl TaskContext {
    pub fn new(
        request_id: impl Into<String>,
        workspace: impl Into<PathBuf>,
        ledger: Arc<ArtifactLedger>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            workspace: workspace.into(),
            ledger,
            attempt: 1,
        }
    }

    /// Same context for a later attempt.
    pub fn for_attempt(&self, attempt: u32) -> Self {
        Self {
            attempt,
            ..self.clone()
        }
    }

    /// `<workspace>/deliverables/<role>`
    pub fn deliverables_dir(&self, role: &AgentRole) -> PathBuf {
        self.workspace.join("deliverables").join(role.as_str())
    }
}

/// Performs the work of one role.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &AgentTask, ctx: &TaskContext) -> Result<ExecutionOutcome>;
}

/// Executors keyed by role.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<AgentRole, Arc<dyn TaskExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a [`WorkspaceExecutor`] for every built-in role.
    pub fn with_workspace_defaults() -> Self {
        let executor: Arc<dyn TaskExecutor> = Arc::new(WorkspaceExecutor::new());
        let mut registry = Self::new();
        for role in AgentRole::BUILTIN {
            registry.register(role, Arc::clone(&executor));
        }
        registry
    }

    /// Register `executor` for `role`, returning the one it replaces.
    pub fn register(
        &mut self,
        role: AgentRole,
        executor: Arc<dyn TaskExecutor>,
    ) -> Option<Arc<dyn TaskExecutor>> {
        self.executors.insert(role, executor)
    }

    #[must_use]
    pub fn with(mut self, role: AgentRole, executor: impl TaskExecutor + 'static) -> Self {
        self.register(role, Arc::new(executor));
        self
    }

    pub fn get(&self, role: &AgentRole) -> Option<Arc<dyn TaskExecutor>> {
        self.executors.get(role).cloned()
    }

    /// Executor for the role assigned to `task`.
    pub fn for_task(&self, task: &AgentTask) -> Result<Arc<dyn TaskExecutor>> {
        self.get(&task.assigned_role)
            .ok_or_else(|| SwarmError::unknown_role(task.assigned_role.as_str(), &task.id))
    }

    pub fn contains(&self, role: &AgentRole) -> bool {
        self.executors.contains_key(role)
    }

    /// Registered roles, sorted.
    pub fn roles(&self) -> Vec<AgentRole> {
        let mut roles: Vec<AgentRole> = self.executors.keys().cloned().collect();
        roles.sort();
        roles
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("roles", &self.roles())
            .finish()
    }
}

/// Prepares a per-role deliverables directory for an external agent.
///
/// Writes `task-spec.json` and `result.md` under
/// `<workspace>/deliverables/<role>` and publishes the result note to the
/// ledger as documentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkspaceExecutor;

impl WorkspaceExecutor {
    pub fn new() -> Self {
        Self
    }

    fn result_markdown(task: &AgentTask) -> String {
        format!(
            "# {} Agent Result\n\nTask: {}\n\nStatus: Ready for agent implementation\n",
            task.assigned_role, task.description
        )
    }
}

async fn write(path: &Path, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| SwarmError::file(path.display().to_string(), e.to_string()))
}

#[async_trait]
impl TaskExecutor for WorkspaceExecutor {
    async fn execute(&self, task: &AgentTask, ctx: &TaskContext) -> Result<ExecutionOutcome> {
        let dir = ctx.deliverables_dir(&task.assigned_role);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SwarmError::file(dir.display().to_string(), e.to_string()))?;

        write(&dir.join("task-spec.json"), &serde_json::to_string_pretty(task)?).await?;
        let result = Self::result_markdown(task);
        write(&dir.join("result.md"), &result).await?;

        let artifact = ctx
            .ledger
            .publish(
                NewArtifact::new(
                    ArtifactType::Documentation,
                    format!("{}-result.md", task.id),
                    result,
                    task.assigned_role.clone(),
                )
                .with_path(format!("deliverables/{}/result.md", task.assigned_role))
                .with_metadata("taskId", json!(task.id))
                .with_metadata("requestId", json!(ctx.request_id)),
            )
            .await?;

        Ok(
            ExecutionOutcome::success(format!("Agent workspace created at {}", dir.display()))
                .with_data(json!({
                    "deliverables": dir.display().to_string(),
                    "artifactId": artifact.id,
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Echo;

    #[async_trait]
    impl TaskExecutor for Echo {
        async fn execute(&self, task: &AgentTask, _ctx: &TaskContext) -> Result<ExecutionOutcome> {
            Ok(ExecutionOutcome::success(task.id.clone()))
        }
    }

    #[test]
    fn test_outcome_result_value() {
        assert_eq!(ExecutionOutcome::success("done").into_result(), json!("done"));
        assert_eq!(
            ExecutionOutcome::success("done")
                .with_data(json!({"k": 1}))
                .into_result(),
            json!({"k": 1})
        );
        let failed = ExecutionOutcome::failure("flaky");
        assert!(!failed.success);
        assert_eq!(failed.failure_reason(), "flaky");
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ExecutorRegistry::new().with(AgentRole::Backend, Echo);
        assert!(registry.get(&AgentRole::Backend).is_some());
        assert!(registry.get(&AgentRole::Custom("ml".into())).is_none());

        let task = AgentTask::new("r1-mod-9", "Train a model", AgentRole::Custom("ml".into()));
        assert!(matches!(
            registry.for_task(&task),
            Err(SwarmError::UnknownRole { ref role, ref task_id })
                if role == "ml" && task_id == "r1-mod-9"
        ));
    }

    #[test]
    fn test_custom_role_registration() {
        let mut registry = ExecutorRegistry::with_workspace_defaults();
        assert_eq!(registry.roles().len(), AgentRole::BUILTIN.len());

        let ml = AgentRole::Custom("ml".into());
        assert!(registry.register(ml.clone(), Arc::new(Echo)).is_none());
        assert!(registry.contains(&ml));
    }

    #[tokio::test]
    async fn test_workspace_executor_writes_deliverables() {
        let dir = TempDir::new().unwrap();
        let ledger = Arc::new(ArtifactLedger::at(dir.path().join("artifacts")));
        let ctx = TaskContext::new("r1", dir.path(), Arc::clone(&ledger));
        let task = AgentTask::new("r1-mod-2", "Backend API: expose orders", AgentRole::Backend);

        let outcome = WorkspaceExecutor::new().execute(&task, &ctx).await.unwrap();
        assert!(outcome.success);
        assert!(outcome.message.starts_with("Agent workspace created at"));

        let deliverables = dir.path().join("deliverables").join("backend");
        let spec: AgentTask = serde_json::from_str(
            &std::fs::read_to_string(deliverables.join("task-spec.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(spec, task);

        let result = std::fs::read_to_string(deliverables.join("result.md")).unwrap();
        assert!(result.starts_with("# backend Agent Result"));
        assert!(result.contains("Task: Backend API: expose orders"));

        let docs = ledger.by_type(ArtifactType::Documentation);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata["taskId"], json!("r1-mod-2"));
    }
}
