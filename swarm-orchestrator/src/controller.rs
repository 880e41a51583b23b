//! Phase controller.
//!
//! Drives one build request through the workflow:
//! 1. Planning → validated task graph, build workspace, plan files and ADR
//! 2. Development → every task in dependency order, with retries
//! 3. Security gate → one security review over the deliverables; failure is fatal
//! 4. QA review → one review per completed task; rejections flag the task
//! 5. Deployment → only when a deployer is configured; failure is reported
//! 6. Completed → the ledger manifest is exported

use crate::deploy::{Deployer, WebhookDeployer};
use crate::executor::{ExecutorRegistry, TaskContext, TaskExecutor};
use crate::ledger::ArtifactLedger;
use crate::models::{
    AgentRole, AgentTask, BuildRequest, PlanMode, SwarmConfig, TaskStatus, WorkflowPhase,
    WorkflowState,
};
use crate::output::SwarmOutput;
use crate::planner::{BuildPlan, Planner, generate_request_id};
use crate::retry::RetryPolicy;
use crate::scheduler::Scheduler;
use crate::telemetry::{self, log_completion, log_phase_error, log_phase_start, start_timing};
use crate::workspace::BuildWorkspace;
use crate::{Result, SwarmError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Instrument, info, instrument, warn};

/// Result of a build that reached the completed phase.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub state: WorkflowState,
    pub plan: BuildPlan,
    /// Build workspace root
    pub workspace: PathBuf,
    pub manifest_path: PathBuf,
}

impl BuildOutcome {
    /// No task is flagged and deployment, if attempted, succeeded.
    pub fn is_clean(&self) -> bool {
        self.state.stats().validation_required == 0
            && self.state.deployment.as_ref().is_none_or(|d| d.success)
    }
}

/// Runs build requests through the workflow phases.
///
/// # Example
///
/// ```rust,ignore
/// use swarm_orchestrator::{PhaseController, SwarmConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = SwarmConfig::from_env()?;
///     let mut controller = PhaseController::new(config)?;
///     let outcome = controller.run("request.json", None).await?;
///     println!("Manifest: {}", outcome.manifest_path.display());
///     Ok(())
/// }
/// ```
pub struct PhaseController {
    config: SwarmConfig,
    planner: Planner,
    scheduler: Scheduler,
    deployer: Option<Arc<dyn Deployer>>,
    output: SwarmOutput,
    state: Option<WorkflowState>,
}

impl std::fmt::Debug for PhaseController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseController")
            .field("config", &self.config)
            .field("registry", self.scheduler.registry())
            .field("deployer", &self.deployer.as_ref().map(|d| d.environment()))
            .field("phase", &self.state.as_ref().map(|s| s.current_phase))
            .finish()
    }
}

impl PhaseController {
    /// Controller with a workspace executor for every built-in role.
    pub fn new(config: SwarmConfig) -> Result<Self> {
        Self::with_registry(config, ExecutorRegistry::with_workspace_defaults())
    }

    pub fn with_registry(config: SwarmConfig, registry: ExecutorRegistry) -> Result<Self> {
        config.validate()?;
        let deployer = config
            .deployment
            .clone()
            .map(|d| Arc::new(WebhookDeployer::new(d)) as Arc<dyn Deployer>);
        let scheduler = Scheduler::new(Arc::new(registry), config.retry.policy())
            .with_task_timeout(config.task_timeout());

        Ok(Self {
            output: SwarmOutput::new(config.debug_level),
            config,
            planner: Planner::new(),
            scheduler,
            deployer,
            state: None,
        })
    }

    pub fn builder() -> PhaseControllerBuilder {
        PhaseControllerBuilder::default()
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// State of the most recent run, including failed ones.
    pub fn state(&self) -> Option<&WorkflowState> {
        self.state.as_ref()
    }

    fn base_path(&self) -> &Path {
        Path::new(&self.config.base_path)
    }

    fn adr_dir(&self) -> PathBuf {
        self.base_path().join(&self.config.adr_dir)
    }

    /// Load a build request from a JSON file and run it.
    pub async fn run(
        &mut self,
        request_path: impl AsRef<Path>,
        mode: Option<PlanMode>,
    ) -> Result<BuildOutcome> {
        let request = BuildRequest::load(request_path).await.inspect_err(|e| {
            log_phase_error(WorkflowPhase::Planning, None, &e.to_string());
        })?;
        self.run_request(request, mode).await
    }

    /// Run a build request through every phase.
    ///
    /// `mode` defaults to the configured plan mode.
    #[instrument(skip_all, fields(title = %request.title))]
    pub async fn run_request(
        &mut self,
        request: BuildRequest,
        mode: Option<PlanMode>,
    ) -> Result<BuildOutcome> {
        let mode = mode.unwrap_or(self.config.plan_mode);
        let request_id = generate_request_id();
        info!(request_id = %request_id, mode = %mode, "Starting build");
        let _timing = start_timing("build");

        let mut state = WorkflowState::new(&request_id, &request.description);
        let result = self.drive(&request, mode, &mut state).await;
        self.state = Some(state);
        result
    }

    /// Plan a request and persist the plan without executing it.
    pub async fn plan_request(
        &self,
        request: &BuildRequest,
        mode: Option<PlanMode>,
    ) -> Result<(BuildPlan, BuildWorkspace)> {
        let mode = mode.unwrap_or(self.config.plan_mode);
        let request_id = generate_request_id();
        self.run_planning_phase(request, mode, &request_id)
            .await
            .map_err(|e| self.phase_failed(WorkflowPhase::Planning, e))
    }

    async fn drive(
        &self,
        request: &BuildRequest,
        mode: PlanMode,
        state: &mut WorkflowState,
    ) -> Result<BuildOutcome> {
        let request_id = state.request_id.clone();

        self.enter(state, WorkflowPhase::Planning);
        let (plan, workspace) = self
            .run_planning_phase(request, mode, &request_id)
            .await
            .map_err(|e| self.phase_failed(WorkflowPhase::Planning, e))?;
        state.tasks = plan.tasks.clone();

        let isolation = request.isolation(&request_id);
        let ledger = Arc::new(ArtifactLedger::new(
            self.base_path(),
            &request_id,
            isolation.as_ref(),
        ));
        self.output
            .debug("ledger", &ledger.workspace_path().display().to_string());
        ledger
            .initialize()
            .await
            .map_err(|e| self.phase_failed(WorkflowPhase::Planning, e))?;
        let ctx = TaskContext::new(&request_id, workspace.root(), Arc::clone(&ledger));

        self.enter(state, WorkflowPhase::Development);
        self.run_development_phase(state, &ctx)
            .await
            .map_err(|e| self.phase_failed(WorkflowPhase::Development, e))?;

        self.enter(state, WorkflowPhase::SecurityGate);
        self.run_security_gate(state, &ctx)
            .await
            .map_err(|e| self.phase_failed(WorkflowPhase::SecurityGate, e))?;

        self.enter(state, WorkflowPhase::QaReview);
        self.run_qa_phase(state, &ctx)
            .await
            .map_err(|e| self.phase_failed(WorkflowPhase::QaReview, e))?;

        if let Some(deployer) = &self.deployer {
            self.enter(state, WorkflowPhase::Deployment);
            self.run_deployment_phase(deployer.as_ref(), state).await;
        }

        self.enter(state, WorkflowPhase::Completed);
        state.end_time = Some(chrono::Utc::now());
        let manifest_path = ledger
            .export_manifest()
            .await
            .map_err(|e| self.phase_failed(WorkflowPhase::Completed, e))?;

        let stats = state.stats();
        log_completion(&request_id, &stats);
        let outcome = BuildOutcome {
            state: state.clone(),
            plan,
            workspace: workspace.root().to_path_buf(),
            manifest_path,
        };
        self.output.summary(&request_id, &stats, outcome.is_clean());
        Ok(outcome)
    }

    fn enter(&self, state: &mut WorkflowState, phase: WorkflowPhase) {
        state.current_phase = phase;
        log_phase_start(phase, &state.request_id);
        self.output.phase(phase);
    }

    fn phase_failed(&self, phase: WorkflowPhase, error: SwarmError) -> SwarmError {
        log_phase_error(phase, error.task_id(), &error.to_string());
        self.output.error(&format!("{} phase failed: {}", phase, error));
        error
    }

    #[instrument(skip_all, fields(phase = "planning", request_id = %request_id))]
    async fn run_planning_phase(
        &self,
        request: &BuildRequest,
        mode: PlanMode,
        request_id: &str,
    ) -> Result<(BuildPlan, BuildWorkspace)> {
        request.validate()?;
        let plan = telemetry::planning_span(request_id, &mode.to_string())
            .in_scope(|| self.planner.plan(mode, request, request_id))?;

        self.output
            .phase_complete(&format!("Planned {} tasks ({} mode):", plan.tasks.len(), mode));
        for task in &plan.tasks {
            self.output
                .list_item(&format!("{} ({}): {}", task.id, task.assigned_role, task.description));
        }
        if self.output.level().is_debug() {
            self.output.debug_json("plan", &serde_json::to_value(&plan)?);
        }

        let isolation = request.isolation(request_id);
        let workspace = BuildWorkspace::new(self.base_path(), request_id, isolation.as_ref());
        workspace.create(&request.title, request_id).await?;
        let (plan_md, _) = workspace.store_plan(&plan).await?;
        let adr = workspace.write_adr(&plan, &self.adr_dir()).await?;

        self.output
            .status(&format!("Plan written to {}", plan_md.display()));
        self.output.status(&format!("ADR written to {}", adr.display()));
        info!(
            workspace = %workspace.root().display(),
            tasks = plan.tasks.len(),
            "Planning phase complete"
        );
        Ok((plan, workspace))
    }

    #[instrument(skip_all, fields(phase = "development"))]
    async fn run_development_phase(
        &self,
        state: &mut WorkflowState,
        ctx: &TaskContext,
    ) -> Result<()> {
        let result = self.scheduler.run(&mut state.tasks, ctx).await;

        for task in &state.tasks {
            match task.status {
                TaskStatus::Completed => {
                    self.output.task_complete(&task.id, true);
                    if let Some(serde_json::Value::String(message)) = &task.result {
                        self.output.executor_message(message);
                    }
                }
                TaskStatus::Failed => self.output.task_complete(&task.id, false),
                _ => {}
            }
        }

        let report = result?;
        info!(
            tasks = report.order.len(),
            retries = report.retries,
            "Development phase complete"
        );
        Ok(())
    }

    #[instrument(skip_all, fields(phase = "security-gate"))]
    async fn run_security_gate(&self, state: &mut WorkflowState, ctx: &TaskContext) -> Result<()> {
        let reviewed: Vec<&str> = state
            .tasks
            .iter()
            .filter(|t| t.is_completed())
            .map(|t| t.id.as_str())
            .collect();
        let mut gate = AgentTask::new(
            format!("{}-security-gate", state.request_id),
            format!("Security review of deliverables: {}", reviewed.join(", ")),
            AgentRole::Security,
        );

        self.output.task_start(&gate.id, gate.assigned_role.as_str());
        match self
            .scheduler
            .dispatch(&mut gate, ctx, self.scheduler.retry_policy())
            .await
        {
            Ok(()) => {
                state.security_gate_passed = true;
                self.output.phase_complete("Security gate passed");
                Ok(())
            }
            Err(SwarmError::TaskFailed {
                task_id, message, ..
            }) => Err(SwarmError::SecurityGate { task_id, message }),
            Err(e) => Err(e),
        }
    }

    /// Review every completed task once, without retries.
    ///
    /// Returns the number of tasks flagged for validation.
    #[instrument(skip_all, fields(phase = "qa-review"))]
    async fn run_qa_phase(&self, state: &mut WorkflowState, ctx: &TaskContext) -> Result<usize> {
        let policy = RetryPolicy::no_retry();
        let mut flagged = 0;

        for task in state.tasks.iter_mut().filter(|t| t.is_completed()) {
            let mut review = AgentTask::new(
                format!("qa-{}", task.id),
                format!("Validate and test: {}", task.description),
                AgentRole::Qa,
            );
            match self.scheduler.dispatch(&mut review, ctx, &policy).await {
                Ok(()) => self.output.task_complete(&review.id, true),
                Err(SwarmError::TaskFailed { message, .. }) => {
                    telemetry::log_validation_flag(&task.id, &message);
                    self.output
                        .warn(&format!("{} requires validation: {}", task.id, message));
                    task.require_validation(message);
                    flagged += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if flagged > 0 {
            warn!(flagged = flagged, "QA review flagged tasks");
        } else {
            self.output.phase_complete("All tasks passed QA review");
        }
        Ok(flagged)
    }

    async fn run_deployment_phase(&self, deployer: &dyn Deployer, state: &mut WorkflowState) {
        let environment = deployer.environment().to_string();
        let report = deployer
            .deploy()
            .instrument(telemetry::phase_span(
                WorkflowPhase::Deployment,
                &state.request_id,
            ))
            .await;

        telemetry::log_deployment(&environment, report.success, &report.message);
        if report.success {
            self.output.phase_complete(&report.message);
        } else {
            self.output.warn(&report.message);
        }
        state.deployment = Some(report);
    }
}

/// Builder for creating a [`PhaseController`] with fluent API.
#[derive(Default)]
pub struct PhaseControllerBuilder {
    config: Option<SwarmConfig>,
    registry: Option<ExecutorRegistry>,
    deployer: Option<Arc<dyn Deployer>>,
    base_path: Option<PathBuf>,
}

impl PhaseControllerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: SwarmConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the default executor registry.
    pub fn registry(mut self, registry: ExecutorRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register an executor on top of the current registry.
    pub fn executor(mut self, role: AgentRole, executor: impl TaskExecutor + 'static) -> Self {
        let registry = self
            .registry
            .take()
            .unwrap_or_else(ExecutorRegistry::with_workspace_defaults);
        self.registry = Some(registry.with(role, executor));
        self
    }

    /// Use `deployer` instead of the configured webhook.
    pub fn deployer(mut self, deployer: Arc<dyn Deployer>) -> Self {
        self.deployer = Some(deployer);
        self
    }

    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<PhaseController> {
        let mut config = self.config.unwrap_or_default();
        if let Some(path) = self.base_path {
            config.base_path = path.to_string_lossy().to_string();
        }

        let registry = self
            .registry
            .unwrap_or_else(ExecutorRegistry::with_workspace_defaults);
        let mut controller = PhaseController::with_registry(config, registry)?;
        if let Some(deployer) = self.deployer {
            controller.deployer = Some(deployer);
        }
        Ok(controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutionOutcome, WorkspaceExecutor};
    use crate::models::{DebugLevel, DeployEnvironment, DeploymentReport};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Rejects tasks whose id matches `reject`, delegates the rest.
    struct RejectWhen(fn(&str) -> bool);

    #[async_trait]
    impl TaskExecutor for RejectWhen {
        async fn execute(&self, task: &AgentTask, ctx: &TaskContext) -> Result<ExecutionOutcome> {
            if (self.0)(&task.id) {
                Ok(ExecutionOutcome::failure("rejected"))
            } else {
                WorkspaceExecutor::new().execute(task, ctx).await
            }
        }
    }

    struct CountingDeployer {
        calls: Arc<AtomicU32>,
        success: bool,
    }

    #[async_trait]
    impl Deployer for CountingDeployer {
        fn environment(&self) -> DeployEnvironment {
            DeployEnvironment::Staging
        }

        async fn deploy(&self) -> DeploymentReport {
            self.calls.fetch_add(1, Ordering::SeqCst);
            DeploymentReport {
                success: self.success,
                message: "hook".to_string(),
            }
        }
    }

    fn config(dir: &TempDir) -> SwarmConfig {
        SwarmConfig::builder()
            .base_path(dir.path().to_string_lossy().to_string())
            .backoff_base_ms(0)
            .debug_level(DebugLevel::Minimal)
            .build()
            .unwrap()
    }

    fn request() -> BuildRequest {
        BuildRequest::new("Shop", "Build a REST API with MongoDB and React frontend")
    }

    #[tokio::test]
    async fn test_full_run_completes() {
        let dir = TempDir::new().unwrap();
        let mut controller = PhaseController::new(config(&dir)).unwrap();

        let outcome = controller
            .run_request(request(), Some(PlanMode::Enhanced))
            .await
            .unwrap();

        assert_eq!(outcome.state.current_phase, WorkflowPhase::Completed);
        assert!(outcome.state.security_gate_passed);
        assert!(outcome.state.end_time.is_some());
        assert!(outcome.state.tasks.iter().all(AgentTask::is_completed));
        assert!(outcome.manifest_path.is_file());
        assert!(outcome.workspace.join("README.md").is_file());
        assert!(outcome.is_clean());
        assert_eq!(
            controller.state().map(|s| s.current_phase),
            Some(WorkflowPhase::Completed)
        );
    }

    #[tokio::test]
    async fn test_security_gate_failure_blocks_deployment() {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let mut controller = PhaseController::builder()
            .config(config(&dir))
            .executor(
                AgentRole::Security,
                RejectWhen(|id| id.ends_with("-security-gate")),
            )
            .deployer(Arc::new(CountingDeployer {
                calls: Arc::clone(&calls),
                success: true,
            }))
            .build()
            .unwrap();

        let err = controller
            .run_request(request(), Some(PlanMode::Enhanced))
            .await
            .unwrap_err();

        assert!(matches!(err, SwarmError::SecurityGate { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let state = controller.state().unwrap();
        let gate_id = format!("{}-security-gate", state.request_id);
        assert_eq!(err.task_id(), Some(gate_id.as_str()));
        assert_eq!(state.current_phase, WorkflowPhase::SecurityGate);
        assert!(!state.security_gate_passed);
        assert!(state.tasks.iter().all(AgentTask::is_completed));
    }

    #[tokio::test]
    async fn test_qa_rejection_flags_only_that_task() {
        let dir = TempDir::new().unwrap();
        let mut controller = PhaseController::builder()
            .config(config(&dir))
            .executor(
                AgentRole::Qa,
                RejectWhen(|id| id.starts_with("qa-") && id.ends_with("-mod-2")),
            )
            .build()
            .unwrap();

        let outcome = controller
            .run_request(request(), Some(PlanMode::Enhanced))
            .await
            .unwrap();

        assert_eq!(outcome.state.current_phase, WorkflowPhase::Completed);
        let stats = outcome.state.stats();
        assert_eq!(stats.validation_required, 1);
        assert_eq!(stats.completed, stats.total - 1);

        let flagged = outcome
            .state
            .tasks
            .iter()
            .find(|t| t.status == TaskStatus::ValidationRequired)
            .unwrap();
        assert!(flagged.id.ends_with("-mod-2"));
        assert_eq!(flagged.error.as_deref(), Some("rejected"));
        assert!(!outcome.is_clean());
    }

    #[tokio::test]
    async fn test_failed_deployment_is_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let mut controller = PhaseController::builder()
            .config(config(&dir))
            .deployer(Arc::new(CountingDeployer {
                calls: Arc::clone(&calls),
                success: false,
            }))
            .build()
            .unwrap();

        let outcome = controller
            .run_request(request(), Some(PlanMode::Minimal))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.state.current_phase, WorkflowPhase::Completed);
        assert_eq!(
            outcome.state.deployment.as_ref().map(|d| d.success),
            Some(false)
        );
        assert!(!outcome.is_clean());
    }

    #[tokio::test]
    async fn test_missing_request_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        let mut controller = PhaseController::new(config(&dir)).unwrap();

        let err = controller
            .run(dir.path().join("missing.json"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SwarmError::Input(_)));
        assert!(!dir.path().join("solutions").exists());
        assert!(controller.state().is_none());
    }

    #[tokio::test]
    async fn test_staging_builds_keep_separate_manifests() {
        let dir = TempDir::new().unwrap();
        let mut controller = PhaseController::new(config(&dir)).unwrap();

        let first = controller
            .run_request(request(), Some(PlanMode::Minimal))
            .await
            .unwrap();
        let first_manifest = std::fs::read_to_string(&first.manifest_path).unwrap();
        let second = controller
            .run_request(request(), Some(PlanMode::Minimal))
            .await
            .unwrap();

        assert_ne!(first.manifest_path, second.manifest_path);
        assert_eq!(
            first.manifest_path,
            first.workspace.join("artifacts").join("manifest.json")
        );
        assert_eq!(
            std::fs::read_to_string(&first.manifest_path).unwrap(),
            first_manifest
        );
    }

    #[tokio::test]
    async fn test_escaping_project_ids_are_rejected() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let mut controller = PhaseController::new(config(&dir)).unwrap();

        let user = outside.path().to_string_lossy().to_string();
        for (user, project) in [(user.as_str(), "p"), ("u1", "../u2"), ("u1", "")] {
            let err = controller
                .run_request(
                    request().for_project(user, project),
                    Some(PlanMode::Minimal),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, SwarmError::Input(_)), "{:?}", (user, project));
        }
        assert!(!dir.path().join("solutions").exists());
        assert_eq!(std::fs::read_dir(outside.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_builder_applies_base_path() {
        let controller = PhaseController::builder()
            .base_path("/tmp/swarm-base")
            .build()
            .unwrap();
        assert_eq!(controller.config().base_path, "/tmp/swarm-base");
        assert!(controller.state().is_none());
    }
}
