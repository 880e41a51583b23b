//! End-to-end tests for the phase controller with scripted executors.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use swarm_orchestrator::{
    AgentRole, AgentTask, ArtifactType, BuildRequest, DebugLevel, ExecutionOutcome,
    ExecutorRegistry, NewArtifact, PhaseController, PlanMode, Result, SwarmConfig, SwarmError,
    TaskContext, TaskExecutor, TaskStatus, WorkflowPhase,
};
use tempfile::TempDir;

/// Publishes one artifact per task, hands it to QA and records call order.
struct Scripted {
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl TaskExecutor for Scripted {
    async fn execute(&self, task: &AgentTask, ctx: &TaskContext) -> Result<ExecutionOutcome> {
        self.calls.lock().unwrap().push(task.id.clone());
        let artifact = ctx
            .ledger
            .publish(
                NewArtifact::new(
                    ArtifactType::Component,
                    format!("{}.out", task.id),
                    task.description.clone(),
                    task.assigned_role.clone(),
                )
                .consumed_by(AgentRole::Qa),
            )
            .await?;
        ctx.ledger
            .create_handoff(
                task.assigned_role.clone(),
                AgentRole::Qa,
                [artifact.id.as_str()],
                None,
            )
            .await?;
        Ok(ExecutionOutcome::success("ok").with_data(json!({ "artifact": artifact.id })))
    }
}

/// Fails its first `failures` calls.
struct Flaky {
    failures: u32,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl TaskExecutor for Flaky {
    async fn execute(&self, _task: &AgentTask, _ctx: &TaskContext) -> Result<ExecutionOutcome> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Ok(ExecutionOutcome::failure("transient"))
        } else {
            Ok(ExecutionOutcome::success("recovered"))
        }
    }
}

fn config(dir: &TempDir) -> SwarmConfig {
    SwarmConfig::builder()
        .base_path(dir.path().to_string_lossy().to_string())
        .backoff_base_ms(0)
        .max_retries(2)
        .debug_level(DebugLevel::Minimal)
        .build()
        .unwrap()
}

fn scripted_registry(calls: &Arc<Mutex<Vec<String>>>) -> ExecutorRegistry {
    let mut registry = ExecutorRegistry::new();
    for role in AgentRole::BUILTIN {
        registry.register(role, Arc::new(Scripted { calls: Arc::clone(calls) }));
    }
    registry
}

#[tokio::test]
async fn test_enhanced_run_in_dependency_order() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut controller = PhaseController::builder()
        .config(config(&dir))
        .registry(scripted_registry(&calls))
        .build()
        .unwrap();

    let request = BuildRequest::new("Shop", "Build a REST API with MongoDB and React frontend");
    let outcome = controller
        .run_request(request, Some(PlanMode::Enhanced))
        .await
        .unwrap();
    let rid = outcome.state.request_id.clone();

    let calls = calls.lock().unwrap().clone();
    let position = |id: &str| calls.iter().position(|c| c == id).unwrap();
    // database before backend, everything before qa and security
    assert!(position(&format!("{}-mod-3", rid)) < position(&format!("{}-mod-2", rid)));
    assert!(position(&format!("{}-mod-2", rid)) < position(&format!("{}-mod-4", rid)));
    assert!(position(&format!("{}-mod-1", rid)) < position(&format!("{}-mod-5", rid)));
    // gate runs after development, then one review per task
    let gate = position(&format!("{}-security-gate", rid));
    assert!(gate > position(&format!("{}-mod-5", rid)));
    for task in &outcome.state.tasks {
        assert!(position(&format!("qa-{}", task.id)) > gate);
    }
    assert_eq!(calls.len(), 5 + 1 + 5);

    assert!(outcome.state.tasks.iter().all(|t| t.status == TaskStatus::Completed));
    assert!(outcome.state.tasks.iter().all(|t| t.result.is_some()));
}

#[tokio::test]
async fn test_manifest_exported_once_with_all_artifacts() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut controller = PhaseController::builder()
        .config(config(&dir))
        .registry(scripted_registry(&calls))
        .build()
        .unwrap();

    let outcome = controller
        .run_request(
            BuildRequest::new("Notes", "A dashboard").for_project("u1", "p1"),
            Some(PlanMode::Minimal),
        )
        .await
        .unwrap();

    let rid = &outcome.state.request_id;
    let build = dir
        .path()
        .join(format!("solutions/users/u1/projects/p1/builds/{}", rid));
    assert_eq!(outcome.workspace, build);
    assert_eq!(outcome.manifest_path, build.join("artifacts/manifest.json"));
    assert!(build.join("plan.md").is_file());
    assert!(build.join("plan.json").is_file());
    assert!(
        dir.path()
            .join(format!("docs/architecture/decisions/ADR-{}.md", rid))
            .is_file()
    );

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&outcome.manifest_path).unwrap()).unwrap();
    let calls = calls.lock().unwrap().len();
    assert_eq!(manifest["artifacts"].as_array().unwrap().len(), calls);
    assert_eq!(manifest["handoffs"].as_array().unwrap().len(), calls);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let mut controller = PhaseController::builder()
        .config(config(&dir))
        .executor(
            AgentRole::Architect,
            Flaky {
                failures: 2,
                calls: Arc::clone(&calls),
            },
        )
        .build()
        .unwrap();

    let outcome = controller
        .run_request(BuildRequest::new("Tool", "A small tool"), Some(PlanMode::Minimal))
        .await
        .unwrap();

    let architect = &outcome.state.tasks[0];
    assert_eq!(architect.assigned_role, AgentRole::Architect);
    assert_eq!(architect.retry_count, 2);
    assert_eq!(architect.status, TaskStatus::Completed);
    assert_eq!(architect.result, Some(json!("recovered")));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_permanent_failure_aborts_development() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let mut controller = PhaseController::builder()
        .config(config(&dir))
        .executor(
            AgentRole::Backend,
            Flaky {
                failures: u32::MAX,
                calls: Arc::clone(&calls),
            },
        )
        .build()
        .unwrap();

    let err = controller
        .run_request(BuildRequest::new("Tool", "A small tool"), Some(PlanMode::Minimal))
        .await
        .unwrap_err();

    assert!(matches!(err, SwarmError::TaskFailed { attempts: 3, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let state = controller.state().unwrap();
    assert_eq!(state.current_phase, WorkflowPhase::Development);
    assert_eq!(state.tasks[0].status, TaskStatus::Completed);
    assert_eq!(state.tasks[1].status, TaskStatus::Failed);
    assert_eq!(state.tasks[1].retry_count, 3);
    assert!(state.tasks[2..].iter().all(AgentTask::is_pending));
    assert!(!state.security_gate_passed);
}

#[tokio::test]
async fn test_unregistered_role_fails_without_retries() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ExecutorRegistry::new();
    for role in AgentRole::BUILTIN {
        if role != AgentRole::Data {
            registry.register(role, Arc::new(Scripted { calls: Arc::clone(&calls) }));
        }
    }
    let mut controller = PhaseController::builder()
        .config(config(&dir))
        .registry(registry)
        .build()
        .unwrap();

    let err = controller
        .run_request(
            BuildRequest::new("Store", "Persist orders in a database"),
            Some(PlanMode::Enhanced),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SwarmError::UnknownRole { ref role, .. } if role == "data"));
    let data = controller
        .state()
        .unwrap()
        .tasks
        .iter()
        .find(|t| t.assigned_role == AgentRole::Data)
        .unwrap();
    assert_eq!(err.task_id(), Some(data.id.as_str()));
    assert!(data.is_pending());
    assert_eq!(data.retry_count, 0);
}

#[tokio::test]
async fn test_run_from_request_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("request.json");
    std::fs::write(
        &path,
        r#"{"title": "Blog", "description": "A web page with a form", "applyToPlatform": false}"#,
    )
    .unwrap();

    let mut controller = PhaseController::new(config(&dir)).unwrap();
    let outcome = controller.run(&path, Some(PlanMode::Enhanced)).await.unwrap();

    let rid = &outcome.state.request_id;
    assert_eq!(
        outcome.workspace,
        dir.path().join(format!("solutions/_staging/{}", rid))
    );
    assert!(
        dir.path()
            .join(format!("knowledge-base/prompts/build-requests/{}/plan.md", rid))
            .is_file()
    );
    assert!(outcome.workspace.join("deliverables/frontend/result.md").is_file());
    assert_eq!(
        outcome.manifest_path,
        dir.path()
            .join(format!("solutions/_staging/{}/artifacts/manifest.json", rid))
    );
}

#[tokio::test]
async fn test_invalid_request_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("request.json");
    std::fs::write(&path, r#"{"title": "", "description": "x"}"#).unwrap();

    let mut controller = PhaseController::new(config(&dir)).unwrap();
    let err = controller.run(&path, None).await.unwrap_err();
    assert!(matches!(err, SwarmError::Input(_)));
    assert!(!dir.path().join("solutions").exists());
}
