//! Planner: turns a build request into a validated task graph.

use crate::models::{AgentRole, AgentTask, BuildRequest, ParsedRequirement, PlanMode};
use crate::parser::{RequirementParser, extract_constraints};
use crate::scheduler::topological_sort;
use crate::{Result, SwarmError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Short random identifier shared by every task of one build.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// A planned build: the parsed requirements and the tasks derived from them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildPlan {
    pub request_id: String,
    pub title: String,
    pub mode: PlanMode,
    pub parsed_requirements: ParsedRequirement,
    pub tasks: Vec<AgentTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Planner {
    parser: RequirementParser,
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan `request` in the given mode and validate the result.
    pub fn plan(
        &self,
        mode: PlanMode,
        request: &BuildRequest,
        request_id: &str,
    ) -> Result<BuildPlan> {
        let plan = match mode {
            PlanMode::Minimal => self.minimal_plan(request, request_id),
            PlanMode::Enhanced => self.enhanced_plan(request, request_id),
        };
        validate_plan(&plan.tasks)?;
        info!(
            request_id = %request_id,
            mode = %mode,
            tasks = plan.tasks.len(),
            "Plan generated"
        );
        Ok(plan)
    }

    /// Fixed architect-led plan that skips requirement parsing.
    pub fn minimal_plan(&self, request: &BuildRequest, request_id: &str) -> BuildPlan {
        let id = |n: usize| format!("{}-task-{}", request_id, n);
        let title = &request.title;

        let tasks = vec![
            AgentTask::new(
                id(1),
                format!("Draft the architecture and ADR for: {}", title),
                AgentRole::Architect,
            ),
            AgentTask::new(id(2), format!("Implement: {}", title), AgentRole::Backend)
                .with_dependencies([id(1)]),
            AgentTask::new(id(3), format!("Validate and test: {}", title), AgentRole::Qa)
                .with_dependencies([id(2)]),
            AgentTask::new(id(4), format!("Security review: {}", title), AgentRole::Security)
                .with_dependencies([id(2)]),
        ];

        BuildPlan {
            request_id: request_id.to_string(),
            title: request.title.clone(),
            mode: PlanMode::Minimal,
            parsed_requirements: ParsedRequirement {
                modules: Vec::new(),
                overall_goal: request.description.clone(),
                constraints: extract_constraints(&request.description),
            },
            tasks,
            user_id: request.user_id.clone(),
            project_id: request.project_id.clone(),
        }
    }

    /// One task per parsed requirement module, ids prefixed with `request_id`.
    pub fn enhanced_plan(&self, request: &BuildRequest, request_id: &str) -> BuildPlan {
        let parsed = self.parser.parse(&request.description);
        debug!(modules = parsed.modules.len(), "Requirements parsed");

        let tasks = parsed
            .modules
            .iter()
            .map(|module| {
                AgentTask::new(
                    format!("{}-{}", request_id, module.id),
                    format!("{}: {}", module.title, module.description),
                    module.assigned_role.clone(),
                )
                .with_dependencies(
                    module
                        .dependencies
                        .iter()
                        .map(|dep| format!("{}-{}", request_id, dep)),
                )
            })
            .collect();

        BuildPlan {
            request_id: request_id.to_string(),
            title: request.title.clone(),
            mode: PlanMode::Enhanced,
            parsed_requirements: parsed,
            tasks,
            user_id: request.user_id.clone(),
            project_id: request.project_id.clone(),
        }
    }
}

/// Reject duplicate ids, dangling dependencies and cycles.
pub fn validate_plan(tasks: &[AgentTask]) -> Result<()> {
    let mut ids: HashSet<&str> = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !ids.insert(task.id.as_str()) {
            return Err(SwarmError::DuplicateTask(task.id.clone()));
        }
    }

    for task in tasks {
        if let Some(missing) = task.dependencies.iter().find(|dep| !ids.contains(dep.as_str())) {
            return Err(SwarmError::PlanValidation {
                task_id: task.id.clone(),
                missing: missing.clone(),
            });
        }
    }

    topological_sort(tasks).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BuildRequest {
        BuildRequest::new("Shop", "Build a REST API with MongoDB and React frontend")
    }

    #[test]
    fn test_request_id_shape() {
        let id = generate_request_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_request_id());
    }

    #[test]
    fn test_minimal_plan() {
        let plan = Planner::new().plan(PlanMode::Minimal, &request(), "abc123").unwrap();
        assert_eq!(plan.request_id, "abc123");
        assert!(plan.tasks.len() >= 3);
        assert_eq!(plan.tasks[0].assigned_role, AgentRole::Architect);
        assert!(plan.tasks[0].dependencies.is_empty());
        assert!(plan.parsed_requirements.modules.is_empty());
    }

    #[test]
    fn test_enhanced_plan_prefixes_ids() {
        let plan = Planner::new().plan(PlanMode::Enhanced, &request(), "r1").unwrap();
        assert_eq!(plan.tasks.len(), 5);

        let backend = plan
            .tasks
            .iter()
            .find(|t| t.assigned_role == AgentRole::Backend)
            .unwrap();
        assert_eq!(backend.id, "r1-mod-2");
        assert_eq!(backend.dependencies, vec!["r1-mod-3"]);
        assert!(backend.description.starts_with("Backend API: "));
        assert!(plan.tasks.iter().all(|t| t.is_pending()));
    }

    #[test]
    fn test_dangling_dependency_is_rejected() {
        let tasks = vec![
            AgentTask::new("a", "a", AgentRole::Backend).with_dependencies(["ghost"]),
        ];
        let err = validate_plan(&tasks).unwrap_err();
        assert!(matches!(
            err,
            SwarmError::PlanValidation { ref task_id, ref missing }
                if task_id == "a" && missing == "ghost"
        ));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let tasks = vec![
            AgentTask::new("a", "a", AgentRole::Backend),
            AgentTask::new("a", "again", AgentRole::Frontend),
        ];
        assert!(matches!(validate_plan(&tasks), Err(SwarmError::DuplicateTask(_))));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let tasks = vec![
            AgentTask::new("a", "a", AgentRole::Backend).with_dependencies(["b"]),
            AgentTask::new("b", "b", AgentRole::Data).with_dependencies(["a"]),
        ];
        assert!(matches!(
            validate_plan(&tasks),
            Err(SwarmError::CircularDependency { .. })
        ));
    }
}
