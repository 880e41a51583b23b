//! Build workspace layout and plan persistence.
//!
//! Each build gets its own directory:
//! `<base>/solutions/users/<u>/projects/<p>/builds/<rid>` when the request
//! names a user and project, `<base>/solutions/_staging/<rid>` otherwise.
//! The plan (`plan.md`, `plan.json`) is stored in the build directory for
//! isolated builds and under `<base>/knowledge-base/prompts/build-requests/<rid>`
//! for staging builds. The ADR goes to the configured ADR directory.

use crate::models::{AgentRole, IsolationContext};
use crate::planner::BuildPlan;
use crate::{Result, SwarmError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Subdirectories created in every build workspace.
pub const BUILD_SUBDIRS: [&str; 5] = ["deliverables", "artifacts", "schemas", "contracts", "docs"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildWorkspace {
    root: PathBuf,
    plan_dir: PathBuf,
}

impl BuildWorkspace {
    pub fn new(
        base_path: impl AsRef<Path>,
        request_id: &str,
        isolation: Option<&IsolationContext>,
    ) -> Self {
        let base = base_path.as_ref();
        match isolation {
            Some(ctx) => {
                let root = base.join(ctx.build_dir());
                Self {
                    plan_dir: root.clone(),
                    root,
                }
            }
            None => Self {
                root: base.join("solutions").join("_staging").join(request_id),
                plan_dir: base
                    .join("knowledge-base")
                    .join("prompts")
                    .join("build-requests")
                    .join(request_id),
            },
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn plan_dir(&self) -> &Path {
        &self.plan_dir
    }

    /// Create the build directory, its subdirectories and a README.
    pub async fn create(&self, title: &str, request_id: &str) -> Result<()> {
        for sub in BUILD_SUBDIRS {
            create_dir(&self.root.join(sub)).await?;
        }
        let readme = format!(
            "# Solution: {}\n\nRequest ID: {}\n\nGenerated by the swarm orchestrator.\n",
            title, request_id
        );
        write(&self.root.join("README.md"), &readme).await?;
        debug!(root = %self.root.display(), "Build workspace created");
        Ok(())
    }

    /// Write `plan.md` and `plan.json`, returning their paths.
    pub async fn store_plan(&self, plan: &BuildPlan) -> Result<(PathBuf, PathBuf)> {
        create_dir(&self.plan_dir).await?;
        let markdown = self.plan_dir.join("plan.md");
        let json = self.plan_dir.join("plan.json");
        write(&markdown, &plan_markdown(plan)).await?;
        write(&json, &serde_json::to_string_pretty(plan)?).await?;
        Ok((markdown, json))
    }

    /// Write `ADR-<rid>.md` into `adr_dir`.
    pub async fn write_adr(&self, plan: &BuildPlan, adr_dir: &Path) -> Result<PathBuf> {
        create_dir(adr_dir).await?;
        let path = adr_dir.join(format!("ADR-{}.md", plan.request_id));
        write(&path, &adr_markdown(plan)).await?;
        Ok(path)
    }
}

/// Human-readable rendering of a plan.
pub fn plan_markdown(plan: &BuildPlan) -> String {
    let parsed = &plan.parsed_requirements;
    let mut out = String::new();
    out.push_str(&format!("# Plan: {}\n\n", plan.title));
    out.push_str(&format!("Request ID: {}\n", plan.request_id));
    out.push_str(&format!("Mode: {}\n\n", plan.mode));
    out.push_str(&format!("## Overall Goal\n\n{}\n\n", parsed.overall_goal));

    if !parsed.constraints.is_empty() {
        out.push_str("## Constraints\n\n");
        for constraint in &parsed.constraints {
            out.push_str(&format!("- {}\n", constraint));
        }
        out.push('\n');
    }

    if !parsed.modules.is_empty() {
        out.push_str("## Modules\n\n");
        for module in &parsed.modules {
            out.push_str(&format!("### {} ({})\n\n", module.title, module.assigned_role));
            out.push_str(&format!("{}\n\n", module.description));
            out.push_str("**Acceptance Criteria:**\n");
            for criterion in &module.acceptance_criteria {
                out.push_str(&format!("- {}\n", criterion));
            }
            out.push('\n');
        }
    }

    out.push_str("## Tasks\n\n");
    for task in &plan.tasks {
        let mark = if task.is_completed() { "x" } else { " " };
        out.push_str(&format!(
            "- [{}] **{}** ({}): {}\n",
            mark, task.id, task.assigned_role, task.description
        ));
        if !task.dependencies.is_empty() {
            out.push_str(&format!("  - depends on: {}\n", task.dependencies.join(", ")));
        }
    }
    out
}

/// Architecture decision record proposed for a plan.
pub fn adr_markdown(plan: &BuildPlan) -> String {
    let parsed = &plan.parsed_requirements;
    let mut out = String::new();
    out.push_str(&format!("# ADR-{}: {}\n\n", plan.request_id, plan.title));
    out.push_str("## Status\n\nProposed\n\n");

    out.push_str(&format!("## Context\n\nBuild request: {}\n\n", plan.title));
    if parsed.modules.is_empty() {
        out.push_str(&format!("{}\n\n", parsed.overall_goal));
    } else {
        out.push_str("Required modules:\n");
        for module in &parsed.modules {
            out.push_str(&format!("- {}: {}\n", module.title, module.description));
        }
        out.push('\n');
    }

    let mut roles: Vec<&AgentRole> = Vec::new();
    for task in &plan.tasks {
        if !roles.contains(&&task.assigned_role) {
            roles.push(&task.assigned_role);
        }
    }
    out.push_str("## Decision\n\nThe build is split across these agent roles:\n");
    for role in roles {
        out.push_str(&format!("- {}\n", role));
    }
    out.push_str("\nWorkflow:\n");
    out.push_str("1. Plan tasks from the request\n");
    out.push_str("2. Develop tasks in dependency order\n");
    out.push_str("3. Pass the security gate\n");
    out.push_str("4. Review every task through QA\n");
    out.push_str("5. Deploy when a deployment hook is configured\n\n");

    out.push_str("## Consequences\n\n");
    out.push_str("- Each role works in its own deliverables directory\n");
    out.push_str("- Artifacts are shared through the ledger manifest\n");
    out.push_str("- Security review blocks deployment on failure\n");
    out.push_str("- Tasks rejected by QA are flagged for validation\n");
    out
}

async fn create_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| SwarmError::file(path.display().to_string(), e.to_string()))
}

async fn write(path: &Path, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| SwarmError::file(path.display().to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuildRequest, PlanMode};
    use crate::planner::Planner;
    use tempfile::TempDir;

    fn plan() -> BuildPlan {
        let request = BuildRequest::new("Shop", "A secure REST API with MongoDB");
        Planner::new()
            .plan(PlanMode::Enhanced, &request, "r1")
            .unwrap()
    }

    #[test]
    fn test_layouts() {
        let staging = BuildWorkspace::new("/b", "r1", None);
        assert_eq!(staging.root(), Path::new("/b/solutions/_staging/r1"));
        assert_eq!(
            staging.plan_dir(),
            Path::new("/b/knowledge-base/prompts/build-requests/r1")
        );

        let ctx = IsolationContext::new("u", "p", "r1");
        let isolated = BuildWorkspace::new("/b", "r1", Some(&ctx));
        assert_eq!(
            isolated.root(),
            Path::new("/b/solutions/users/u/projects/p/builds/r1")
        );
        assert_eq!(isolated.plan_dir(), isolated.root());
    }

    #[test]
    fn test_plan_markdown() {
        let md = plan_markdown(&plan());
        assert!(md.starts_with("# Plan: Shop\n"));
        assert!(md.contains("Request ID: r1"));
        assert!(md.contains("## Constraints\n\n- Must follow security best practices"));
        assert!(md.contains("### Backend API (backend)"));
        assert!(md.contains("**Acceptance Criteria:**"));
        assert!(md.contains("- [ ] **r1-mod-1** (backend): "));
        assert!(md.contains("  - depends on: r1-mod-2\n"));
        assert!(md.ends_with('\n'));
    }

    #[test]
    fn test_adr_markdown() {
        let adr = adr_markdown(&plan());
        assert!(adr.starts_with("# ADR-r1: Shop\n"));
        assert!(adr.contains("## Status\n\nProposed"));
        assert!(adr.contains("- security"));
        assert!(adr.contains("## Consequences\n\n- Each role"));
        assert!(adr.ends_with("flagged for validation\n"));
    }

    #[tokio::test]
    async fn test_create_and_store() {
        let dir = TempDir::new().unwrap();
        let plan = plan();
        let workspace = BuildWorkspace::new(dir.path(), "r1", None);

        workspace.create("Shop", "r1").await.unwrap();
        for sub in BUILD_SUBDIRS {
            assert!(workspace.root().join(sub).is_dir());
        }
        let readme = std::fs::read_to_string(workspace.root().join("README.md")).unwrap();
        assert!(readme.starts_with("# Solution: Shop\n\nRequest ID: r1"));

        let (_, json) = workspace.store_plan(&plan).await.unwrap();
        let stored: BuildPlan =
            serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
        assert_eq!(stored, plan);

        let adr = workspace
            .write_adr(&plan, &dir.path().join("docs/architecture/decisions"))
            .await
            .unwrap();
        assert!(adr.ends_with("ADR-r1.md"));
    }
}
