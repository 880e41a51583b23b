//! Build request input.

use super::artifact::IsolationContext;
use crate::{Result, SwarmError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A feature request submitted for orchestration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub apply_to_platform: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl BuildRequest {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            apply_to_platform: false,
            user_id: None,
            project_id: None,
        }
    }

    /// Scope the request to a user's project.
    pub fn for_project(
        mut self,
        user_id: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        self.user_id = Some(user_id.into());
        self.project_id = Some(project_id.into());
        self
    }

    /// Read and validate a request from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            SwarmError::input(format!("cannot read build request '{}': {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate a request from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self> {
        let request: BuildRequest = serde_json::from_str(raw)
            .map_err(|e| SwarmError::input(format!("malformed build request: {}", e)))?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(SwarmError::input("build request title cannot be empty"));
        }
        if self.description.trim().is_empty() {
            return Err(SwarmError::input("build request description cannot be empty"));
        }
        for (field, id) in [("userId", &self.user_id), ("projectId", &self.project_id)] {
            if let Some(id) = id {
                validate_path_segment(field, id)?;
            }
        }
        Ok(())
    }

    /// Isolation context for this build, present only when both the user and
    /// project are known.
    pub fn isolation(&self, request_id: &str) -> Option<IsolationContext> {
        match (self.user_id.as_deref(), self.project_id.as_deref()) {
            (Some(user), Some(project)) if !user.is_empty() && !project.is_empty() => {
                Some(IsolationContext::new(user, project, request_id))
            }
            _ => None,
        }
    }
}

/// Ids become directory names under the base path, so each one must be a
/// single relative segment.
fn validate_path_segment(field: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(SwarmError::input(format!("{} cannot be empty", field)));
    }
    if Path::new(id).is_absolute() || id.contains(['/', '\\']) || id.contains("..") {
        return Err(SwarmError::input(format!(
            "{} '{}' must be a plain name without path separators or '..'",
            field, id
        )));
    }
    Ok(())
}

/// How the planner turns a request into tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    /// Fixed architect-led plan without requirement parsing
    Minimal,
    /// One task per parsed requirement module
    #[default]
    Enhanced,
}

impl std::fmt::Display for PlanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanMode::Minimal => write!(f, "minimal"),
            PlanMode::Enhanced => write!(f, "enhanced"),
        }
    }
}

impl std::str::FromStr for PlanMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minimal" => Ok(PlanMode::Minimal),
            "enhanced" => Ok(PlanMode::Enhanced),
            other => Err(format!("unknown plan mode '{}'", other)),
        }
    }
}
