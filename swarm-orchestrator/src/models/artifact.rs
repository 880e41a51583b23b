//! Artifact and handoff records kept by the ledger.

use super::task::AgentRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Kind of artifact a task can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Schema,
    Interface,
    Endpoint,
    Component,
    Test,
    Documentation,
}

impl ArtifactType {
    /// Workspace subdirectory holding artifacts of this type (`<type>s`).
    pub fn directory(&self) -> &'static str {
        match self {
            ArtifactType::Schema => "schemas",
            ArtifactType::Interface => "interfaces",
            ArtifactType::Endpoint => "endpoints",
            ArtifactType::Component => "components",
            ArtifactType::Test => "tests",
            ArtifactType::Documentation => "documentations",
        }
    }

    /// Whether raw content is mirrored next to the JSON sidecar.
    pub fn stores_raw_content(&self) -> bool {
        !matches!(self, ArtifactType::Documentation)
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArtifactType::Schema => "schema",
            ArtifactType::Interface => "interface",
            ArtifactType::Endpoint => "endpoint",
            ArtifactType::Component => "component",
            ArtifactType::Test => "test",
            ArtifactType::Documentation => "documentation",
        };
        f.write_str(name)
    }
}

/// An artifact before the ledger assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArtifact {
    pub artifact_type: ArtifactType,
    pub name: String,
    pub path: String,
    pub content: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub produced_by: AgentRole,
    pub consumed_by: Vec<AgentRole>,
}

impl NewArtifact {
    pub fn new(
        artifact_type: ArtifactType,
        name: impl Into<String>,
        content: impl Into<String>,
        produced_by: AgentRole,
    ) -> Self {
        let name = name.into();
        Self {
            artifact_type,
            path: name.clone(),
            name,
            content: content.into(),
            metadata: HashMap::new(),
            produced_by,
            consumed_by: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn consumed_by(mut self, role: AgentRole) -> Self {
        if !self.consumed_by.contains(&role) {
            self.consumed_by.push(role);
        }
        self
    }
}

/// A published, immutable artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub name: String,
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub produced_by: AgentRole,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumed_by: Vec<AgentRole>,
    pub timestamp: DateTime<Utc>,
}

impl Artifact {
    /// Check whether `role` is listed as a consumer.
    pub fn is_consumed_by(&self, role: &AgentRole) -> bool {
        self.consumed_by.contains(role)
    }
}

/// A grouped reference from one role to another over a set of artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Handoff {
    pub id: String,
    pub from_role: AgentRole,
    pub to_role: AgentRole,
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Serialized snapshot of a ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Manifest {
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub handoffs: Vec<Handoff>,
}

/// Tenant and build that scope a workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct IsolationContext {
    pub user_id: String,
    pub project_id: String,
    pub build_request_id: String,
}

impl IsolationContext {
    pub fn new(
        user_id: impl Into<String>,
        project_id: impl Into<String>,
        build_request_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            project_id: project_id.into(),
            build_request_id: build_request_id.into(),
        }
    }

    /// `solutions/users/<user>/projects/<project>/builds/<build>`, relative.
    pub fn build_dir(&self) -> PathBuf {
        PathBuf::from("solutions")
            .join("users")
            .join(&self.user_id)
            .join("projects")
            .join(&self.project_id)
            .join("builds")
            .join(&self.build_request_id)
    }
}
