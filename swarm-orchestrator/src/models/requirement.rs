//! Requirement data structures produced by the parser.

use super::task::AgentRole;
use serde::{Deserialize, Serialize};

/// Kind of work a requirement module describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    Frontend,
    Backend,
    Database,
    Security,
    Infrastructure,
    Qa,
}

impl ModuleType {
    /// Role that owns modules of this type.
    pub fn default_role(&self) -> AgentRole {
        match self {
            ModuleType::Frontend => AgentRole::Frontend,
            ModuleType::Backend => AgentRole::Backend,
            ModuleType::Database => AgentRole::Data,
            ModuleType::Security => AgentRole::Security,
            ModuleType::Infrastructure => AgentRole::Infra,
            ModuleType::Qa => AgentRole::Qa,
        }
    }
}

impl std::fmt::Display for ModuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleType::Frontend => write!(f, "frontend"),
            ModuleType::Backend => write!(f, "backend"),
            ModuleType::Database => write!(f, "database"),
            ModuleType::Security => write!(f, "security"),
            ModuleType::Infrastructure => write!(f, "infrastructure"),
            ModuleType::Qa => write!(f, "qa"),
        }
    }
}

/// Priority of a requirement module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    High,
    Medium,
    Low,
}

/// A typed unit of requirement inferred from free text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequirementModule {
    /// Identifier unique within one parse (e.g., "mod-3")
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub module_type: ModuleType,
    pub assigned_role: AgentRole,
    #[serde(default)]
    pub priority: Priority,
    /// Ids of modules that must be delivered first
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
}

/// Output of the requirement parser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ParsedRequirement {
    pub modules: Vec<RequirementModule>,
    /// The original request text
    pub overall_goal: String,
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl ParsedRequirement {
    /// Find a module by type.
    pub fn module(&self, module_type: ModuleType) -> Option<&RequirementModule> {
        self.modules.iter().find(|m| m.module_type == module_type)
    }

    /// Check whether a module of the given type was inferred.
    pub fn has_module(&self, module_type: ModuleType) -> bool {
        self.module(module_type).is_some()
    }
}
