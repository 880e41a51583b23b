//! Requirement parser.
//!
//! Classifies free text into typed requirement modules by case-insensitive
//! keyword matching. Deterministic and free of I/O.
//!
//! Module ids are assigned as `mod-1`, `mod-2`, ... in the order frontend,
//! backend, database, qa, security. QA and security modules are always
//! present: QA depends on every module before it, security on every
//! non-QA module.

use crate::models::{ModuleType, ParsedRequirement, Priority, RequirementModule};

const UI_KEYWORDS: &[&str] = &[
    "ui", "interface", "frontend", "react", "component", "page", "form", "button", "display",
    "view", "screen", "dashboard", "mobile", "web",
];

const BACKEND_KEYWORDS: &[&str] = &[
    "api",
    "backend",
    "server",
    "endpoint",
    "rest",
    "graphql",
    "service",
    "authentication",
    "authorization",
    "route",
    "controller",
    "middleware",
];

const DATA_KEYWORDS: &[&str] = &[
    "database", "db", "mongodb", "schema", "model", "collection", "data", "store", "persist",
    "query", "mongoose",
];

fn mentions(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|keyword| lower.contains(keyword))
}

/// Sentences of `text` (split on runs of `.`, `!`, `?`) that mention any keyword.
fn matching_sentences(text: &str, keywords: &[&str]) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty() && mentions(sentence, keywords))
        .map(str::to_string)
        .collect()
}

fn describe(text: &str, keywords: &[&str], lead: &str, fallback: &str) -> String {
    let sentences = matching_sentences(text, keywords);
    if sentences.is_empty() {
        fallback.to_string()
    } else {
        format!("{}: {}", lead, sentences.join(". "))
    }
}

fn acceptance_criteria(text: &str, module_type: ModuleType) -> Vec<String> {
    let criteria: &[&str] = match module_type {
        ModuleType::Frontend => &[
            "UI components are responsive and mobile-friendly",
            "All user interactions work as expected",
        ],
        ModuleType::Backend => &[
            "All API endpoints return correct responses",
            "Error handling is implemented",
            "Authentication and authorization work correctly",
        ],
        ModuleType::Database => &[
            "Schema is properly structured and normalized",
            "Indexes are created for optimal performance",
            "Data validation rules are enforced",
        ],
        ModuleType::Qa => &["All tests pass", "Code meets quality standards"],
        ModuleType::Security => &[
            "No critical vulnerabilities",
            "Security best practices followed",
        ],
        ModuleType::Infrastructure => &[
            "Environments are reproducible",
            "Deployment is automated",
        ],
    };

    let mut criteria: Vec<String> = criteria.iter().map(|c| c.to_string()).collect();
    if module_type == ModuleType::Frontend && text.to_lowercase().contains("form") {
        criteria.push("Form validation works correctly".to_string());
    }
    criteria
}

/// Extract cross-cutting constraints from the request text.
pub fn extract_constraints(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut constraints = Vec::new();

    if lower.contains("mobile") {
        constraints.push("Must be mobile-friendly".to_string());
    }
    if lower.contains("secure") || lower.contains("security") {
        constraints.push("Must follow security best practices".to_string());
    }
    if lower.contains("fast") || lower.contains("performance") {
        constraints.push("Must be optimized for performance".to_string());
    }

    constraints
}

/// Keyword-driven requirement parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequirementParser;

impl RequirementParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse free text into requirement modules and constraints.
    pub fn parse(&self, text: &str) -> ParsedRequirement {
        let mut modules: Vec<RequirementModule> = Vec::new();
        let mut next_id = 1usize;
        let mut module = |module_type: ModuleType,
                          title: &str,
                          description: String,
                          dependencies: Vec<String>| {
            let id = format!("mod-{}", next_id);
            next_id += 1;
            RequirementModule {
                id,
                title: title.to_string(),
                description,
                module_type,
                assigned_role: module_type.default_role(),
                priority: Priority::High,
                dependencies,
                acceptance_criteria: acceptance_criteria(text, module_type),
            }
        };

        if mentions(text, UI_KEYWORDS) {
            modules.push(module(
                ModuleType::Frontend,
                "User Interface",
                describe(
                    text,
                    UI_KEYWORDS,
                    "Build a user interface that",
                    "Build a user interface for the application",
                ),
                Vec::new(),
            ));
        }

        if mentions(text, BACKEND_KEYWORDS) {
            modules.push(module(
                ModuleType::Backend,
                "Backend API",
                describe(
                    text,
                    BACKEND_KEYWORDS,
                    "Build a backend API that",
                    "Build a RESTful API backend",
                ),
                Vec::new(),
            ));
        }

        if mentions(text, DATA_KEYWORDS) {
            let data = module(
                ModuleType::Database,
                "Data Model",
                describe(
                    text,
                    DATA_KEYWORDS,
                    "Design a database schema that",
                    "Design appropriate database schemas",
                ),
                Vec::new(),
            );
            // The API is built on top of the data model.
            if let Some(backend) = modules
                .iter_mut()
                .find(|m| m.module_type == ModuleType::Backend)
            {
                backend.dependencies.push(data.id.clone());
            }
            modules.push(data);
        }

        let qa_deps: Vec<String> = modules.iter().map(|m| m.id.clone()).collect();
        let qa = module(
            ModuleType::Qa,
            "Quality Assurance",
            "Validate and test all generated code".to_string(),
            qa_deps,
        );
        modules.push(qa);

        let security_deps: Vec<String> = modules
            .iter()
            .filter(|m| m.module_type != ModuleType::Qa)
            .map(|m| m.id.clone())
            .collect();
        let security = module(
            ModuleType::Security,
            "Security Review",
            "Perform security audit on generated code".to_string(),
            security_deps,
        );
        modules.push(security);

        ParsedRequirement {
            modules,
            overall_goal: text.to_string(),
            constraints: extract_constraints(text),
        }
    }
}

/// Parse with the default parser.
pub fn parse_requirement(text: &str) -> ParsedRequirement {
    RequirementParser::new().parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgentRole;

    #[test]
    fn test_full_stack_request() {
        let parsed = parse_requirement("Build a REST API with MongoDB and React frontend");
        let types: Vec<ModuleType> = parsed.modules.iter().map(|m| m.module_type).collect();
        assert_eq!(
            types,
            vec![
                ModuleType::Frontend,
                ModuleType::Backend,
                ModuleType::Database,
                ModuleType::Qa,
                ModuleType::Security
            ]
        );

        let backend = parsed.module(ModuleType::Backend).unwrap();
        let database = parsed.module(ModuleType::Database).unwrap();
        assert!(backend.dependencies.contains(&database.id));

        let security = parsed.module(ModuleType::Security).unwrap();
        assert_eq!(security.dependencies, vec!["mod-1", "mod-2", "mod-3"]);

        let qa = parsed.module(ModuleType::Qa).unwrap();
        assert_eq!(qa.dependencies, vec!["mod-1", "mod-2", "mod-3"]);
        assert_eq!(qa.id, "mod-4");
        assert_eq!(security.id, "mod-5");
    }

    #[test]
    fn test_sentence_extraction() {
        let parsed = parse_requirement(
            "Users log in with a form. Orders are kept for a year! Admins get a dashboard?",
        );
        let frontend = parsed.module(ModuleType::Frontend).unwrap();
        assert_eq!(
            frontend.description,
            "Build a user interface that: Users log in with a form. Admins get a dashboard"
        );
        assert!(
            frontend
                .acceptance_criteria
                .contains(&"Form validation works correctly".to_string())
        );
    }

    #[test]
    fn test_plain_text_still_gets_qa_and_security() {
        let parsed = parse_requirement("Something nice");
        assert_eq!(parsed.modules.len(), 2);
        assert_eq!(parsed.modules[0].module_type, ModuleType::Qa);
        assert!(parsed.modules[0].dependencies.is_empty());
        assert_eq!(parsed.modules[1].module_type, ModuleType::Security);
        assert!(parsed.modules[1].dependencies.is_empty());
    }

    #[test]
    fn test_roles_follow_module_types() {
        let parsed = parse_requirement("A dashboard backed by a database");
        let data = parsed.module(ModuleType::Database).unwrap();
        assert_eq!(data.assigned_role, AgentRole::Data);
        assert_eq!(data.acceptance_criteria.len(), 3);
    }

    #[test]
    fn test_constraints() {
        let constraints = extract_constraints("A fast, secure mobile app");
        assert_eq!(
            constraints,
            vec![
                "Must be mobile-friendly",
                "Must follow security best practices",
                "Must be optimized for performance"
            ]
        );
        assert!(extract_constraints("plain").is_empty());
    }

    #[test]
    fn test_overall_goal_is_echoed() {
        let text = "Expose an endpoint";
        assert_eq!(parse_requirement(text).overall_goal, text);
    }
}
