//! # Swarm Orchestrator
//!
//! Turns a natural-language build request into a dependency-ordered graph of
//! role-specific tasks and drives it through a phased workflow:
//! planning, development, security gate, QA review, optional deployment.
//!
//! ## Overview
//!
//! - [`parser`] classifies request text into typed requirement modules
//! - [`planner`] derives a validated task graph (minimal or enhanced mode)
//! - [`scheduler`] orders tasks topologically and dispatches them to the
//!   [`executor`] registered for each role, retrying with backoff
//! - [`ledger`] records published artifacts and handoffs on disk
//! - [`controller`] sequences the phases and owns the workflow state
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use swarm_orchestrator::{BuildRequest, PhaseController, PlanMode, SwarmConfig};
//!
//! #[tokio::main]
//! async fn main() -> swarm_orchestrator::Result<()> {
//!     let mut controller = PhaseController::new(SwarmConfig::default())?;
//!     let request = BuildRequest::new("Shop", "A REST API with MongoDB and a React frontend");
//!     let outcome = controller.run_request(request, Some(PlanMode::Enhanced)).await?;
//!     println!("{} tasks", outcome.state.tasks.len());
//!     Ok(())
//! }
//! ```

pub mod controller;
pub mod deploy;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod models;
pub mod output;
pub mod parser;
pub mod planner;
pub mod retry;
pub mod scheduler;
pub mod telemetry;
pub mod workspace;

pub use controller::{BuildOutcome, PhaseController, PhaseControllerBuilder};
pub use deploy::{Deployer, WebhookDeployer};
pub use error::{Result, SwarmError};
pub use executor::{
    ExecutionOutcome, ExecutorRegistry, TaskContext, TaskExecutor, WorkspaceExecutor,
};
pub use ledger::ArtifactLedger;
pub use models::*;
pub use output::SwarmOutput;
pub use parser::{RequirementParser, extract_constraints, parse_requirement};
pub use planner::{BuildPlan, Planner, generate_request_id, validate_plan};
pub use retry::{Backoff, RetryPolicy};
pub use scheduler::{ScheduleReport, Scheduler, topological_sort};
pub use workspace::BuildWorkspace;
