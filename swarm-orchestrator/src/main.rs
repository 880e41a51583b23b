//! Swarm - multi-agent build orchestrator CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Plan and run a build request
//! swarm run request.json --mode enhanced
//!
//! # Write plan files only
//! swarm plan request.json
//!
//! # Inspect a ledger workspace
//! swarm manifest solutions/_staging/<request-id>/artifacts
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use swarm_orchestrator::{
    ArtifactLedger, BuildRequest, DebugLevel, PhaseController, PlanMode, Result, SwarmConfig,
    SwarmOutput, TelemetryConfig,
};
use swarm_telemetry::TelemetryOptions;
use tracing::info;

/// Swarm - multi-agent build orchestrator
#[derive(Parser, Debug)]
#[command(name = "swarm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output verbosity level
    #[arg(short = 'd', long, value_enum, global = true)]
    debug: Option<CliDebugLevel>,

    /// Root for solutions, plans and ADRs (overrides SWARM_BASE_PATH)
    #[arg(short = 'b', long, global = true)]
    base_path: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDebugLevel {
    /// Only errors and final status
    Minimal,
    /// Phase and task progress (default)
    Normal,
    /// Adds executor messages
    Verbose,
    /// Full debug output
    Debug,
}

impl From<CliDebugLevel> for DebugLevel {
    fn from(cli: CliDebugLevel) -> Self {
        match cli {
            CliDebugLevel::Minimal => DebugLevel::Minimal,
            CliDebugLevel::Normal => DebugLevel::Normal,
            CliDebugLevel::Verbose => DebugLevel::Verbose,
            CliDebugLevel::Debug => DebugLevel::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliPlanMode {
    Minimal,
    Enhanced,
}

impl From<CliPlanMode> for PlanMode {
    fn from(cli: CliPlanMode) -> Self {
        match cli {
            CliPlanMode::Minimal => PlanMode::Minimal,
            CliPlanMode::Enhanced => PlanMode::Enhanced,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a build request through every phase
    Run {
        /// Build request JSON file
        request: PathBuf,
        /// Planning mode (overrides SWARM_PLAN_MODE)
        #[arg(short, long, value_enum)]
        mode: Option<CliPlanMode>,
        /// Shorthand for --mode enhanced
        #[arg(long, conflicts_with = "mode")]
        enhanced: bool,
    },
    /// Plan a build request and write the plan files without executing
    Plan {
        /// Build request JSON file
        request: PathBuf,
        #[arg(short, long, value_enum)]
        mode: Option<CliPlanMode>,
    },
    /// Load a ledger workspace and list its artifacts and handoffs
    Manifest {
        /// Ledger workspace directory (contains manifest.json)
        workspace: PathBuf,
    },
    /// Validate and print the configuration
    Config,
}

/// Pick the console filter from the debug level so normal runs stay quiet.
fn init_telemetry(
    config: &TelemetryConfig,
    debug_level: DebugLevel,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let log_level = match debug_level {
        DebugLevel::Minimal | DebugLevel::Normal => "error",
        DebugLevel::Verbose => "warn",
        DebugLevel::Debug => config.log_level.as_str(),
    };

    let mut options = TelemetryOptions::new(&config.service_name)
        .with_log_level(log_level)
        .with_json(config.json_logs);
    if config.enabled && debug_level.is_verbose() {
        if let Some(ref endpoint) = config.otlp_endpoint {
            options = options.with_otlp_endpoint(endpoint);
        }
    }
    swarm_telemetry::init(&options)
}

fn print_config(config: &SwarmConfig) {
    println!("{}", "Configuration:".yellow().bold());
    println!("  Plan Mode:       {}", config.plan_mode.to_string().cyan());
    println!(
        "  Retries:         {} ({:?}, base {}ms)",
        config.retry.max_retries, config.retry.strategy, config.retry.backoff_base_ms
    );
    match config.task_timeout_secs {
        Some(secs) => println!("  Task Timeout:    {}s", secs),
        None => println!("  Task Timeout:    {}", "none".bright_black()),
    }
    println!("  Base Path:       {}", config.base_path);
    println!("  ADR Directory:   {}", config.adr_dir);
    match config.deployment {
        Some(ref deployment) => println!(
            "  Deployment:      {} → {}",
            deployment.environment.to_string().cyan(),
            deployment.webhook_url
        ),
        None => println!("  Deployment:      {}", "disabled".bright_black()),
    }
    println!("  Debug Level:     {}", config.debug_level.to_string().cyan());
    println!();
}

async fn run_build(config: SwarmConfig, path: PathBuf, mode: Option<PlanMode>) -> Result<()> {
    let mut controller = PhaseController::new(config)?;
    let outcome = controller.run(&path, mode).await?;

    println!();
    println!("{}", "Build Complete!".green().bold());
    println!("  Workspace: {}", outcome.workspace.display());
    println!("  Manifest:  {}", outcome.manifest_path.display());
    if let Some(ref deployment) = outcome.state.deployment {
        println!("  Deployment: {}", deployment.message);
    }
    Ok(())
}

async fn plan_build(config: SwarmConfig, path: PathBuf, mode: Option<PlanMode>) -> Result<()> {
    let controller = PhaseController::new(config)?;
    let request = BuildRequest::load(&path).await?;
    let (plan, workspace) = controller.plan_request(&request, mode).await?;

    println!();
    println!(
        "{} {} ({} tasks)",
        "Planned".green().bold(),
        plan.request_id.cyan(),
        plan.tasks.len()
    );
    println!("  Plan: {}", workspace.plan_dir().join("plan.md").display());
    Ok(())
}

async fn show_manifest(workspace: PathBuf) -> Result<()> {
    let ledger = ArtifactLedger::at(workspace);
    let count = ledger.load_from_workspace().await?;
    if count == 0 {
        println!("{}", "No manifest found.".yellow());
        return Ok(());
    }

    println!("{}", "Artifacts:".yellow().bold());
    for artifact in ledger.all_artifacts() {
        println!(
            "  {} {} ({}, by {})",
            artifact.id.cyan(),
            artifact.name,
            artifact.artifact_type,
            artifact.produced_by
        );
    }
    let handoffs = ledger.handoffs();
    if !handoffs.is_empty() {
        println!("{}", "Handoffs:".yellow().bold());
        for handoff in handoffs {
            println!(
                "  {} {} → {} ({} artifacts)",
                handoff.id.cyan(),
                handoff.from_role,
                handoff.to_role,
                handoff.artifacts.len()
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("Loaded config from: {}", path.display());
    }

    let cli = Cli::parse();

    let mut config = match SwarmConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "Configuration Error".red().bold(), e);
            std::process::exit(1);
        }
    };
    if let Some(debug_level) = cli.debug {
        config.debug_level = debug_level.into();
    }
    if let Some(ref path) = cli.base_path {
        config.base_path = path.clone();
    }

    if let Err(e) = init_telemetry(&config.telemetry, config.debug_level) {
        eprintln!("{}: {}", "Telemetry Warning".yellow(), e);
        eprintln!("Continuing without full telemetry support...");
    }

    let output = SwarmOutput::new(config.debug_level);
    output.banner();

    let result = match cli.command {
        Commands::Run {
            request,
            mode,
            enhanced,
        } => {
            let mode = if enhanced {
                Some(PlanMode::Enhanced)
            } else {
                mode.map(PlanMode::from)
            };
            info!(request = %request.display(), "Starting swarm run");
            run_build(config, request, mode).await
        }
        Commands::Plan { request, mode } => {
            plan_build(config, request, mode.map(PlanMode::from)).await
        }
        Commands::Manifest { workspace } => show_manifest(workspace).await,
        Commands::Config => match config.validate() {
            Ok(()) => {
                print_config(&config);
                output.success("Configuration is valid!");
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
    };

    swarm_telemetry::shutdown_telemetry();

    if let Err(e) = result {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}
