//! Console output for orchestration runs.
//!
//! ## Debug Levels
//!
//! - `Minimal`: Only errors and the final result line
//! - `Normal`: Phase changes and task progress (default)
//! - `Verbose`: Adds executor messages and retry notices
//! - `Debug`: Adds internal state dumps

use crate::models::{DebugLevel, TaskStats, WorkflowPhase};
use colored::Colorize;

/// Output handler that respects debug levels.
#[derive(Debug, Clone)]
pub struct SwarmOutput {
    level: DebugLevel,
}

impl Default for SwarmOutput {
    fn default() -> Self {
        Self::new(DebugLevel::Normal)
    }
}

impl SwarmOutput {
    pub fn new(level: DebugLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> DebugLevel {
        self.level
    }

    /// Print a phase header (shown at Normal and above).
    pub fn phase(&self, phase: WorkflowPhase) {
        if self.level.is_normal() {
            println!(
                "\n{} {}",
                "▶".bright_cyan(),
                phase.to_string().bright_white().bold()
            );
        }
    }

    /// Print a status message within a phase (shown at Normal and above).
    pub fn status(&self, message: &str) {
        if self.level.is_normal() {
            println!("  {} {}", "•".bright_black(), message);
        }
    }

    pub fn phase_complete(&self, message: &str) {
        if self.level.is_normal() {
            println!("  {} {}", "✓".bright_green(), message.green());
        }
    }

    pub fn list_item(&self, message: &str) {
        if self.level.is_normal() {
            println!("    {} {}", "─".bright_black(), message);
        }
    }

    pub fn task_start(&self, task_id: &str, role: &str) {
        if self.level.is_normal() {
            println!("  {} {} ({})", "→".bright_blue(), task_id.cyan(), role);
        }
    }

    pub fn task_complete(&self, task_id: &str, success: bool) {
        if self.level.is_normal() {
            if success {
                println!("  {} {} completed", "✓".bright_green(), task_id.green());
            } else {
                println!("  {} {} failed", "✗".bright_red(), task_id.red());
            }
        }
    }

    /// Print an executor result message (shown at Verbose and above).
    pub fn executor_message(&self, message: &str) {
        if self.level.is_verbose() && !message.trim().is_empty() {
            println!("     {} {}", "←".green(), message.trim().bright_black());
        }
    }

    /// Print a JSON value (shown at Debug only).
    pub fn debug_json(&self, context: &str, value: &serde_json::Value) {
        if self.level.is_debug() {
            println!("  {} [{}]", "🐛".bright_yellow(), context.bright_black());
            if let Ok(pretty) = serde_json::to_string_pretty(value) {
                for line in pretty.lines() {
                    println!("       {}", line.bright_black());
                }
            }
        }
    }

    pub fn debug(&self, context: &str, message: &str) {
        if self.level.is_debug() {
            println!(
                "  {} [{}] {}",
                "🐛".bright_yellow(),
                context.bright_black(),
                message
            );
        }
    }

    /// Print an error (always shown).
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗ Error:".bright_red().bold(), message);
    }

    pub fn warn(&self, message: &str) {
        if self.level.is_normal() {
            println!("{} {}", "⚠".bright_yellow(), message.yellow());
        }
    }

    /// Print a success message (always shown).
    pub fn success(&self, message: &str) {
        println!("{} {}", "✓".bright_green(), message.green());
    }

    pub fn banner(&self) {
        if self.level.is_normal() {
            println!(
                "{}",
                r#"
  ____
 / ___|_      ____ _ _ __ _ __ ___
 \___ \ \ /\ / / _` | '__| '_ ` _ \
  ___) \ V  V / (_| | |  | | | | | |
 |____/ \_/\_/ \__,_|_|  |_| |_| |_|
"#
                .cyan()
            );
            println!("{}", "Multi-Agent Build Orchestrator".bright_white());
            println!();
        }
    }

    /// Print the final summary. Minimal prints a single line.
    pub fn summary(&self, request_id: &str, stats: &TaskStats, success: bool) {
        if self.level.is_minimal() {
            if success {
                println!("✓ Complete: {}/{} tasks", stats.completed, stats.total);
            } else {
                println!(
                    "✗ Incomplete: {}/{} tasks ({} flagged)",
                    stats.completed, stats.total, stats.validation_required
                );
            }
            return;
        }

        println!();
        println!("{}", "─".repeat(50).bright_black());
        println!("  Request {}", request_id.cyan());
        if success {
            println!(
                "{} {} tasks completed",
                "✓".bright_green(),
                stats.completed.to_string().green()
            );
        } else {
            println!(
                "{} {}/{} tasks completed, {} require validation, {} failed",
                "⚠".bright_yellow(),
                stats.completed,
                stats.total,
                stats.validation_required,
                stats.failed
            );
        }
        println!("{}", "─".repeat(50).bright_black());
    }
}
