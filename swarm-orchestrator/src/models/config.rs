//! Configuration for the swarm orchestrator.
//!
//! This module provides configuration structures for:
//! - Retry and backoff policy for task dispatch
//! - Optional deployment webhook
//! - Telemetry and console verbosity
//! - Output locations for plans, ADRs and build workspaces
//!
//! ## Validation
//!
//! Configuration is validated on load so a bad value fails before any build
//! starts. Use `SwarmConfig::from_env()` to read `SWARM_*` variables, or the
//! builder with `.build()` for programmatic configuration.

use super::request::PlanMode;
use crate::retry::{Backoff, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Maximum allowed value for max_retries.
pub const MAX_RETRIES_LIMIT: u32 = 100;

/// Maximum allowed backoff base, in milliseconds.
pub const MAX_BACKOFF_BASE_MS: u64 = 600_000;

/// Maximum allowed per-task timeout, in seconds.
pub const MAX_TASK_TIMEOUT_SECS: u64 = 86_400;

/// Validation error with context and suggestions.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field that failed validation
    pub field: String,
    /// Description of the error
    pub message: String,
    /// Suggested fix or valid values
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl ValidationError {
    /// Create a new validation error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion to the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::error::Error for ValidationError {}

/// Console verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DebugLevel {
    /// Only errors and the final status
    Minimal,
    /// Phase and task progress
    #[default]
    Normal,
    /// Progress plus executor messages
    Verbose,
    /// Everything, including tracing output
    Debug,
}

impl DebugLevel {
    pub fn is_minimal(&self) -> bool {
        matches!(self, DebugLevel::Minimal)
    }

    pub fn is_normal(&self) -> bool {
        !self.is_minimal()
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, DebugLevel::Verbose | DebugLevel::Debug)
    }

    pub fn is_debug(&self) -> bool {
        matches!(self, DebugLevel::Debug)
    }
}

impl std::fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DebugLevel::Minimal => write!(f, "minimal"),
            DebugLevel::Normal => write!(f, "normal"),
            DebugLevel::Verbose => write!(f, "verbose"),
            DebugLevel::Debug => write!(f, "debug"),
        }
    }
}

impl FromStr for DebugLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minimal" => Ok(DebugLevel::Minimal),
            "normal" => Ok(DebugLevel::Normal),
            "verbose" => Ok(DebugLevel::Verbose),
            "debug" => Ok(DebugLevel::Debug),
            other => Err(format!("unknown debug level '{}'", other)),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    /// Whether telemetry is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Service name for telemetry
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// OTLP endpoint for exporting telemetry
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON log lines
    #[serde(default)]
    pub json_logs: bool,
}

fn default_true() -> bool {
    true
}

fn default_service_name() -> String {
    "swarm".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: default_service_name(),
            otlp_endpoint: None,
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create from environment variables.
    pub fn from_env() -> Result<Self, ValidationError> {
        let mut config = Self::default();

        if let Ok(enabled) = env::var("SWARM_TELEMETRY_ENABLED") {
            config.enabled = enabled.to_lowercase() == "true";
        }
        if let Ok(name) = env::var("SWARM_SERVICE_NAME") {
            config.service_name = name;
        }
        if let Ok(endpoint) = env::var("SWARM_OTLP_ENDPOINT") {
            config.otlp_endpoint = Some(endpoint);
        }
        if let Ok(level) = env::var("SWARM_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Ok(json) = env::var("SWARM_JSON_LOGS") {
            config.json_logs = json.to_lowercase() == "true";
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate telemetry config.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::new(
                "log_level",
                format!("Invalid log level '{}'", self.log_level),
            )
            .with_suggestion(format!("Valid log levels: {:?}", valid_levels)));
        }

        if self.service_name.is_empty() {
            return Err(ValidationError::new("service_name", "Service name cannot be empty")
                .with_suggestion("Set SWARM_SERVICE_NAME or use default 'swarm'"));
        }

        if let Some(ref endpoint) = self.otlp_endpoint {
            validate_url("otlp_endpoint", endpoint)?;
        }

        Ok(())
    }
}

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `base * attempt`
    #[default]
    Linear,
    /// `base * 2^(attempt-1)`, capped at `max_backoff_ms`
    Exponential,
}

impl FromStr for BackoffStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(BackoffStrategy::Linear),
            "exponential" => Ok(BackoffStrategy::Exponential),
            other => Err(format!("unknown backoff strategy '{}'", other)),
        }
    }
}

/// Retry settings for task dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrySettings {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default)]
    pub strategy: BackoffStrategy,
    /// Upper bound for exponential delays
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            strategy: BackoffStrategy::default(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetrySettings {
    /// Build the runtime retry policy.
    pub fn policy(&self) -> RetryPolicy {
        let base = Duration::from_millis(self.backoff_base_ms);
        let backoff = match self.strategy {
            BackoffStrategy::Linear => Backoff::Linear { base },
            BackoffStrategy::Exponential => Backoff::Exponential {
                initial: base,
                multiplier: 2.0,
                max: Duration::from_millis(self.max_backoff_ms),
            },
        };
        RetryPolicy::new(self.max_retries, backoff)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ValidationError::new(
                "max_retries",
                format!(
                    "Max retries {} exceeds limit of {}",
                    self.max_retries, MAX_RETRIES_LIMIT
                ),
            )
            .with_suggestion(format!("Use a value between 0 and {}", MAX_RETRIES_LIMIT)));
        }

        if self.backoff_base_ms > MAX_BACKOFF_BASE_MS {
            return Err(ValidationError::new(
                "backoff_base_ms",
                format!(
                    "Backoff base {}ms exceeds limit of {}ms",
                    self.backoff_base_ms, MAX_BACKOFF_BASE_MS
                ),
            )
            .with_suggestion("Use a value like 1000 (one second per attempt)"));
        }

        if self.strategy == BackoffStrategy::Exponential
            && self.max_backoff_ms < self.backoff_base_ms
        {
            return Err(ValidationError::new(
                "max_backoff_ms",
                "Max backoff must not be smaller than the backoff base",
            )
            .with_suggestion(format!("Use at least {}", self.backoff_base_ms)));
        }

        Ok(())
    }
}

/// Target environment of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeployEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl std::fmt::Display for DeployEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployEnvironment::Development => write!(f, "development"),
            DeployEnvironment::Staging => write!(f, "staging"),
            DeployEnvironment::Production => write!(f, "production"),
        }
    }
}

impl FromStr for DeployEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(DeployEnvironment::Development),
            "staging" => Ok(DeployEnvironment::Staging),
            "production" | "prod" => Ok(DeployEnvironment::Production),
            other => Err(format!("unknown deployment environment '{}'", other)),
        }
    }
}

/// Deploy hook settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub environment: DeployEnvironment,
}

impl DeploymentConfig {
    pub fn new(webhook_url: impl Into<String>, environment: DeployEnvironment) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            environment,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_url("deployment.webhook_url", &self.webhook_url)
    }
}

/// Main configuration for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwarmConfig {
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Retry policy for task dispatch
    #[serde(default)]
    pub retry: RetrySettings,
    /// Per-task executor timeout in seconds
    #[serde(default)]
    pub task_timeout_secs: Option<u64>,
    /// Root under which solutions, plans and ADRs are written
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// ADR directory, relative to `base_path`
    #[serde(default = "default_adr_dir")]
    pub adr_dir: String,
    /// Planning mode used when the caller does not choose one
    #[serde(default)]
    pub plan_mode: PlanMode,
    /// Console verbosity
    #[serde(default)]
    pub debug_level: DebugLevel,
    /// Deployment hook; the deployment phase is skipped without it
    #[serde(default)]
    pub deployment: Option<DeploymentConfig>,
}

fn default_base_path() -> String {
    ".".to_string()
}

fn default_adr_dir() -> String {
    "docs/architecture/decisions".to_string()
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            telemetry: TelemetryConfig::default(),
            retry: RetrySettings::default(),
            task_timeout_secs: None,
            base_path: default_base_path(),
            adr_dir: default_adr_dir(),
            plan_mode: PlanMode::default(),
            debug_level: DebugLevel::default(),
            deployment: None,
        }
    }
}

fn parse_env<T>(var: &str, field: &str, suggestion: &str) -> Result<Option<T>, ValidationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|e| {
            ValidationError::new(field, format!("Invalid {} '{}': {}", var, raw, e))
                .with_suggestion(suggestion)
        }),
        Err(_) => Ok(None),
    }
}

impl SwarmConfig {
    /// Create a new configuration builder.
    pub fn builder() -> SwarmConfigBuilder {
        SwarmConfigBuilder::default()
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// ## Environment Variables
    ///
    /// - `SWARM_MAX_RETRIES` - Retries per task (default: 3)
    /// - `SWARM_BACKOFF_BASE_MS` - Backoff base in ms (default: 1000)
    /// - `SWARM_BACKOFF_STRATEGY` - `linear` or `exponential` (default: linear)
    /// - `SWARM_MAX_BACKOFF_MS` - Exponential cap in ms (default: 30000)
    /// - `SWARM_TASK_TIMEOUT_SECS` - Per-task timeout (default: none)
    /// - `SWARM_BASE_PATH` - Output root (default: .)
    /// - `SWARM_ADR_DIR` - ADR directory (default: docs/architecture/decisions)
    /// - `SWARM_PLAN_MODE` - `minimal` or `enhanced` (default: enhanced)
    /// - `SWARM_DEBUG_LEVEL` - Console verbosity (default: normal)
    /// - `SWARM_DEPLOY_WEBHOOK_URL` / `SWARM_DEPLOY_ENVIRONMENT` - Deploy hook
    pub fn from_env() -> Result<Self, ValidationError> {
        let mut config = Self {
            telemetry: TelemetryConfig::from_env()?,
            ..Default::default()
        };

        if let Some(retries) =
            parse_env("SWARM_MAX_RETRIES", "max_retries", "Use a non-negative integer like 3")?
        {
            config.retry.max_retries = retries;
        }
        if let Some(base) = parse_env(
            "SWARM_BACKOFF_BASE_MS",
            "backoff_base_ms",
            "Use milliseconds, e.g. 1000",
        )? {
            config.retry.backoff_base_ms = base;
        }
        if let Some(strategy) = parse_env(
            "SWARM_BACKOFF_STRATEGY",
            "strategy",
            "Use 'linear' or 'exponential'",
        )? {
            config.retry.strategy = strategy;
        }
        if let Some(max) = parse_env(
            "SWARM_MAX_BACKOFF_MS",
            "max_backoff_ms",
            "Use milliseconds, e.g. 30000",
        )? {
            config.retry.max_backoff_ms = max;
        }
        if let Some(timeout) = parse_env(
            "SWARM_TASK_TIMEOUT_SECS",
            "task_timeout_secs",
            "Use a positive number of seconds",
        )? {
            config.task_timeout_secs = Some(timeout);
        }
        if let Ok(path) = env::var("SWARM_BASE_PATH") {
            config.base_path = path;
        }
        if let Ok(path) = env::var("SWARM_ADR_DIR") {
            config.adr_dir = path;
        }
        if let Some(mode) =
            parse_env("SWARM_PLAN_MODE", "plan_mode", "Use 'minimal' or 'enhanced'")?
        {
            config.plan_mode = mode;
        }
        if let Some(level) = parse_env(
            "SWARM_DEBUG_LEVEL",
            "debug_level",
            "Use minimal, normal, verbose or debug",
        )? {
            config.debug_level = level;
        }
        if let Ok(url) = env::var("SWARM_DEPLOY_WEBHOOK_URL") {
            let environment = parse_env(
                "SWARM_DEPLOY_ENVIRONMENT",
                "deployment.environment",
                "Use development, staging or production",
            )?
            .unwrap_or_default();
            config.deployment = Some(DeploymentConfig::new(url, environment));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.telemetry.validate()?;
        self.retry.validate()?;

        if let Some(timeout) = self.task_timeout_secs {
            if timeout == 0 || timeout > MAX_TASK_TIMEOUT_SECS {
                return Err(ValidationError::new(
                    "task_timeout_secs",
                    format!("Task timeout {}s is out of range", timeout),
                )
                .with_suggestion(format!(
                    "Use a value between 1 and {} or unset SWARM_TASK_TIMEOUT_SECS",
                    MAX_TASK_TIMEOUT_SECS
                )));
            }
        }

        validate_path("base_path", &self.base_path)?;
        validate_path("adr_dir", &self.adr_dir)?;

        if let Some(ref deployment) = self.deployment {
            deployment.validate()?;
        }

        Ok(())
    }

    /// Per-task timeout, if configured.
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }
}

fn validate_url(field: &str, url: &str) -> Result<(), ValidationError> {
    if url.is_empty() {
        return Err(ValidationError::new(field, "URL cannot be empty if specified")
            .with_suggestion("Provide a URL like 'https://example.com/hook'"));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ValidationError::new(
            field,
            format!("'{}' must start with http:// or https://", url),
        )
        .with_suggestion("Use a valid URL like 'http://localhost:4317'"));
    }
    Ok(())
}

/// Validate a path configuration value.
fn validate_path(field: &str, path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(ValidationError::new(field, format!("{} cannot be empty", field))
            .with_suggestion(format!("Set SWARM_{} to a valid path", field.to_uppercase())));
    }

    if path.chars().any(|c| c.is_control()) {
        return Err(ValidationError::new(
            field,
            format!("{} contains invalid control characters", field),
        )
        .with_suggestion("Use only printable characters in paths"));
    }

    if path.len() > 4096 {
        return Err(ValidationError::new(
            field,
            format!("{} is too long ({} chars)", field, path.len()),
        )
        .with_suggestion("Path should be under 4096 characters"));
    }

    Ok(())
}

/// Builder for SwarmConfig with fluent API.
#[derive(Debug, Clone, Default)]
pub struct SwarmConfigBuilder {
    config: SwarmConfig,
}

impl SwarmConfigBuilder {
    pub fn telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.config.telemetry = telemetry;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.retry.max_retries = retries;
        self
    }

    pub fn backoff_base_ms(mut self, millis: u64) -> Self {
        self.config.retry.backoff_base_ms = millis;
        self
    }

    pub fn backoff_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.config.retry.strategy = strategy;
        self
    }

    pub fn task_timeout_secs(mut self, secs: u64) -> Self {
        self.config.task_timeout_secs = Some(secs);
        self
    }

    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.config.base_path = path.into();
        self
    }

    pub fn adr_dir(mut self, path: impl Into<String>) -> Self {
        self.config.adr_dir = path.into();
        self
    }

    pub fn plan_mode(mut self, mode: PlanMode) -> Self {
        self.config.plan_mode = mode;
        self
    }

    pub fn debug_level(mut self, level: DebugLevel) -> Self {
        self.config.debug_level = level;
        self
    }

    pub fn deployment(mut self, deployment: DeploymentConfig) -> Self {
        self.config.deployment = Some(deployment);
        self
    }

    /// Build the configuration, validating it first.
    pub fn build(self) -> Result<SwarmConfig, ValidationError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build the configuration without validation.
    pub fn build_unchecked(self) -> SwarmConfig {
        self.config
    }
}
