//! Subscriber installation.
//!
//! Only the first successful call in a process installs a subscriber; later
//! calls are no-ops so tests and binaries can call `init` freely.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

type InitResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Options controlling how the global subscriber is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryOptions {
    /// Service name attached to every exported span.
    pub service_name: String,
    /// Default filter directive when `RUST_LOG` is unset.
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// OTLP collector endpoint, e.g. `http://localhost:4317`.
    pub otlp_endpoint: Option<String>,
}

impl TelemetryOptions {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: "info".to_string(),
            json: false,
            otlp_endpoint: None,
        }
    }

    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    #[must_use]
    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }
}

fn env_filter(default_level: &str) -> Result<EnvFilter, Box<dyn std::error::Error + Send + Sync>> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(default_level)?),
    }
}

/// Install the global subscriber described by `options`.
///
/// With an OTLP endpoint, spans and metrics are exported through
/// OpenTelemetry in addition to console output.
pub fn init(options: &TelemetryOptions) -> InitResult {
    let mut outcome: InitResult = Ok(());
    INIT.call_once(|| {
        outcome = match options.otlp_endpoint.as_deref() {
            Some(endpoint) => install_otlp(options, endpoint),
            None => install_console(options),
        };
    });
    outcome
}

/// Console-only logging at `info` for the given service.
pub fn init_telemetry(service_name: &str) -> InitResult {
    init(&TelemetryOptions::new(service_name))
}

/// Console logging plus OTLP export to `endpoint`.
pub fn init_with_otlp(service_name: &str, endpoint: &str) -> InitResult {
    init(&TelemetryOptions::new(service_name).with_otlp_endpoint(endpoint))
}

fn install_console(options: &TelemetryOptions) -> InitResult {
    let filter = env_filter(&options.log_level)?;
    let registry = tracing_subscriber::registry().with(filter);

    if options.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true).with_line_number(true))
            .try_init()?;
    }

    tracing::info!(service.name = %options.service_name, "Telemetry initialized");
    Ok(())
}

fn install_otlp(options: &TelemetryOptions, endpoint: &str) -> InitResult {
    use opentelemetry_otlp::WithExportConfig;
    use tracing_opentelemetry::OpenTelemetryLayer;

    let resource = opentelemetry_sdk::Resource::new(vec![opentelemetry::KeyValue::new(
        "service.name",
        options.service_name.clone(),
    )]);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
        .with_trace_config(opentelemetry_sdk::trace::config().with_resource(resource.clone()))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    let meter_provider = opentelemetry_otlp::new_pipeline()
        .metrics(opentelemetry_sdk::runtime::Tokio)
        .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
        .with_resource(resource)
        .build()?;
    opentelemetry::global::set_meter_provider(meter_provider);

    tracing_subscriber::registry()
        .with(env_filter(&options.log_level)?)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_line_number(true))
        .with(OpenTelemetryLayer::new(tracer))
        .try_init()?;

    tracing::info!(
        service.name = %options.service_name,
        otlp.endpoint = endpoint,
        "Telemetry initialized with OpenTelemetry"
    );
    Ok(())
}

/// Flush pending spans. Call once before process exit.
pub fn shutdown_telemetry() {
    opentelemetry::global::shutdown_tracer_provider();
}
