//! # Swarm Telemetry
//!
//! Process-level observability for the swarm orchestrator: structured logging
//! through `tracing`, with optional OpenTelemetry export over OTLP.
//!
//! ```rust
//! use swarm_telemetry::{TelemetryOptions, init};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     init(&TelemetryOptions::new("swarm").with_log_level("debug"))?;
//!     swarm_telemetry::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod init;

pub use tracing::{Span, debug, error, info, instrument, trace, warn};

pub use init::{TelemetryOptions, init, init_telemetry, init_with_otlp, shutdown_telemetry};

pub use opentelemetry::global;
pub use opentelemetry::metrics::{Meter, MeterProvider};
