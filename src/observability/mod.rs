//! Observability and telemetry.

mod logging;
mod metrics;

pub use logging::{LogFormat, LoggingConfig, RedactingJsonFields, init_logging};
pub use metrics::{MetricsConfig, install_metrics};
