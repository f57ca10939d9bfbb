//! Structured logging.
//!
//! JSON logs by default, pretty logs for local debugging. Memory content,
//! prompts and credentials flow through log fields constantly on this code
//! path, so the JSON formatter redacts sensitive field names and truncates
//! long values before they reach the sink.

use std::fmt;

use serde_json::{Map, Number, Value};
use tracing::field::{Field, Visit};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::field::RecordFields;
use tracing_subscriber::fmt::format::{FormatFields, Writer};

/// Logging output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs.
    Json,
    /// Human-friendly logs for local debugging.
    Pretty,
}

/// Logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Log format.
    pub format: LogFormat,
    /// Log filter, e.g. `mnemo=info`.
    pub filter: EnvFilter,
}

impl LoggingConfig {
    /// Builds logging configuration from the environment.
    ///
    /// `MNEMO_LOG_FORMAT` selects `json` or `pretty`; `MNEMO_LOG_LEVEL` or
    /// `RUST_LOG` set the filter, defaulting to `mnemo=info` (`mnemo=debug`
    /// with `verbose`).
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        let format = std::env::var("MNEMO_LOG_FORMAT")
            .ok()
            .and_then(|value| parse_log_format(&value))
            .unwrap_or(LogFormat::Json);

        let filter = std::env::var("MNEMO_LOG_LEVEL")
            .ok()
            .map(|level| EnvFilter::new(normalize_level(level)))
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| default_filter(verbose));

        Self { format, filter }
    }
}

/// Initialises the global tracing subscriber.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(config: LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter)
        .with_writer(std::io::stderr);

    let result = match config.format {
        LogFormat::Json => builder
            .json()
            .fmt_fields(RedactingJsonFields::new())
            .try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };

    if result.is_err() {
        tracing::debug!("Global tracing subscriber was already set");
    }
}

fn parse_log_format(value: &str) -> Option<LogFormat> {
    match value.to_lowercase().as_str() {
        "pretty" => Some(LogFormat::Pretty),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

fn normalize_level(level: String) -> String {
    let normalized = level.trim().to_lowercase();
    if normalized.contains('=') || normalized.contains(',') {
        normalized
    } else {
        format!("mnemo={normalized}")
    }
}

fn default_filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "mnemo=debug" } else { "mnemo=info" };
    EnvFilter::new(default_level)
}

/// Redactor for sensitive log fields.
#[derive(Debug, Clone)]
struct LogRedactor {
    sensitive_fields: Vec<&'static str>,
    max_len: usize,
}

impl LogRedactor {
    fn new() -> Self {
        Self {
            sensitive_fields: vec![
                "content",
                "query",
                "prompt",
                "token",
                "secret",
                "password",
                "authorization",
                "api_key",
                "api-key",
            ],
            max_len: 120,
        }
    }

    fn redact_field(&self, field: &str, value: &str) -> String {
        let field_lower = field.to_lowercase();
        if self
            .sensitive_fields
            .iter()
            .any(|needle| field_lower.contains(needle))
        {
            return "[REDACTED]".to_string();
        }

        if value.chars().count() > self.max_len {
            let truncated: String = value.chars().take(self.max_len).collect();
            return format!("{truncated}...(truncated)");
        }

        value.to_string()
    }
}

/// JSON field formatter with redaction support.
#[derive(Debug, Clone)]
pub struct RedactingJsonFields {
    redactor: LogRedactor,
}

impl RedactingJsonFields {
    /// Creates a redacting JSON field formatter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            redactor: LogRedactor::new(),
        }
    }
}

impl Default for RedactingJsonFields {
    fn default() -> Self {
        Self::new()
    }
}

impl<'writer> FormatFields<'writer> for RedactingJsonFields {
    fn format_fields<R: RecordFields>(
        &self,
        mut writer: Writer<'writer>,
        fields: R,
    ) -> fmt::Result {
        let mut visitor = RedactingVisitor::new(&self.redactor);
        fields.record(&mut visitor);
        let json = serde_json::to_string(&visitor.values).map_err(|_| fmt::Error)?;
        writer.write_str(&json)
    }
}

struct RedactingVisitor<'a> {
    values: Map<String, Value>,
    redactor: &'a LogRedactor,
}

impl<'a> RedactingVisitor<'a> {
    fn new(redactor: &'a LogRedactor) -> Self {
        Self {
            values: Map::new(),
            redactor,
        }
    }

    fn insert_str(&mut self, field: &Field, value: &str) {
        let redacted = self.redactor.redact_field(field.name(), value);
        self.values
            .insert(field.name().to_string(), Value::String(redacted));
    }

    fn insert_number(&mut self, field: &Field, number: Number) {
        self.values
            .insert(field.name().to_string(), Value::Number(number));
    }
}

impl Visit for RedactingVisitor<'_> {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert_number(field, Number::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert_number(field, Number::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.values
            .insert(field.name().to_string(), Value::Bool(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        let number = Number::from_f64(value).unwrap_or_else(|| Number::from(0_u64));
        self.insert_number(field, number);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert_str(field, value);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let formatted = format!("{value:?}");
        self.insert_str(field, &formatted);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert_str(field, &value.to_string());
    }
}
