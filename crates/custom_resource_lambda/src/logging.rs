//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at cold start, after [`LambdaConfig`] is resolved.
//!
//! [`LambdaConfig`]: crate::config::LambdaConfig

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level '{level}': {reason}")]
    InvalidLevel { level: String, reason: String },
    #[error("failed to set subscriber: {0}")]
    AlreadySet(String),
}

/// Installs the global subscriber writing to stderr, which the platform
/// forwards to the function's log stream.
///
/// `level` is an `EnvFilter` directive such as `"info"` or
/// `"custom_resource_lambda=debug,aws_config=warn"`. In JSON mode event fields
/// sit at the top level of each record and the active `invocation` span's
/// fields are nested under `"span"`.
pub fn init(format: LogFormat, level: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(level).map_err(|error| LoggingError::InvalidLevel {
        level: level.to_string(),
        reason: error.to_string(),
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .try_init(),
    };
    installed.map_err(|error| LoggingError::AlreadySet(error.to_string()))
}
