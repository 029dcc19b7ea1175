//! Tracing setup.
//!
//! Structured logging with `tracing` and `tracing-subscriber`:
//! - environment-based filtering (`RUST_LOG` overrides the configured level)
//! - pretty or compact output
//!
//! # Example
//! ```no_run
//! use labjack_daq::{config::AppConfig, logging};
//!
//! # fn main() -> Result<(), String> {
//! let config = AppConfig::load().map_err(|e| e.to_string())?;
//! logging::init_from_config(&config)?;
//! tracing::info!("started");
//! # Ok(())
//! # }
//! ```

use tracing::Level;
use tracing_subscriber::{
    fmt::{self},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::AppConfig;

/// Output format.
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Pretty-printed with colors, for interactive use.
    Pretty,
    /// Compact single-line output.
    Compact,
}

/// Logging options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Level,
    /// Output format.
    pub format: OutputFormat,
    /// Whether to enable ANSI colors.
    pub with_ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            format: OutputFormat::Compact,
            with_ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Options at the given level with the defaults otherwise.
    pub fn new(level: Level) -> Self {
        LoggingConfig {
            level,
            ..Default::default()
        }
    }

    /// Set the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

/// Initialize tracing with the log level from the application config.
pub fn init_from_config(config: &AppConfig) -> Result<(), String> {
    let level = parse_log_level(&config.application.log_level)?;
    init(LoggingConfig::new(level))
}

/// Initialize tracing.
///
/// Idempotent: a second call (common in tests) returns Ok without touching
/// the already-installed subscriber.
pub fn init(config: LoggingConfig) -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string().to_lowercase()));

    let result = match config.format {
        OutputFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_ansi(config.with_ansi)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(fmt_layer).try_init()
        }
        OutputFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_ansi(config.with_ansi)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(fmt_layer).try_init()
        }
    };

    result.or_else(|e| {
        if e.to_string()
            .contains("a global default trace dispatcher has already been set")
        {
            Ok(())
        } else {
            Err(format!("Failed to initialize tracing: {e}"))
        }
    })
}

/// Parse a log level string.
pub fn parse_log_level(level: &str) -> Result<Level, String> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(format!(
            "Invalid log level '{other}'. Must be one of: trace, debug, info, warn, error"
        )),
    }
}
