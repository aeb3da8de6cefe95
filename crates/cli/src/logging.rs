use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::Args;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

/// Global logging flags
#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "warn", env = "CALLROUTE_LOG_LEVEL")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Include source file and line in log lines
    #[arg(long, global = true)]
    pub log_source: bool,

    /// Log span activity
    #[arg(long, global = true)]
    pub log_spans: bool,
}

/// Subscriber settings resolved from [`LogArgs`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: Level,
    pub json: bool,
    pub source_location: bool,
    pub spans: bool,
}

impl LoggingConfig {
    pub fn from_args(args: &LogArgs) -> Result<Self> {
        Ok(Self {
            level: parse_log_level(&args.log_level)?,
            json: args.json_logs,
            source_location: args.log_source,
            spans: args.log_spans,
        })
    }
}

/// Set up the logging system with the provided configuration.
///
/// `RUST_LOG` directives are honoured; the configured level is added on top.
/// Logs go to stderr so replay output on stdout stays clean.
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let span_events = if config.spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_writer(std::io::stderr)
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    let installed = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };

    installed.map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| anyhow!("Invalid log level: {}", level))
}

/// Log a welcome message with version info
pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!("Starting {} v{}", app_name, version);
}
