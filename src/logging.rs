//! Structured logging setup.
//!
//! Output is JSON by default (one object per line) or human-readable with
//! `ELFARO_LOG_FORMAT=pretty`. Handlers and repositories log with structured fields
//! (`method`, `path`, `handler_name`, `status`, `duration_us`, `table`, `error`);
//! passwords, password hashes and CSRF tokens are never recorded.
//!
//! | Variable | Default |
//! |---|---|
//! | `ELFARO_LOG_LEVEL` | `info` (`RUST_LOG` wins when set) |
//! | `ELFARO_LOG_FORMAT` | `json` |
//! | `ELFARO_LOG_ASYNC` | `false` |
//! | `ELFARO_LOG_INCLUDE_LOCATION` | `false` |
//! | `ELFARO_LOG_TARGET_FILTER` | unset, comma-separated directives |

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    /// Write through a background thread.
    pub async_logging: bool,
    /// Extra `EnvFilter` directives, comma-separated.
    pub target_filter: Option<String>,
    /// Include file:line (dev only).
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            async_logging: false,
            target_filter: None,
            include_location: false,
        }
    }
}

impl LogConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable flags fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|v| v.trim().to_lowercase().parse().ok())
                .unwrap_or(default)
        };
        let defaults = Self::default();
        Self {
            log_level: lookup("ELFARO_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: lookup("ELFARO_LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.format),
            async_logging: flag("ELFARO_LOG_ASYNC", defaults.async_logging),
            target_filter: lookup("ELFARO_LOG_TARGET_FILTER").filter(|v| !v.trim().is_empty()),
            include_location: flag("ELFARO_LOG_INCLUDE_LOCATION", defaults.include_location),
        }
    }

    /// Verbose pretty output for local runs.
    #[must_use]
    pub fn dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            async_logging: false,
            target_filter: None,
            include_location: true,
        }
    }

    #[must_use]
    pub fn level(&self) -> Level {
        match self.log_level.trim().to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// `RUST_LOG` when set, otherwise the configured level, plus the target directives.
    pub fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));
        if let Some(targets) = &self.target_filter {
            for directive in targets.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                match directive.parse() {
                    Ok(directive) => filter = filter.add_directive(directive),
                    Err(_) => eprintln!("Warning: Invalid log filter directive: {directive}"),
                }
            }
        }
        filter
    }
}

/// Keeps the background writer alive; drop it last to flush buffered lines.
#[must_use = "dropping the guard stops async log output"]
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// ```no_run
/// use elfaro::logging::{init_logging, LogConfig};
///
/// let _guard = init_logging(&LogConfig::from_env()).expect("logging");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<LogGuard> {
    let (writer, worker) = if config.async_logging {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(writer),
            Some(guard),
        )
    } else {
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stdout),
            None,
        )
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_list(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(LogGuard { _worker: worker })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("invalid"), LogFormat::Json);
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = LogConfig::from_lookup(|_| None);
        assert_eq!(config, LogConfig::default());
        assert_eq!(config.level(), Level::INFO);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = LogConfig::from_lookup(|key| match key {
            "ELFARO_LOG_LEVEL" => Some("debug".to_string()),
            "ELFARO_LOG_FORMAT" => Some("pretty".to_string()),
            "ELFARO_LOG_ASYNC" => Some("TRUE".to_string()),
            "ELFARO_LOG_INCLUDE_LOCATION" => Some("yes".to_string()),
            "ELFARO_LOG_TARGET_FILTER" => Some("elfaro::server=trace".to_string()),
            _ => None,
        });
        assert_eq!(config.level(), Level::DEBUG);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.async_logging);
        // "yes" is not a bool; the default stays.
        assert!(!config.include_location);
        assert_eq!(config.target_filter.as_deref(), Some("elfaro::server=trace"));
    }

    #[test]
    fn test_dev_config() {
        let config = LogConfig::dev();
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.include_location);
    }
}
