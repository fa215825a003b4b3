//! Tracing subscriber setup for the simulator.
//!
//! Logs go to stderr so prompts and the final outcome on stdout stay clean.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `-v` nor RUST_LOG is given
const DEFAULT_FILTER: &str = "info";

/// Tracing output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TracingFormat {
    /// Human-readable multi-line format.
    Pretty,

    /// Single-line format.
    Compact,

    /// JSON lines, one event per line.
    Json,
}

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level filter.
    ///
    /// If None, uses RUST_LOG environment variable or defaults to "info".
    pub level: Option<tracing::Level>,

    /// Output format.
    pub format: TracingFormat,

    /// Include target module names in output.
    pub target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: TracingFormat::Compact,
            target: false,
        }
    }
}

impl TracingConfig {
    /// Map `-v` occurrences to a level; zero keeps the environment default
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        self.level = match verbose {
            0 => self.level,
            1 => Some(tracing::Level::INFO),
            2 => Some(tracing::Level::DEBUG),
            _ => Some(tracing::Level::TRACE),
        };
        self
    }

    fn filter(&self) -> EnvFilter {
        match self.level {
            Some(level) => EnvFilter::new(level.to_string()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        }
    }
}

/// Initialize the global subscriber.
pub fn init_subscriber(config: TracingConfig) {
    let filter = config.filter();
    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.target);

    match config.format {
        TracingFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt.pretty())
                .init();
        }
        TracingFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt.compact().without_time())
                .init();
        }
        TracingFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt.json())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.format, TracingFormat::Compact);
        assert!(config.level.is_none());
        assert!(!config.target);
    }

    #[test]
    fn test_default_filter_logs_info() {
        assert_eq!(DEFAULT_FILTER, "info");
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_verbosity_levels() {
        let config = TracingConfig::default().with_verbosity(0);
        assert!(config.level.is_none());

        let config = TracingConfig::default().with_verbosity(2);
        assert_eq!(config.level, Some(tracing::Level::DEBUG));

        let config = TracingConfig::default().with_verbosity(9);
        assert_eq!(config.level, Some(tracing::Level::TRACE));
    }
}
