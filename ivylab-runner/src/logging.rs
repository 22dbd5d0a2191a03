//! Tracing subscriber setup.
//!
//! Log lines go to stderr so stdout stays free for progress and command
//! output. `RUST_LOG` wins over the configured default level.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset, e.g. "info" or "ivylab_runner=debug".
    pub default_level: String,
    pub ansi: bool,
}

impl LoggingConfig {
    pub fn new(verbose: bool) -> Self {
        Self {
            default_level: if verbose { "debug" } else { "info" }.to_string(),
            ansi: true,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_level))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: LoggingConfig) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(config.filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(config.ansi)
                .with_target(false),
        )
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_lowers_default_level() {
        assert_eq!(LoggingConfig::new(true).default_level, "debug");
        assert_eq!(LoggingConfig::default().default_level, "info");
    }
}
