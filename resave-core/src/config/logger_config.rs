use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Logger configuration used by resave.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Filter directive, e.g. `"info"` or `"resave_core=debug,resave_esp=warn"`.
    pub level_filter: String,
    /// Prefer `RUST_LOG` over `level_filter` when it is set.
    #[serde(default)]
    pub respect_env: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self { level_filter: "info".to_string(), respect_env: true }
    }
}

impl LoggerConfig {
    pub fn env_filter(&self) -> EnvFilter {
        if self.respect_env {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level_filter))
        } else {
            EnvFilter::new(&self.level_filter)
        }
    }
}

/// Installs a global fmt subscriber. Returns `false` if one was already installed.
pub fn init_logging(config: &LoggerConfig) -> bool {
    tracing_subscriber::fmt().with_env_filter(config.env_filter()).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use tracing::level_filters::LevelFilter;

    use super::*;

    fn fixed(directive: &str) -> LoggerConfig {
        LoggerConfig { level_filter: directive.to_string(), respect_env: false }
    }

    #[test]
    fn level_filter_becomes_the_directive() {
        assert_eq!(fixed("warn").env_filter().max_level_hint(), Some(LevelFilter::WARN));
        let filter = fixed("resave_core=debug,resave_esp=warn").env_filter();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
        assert!(filter.to_string().contains("resave_core=debug"), "{filter}");
    }

    #[test]
    fn second_install_is_refused() {
        init_logging(&fixed("info"));
        assert!(!init_logging(&fixed("debug")));
    }
}
