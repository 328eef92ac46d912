use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{init_logging, Game, Layout, LoggerConfig, StringIndexWidth};

/// Configuration of one decode/encode session.
/// Use [`SessionConfigBuilder`] to build it from code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub game: Game,
    #[serde(default)]
    pub string_index: StringIndexWidth,
    /// Overrides the edition default for lightweight plugins.
    #[serde(default)]
    pub lite_plugins: Option<bool>,
    #[serde(default)]
    pub logger: Option<LoggerConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            game: Game::SkyrimSe,
            string_index: StringIndexWidth::default(),
            lite_plugins: None,
            logger: Some(Default::default()),
        }
    }
}

impl SessionConfig {
    pub fn layout(&self) -> Layout {
        let mut layout = Layout::new(self.game, self.string_index);
        if let Some(lite) = self.lite_plugins {
            layout.lite_plugins = lite;
        }
        layout
    }

    /// Installs logging when the config has a logger section and returns the layout
    /// every reader and writer of the session should use.
    pub fn start(&self) -> Layout {
        if let Some(logger) = &self.logger {
            if !init_logging(logger) {
                tracing::debug!("a global subscriber is already installed");
            }
        }
        self.layout()
    }

    pub fn read_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).with_context(|| format!("open {:?}", path))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).with_context(|| format!("read {:?}", path))?;
        let config = serde_json::from_slice(&bytes).with_context(|| format!("parse {:?}", path))?;
        Ok(config)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = serde_json::to_vec_pretty(self).context("serialize SessionConfig")?;
        let mut file = File::create(path).with_context(|| format!("create {:?}", path))?;
        file.write_all(&bytes).with_context(|| format!("write {:?}", path))?;
        Ok(())
    }
}

/// `SessionConfigBuilder` is a convenience builder to create a `SessionConfig` from code.
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn new(game: Game) -> Self {
        Self { config: SessionConfig { game, ..Default::default() } }
    }

    pub fn with_string_index(mut self, width: StringIndexWidth) -> Self {
        self.config.string_index = width;
        self
    }

    pub fn with_lite_plugins(mut self, enabled: bool) -> Self {
        self.config.lite_plugins = Some(enabled);
        self
    }

    pub fn with_logger_config(mut self, logger: LoggerConfig) -> Self {
        self.config.logger = Some(logger);
        self
    }

    pub fn get(self) -> SessionConfig {
        self.config
    }
}
