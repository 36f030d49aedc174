use super::ConsoleConfig;
use crate::errors::ConfigError;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

pub struct ConfigManager {
    current_config: Arc<ConsoleConfig>,
}

impl ConfigManager {
    /// Load `main.toml` from the given configuration directory
    pub async fn new(config_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = config_dir.as_ref().join("main.toml");
        let config = Self::load_configuration(&path).await?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    /// Build from inline TOML content
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config = Self::parse(content)?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    pub fn get_current_config(&self) -> Arc<ConsoleConfig> {
        self.current_config.clone()
    }

    async fn load_configuration(path: &Path) -> Result<ConsoleConfig, ConfigError> {
        debug!("Loading console config: {}", path.display());
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let config = Self::parse(&content)?;
        info!(
            "Loaded console config: {} (poll every {}ms)",
            config.base_url, config.poll_interval_ms
        );
        Ok(config)
    }

    fn parse(content: &str) -> Result<ConsoleConfig, ConfigError> {
        let config: ConsoleConfig = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })?;
        config.validate()
    }
}
