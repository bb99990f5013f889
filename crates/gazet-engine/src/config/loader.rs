use super::schema::GazetConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./gazet.yaml
    /// 2. ~/.gazet/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<GazetConfig, ConfigError> {
        let local_config = PathBuf::from("./gazet.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".gazet").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(GazetConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<GazetConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: GazetConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Explicit path when given, default search otherwise.
    pub async fn load(path: Option<&Path>) -> Result<GazetConfig, ConfigError> {
        match path {
            Some(p) => Self::load_from(p).await,
            None => Self::load_default().await,
        }
    }
}
