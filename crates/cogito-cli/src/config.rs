//! `cogito.toml` loading.

use cogito_core::{CogitoError, CogitoResult};
use cogito_session::{RetryPolicy, StoreConfig, ThinkingConfig};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Top-level configuration file. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CogitoConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub thinking: ThinkingConfig,
}

impl CogitoConfig {
    pub fn parse(text: &str) -> CogitoResult<Self> {
        let config: CogitoConfig =
            toml::from_str(text).map_err(|e| CogitoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, falling back to defaults when the file does not exist.
    pub async fn load(path: &Path) -> CogitoResult<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(CogitoError::Config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))),
        }
    }

    pub fn validate(&self) -> CogitoResult<()> {
        self.store.validate()?;
        self.retry.validate()?;
        self.thinking.validate()
    }
}
