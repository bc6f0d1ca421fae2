//! Client settings loaded from TOML

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Settings applied by
/// [`HttpClientContextBuilder::config`](crate::HttpClientContextBuilder::config)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL every request starts from
    pub base_url: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Content type for bodies and responses that do not name one; `None`
    /// keeps the codec registry's own default
    pub default_content_type: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: 20,
            default_content_type: None,
        }
    }
}

impl ClientConfig {
    /// Load settings from a file, layered over the defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_string_lossy().to_string();
        Self::load(File::with_name(&path))
    }

    /// Load settings from TOML text, layered over the defaults
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::load(File::from_str(toml, FileFormat::Toml))
    }

    fn load<S>(source: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let default = Self::default();
        let config = Config::builder()
            // use defaults
            .add_source(Config::try_from(&default)?)
            // override with file contents
            .add_source(source)
            .build()?;
        config.try_deserialize()
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
