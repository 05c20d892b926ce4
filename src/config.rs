use crate::constants::*;
use crate::error::{EnrichError, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub throttle: ThrottleConfig,
    pub server: ServerConfig,
    pub notifier: NotifierConfig,
    pub storage: StorageConfig,
    /// Only ever populated from the environment.
    #[serde(skip)]
    pub credentials: Option<ClientCredentials>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub api_version: String,
    pub category_id: u32,
    pub request_timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            category_id: DEFAULT_CATEGORY_ID,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl CatalogConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub interval_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_THROTTLE_INTERVAL_MS,
        }
    }
}

impl ThrottleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub app_name: String,
    pub topic: String,
    /// Kafka bootstrap servers; events stay local when unset.
    pub brokers: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            topic: DEFAULT_EVENT_TOPIC.to_string(),
            brokers: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_STORAGE_PATH.to_string(),
        }
    }
}

/// Client secret that never prints itself
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSecret(String);

impl ClientSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClientSecret(<redacted>)")
    }
}

/// Public/private key pair exchanged for a bearer credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: ClientSecret,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: ClientSecret::new(client_secret),
        }
    }
}

impl Config {
    /// Load from a TOML file (defaults when it does not exist), then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                EnrichError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            toml::from_str::<Config>(&content)?
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.catalog.base_url = url;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port
                .parse()
                .map_err(|_| EnrichError::Config(format!("{ENV_PORT} is not a port: {port}")))?;
        }
        if let Some(brokers) = lookup(ENV_KAFKA_BROKERS) {
            self.notifier.brokers = Some(brokers);
        }
        if let (Some(id), Some(secret)) = (lookup(ENV_CLIENT_ID), lookup(ENV_CLIENT_SECRET)) {
            self.credentials = Some(ClientCredentials::new(id, secret));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Result<&ClientCredentials> {
        self.credentials.as_ref().ok_or_else(|| {
            EnrichError::Config(format!(
                "{ENV_CLIENT_ID} and {ENV_CLIENT_SECRET} must be set"
            ))
        })
    }
}
