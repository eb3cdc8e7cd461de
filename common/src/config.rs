use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const ENV_CONFIG: &str = "STATUSPAGE_CONFIG";
pub const ENV_API_URL: &str = "STATUSPAGE_API_URL";
pub const ENV_PUBLISHABLE_KEY: &str = "STATUSPAGE_PUBLISHABLE_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Missing publishable key: set STATUSPAGE_PUBLISHABLE_KEY or identity.publishable_key")]
    MissingPublishableKey,

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub live: LiveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub publishable_key: Option<String>,
    #[serde(default = "default_session_path")]
    pub session_path: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        IdentityConfig {
            publishable_key: None,
            session_path: default_session_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cached reads older than this refetch even without an invalidation.
    /// Unset means fresh until invalidated.
    #[serde(default)]
    pub stale_after_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        LiveConfig { refresh_secs: default_refresh_secs() }
    }
}

fn default_base_url() -> String { DEFAULT_API_URL.to_string() }
fn default_timeout_secs() -> u64 { 10 }
fn default_refresh_secs() -> u64 { 5 }

fn default_session_path() -> String {
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => format!("{}/.config/statuspage/session.toml", home),
        _ => "./.statuspage-session.toml".to_string(),
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &str, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn default_path() -> String {
        std::env::var(ENV_CONFIG)
            .unwrap_or_else(|_| "./config/statuspage.toml".to_string())
    }

    /// File at `path` if it exists (defaults otherwise), then environment
    /// overrides. Does not validate.
    pub fn resolve(path: &str) -> Result<Self, ConfigError> {
        let mut config = if Path::new(path).exists() {
            Self::load(path)?
        } else {
            log::debug!("no config file at {}, using defaults", path);
            Config::default()
        };
        config.apply_overrides(
            std::env::var(ENV_API_URL).ok(),
            std::env::var(ENV_PUBLISHABLE_KEY).ok(),
        );
        Ok(config)
    }

    pub fn apply_overrides(&mut self, api_url: Option<String>, publishable_key: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api.base_url = url.trim().to_string();
        }
        if let Some(key) = publishable_key.filter(|k| !k.trim().is_empty()) {
            self.identity.publishable_key = Some(key.trim().to_string());
        }
    }

    pub fn publishable_key(&self) -> Result<&str, ConfigError> {
        self.identity
            .publishable_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingPublishableKey)
    }

    /// Startup check. A missing publishable key is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.publishable_key()?;
        let url = self.api.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api.base_url must start with http:// or https://, got '{}'",
                url
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be greater than 0".to_string()));
        }
        if self.live.refresh_secs == 0 {
            return Err(ConfigError::Invalid("live.refresh_secs must be greater than 0".to_string()));
        }
        Ok(())
    }
}
