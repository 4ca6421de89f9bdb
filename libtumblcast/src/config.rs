//! Configuration management for Tumblcast
//!
//! The adapter itself only ever receives a [`TumblrConfig`] value. Loading
//! from files and the environment lives here for the hosting binary.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{ConfigError, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://api.tumblr.com";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://www.tumblr.com/oauth2/authorize";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Path appended to the frontend URL to form the OAuth redirect target
const REDIRECT_PATH: &str = "/integrations/social/tumblr";
/// Tumblr only accepts https redirect targets; plain-http frontends go through this relay
const HTTPS_REDIRECT_RELAY: &str = "https://redirectmeto.com/";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub tumblr: TumblrConfig,
    #[serde(default)]
    pub logging: LogSettings,
}

/// OAuth client settings for the Tumblr adapter
#[derive(Debug, Deserialize)]
pub struct TumblrConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    /// Explicit redirect target; takes precedence over `frontend_url`
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Base URL of the hosting frontend, used to derive the redirect target
    #[serde(default)]
    pub frontend_url: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_authorize_url() -> String {
    DEFAULT_AUTHORIZE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TumblrConfig {
    /// Create a configuration with an explicit redirect target and default endpoints
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            redirect_uri: Some(redirect_uri.into()),
            frontend_url: None,
            api_base_url: default_api_base_url(),
            authorize_url: default_authorize_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Point API calls at another base URL (test servers, proxies)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = url.into();
        self
    }

    pub fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }

    /// Resolve the redirect target sent during authorization and code exchange
    pub fn redirect_uri(&self) -> Result<String> {
        if let Some(uri) = self.redirect_uri.as_deref().filter(|u| !u.is_empty()) {
            return Ok(uri.to_string());
        }

        let frontend = self
            .frontend_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ConfigError::MissingField("tumblr.redirect_uri".to_string()))?;

        Ok(redirect_from_frontend(frontend))
    }

    /// Check that every field the adapter needs is present
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::MissingField("tumblr.client_id".to_string()).into());
        }
        if self.client_secret().trim().is_empty() {
            return Err(ConfigError::MissingField("tumblr.client_secret".to_string()).into());
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tumblr.request_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        self.redirect_uri()?;
        Ok(())
    }

    /// Apply `TUMBLR_CLIENT_ID`, `TUMBLR_CLIENT_SECRET` and `FRONTEND_URL` overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(client_id) = std::env::var("TUMBLR_CLIENT_ID") {
            self.client_id = client_id;
        }
        if let Ok(secret) = std::env::var("TUMBLR_CLIENT_SECRET") {
            self.client_secret = SecretString::from(secret);
        }
        if let Ok(frontend) = std::env::var("FRONTEND_URL") {
            self.frontend_url = Some(frontend);
        }
    }

    /// Build a configuration purely from the environment
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("TUMBLR_CLIENT_ID")
            .map_err(|_| ConfigError::MissingField("TUMBLR_CLIENT_ID".to_string()))?;
        let client_secret = std::env::var("TUMBLR_CLIENT_SECRET")
            .map_err(|_| ConfigError::MissingField("TUMBLR_CLIENT_SECRET".to_string()))?;

        Ok(Self {
            client_id,
            client_secret: SecretString::from(client_secret),
            redirect_uri: std::env::var("TUMBLR_REDIRECT_URI").ok(),
            frontend_url: std::env::var("FRONTEND_URL").ok(),
            api_base_url: default_api_base_url(),
            authorize_url: default_authorize_url(),
            request_timeout_secs: default_request_timeout_secs(),
        })
    }
}

/// Derive the redirect target from the frontend base URL
pub fn redirect_from_frontend(frontend_url: &str) -> String {
    let base = frontend_url.trim_end_matches('/');
    if base.starts_with("https") {
        format!("{}{}", base, REDIRECT_PATH)
    } else {
        format!("{}{}{}", HTTPS_REDIRECT_RELAY, base, REDIRECT_PATH)
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// Falls back to environment variables when no config file exists.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, reading environment",
                config_path.display()
            );
            let tumblr = TumblrConfig::from_env()?;
            tumblr.validate()?;
            return Ok(Self {
                tumblr,
                logging: LogSettings::default(),
            });
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let mut config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.tumblr.apply_env_overrides();
        config.tumblr.validate()?;
        Ok(config)
    }
}

/// Resolve the configuration file path (`$TUMBLCAST_CONFIG` or the XDG config dir)
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("TUMBLCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("tumblcast").join("config.toml"))
}
