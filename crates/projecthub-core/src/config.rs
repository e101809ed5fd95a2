use crate::{HubError, HubResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://projecthub.db";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: u64,
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_token_ttl_minutes() -> u64 {
    60 * 8
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_minutes: default_token_ttl_minutes(),
        }
    }
}

/// Values supplied on the command line or through the environment.
/// Each `Some` wins over whatever the config file said.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<String>,
    pub database_url: Option<String>,
    pub jwt_secret: Option<String>,
}

impl AppConfig {
    pub fn config_path() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            dirs::home_dir().map(|home| home.join(".config/projecthub/config.toml"))
        }
        #[cfg(target_os = "linux")]
        {
            dirs::config_dir().map(|config| config.join("projecthub/config.toml"))
        }
        #[cfg(target_os = "windows")]
        {
            dirs::config_dir().map(|config| config.join("projecthub\\config.toml"))
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }

    /// Load configuration from `explicit` if given, otherwise from the
    /// platform default location. Only an explicit path is required to exist.
    pub fn load(explicit: Option<&Path>) -> HubResult<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> HubResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HubError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| HubError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> HubResult<Self> {
        toml::from_str(content).map_err(|e| HubError::Config(e.to_string()))
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bind) = overrides.bind {
            self.server.bind = bind;
        }
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(secret) = overrides.jwt_secret {
            self.auth.jwt_secret = Some(secret);
        }
    }

    /// Secret used to sign and verify bearer tokens. There is no fallback:
    /// a missing or blank secret is a configuration error.
    pub fn jwt_secret(&self) -> HubResult<&str> {
        self.auth
            .jwt_secret
            .as_deref()
            .filter(|secret| !secret.trim().is_empty())
            .ok_or_else(|| {
                HubError::Config(
                    "no JWT secret configured; set auth.jwt_secret, --jwt-secret or PROJECTHUB_JWT_SECRET"
                        .into(),
                )
            })
    }
}
