use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::catalog::{ListingConfig, ProjectionConfig};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(skip)]
    pub debug_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default)]
    pub tlscert: Option<String>,
    #[serde(default)]
    pub tlskey: Option<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
            tlscert: None,
            tlskey: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_sqlite")]
    pub sqlite: SqliteConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite: default_sqlite(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SqliteConfig {
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbConfig {
    /// May be written as `${ENV_VAR}`.
    #[serde(alias = "apikey", rename = "apikey")]
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(alias = "baseurl", rename = "baseurl")]
    #[serde(default = "default_tmdb_base_url")]
    pub base_url: String,
    #[serde(default = "default_tmdb_language")]
    pub language: String,
    /// Request timeout in seconds.
    #[serde(default = "default_tmdb_timeout")]
    pub timeout: u64,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_tmdb_base_url(),
            language: default_tmdb_language(),
            timeout: default_tmdb_timeout(),
        }
    }
}

impl TmdbConfig {
    /// The API key with `${VAR}` expanded. `None` when unset or empty.
    pub fn api_key(&self) -> Option<String> {
        let raw = self.api_key.as_deref()?.trim();
        let key = match raw.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            Some(var) => std::env::var(var).ok()?,
            None => raw.to_string(),
        };
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CatalogConfig {
    #[serde(default)]
    pub defaults: ProjectionConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    /// Offset from UTC in minutes used to bucket showtimes into calendar
    /// days. The server's local time zone when unset.
    #[serde(alias = "utcoffset", rename = "utcoffset")]
    #[serde(default)]
    pub utc_offset: Option<i32>,
}

impl CatalogConfig {
    pub fn fixed_offset(&self) -> Option<FixedOffset> {
        self.utc_offset.and_then(|m| FixedOffset::east_opt(m * 60))
    }

    /// Clamp a requested page size into `1..=max_page_size`.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        let max = self.listing.max_page_size.max(1);
        requested.unwrap_or(self.listing.page_size).clamp(1, max)
    }
}

fn default_port() -> String {
    "8080".to_string()
}

fn default_sqlite() -> SqliteConfig {
    SqliteConfig {
        filename: "felem.db".to_string(),
    }
}

fn default_tmdb_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_tmdb_language() -> String {
    "en-US".to_string()
}

fn default_tmdb_timeout() -> u64 {
    30
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_string(), e))?;

        Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::Invalid(msg) => ConfigError::Invalid(format!("{}: {}", path, msg)),
            ConfigError::ParseError(_, err) => ConfigError::ParseError(path.to_string(), err),
            other => other,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::ParseError("<inline>".to_string(), e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let rating = self.catalog.defaults.default_rating;
        if !(0.0..=10.0).contains(&rating) {
            return Err(ConfigError::Invalid(format!(
                "catalog.defaults.defaultrating must be within 0..10, got {}",
                rating
            )));
        }
        if let Some(offset) = self.catalog.utc_offset {
            if self.catalog.fixed_offset().is_none() {
                return Err(ConfigError::Invalid(format!(
                    "catalog.utcoffset out of range: {}",
                    offset
                )));
            }
        }
        if self.listen.tlscert.is_some() != self.listen.tlskey.is_some() {
            return Err(ConfigError::Invalid(
                "listen.tlscert and listen.tlskey must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(String, std::io::Error),
    #[error("Failed to parse config file {0}: {1}")]
    ParseError(String, serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
