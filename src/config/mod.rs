//! Configuration loading and management

use crate::core::error::ConfigError;
use crate::core::link::parse_base_url;
use anyhow::Result;
use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Environment variable overriding [`ClientConfig::backend_url`]
pub const ENV_BACKEND_URL: &str = "INVITE_BACKEND_URL";
/// Environment variable overriding [`ClientConfig::api_key`]
pub const ENV_API_KEY: &str = "INVITE_API_KEY";
/// Environment variable overriding [`ClientConfig::site_url`]
pub const ENV_SITE_URL: &str = "INVITE_SITE_URL";
/// Environment variable overriding [`ServerConfig::bind_addr`]
pub const ENV_BIND_ADDR: &str = "INVITE_BIND_ADDR";
/// Environment variable overriding [`ServerConfig::database_url`]
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Complete configuration of the invitation service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InviteConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub wedding: WeddingConfig,
}

/// Settings of the HTTP/realtime server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, e.g. `0.0.0.0:3000`
    pub bind_addr: String,

    /// PostgreSQL connection string; in-memory tables when absent
    pub database_url: Option<String>,

    /// Capacity of the change feed broadcast channel
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            database_url: None,
            event_capacity: 1024,
        }
    }
}

/// Where the pages find the table store and how links are addressed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the table store (REST under `/rest/v1`)
    pub backend_url: String,

    /// Public API key sent with every request
    pub api_key: String,

    /// Public origin of the invitation page, used to build guest links
    pub site_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            api_key: String::new(),
            site_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Background music settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub src: String,
    pub volume: f32,
    pub looped: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            src: "/wedding-background-music.mp3".to_string(),
            volume: 0.5,
            looped: true,
        }
    }
}

/// Fixed content of the invitation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeddingConfig {
    /// Couple shown on the cover
    pub couple: String,

    /// Ceremony start, with the venue's UTC offset
    pub target: DateTime<FixedOffset>,

    /// Deadline text shown above the RSVP form
    pub rsvp_deadline: String,

    /// Lightbox image sequence
    pub gallery: Vec<String>,

    pub audio: AudioConfig,
}

impl Default for WeddingConfig {
    fn default() -> Self {
        Self {
            couple: "Maulana & Nurul".to_string(),
            target: default_target(),
            rsvp_deadline: "20 Juni 2026".to_string(),
            gallery: vec![
                "/romantic-couple-photo-1.png".to_string(),
                "/romantic-couple-moment.png".to_string(),
                "/romantic-couple-photo-3.jpg".to_string(),
                "/romantic-couple-photo-4.jpg".to_string(),
                "/romantic-couple-photo-5.jpg".to_string(),
                "/romantic-couple-photo-6.jpg".to_string(),
            ],
            audio: AudioConfig::default(),
        }
    }
}

/// UTC offset of Asia/Jakarta
const VENUE_OFFSET_SECS: i32 = 7 * 3600;

fn default_target() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(VENUE_OFFSET_SECS)
        .and_then(|venue| venue.with_ymd_and_hms(2026, 6, 26, 10, 0, 0).single())
        .expect("constant wedding date is valid")
}

impl InviteConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            message: format!("{}: {}", path, e),
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            file: Some(path.to_string()),
            message: e.to_string(),
        })?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError {
            file: None,
            message: e.to_string(),
        })?;
        Ok(config)
    }

    /// Load the optional YAML file, apply the process environment and validate
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };

        let config = config.with_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        tracing::debug!(
            backend_url = %config.client.backend_url,
            site_url = %config.client.site_url,
            bind_addr = %config.server.bind_addr,
            "configuration loaded"
        );

        Ok(config)
    }

    /// Apply environment overrides read through `lookup`
    ///
    /// Empty values are ignored.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_BACKEND_URL) {
            self.client.backend_url = url;
        }
        if let Some(key) = get(ENV_API_KEY) {
            self.client.api_key = key;
        }
        if let Some(site) = get(ENV_SITE_URL) {
            self.client.site_url = site;
        }
        if let Some(addr) = get(ENV_BIND_ADDR) {
            self.server.bind_addr = addr;
        }
        if let Some(db) = get(ENV_DATABASE_URL) {
            self.server.database_url = Some(db);
        }

        self
    }

    /// Check required values
    ///
    /// The backend endpoint and the public API key must both be present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.backend_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "client.backend_url".to_string(),
                context: format!("set it in the config file or via {}", ENV_BACKEND_URL),
            });
        }

        if self.client.api_key.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "client.api_key".to_string(),
                context: format!("set it in the config file or via {}", ENV_API_KEY),
            });
        }

        for (field, value) in [
            ("client.backend_url", &self.client.backend_url),
            ("client.site_url", &self.client.site_url),
        ] {
            parse_base_url(value).map_err(|e| ConfigError::InvalidValue {
                field: field.to_string(),
                value: value.clone(),
                message: e.to_string(),
            })?;
        }

        self.bind_addr()?;

        if self.wedding.gallery.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "wedding.gallery".to_string(),
                value: "[]".to_string(),
                message: "at least one image is required".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.wedding.audio.volume) {
            return Err(ConfigError::InvalidValue {
                field: "wedding.audio.volume".to_string(),
                value: self.wedding.audio.volume.to_string(),
                message: "must be between 0 and 1".to_string(),
            });
        }

        Ok(())
    }

    /// Parsed listen address
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                field: "server.bind_addr".to_string(),
                value: self.server.bind_addr.clone(),
                message: e.to_string(),
            })
    }

    /// Minimal valid configuration for tests and local runs
    pub fn local(api_key: &str) -> Self {
        let mut config = Self::default();
        config.client.backend_url = "http://127.0.0.1:3000".to_string();
        config.client.api_key = api_key.to_string();
        config
    }
}
