use chrono_tz::Tz;
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Unknown IANA time zone name.
    InvalidTimezone(String),
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::InvalidTimezone(name) => write!(f, "unknown time zone '{}'", name),
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::InvalidTimezone(_) | Self::Validation(_) => None,
        }
    }
}

/// Which chat channel carries the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Telegram,
    Whatsapp,
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    transport: Transport,
    #[serde(default)]
    telegram_bot_token: String,
    whatsapp: Option<WhatsappFile>,
    mirror: Option<MirrorFile>,
    /// IANA zone used for month and day boundaries.
    #[serde(default = "default_timezone")]
    timezone: String,
    /// Directory for the database and logs. Defaults to current directory.
    data_dir: Option<String>,
}

#[derive(Deserialize)]
struct WhatsappFile {
    #[serde(default)]
    verify_token: String,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    phone_number_id: String,
    #[serde(default = "default_listen_addr")]
    listen_addr: String,
    #[serde(default = "default_graph_api_version")]
    graph_api_version: String,
}

#[derive(Deserialize)]
struct MirrorFile {
    #[serde(default)]
    url: String,
    key: Option<String>,
    #[serde(default = "default_mirror_timeout_secs")]
    timeout_secs: u64,
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_graph_api_version() -> String {
    "v20.0".to_string()
}

fn default_mirror_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone)]
pub struct WhatsappConfig {
    /// Shared secret for the webhook subscription handshake.
    pub verify_token: String,
    pub access_token: String,
    pub phone_number_id: String,
    pub listen_addr: SocketAddr,
    pub graph_api_version: String,
}

#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub url: String,
    pub key: Option<String>,
    pub timeout: Duration,
}

pub struct Config {
    pub transport: Transport,
    pub telegram_bot_token: String,
    pub whatsapp: Option<WhatsappConfig>,
    /// `None` when no mirror URL is set; every mirror call then falls back
    /// to the local store.
    pub mirror: Option<MirrorConfig>,
    pub timezone: Tz,
    /// Directory for state files (database, logs).
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        let timezone: Tz = file
            .timezone
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(file.timezone.clone()))?;

        if file.transport == Transport::Telegram {
            validate_telegram_token(&file.telegram_bot_token)?;
        }

        let whatsapp = file.whatsapp.map(WhatsappFile::into_config).transpose()?;
        if file.transport == Transport::Whatsapp && whatsapp.is_none() {
            return Err(ConfigError::Validation("whatsapp section is required for the whatsapp transport".into()));
        }

        let mirror = file.mirror.and_then(|m| {
            let url = m.url.trim().to_string();
            (!url.is_empty()).then(|| MirrorConfig {
                url,
                key: m.key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
                timeout: Duration::from_secs(m.timeout_secs.max(1)),
            })
        });

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            transport: file.transport,
            telegram_bot_token: file.telegram_bot_token,
            whatsapp,
            mirror,
            timezone,
            data_dir,
        })
    }
}

fn validate_telegram_token(token: &str) -> Result<(), ConfigError> {
    if token.is_empty() {
        return Err(ConfigError::Validation("telegram_bot_token is required".into()));
    }
    // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
    let token_parts: Vec<&str> = token.split(':').collect();
    if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
        return Err(ConfigError::Validation(
            "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
        ));
    }
    Ok(())
}

impl WhatsappFile {
    fn into_config(self) -> Result<WhatsappConfig, ConfigError> {
        for (name, value) in [
            ("verify_token", &self.verify_token),
            ("access_token", &self.access_token),
            ("phone_number_id", &self.phone_number_id),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("whatsapp.{name} is required")));
            }
        }
        let listen_addr = self
            .listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Validation(format!("whatsapp.listen_addr '{}': {e}", self.listen_addr)))?;

        Ok(WhatsappConfig {
            verify_token: self.verify_token,
            access_token: self.access_token,
            phone_number_id: self.phone_number_id,
            listen_addr,
            graph_api_version: self.graph_api_version,
        })
    }
}
