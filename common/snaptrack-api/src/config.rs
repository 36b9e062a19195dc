use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8000/ws";

/// The only handshake origin the agent accepts.
pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// User-facing config, stored in ~/.snaptrack/snaptrack.yml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The websocket endpoint of the monitoring agent.
    pub endpoint: String,
    /// Sent as the Origin header on the websocket handshake.
    pub origin: String,
    /// An opaque bearer token, sent on the websocket handshake.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            auth_token: None,
            log_level: None,
        }
    }
}

impl Config {
    /// Applies SNAPTRACK_ENDPOINT and SNAPTRACK_TOKEN, if they are set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(endpoint) = crate::env::endpoint() {
            self.endpoint = endpoint;
        }

        if let Some(token) = crate::env::auth_token() {
            self.auth_token = Some(token);
        }

        self
    }
}

pub fn dotdir_path() -> Result<PathBuf> {
    let mut dir = dirs::home_dir().ok_or_else(|| anyhow::Error::msg("home_dir not found"))?;

    dir.push(".snaptrack");

    Ok(dir)
}

pub fn mkdir() -> Result<()> {
    let path = dotdir_path()?;
    std::fs::create_dir_all(path)?;
    Ok(())
}

pub fn config_path() -> Result<PathBuf> {
    let mut path = dotdir_path()?;
    path.push("snaptrack.yml");
    Ok(path)
}

pub fn log_path() -> Result<PathBuf> {
    let mut path = dotdir_path()?;
    path.push("snaptrack.log");
    Ok(path)
}

/// Loads the config file, writing the default config if it does not exist.
pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    load_config_from(path.as_path())
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.is_file() {
        log::debug!("writing default config to {:?}", path);
        let config = Config::default();
        write_config(path, &config)?;

        return Ok(config);
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let config = serde_yaml::from_reader(reader)?;

    Ok(config)
}

pub fn write_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_yaml::to_writer(writer, config)?;
    Ok(())
}
