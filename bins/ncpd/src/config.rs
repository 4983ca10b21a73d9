use std::{
    fs,
    path::PathBuf,
    time::{self, Duration},
};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error while reading TOML config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Error while deserializing TOML: {0}")]
    Deserialize(#[from] toml::de::Error),
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RawConfig {
    imp_addr: String,
    socket_path: String,
    connect_timeout: u64,
}

impl RawConfig {
    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let b = match fs::read_to_string(path) {
            Ok(b) => b,
            Err(err) => return Err(ConfigError::Read(err)),
        };

        let c: Self = match toml::from_str(&b) {
            Ok(c) => c,
            Err(err) => return Err(ConfigError::Deserialize(err)),
        };

        Ok(c)
    }

    pub fn validate(&self) -> Result<Config, ConfigError> {
        Ok(Config {
            imp_addr: match self.imp_addr.is_empty() {
                true => String::from("127.0.0.1:1822"),
                false => self.imp_addr.clone(),
            },
            socket_path: match self.socket_path.is_empty() {
                true => None,
                false => Some(PathBuf::from(&self.socket_path)),
            },
            connect_timeout: match self.connect_timeout {
                0 => Duration::from_secs(5),
                secs => Duration::from_secs(secs),
            },
        })
    }
}

pub struct Config {
    /// Address of the IMP emulator the daemon attaches to.
    pub imp_addr: String,

    /// Application socket path used when `$NCP` is not set.
    pub socket_path: Option<PathBuf>,

    pub connect_timeout: time::Duration,
}

impl Config {
    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let raw_config = RawConfig::from_file(path)?;
        raw_config.validate()
    }
}
