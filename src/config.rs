//! Optional TOML configuration, overridable by the CLI flags each binary
//! exposes. A binary works with no config file at all, using the defaults
//! below; the file only needs to name what differs.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, source: toml::de::Error },
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_connect_attempts() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub master_port: u16,
    pub master_host: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 30000,
            master_port: 30001,
            master_host: "127.0.0.1".to_string(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub health_check_interval_secs: u64,
}

impl Default for MasterConfig {
    fn default() -> Self {
        MasterConfig {
            port: 30001,
            log_level: default_log_level(),
            health_check_interval_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            connect_attempts: default_connect_attempts(),
            log_level: default_log_level(),
        }
    }
}

pub fn load<T: Default + for<'de> Deserialize<'de>>(path: Option<&Path>) -> Result<T, ConfigError> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_require_no_file() {
        let cfg: ServerConfig = load(None).unwrap();
        assert_eq!(cfg.port, 30000);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn parses_partial_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shard.toml");
        fs::write(&path, "port = 40000\n").unwrap();
        let cfg: ServerConfig = load(Some(&path)).unwrap();
        assert_eq!(cfg.port, 40000);
        assert_eq!(cfg.master_port, 30001);
    }
}
