use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "docdesk.json";
pub const DEFAULT_SERVER: &str = "http://localhost:8000/api";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the REST API, including the `/api` prefix.
    pub server: String,
    pub token_file: String,
    /// Address the WebDAV view listens on.
    pub listen: String,
    /// Number of downloaded documents kept in memory by the WebDAV view.
    pub cache_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: DEFAULT_SERVER.to_string(),
            token_file: ".docdesk-tokens.json".to_string(),
            listen: "127.0.0.1:4918".to_string(),
            cache_size: 50,
        }
    }
}

impl Config {
    /// Read the config file, falling back to defaults when it does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("{} not found, using default config", path.display());
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str::<Config>(&content).map_err(|e| {
            let sample = serde_json::to_string_pretty(&Config::default()).unwrap_or_default();
            Error::Config(format!(
                "{} is invalid ({}), expected content like:\r\n{}",
                path.display(),
                e,
                sample
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.server.starts_with("http://") || self.server.starts_with("https://")) {
            return Err(Error::Config(format!(
                "server must be an http(s) URL, got `{}`",
                self.server
            )));
        }
        if self.cache_size == 0 {
            return Err(Error::Config("cache_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docdesk.json");
        fs::write(&path, r#"{"server": "https://docs.example.org/api"}"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.server, "https://docs.example.org/api");
        assert_eq!(config.cache_size, 50);
    }

    #[test]
    fn rejects_bad_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docdesk.json");
        fs::write(&path, r#"{"server": "localhost:8000"}"#).unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }
}
