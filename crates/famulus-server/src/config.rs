//! Bridge configuration.

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Default remote graph source.
    #[serde(default)]
    pub remote_memory_url: Option<String>,
    /// Attempt a graph sync when the memory service starts.
    #[serde(default)]
    pub sync_on_init: bool,
    /// Shelf-life cap for the desk agent.
    #[serde(default = "default_max_runs")]
    pub max_runs: u32,
    #[serde(default = "default_llm_endpoint")]
    pub llm_endpoint: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_proxy_host")]
    pub proxy_host: String,
    #[serde(default = "default_proxy_port")]
    pub proxy_port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("famulus")
        .join("memory.db")
}

fn default_max_runs() -> u32 {
    3
}

fn default_llm_endpoint() -> String {
    "http://127.0.0.1:11434/api/generate".to_string()
}

fn default_llm_model() -> String {
    "llama3".to_string()
}

fn default_proxy_host() -> String {
    "127.0.0.1".to_string()
}

fn default_proxy_port() -> u16 {
    9050
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            remote_memory_url: None,
            sync_on_init: false,
            max_runs: default_max_runs(),
            llm_endpoint: default_llm_endpoint(),
            llm_model: default_llm_model(),
            proxy_host: default_proxy_host(),
            proxy_port: default_proxy_port(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from the default location (config/default.toml) or fall
    /// back to defaults, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from("config/default.toml");
        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            Config::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Environment overrides for the core configuration surface.
    pub fn apply_env(&mut self) {
        if let Ok(db_path) = std::env::var("FAMULUS_DB_PATH") {
            self.db_path = PathBuf::from(db_path);
        }
        if let Ok(url) = std::env::var("FAMULUS_REMOTE_MEMORY_URL") {
            if !url.is_empty() {
                self.remote_memory_url = Some(url);
            }
        }
        if let Ok(flag) = std::env::var("FAMULUS_SYNC_ON_INIT") {
            self.sync_on_init = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(max_runs) = std::env::var("FAMULUS_MAX_RUNS") {
            if let Ok(value) = max_runs.parse() {
                self.max_runs = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_runs, 3);
        assert!(!config.sync_on_init);
        assert!(config.remote_memory_url.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("port = 9000\nmax_runs = 7").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.max_runs, 7);
        assert_eq!(config.host, "127.0.0.1");
    }
}
