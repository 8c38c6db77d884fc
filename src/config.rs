use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result};

/// server configuration, loaded from `config.toml` or built from CLI flags
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// directory containing one subdirectory per store
    pub stores_root: PathBuf,
    /// address the HTTP server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// seconds between background gc sweeps; 0 disables the sweep thread
    #[serde(default = "default_gc_interval_secs")]
    pub gc_interval_secs: u64,
    /// max entries held by the per-process query cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_gc_interval_secs() -> u64 {
    3600
}

fn default_cache_capacity() -> usize {
    10_000
}

impl Config {
    pub fn new(stores_root: impl Into<PathBuf>) -> Self {
        Self {
            stores_root: stores_root.into(),
            bind_addr: default_bind_addr(),
            gc_interval_secs: default_gc_interval_secs(),
            cache_capacity: default_cache_capacity(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_toml_roundtrip() {
        let config = Config::new("/var/lib/herodb/stores");
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_minimal_toml_fills_defaults() {
        let toml_str = r#"stores_root = "/var/lib/herodb/stores""#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.gc_interval_secs, 3600);
        assert_eq!(config.cache_capacity, 10_000);
    }
}
