//! Configuration for platoterm.
//!
//! Loaded from `~/.platoterm/config.toml`:
//!
//! ```toml
//! # Host running the PLATO service
//! host = "irata.online"
//! port = 8005
//!
//! [flow_control]
//! high_water = 1536   # inbound bytes at which XOFF is sent
//! low_water = 512     # inbound bytes at which XON is sent
//! ```

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::transport::FlowConfig;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// PLATO service host
    pub host: String,
    /// PLATO service port
    pub port: u16,
    /// Flow-control watermarks
    pub flow_control: FlowControlConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "irata.online".to_string(),
            port: 8005,
            flow_control: FlowControlConfig::default(),
        }
    }
}

/// Flow-control watermark settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowControlConfig {
    pub high_water: usize,
    pub low_water: usize,
}

impl Default for FlowControlConfig {
    fn default() -> Self {
        let flow = FlowConfig::default();
        Self {
            high_water: flow.high_water,
            low_water: flow.low_water,
        }
    }
}

impl FlowControlConfig {
    pub fn to_flow(&self) -> FlowConfig {
        FlowConfig {
            high_water: self.high_water,
            low_water: self.low_water,
        }
        .normalized()
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(config) = toml::from_str(&content) {
                        return config;
                    }
                }
            }
        }
        Self::default()
    }

    /// Save configuration to file
    #[allow(dead_code)]
    pub fn save(&self) -> Result<(), String> {
        if let Some(path) = Self::get_config_path() {
            let content = toml::to_string_pretty(self)
                .map_err(|e| format!("Failed to serialize config: {}", e))?;
            fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;
            Ok(())
        } else {
            Err("Could not determine config path".to_string())
        }
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        if let Some(home) = home_dir() {
            let dir = home.join(".platoterm");
            if !dir.exists() {
                let _ = fs::create_dir_all(&dir);
            }
            return Some(dir.join("config.toml"));
        }
        None
    }
}

// Get home directory
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse_from_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.host, "irata.online");
        assert_eq!(config.port, 8005);
        assert_eq!(config.flow_control.high_water, 1536);
        assert_eq!(config.flow_control.low_water, 512);
    }

    #[test]
    fn test_partial_override() {
        let config: Config = toml::from_str(
            r#"
            host = "cyberserv.example"

            [flow_control]
            high_water = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.host, "cyberserv.example");
        assert_eq!(config.port, 8005);
        assert_eq!(config.flow_control.high_water, 1024);
        assert_eq!(config.flow_control.low_water, 512);
    }

    #[test]
    fn test_to_flow_normalizes() {
        let flow = FlowControlConfig {
            high_water: 100,
            low_water: 900,
        }
        .to_flow();
        assert!(flow.low_water < flow.high_water);
    }
}
