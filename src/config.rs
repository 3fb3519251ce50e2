use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Application configuration for the companion binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub menu: MenuConfig,
}

impl Config {
    /// Load configuration from file or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;
        Ok(())
    }

    /// Get config file path
    pub fn config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".config/keydeck/config.toml")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device brightness (0-100)
    pub brightness: u8,
    /// Flip icons horizontally for the device's mirrored rendering
    pub mirror_icons: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            brightness: 80,
            mirror_icons: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    /// Milliseconds between button ticks (long-press detection)
    pub tick_interval_ms: u64,
    /// Optional menu layout file applied at startup
    pub layout_file: Option<PathBuf>,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            layout_file: None,
        }
    }
}
