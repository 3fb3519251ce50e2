//! Serializable snapshots of the menu tree
//!
//! Persistence collaborators (the CLI, a future web UI) consume these types
//! instead of the live tree: button behaviors are code and cannot
//! round-trip, so a snapshot carries descriptors only — which keys hold a
//! button and which icon each one shows. The on-disk format is plain TOML
//! via serde.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One assigned button slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonEntry {
    /// Key slot (0-14)
    pub key: u8,
    /// Icon shown on the key, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<PathBuf>,
}

/// One menu's assignments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuEntry {
    pub buttons: Vec<ButtonEntry>,
}

/// The whole menu tree at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuLayout {
    /// Active menu at snapshot time
    pub current: Option<String>,
    /// Menus keyed by identifier
    pub menus: BTreeMap<String, MenuEntry>,
}

impl MenuLayout {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
