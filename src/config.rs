/*!
Runtime configuration for a console session, read from a JSON file.

Every field is optional in the file; missing ones fall back to
`EmuConfig::default()`.
*/

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EmuError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmuConfig {
    /// Host pacing multiplier. 1.0 runs at NTSC speed; the tick stream itself
    /// is unaffected.
    pub speed_multiplier: f64,
    /// Skip the PPU warm-up window after power-on so register writes take
    /// effect immediately.
    pub skip_warmup: bool,
    /// Log every interrupt service entry at debug level.
    pub log_interrupts: bool,
}

impl Default for EmuConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            skip_warmup: false,
            log_interrupts: false,
        }
    }
}

impl EmuConfig {
    /// Parse a config from a JSON string. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a config file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| EmuError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        log::debug!("loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }
}
