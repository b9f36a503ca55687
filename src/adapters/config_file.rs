//! JSON configuration file adapter.
//!
//! Implements [`ConfigPort`] on top of a single pretty-printed JSON file.
//! A missing file means "use the defaults".  Every field is range-checked
//! by [`validate_config`] on both load and save, and saves go through a
//! temporary file plus rename so a crash never leaves a half-written config.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::{SystemConfig, validate_config};

#[derive(Debug, Clone)]
pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No config at {}, using defaults", self.path.display());
                let cfg = SystemConfig::default();
                validate_config(&cfg)?;
                return Ok(cfg);
            }
            Err(e) => {
                warn!("Config read {}: {}", self.path.display(), e);
                return Err(ConfigError::IoError);
            }
        };

        let cfg: SystemConfig = serde_json::from_str(&text).map_err(|e| {
            warn!("Config parse {}: {}", self.path.display(), e);
            ConfigError::Corrupted
        })?;
        validate_config(&cfg)?;
        info!("Loaded config from {}", self.path.display());
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let json = serde_json::to_string_pretty(config).map_err(|_| ConfigError::Corrupted)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json + "\n")
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                warn!("Config write {}: {}", self.path.display(), e);
                ConfigError::IoError
            })?;
        info!("Saved config to {}", self.path.display());
        Ok(())
    }
}
