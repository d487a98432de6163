//! Configuration loading, saving and presets

mod schema;

pub use schema::*;

use crate::synth::{ModuleRegistry, ParamValue};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Load configuration from a YAML file
pub fn load_config(path: &Path, registry: &ModuleRegistry) -> Result<SynthConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings: {:?}", path))?;
    let config: SynthConfig = serde_yaml::from_str(&contents)?;
    config.validate(registry)?;
    Ok(config)
}

/// Load configuration, falling back to defaults when the file doesn't exist yet
pub fn load_or_default(path: &Path, registry: &ModuleRegistry) -> Result<SynthConfig> {
    if path.exists() {
        load_config(path, registry)
    } else {
        warn!("No settings at {:?}, using defaults", path);
        Ok(SynthConfig::default())
    }
}

/// Write configuration as YAML
pub fn save_config(path: &Path, config: &SynthConfig) -> Result<()> {
    let contents = serde_yaml::to_string(config)?;
    std::fs::write(path, contents).with_context(|| format!("failed to write settings: {:?}", path))?;
    Ok(())
}

/// Load a JSON preset: a list of `[binding_name, value]`
pub fn load_preset(path: &Path) -> crate::Result<Vec<ParamValue>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Preset files addressed by recall number
#[derive(Debug, Clone, Default)]
pub struct PresetBank {
    paths: Vec<PathBuf>,
}

impl PresetBank {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Read preset `index` from disk
    pub fn load(&self, index: usize) -> crate::Result<Vec<ParamValue>> {
        let path = self
            .paths
            .get(index)
            .ok_or(crate::Error::PresetOutOfRange(index))?;
        load_preset(path)
    }
}
