//! Configuration schema definitions

use crate::synth::{split_binding_name, ImpactScaling, ModuleRegistry, ParamValue};
use crate::MAX_BLOCK_SIZE;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Binding names handled by the engine rather than a module
pub const RESERVED_BINDINGS: [&str; 3] = ["master_volume", "pitch_wheel", "mod_wheel"];

/// Main configuration for a synth session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthConfig {
    /// Audio output settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// MIDI input settings
    #[serde(default)]
    pub midi: MidiConfig,

    /// Master volume and impact
    #[serde(default)]
    pub master: MasterConfig,

    /// Stage hand-off tuning
    #[serde(default)]
    pub engine: EngineConfig,

    /// Modules to load, in processing order
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,

    /// Control bindings, matched in order
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,

    /// Saved module parameters
    #[serde(default)]
    pub module_data: Vec<ParamValue>,

    /// Preset files, addressed by preset recall number
    #[serde(default)]
    pub presets: Vec<PathBuf>,
}

impl SynthConfig {
    /// Validate the configuration against the available modules
    pub fn validate(&self, registry: &ModuleRegistry) -> Result<()> {
        // Validate audio settings
        if self.audio.sample_rate < 8000 || self.audio.sample_rate > 192000 {
            bail!("Sample rate must be between 8000 and 192000");
        }
        if self.audio.buffer_size < 64 || self.audio.buffer_size > MAX_BLOCK_SIZE {
            bail!("Buffer size must be between 64 and {}", MAX_BLOCK_SIZE);
        }

        // Validate master settings
        if !(0.0..=127.0).contains(&self.master.volume) {
            bail!("Master volume must be between 0 and 127");
        }
        if self.master.impact.weight <= 0.0 {
            bail!("Impact weight must be positive");
        }

        self.midi.validate()?;

        if self.engine.queue_capacity == 0 {
            bail!("Queue capacity must be at least 1");
        }

        for module in &self.modules {
            if !registry.contains(module) {
                bail!("Unknown module '{}'", module);
            }
        }

        for binding in &self.bindings {
            if !RESERVED_BINDINGS.contains(&binding.name()) && split_binding_name(binding.name()).is_err() {
                bail!(
                    "Binding '{}' must be one of {:?} or have the form module.setter",
                    binding.name(),
                    RESERVED_BINDINGS
                );
            }
        }

        Ok(())
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            midi: MidiConfig::default(),
            master: MasterConfig::default(),
            engine: EngineConfig::default(),
            modules: default_modules(),
            bindings: default_bindings(),
            module_data: Vec::new(),
            presets: Vec::new(),
        }
    }
}

fn default_modules() -> Vec<String> {
    vec![
        "envelope".to_string(),
        "band_pass".to_string(),
        "reverberation".to_string(),
    ]
}

fn default_bindings() -> Vec<BindingConfig> {
    vec![
        BindingConfig::new("master_volume", 176, 7),
        BindingConfig::new("mod_wheel", 176, 1),
        BindingConfig::new("pitch_wheel", 224, 0),
        BindingConfig::new("envelope.set_attack", 176, 73),
        BindingConfig::new("envelope.set_decay", 176, 75),
        BindingConfig::new("envelope.set_sustain", 176, 79),
        BindingConfig::new("envelope.set_release", 176, 72),
        BindingConfig::new("band_pass.set_high_pass", 176, 71),
        BindingConfig::new("band_pass.set_low_pass", 176, 74),
        BindingConfig::new("reverberation.set_reverb", 176, 91),
    ]
}

/// Audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz (default: 44100)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Frames per render cycle (default: 1470, a thirtieth of a second)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Output device name (None = default device)
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            device: None,
        }
    }
}

fn default_sample_rate() -> u32 { 44100 }
fn default_buffer_size() -> usize { 1470 }

/// MIDI input configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidiConfig {
    /// Input port name or index (None = first port)
    pub port: Option<String>,

    /// Note-on status for the first waveform (default: 144)
    #[serde(default = "default_note_on")]
    pub note_on: u8,

    /// Note-off status for the first waveform (default: 128)
    #[serde(default = "default_note_off")]
    pub note_off: u8,

    /// Status that recalls a preset by number (default: 192)
    #[serde(default = "default_preset_recall")]
    pub preset_recall: u8,
}

impl MidiConfig {
    fn validate(&self) -> Result<()> {
        if self.note_on > 252 || self.note_off > 252 {
            bail!("Note on/off status must leave room for four waveform channels");
        }
        if self.note_on.abs_diff(self.note_off) < 4 {
            bail!("Note on and note off status ranges overlap");
        }
        if self.note_range(self.note_on).contains(&self.preset_recall)
            || self.note_range(self.note_off).contains(&self.preset_recall)
        {
            bail!("Preset recall status overlaps a note status range");
        }
        Ok(())
    }

    fn note_range(&self, base: u8) -> std::ops::RangeInclusive<u8> {
        base..=base.saturating_add(3)
    }
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            port: None,
            note_on: default_note_on(),
            note_off: default_note_off(),
            preset_recall: default_preset_recall(),
        }
    }
}

fn default_note_on() -> u8 { 144 }
fn default_note_off() -> u8 { 128 }
fn default_preset_recall() -> u8 { 192 }

/// Master settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Master volume as a 0-127 control value (default: 50)
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// How note velocity scales amplitude
    #[serde(default)]
    pub impact: ImpactConfig,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            impact: ImpactConfig::default(),
        }
    }
}

fn default_volume() -> f32 { 50.0 }

/// Impact (velocity) sensitivity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactConfig {
    /// Scale amplitude by velocity (default: true)
    #[serde(default = "default_impact_enabled")]
    pub enabled: bool,

    /// Velocity divisor (default: 20000)
    #[serde(default = "default_impact_weight")]
    pub weight: f32,

    /// Amplitude factor when disabled (default: 0.002)
    #[serde(default = "default_impact_fixed")]
    pub fixed: f32,
}

impl ImpactConfig {
    pub fn scaling(&self) -> ImpactScaling {
        ImpactScaling {
            enabled: self.enabled,
            weight: self.weight,
            fixed: self.fixed,
        }
    }
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            enabled: default_impact_enabled(),
            weight: default_impact_weight(),
            fixed: default_impact_fixed(),
        }
    }
}

fn default_impact_enabled() -> bool { true }
fn default_impact_weight() -> f32 { 20000.0 }
fn default_impact_fixed() -> f32 { 0.002 }

/// Stage hand-off settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of each hand-off queue before the oldest entries drop (default: 1024)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long control waits for an event before checking for shutdown (default: 100)
    #[serde(default = "default_control_timeout_ms")]
    pub control_timeout_ms: u64,

    /// Consecutive idle timeouts before control ends the session (None = never)
    pub idle_shutdown: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            control_timeout_ms: default_control_timeout_ms(),
            idle_shutdown: None,
        }
    }
}

fn default_queue_capacity() -> usize { 1024 }
fn default_control_timeout_ms() -> u64 { 100 }

/// A control binding: `[binding_name, status, data]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingConfig(pub String, pub u8, pub u8);

impl BindingConfig {
    pub fn new(name: &str, status: u8, data: u8) -> Self {
        Self(name.to_string(), status, data)
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn status(&self) -> u8 {
        self.1
    }

    pub fn data(&self) -> u8 {
        self.2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_audio_config() {
        let yaml = "sample_rate: 48000";
        let config: AudioConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.buffer_size, 1470); // default
    }

    #[test]
    fn test_binding_config() {
        let yaml = r#"
- [master_volume, 176, 29]
- [envelope.set_attack, 176, 73]
"#;
        let bindings: Vec<BindingConfig> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(bindings[0], BindingConfig::new("master_volume", 176, 29));
        assert_eq!(bindings[1].name(), "envelope.set_attack");
        assert_eq!(bindings[1].status(), 176);
        assert_eq!(bindings[1].data(), 73);
    }

    #[test]
    fn test_module_data() {
        let yaml = r#"
module_data:
  - [reverberation.set_reverb, 40]
"#;
        let config: SynthConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.module_data, vec![ParamValue::new("reverberation", "set_reverb", 40.0)]);
        assert_eq!(config.modules.len(), 3);
        assert!(config.bindings.is_empty());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = SynthConfig::default();
        assert!(config.validate(&ModuleRegistry::with_builtin()).is_ok());
        assert_eq!(config.master.volume, 50.0);
        assert_eq!(config.midi.note_on, 144);
    }

    #[test]
    fn test_invalid_binding_name() {
        let mut config = SynthConfig::default();
        config.bindings.push(BindingConfig::new("volume", 176, 30));
        assert!(config.validate(&ModuleRegistry::with_builtin()).is_err());
    }

    #[test]
    fn test_unknown_module() {
        let mut config = SynthConfig::default();
        config.modules.push("chorus".to_string());
        assert!(config.validate(&ModuleRegistry::with_builtin()).is_err());
    }

    #[test]
    fn test_overlapping_status_ranges() {
        let registry = ModuleRegistry::with_builtin();

        let mut config = SynthConfig::default();
        config.midi.note_off = 146;
        assert!(config.validate(&registry).is_err());

        let mut config = SynthConfig::default();
        config.midi.preset_recall = 130;
        assert!(config.validate(&registry).is_err());
    }

    #[test]
    fn test_master_volume_range() {
        let mut config = SynthConfig::default();
        config.master.volume = 200.0;
        assert!(config.validate(&ModuleRegistry::with_builtin()).is_err());
    }
}
