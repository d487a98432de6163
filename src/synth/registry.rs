//! Module registration
//!
//! Maps module names to constructors so a chain can be built from the names
//! listed in the settings.

use super::{BandPass, Envelope, ModuleChain, Reverberation, SignalModule};
use crate::error::{Error, Result};

type Constructor = Box<dyn Fn(f64) -> Box<dyn SignalModule> + Send + Sync>;

/// Named module constructors
pub struct ModuleRegistry {
    constructors: Vec<(String, Constructor)>,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            constructors: Vec::new(),
        }
    }

    /// Registry with the envelope, band-pass and reverberation modules
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Envelope::NAME, |rate| Box::new(Envelope::new(rate)));
        registry.register(BandPass::NAME, |_| Box::new(BandPass::new()));
        registry.register(Reverberation::NAME, |_| Box::new(Reverberation::new()));
        registry
    }

    /// Register a constructor, replacing any previous one with this name
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(f64) -> Box<dyn SignalModule> + Send + Sync + 'static,
    {
        self.constructors.retain(|(existing, _)| existing != name);
        self.constructors.push((name.to_string(), Box::new(constructor)));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.iter().any(|(existing, _)| existing == name)
    }

    /// Registered names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.iter().map(|(name, _)| name.as_str())
    }

    /// Instantiate a module
    pub fn create(&self, name: &str, sample_rate: f64) -> Result<Box<dyn SignalModule>> {
        self.constructors
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, constructor)| constructor(sample_rate))
            .ok_or_else(|| Error::UnknownModule(name.to_string()))
    }

    /// Build a chain from module names, in order
    pub fn build_chain<S: AsRef<str>>(&self, names: &[S], sample_rate: f64) -> Result<ModuleChain> {
        let mut chain = ModuleChain::new();
        for name in names {
            chain.add(self.create(name.as_ref(), sample_rate)?);
        }
        Ok(chain)
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
