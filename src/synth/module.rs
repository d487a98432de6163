//! Signal module contract
//!
//! A signal module is one processing stage in the chain: a filter, an
//! envelope or an effect. Modules own their parameter state; the chain only
//! reaches it through this trait.

use super::voice::GateEvent;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// One persisted parameter: `(binding_name, value)` where the binding name
/// has the form `module.setter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamValue(pub String, pub f32);

impl ParamValue {
    pub fn new(module: &str, setter: &str, value: f32) -> Self {
        Self(format!("{}.{}", module, setter), value)
    }

    pub fn binding(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> f32 {
        self.1
    }
}

/// Split a `module.setter` binding name at its first dot.
pub fn split_binding_name(name: &str) -> Result<(&str, &str)> {
    match name.split_once('.') {
        Some((module, setter)) if !module.is_empty() && !setter.is_empty() => Ok((module, setter)),
        _ => Err(Error::InvalidBinding(name.to_string())),
    }
}

/// Trait for signal processing stages
pub trait SignalModule: Send {
    /// Name used in bindings and chain lookups
    fn name(&self) -> &str;

    /// Process one voice's buffer in place
    fn process(&mut self, note: u8, buffer: &mut [f32]) -> Result<()>;

    /// Invoke a named setter with a control value
    fn set_parameter(&mut self, setter: &str, value: f32) -> Result<()>;

    /// Current parameters as `module.setter` bindings, in a stable order
    fn serialize(&self) -> Result<Vec<ParamValue>>;

    /// Note lifecycle notification
    fn on_gate(&mut self, _event: &GateEvent) -> Result<()> {
        Ok(())
    }

    /// Mod wheel change, 0-127
    fn on_modulation(&mut self, _value: f32) {}
}

/// Error for a setter the module doesn't have
pub(crate) fn unknown_setter(module: &str, setter: &str) -> Error {
    Error::UnknownSetter {
        module: module.to_string(),
        setter: setter.to_string(),
    }
}
