//! Module chain (patchboard)
//!
//! An ordered list of signal modules applied to each voice in turn. A
//! module that fails is skipped for that call and its fault is counted;
//! the buffer moves on to the next module as if the failing one was absent.

use super::module::{split_binding_name, ParamValue, SignalModule};
use super::voice::GateEvent;
use crate::error::{Error, Result};
use crate::MAX_BLOCK_SIZE;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

struct Slot {
    module: Box<dyn SignalModule>,
    faults: u64,
}

/// Run a module call, treating both errors and panics as a fault
fn guarded<F: FnOnce() -> Result<()>>(call: F) -> bool {
    matches!(panic::catch_unwind(AssertUnwindSafe(call)), Ok(Ok(())))
}

/// Ordered chain of signal modules
pub struct ModuleChain {
    slots: Vec<Slot>,
    /// Working copy so a failing module can't leave a half-written buffer
    scratch: Vec<f32>,
}

impl ModuleChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            scratch: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    /// Add a module (builder pattern)
    pub fn with<M: SignalModule + 'static>(mut self, module: M) -> Self {
        self.add(Box::new(module));
        self
    }

    /// Append a module; insertion order is processing order
    pub fn add(&mut self, module: Box<dyn SignalModule>) {
        self.slots.push(Slot { module, faults: 0 });
    }

    /// Drop every module
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Module names in processing order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.module.name())
    }

    /// Look up a module by exact name
    pub fn find(&self, name: &str) -> Result<&(dyn SignalModule + 'static)> {
        self.slots
            .iter()
            .find(|slot| slot.module.name() == name)
            .map(|slot| slot.module.as_ref())
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))
    }

    /// Look up a module by exact name for mutation
    pub fn find_mut(&mut self, name: &str) -> Result<&mut (dyn SignalModule + 'static)> {
        self.slots
            .iter_mut()
            .find(|slot| slot.module.name() == name)
            .map(|slot| slot.module.as_mut())
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))
    }

    /// Invoke `module.setter(value)`
    pub fn set_parameter(&mut self, module: &str, setter: &str, value: f32) -> Result<()> {
        self.find_mut(module)?.set_parameter(setter, value)
    }

    /// Run `buffer` through every module in order
    pub fn apply(&mut self, note: u8, buffer: &mut [f32]) {
        let len = buffer.len();
        if self.scratch.len() < len {
            self.scratch.resize(len, 0.0);
        }

        for slot in &mut self.slots {
            let scratch = &mut self.scratch[..len];
            scratch.copy_from_slice(buffer);

            let module = &mut slot.module;
            if guarded(|| module.process(note, &mut *scratch)) {
                buffer.copy_from_slice(scratch);
            } else {
                slot.faults += 1;
            }
        }
    }

    /// Notify every module of a gate event
    pub fn broadcast_gate(&mut self, event: &GateEvent) {
        for slot in &mut self.slots {
            let module = &mut slot.module;
            if !guarded(|| module.on_gate(event)) {
                slot.faults += 1;
            }
        }
    }

    /// Forward a mod wheel value to every module
    pub fn broadcast_modulation(&mut self, value: f32) {
        for slot in &mut self.slots {
            slot.module.on_modulation(value);
        }
    }

    /// Concatenated parameter state of every module that can report it
    pub fn collect_state(&self) -> Vec<ParamValue> {
        let mut state = Vec::new();
        for slot in &self.slots {
            match slot.module.serialize() {
                Ok(params) => state.extend(params),
                Err(e) => warn!("Skipping state of '{}': {}", slot.module.name(), e),
            }
        }
        state
    }

    /// Apply persisted bindings, returning the ones that could not be applied
    pub fn apply_state(&mut self, bindings: &[ParamValue]) -> Vec<Error> {
        let mut failures = Vec::new();

        for param in bindings {
            let result = split_binding_name(param.binding())
                .and_then(|(module, setter)| self.set_parameter(module, setter, param.value()));

            if let Err(e) = result {
                warn!("Could not apply '{}': {}", param.binding(), e);
                failures.push(e);
            }
        }

        failures
    }

    /// Total faults across all modules
    pub fn fault_count(&self) -> u64 {
        self.slots.iter().map(|slot| slot.faults).sum()
    }

    /// Faults recorded for one module
    pub fn module_faults(&self, name: &str) -> Option<u64> {
        self.slots
            .iter()
            .find(|slot| slot.module.name() == name)
            .map(|slot| slot.faults)
    }
}

impl Default for ModuleChain {
    fn default() -> Self {
        Self::new()
    }
}
