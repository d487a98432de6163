//! Reverberation module
//!
//! Adds a circularly shifted copy of the buffer back onto itself. The
//! reverb control sets both the shift (as a fraction of the buffer) and the
//! level of the copy.

use super::module::{unknown_setter, ParamValue, SignalModule};
use crate::error::Result;
use crate::MAX_BLOCK_SIZE;

const REVERB_MAX: f32 = 127.0;

/// Echo-style reverberation
pub struct Reverberation {
    reverb: f32,
    /// Copy of the dry block, reused between calls
    scratch: Vec<f32>,
}

impl Reverberation {
    pub const NAME: &'static str = "reverberation";

    pub fn new() -> Self {
        Self {
            reverb: 0.0,
            scratch: Vec::with_capacity(MAX_BLOCK_SIZE),
        }
    }

    /// Shift in frames for a buffer of `len` frames
    pub fn shift(&self, len: usize) -> usize {
        (len as f32 * (self.reverb / REVERB_MAX)) as usize
    }
}

impl Default for Reverberation {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalModule for Reverberation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn process(&mut self, _note: u8, buffer: &mut [f32]) -> Result<()> {
        let len = buffer.len();
        if self.reverb <= 0.0 || len == 0 {
            return Ok(());
        }

        let shift = self.shift(len) % len;
        let level = self.reverb / REVERB_MAX;

        self.scratch.clear();
        self.scratch.extend_from_slice(buffer);

        for (i, sample) in buffer.iter_mut().enumerate() {
            *sample += self.scratch[(i + len - shift) % len] * level;
        }
        Ok(())
    }

    fn set_parameter(&mut self, setter: &str, value: f32) -> Result<()> {
        match setter {
            "set_reverb" => {
                self.reverb = value.clamp(0.0, REVERB_MAX);
                Ok(())
            }
            _ => Err(unknown_setter(Self::NAME, setter)),
        }
    }

    fn serialize(&self) -> Result<Vec<ParamValue>> {
        Ok(vec![ParamValue::new(Self::NAME, "set_reverb", self.reverb)])
    }
}
