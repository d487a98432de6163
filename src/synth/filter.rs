//! Band-pass amplitude gate
//!
//! Keeps samples inside a magnitude band: anything louder than the ceiling
//! is clamped to it, anything quieter than the floor is silenced.

use super::module::{unknown_setter, ParamValue, SignalModule};
use crate::error::Result;

/// Band-pass gate driven by two 0-127 controls
pub struct BandPass {
    high_pass: f32,
    low_pass: f32,
}

impl BandPass {
    pub const NAME: &'static str = "band_pass";

    /// Create a gate that passes everything
    pub fn new() -> Self {
        Self {
            high_pass: 0.0,
            low_pass: 0.0,
        }
    }

    /// Magnitudes below this are zeroed
    pub fn floor(&self) -> f32 {
        self.high_pass / 127.0
    }

    /// Magnitudes above this are clamped
    pub fn ceiling(&self) -> f32 {
        (127.0 - self.low_pass) / 127.0
    }
}

impl Default for BandPass {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalModule for BandPass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn process(&mut self, _note: u8, buffer: &mut [f32]) -> Result<()> {
        let floor = self.floor();
        let ceiling = self.ceiling();

        for sample in buffer.iter_mut() {
            let magnitude = sample.abs();
            if magnitude < floor {
                *sample = 0.0;
            } else if magnitude > ceiling {
                *sample = ceiling.copysign(*sample);
            }
        }
        Ok(())
    }

    fn set_parameter(&mut self, setter: &str, value: f32) -> Result<()> {
        let value = value.clamp(0.0, 127.0);
        match setter {
            "set_high_pass" => self.high_pass = value,
            "set_low_pass" => self.low_pass = value,
            _ => return Err(unknown_setter(Self::NAME, setter)),
        }
        Ok(())
    }

    fn serialize(&self) -> Result<Vec<ParamValue>> {
        Ok(vec![
            ParamValue::new(Self::NAME, "set_high_pass", self.high_pass),
            ParamValue::new(Self::NAME, "set_low_pass", self.low_pass),
        ])
    }
}
