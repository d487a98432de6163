//! ADSR envelope module
//!
//! Shapes each voice with an attack-decay-sustain gain curve. Every note
//! keeps its own position on the curve, restarted when its gate opens.

use super::module::{unknown_setter, ParamValue, SignalModule};
use super::voice::GateEvent;
use crate::error::Result;

/// Longest attack or decay, reached at control value 127
const MAX_STAGE_SECONDS: f64 = 2.0;

/// Envelope stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvelopeStage {
    Attack,
    Decay,
    Sustain,
}

/// ADSR envelope generator
pub struct Envelope {
    sample_rate: f64,

    // Control values (0-127)
    attack: f32,
    decay: f32,
    sustain: f32,
    release: f32,

    /// Samples elapsed since each note's gate opened
    positions: [u64; 128],
}

impl Envelope {
    pub const NAME: &'static str = "envelope";

    /// Create a new envelope with unity gain
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            attack: 0.0,
            decay: 0.0,
            sustain: 127.0,
            release: 0.0,
            positions: [0; 128],
        }
    }

    fn stage_samples(&self, value: f32) -> f64 {
        (value as f64 / 127.0) * MAX_STAGE_SECONDS * self.sample_rate
    }

    /// Sustain level (0.0-1.0)
    pub fn sustain_level(&self) -> f64 {
        self.sustain as f64 / 127.0
    }

    /// Stage reached `position` samples after the gate opened
    pub fn stage_at(&self, position: u64) -> EnvelopeStage {
        let attack = self.stage_samples(self.attack);
        let decay = self.stage_samples(self.decay);
        let p = position as f64;

        if p < attack {
            EnvelopeStage::Attack
        } else if p < attack + decay {
            EnvelopeStage::Decay
        } else {
            EnvelopeStage::Sustain
        }
    }

    /// Gain `position` samples after the gate opened
    pub fn gain_at(&self, position: u64) -> f64 {
        let attack = self.stage_samples(self.attack);
        let decay = self.stage_samples(self.decay);
        let sustain = self.sustain_level();
        let p = position as f64;

        match self.stage_at(position) {
            EnvelopeStage::Attack => p / attack,
            EnvelopeStage::Decay => 1.0 - (1.0 - sustain) * (p - attack) / decay,
            EnvelopeStage::Sustain => sustain,
        }
    }

    /// Current curve position of a note
    pub fn position(&self, note: u8) -> u64 {
        self.positions[note as usize & 0x7F]
    }
}

impl SignalModule for Envelope {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn process(&mut self, note: u8, buffer: &mut [f32]) -> Result<()> {
        let start = self.position(note);

        for (i, sample) in buffer.iter_mut().enumerate() {
            *sample *= self.gain_at(start + i as u64) as f32;
        }

        self.positions[note as usize & 0x7F] = start + buffer.len() as u64;
        Ok(())
    }

    fn set_parameter(&mut self, setter: &str, value: f32) -> Result<()> {
        let value = value.clamp(0.0, 127.0);
        match setter {
            "set_attack" => self.attack = value,
            "set_decay" => self.decay = value,
            "set_sustain" => self.sustain = value,
            "set_release" => self.release = value,
            _ => return Err(unknown_setter(Self::NAME, setter)),
        }
        Ok(())
    }

    fn serialize(&self) -> Result<Vec<ParamValue>> {
        Ok(vec![
            ParamValue::new(Self::NAME, "set_attack", self.attack),
            ParamValue::new(Self::NAME, "set_decay", self.decay),
            ParamValue::new(Self::NAME, "set_sustain", self.sustain),
            ParamValue::new(Self::NAME, "set_release", self.release),
        ])
    }

    fn on_gate(&mut self, event: &GateEvent) -> Result<()> {
        // A retrigger restarts the attack; a release leaves the slot fresh
        // for the next note-on
        self.positions[event.note as usize & 0x7F] = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::Waveform;

    #[test]
    fn test_default_is_unity_gain() {
        let mut env = Envelope::new(44100.0);
        let mut buffer = vec![0.5f32; 64];
        env.process(60, &mut buffer).unwrap();
        assert!(buffer.iter().all(|&s| s == 0.5));
        assert_eq!(env.stage_at(0), EnvelopeStage::Sustain);
    }

    #[test]
    fn test_attack_ramp() {
        let mut env = Envelope::new(1000.0);
        // 127 -> 2 seconds -> 2000 samples at 1 kHz
        env.set_parameter("set_attack", 127.0).unwrap();

        assert_eq!(env.stage_at(0), EnvelopeStage::Attack);
        assert!((env.gain_at(1000) - 0.5).abs() < 1e-9);
        assert_eq!(env.stage_at(2000), EnvelopeStage::Sustain);
    }

    #[test]
    fn test_decay_to_sustain() {
        let mut env = Envelope::new(1000.0);
        env.set_parameter("set_decay", 127.0).unwrap();
        env.set_parameter("set_sustain", 63.5).unwrap();

        assert_eq!(env.stage_at(0), EnvelopeStage::Decay);
        assert!((env.gain_at(0) - 1.0).abs() < 1e-9);
        assert!((env.gain_at(1000) - 0.75).abs() < 1e-9);
        assert!((env.gain_at(5000) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_position_advances_per_note() {
        let mut env = Envelope::new(44100.0);
        let mut buffer = vec![1.0f32; 128];
        env.process(60, &mut buffer).unwrap();
        env.process(60, &mut buffer).unwrap();
        env.process(64, &mut buffer).unwrap();

        assert_eq!(env.position(60), 256);
        assert_eq!(env.position(64), 128);
    }

    #[test]
    fn test_gate_restarts_curve() {
        let mut env = Envelope::new(44100.0);
        let mut buffer = vec![1.0f32; 128];
        env.process(60, &mut buffer).unwrap();

        env.on_gate(&GateEvent::on(60, Waveform::Sine, 100)).unwrap();
        assert_eq!(env.position(60), 0);
    }

    #[test]
    fn test_setters_and_serialize() {
        let mut env = Envelope::new(44100.0);
        env.set_parameter("set_attack", 10.0).unwrap();
        env.set_parameter("set_release", 200.0).unwrap();
        assert!(env.set_parameter("set_nothing", 1.0).is_err());

        let state = env.serialize().unwrap();
        assert_eq!(state.len(), 4);
        assert_eq!(state[0], ParamValue::new("envelope", "set_attack", 10.0));
        // Clamped to the control range
        assert_eq!(state[3], ParamValue::new("envelope", "set_release", 127.0));
    }
}
