//! Waveform generation
//!
//! The oscillator keeps no phase of its own: every sample is computed from
//! the absolute sample-time index, so consecutive buffers join without
//! discontinuity and independent notes can be generated concurrently.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

/// The sample-time index wraps back to zero at this bound.
pub const TIME_INDEX_WRAP: u64 = 1 << 40;

/// Waveform types, in sub-channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Sawtooth,
    Triangle,
    Square,
    Sine,
}

impl Waveform {
    /// All waveforms, indexed by their status byte offset
    pub const ALL: [Waveform; 4] = [
        Waveform::Sawtooth,
        Waveform::Triangle,
        Waveform::Square,
        Waveform::Sine,
    ];

    /// Waveform selected by a status byte's offset from its base status
    pub fn from_offset(offset: u8) -> Option<Self> {
        Self::ALL.get(offset as usize).copied()
    }

    pub fn offset(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
            Waveform::Square => "square",
            Waveform::Sine => "sine",
        }
    }

    /// Sample value at a phase position given in cycles, `[0, 1)`
    fn sample(&self, cycle: f64) -> f64 {
        match self {
            Waveform::Sawtooth => sawtooth(cycle, 1.0),
            Waveform::Triangle => sawtooth(cycle, 0.5),
            Waveform::Square => {
                if cycle < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sine => (TAU * cycle).sin(),
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "saw" | "sawtooth" => Ok(Waveform::Sawtooth),
            "triangle" => Ok(Waveform::Triangle),
            "square" => Ok(Waveform::Square),
            "sine" => Ok(Waveform::Sine),
            other => Err(format!("unknown waveform '{}'", other)),
        }
    }
}

/// Rising ramp from -1 to 1 over `width` of the cycle, falling back to -1
/// over the remainder. A width of 0.5 gives a triangle.
fn sawtooth(cycle: f64, width: f64) -> f64 {
    if cycle < width {
        -1.0 + 2.0 * cycle / width
    } else {
        1.0 - 2.0 * (cycle - width) / (1.0 - width)
    }
}

/// Equal-tempered frequency referenced to A440
pub fn note_to_frequency(note: u8) -> f64 {
    440.0 * 2f64.powf((note as f64 - 69.0) / 12.0)
}

/// Map a 0-127 pitch wheel control value to a bend fraction.
///
/// Down-bends divide by -64 and up-bends by 127; zero is nudged to 0.5 so
/// the lowest position never lands on an exact zero bend.
pub fn pitch_bend_from_control(value: u8) -> f32 {
    match value {
        0 => 0.5 / -64.0,
        v if v < 64 => v as f32 / -64.0,
        64 => 0.0,
        v => v as f32 / 127.0,
    }
}

/// Stateless sample generator
#[derive(Debug, Clone, Copy)]
pub struct Oscillator {
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(sample_rate: f64) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Note frequency with the pitch bend applied
    pub fn frequency(note: u8, pitch_bend: f32) -> f64 {
        let frequency = note_to_frequency(note);
        if pitch_bend != 0.0 {
            frequency * (1.0 + pitch_bend as f64)
        } else {
            frequency
        }
    }

    /// Fill `out` with samples starting at `time_index`
    pub fn fill(&self, waveform: Waveform, note: u8, pitch_bend: f32, time_index: u64, out: &mut [f32]) {
        let frequency = Self::frequency(note, pitch_bend);

        for (i, sample) in out.iter_mut().enumerate() {
            let t = (time_index + i as u64) as f64;
            let cycle = (frequency * t / self.sample_rate).rem_euclid(1.0);
            *sample = waveform.sample(cycle) as f32;
        }
    }

    /// Generate `frame_count` samples starting at `time_index`
    pub fn generate(
        &self,
        waveform: Waveform,
        note: u8,
        pitch_bend: f32,
        frame_count: usize,
        time_index: u64,
    ) -> Vec<f32> {
        let mut buffer = vec![0.0; frame_count];
        self.fill(waveform, note, pitch_bend, time_index, &mut buffer);
        buffer
    }
}

/// Running sample-time index, advanced once per render cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleClock(u64);

impl SampleClock {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn at(index: u64) -> Self {
        Self(index % TIME_INDEX_WRAP)
    }

    pub fn index(&self) -> u64 {
        self.0
    }

    pub fn advance(&mut self, frames: usize) {
        self.0 = (self.0 + frames as u64) % TIME_INDEX_WRAP;
    }
}
