//! Patchsynth - Real-time polyphonic MIDI synthesizer
//!
//! Note events become oscillator voices, each voice runs through a chain of
//! signal modules, and the result is mixed to the audio output. MIDI
//! controllers drive module parameters through a binding table.

pub mod config;
pub mod engine;
pub mod error;
pub mod synth;

pub use config::SynthConfig;
pub use engine::Engine;
pub use error::{Error, Result};

/// Largest block any stage processes in one call; longer buffers are chunked
pub const MAX_BLOCK_SIZE: usize = 4096;
