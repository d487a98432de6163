//! Synthesis building blocks
//!
//! Contains the oscillator, the signal module contract and chain, the
//! reference modules, and the voice registry.

mod chain;
mod envelope;
mod filter;
pub mod module;
mod oscillator;
mod registry;
mod reverb;
mod voice;

pub use chain::ModuleChain;
pub use envelope::{Envelope, EnvelopeStage};
pub use filter::BandPass;
pub use module::{split_binding_name, ParamValue, SignalModule};
pub use oscillator::{
    note_to_frequency, pitch_bend_from_control, Oscillator, SampleClock, Waveform, TIME_INDEX_WRAP,
};
pub use registry::ModuleRegistry;
pub use reverb::Reverberation;
pub use voice::{GateEvent, GateStatus, ImpactScaling, NoteState, Voice, VoiceRegistry};
