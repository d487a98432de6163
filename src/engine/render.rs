//! Render stage
//!
//! Owns the voice registry and produces one output buffer per cycle. Runs
//! inside the audio callback, so it never blocks: the module chain is taken
//! with `try_lock` and a contended cycle is rendered as silence.

use super::queue::EventQueue;
use super::state::SharedState;
use crate::synth::{GateEvent, ModuleChain, Oscillator, SampleClock, VoiceRegistry};
use crate::MAX_BLOCK_SIZE;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct Renderer {
    oscillator: Oscillator,
    voices: VoiceRegistry,
    voice_queue: EventQueue<GateEvent>,
    chain: Arc<Mutex<ModuleChain>>,
    state: Arc<SharedState>,
    clock: SampleClock,
    voice_buffer: Vec<f32>,
    /// Last mod wheel value forwarded to the chain
    mod_value: f32,
    contended_cycles: u64,
}

impl Renderer {
    pub fn new(
        oscillator: Oscillator,
        voices: VoiceRegistry,
        voice_queue: EventQueue<GateEvent>,
        chain: Arc<Mutex<ModuleChain>>,
        state: Arc<SharedState>,
    ) -> Self {
        let mod_value = state.mod_value();
        Self {
            oscillator,
            voices,
            voice_queue,
            chain,
            state,
            clock: SampleClock::new(),
            voice_buffer: vec![0.0; MAX_BLOCK_SIZE],
            mod_value,
            contended_cycles: 0,
        }
    }

    /// Fill `out` with the next block of mixed audio
    pub fn render(&mut self, out: &mut [f32]) {
        if self.state.is_shutdown() {
            out.fill(0.0);
            return;
        }

        // Voice updates land before this cycle is rendered
        while let Some(event) = self.voice_queue.try_pop() {
            self.voices.apply(&event);
        }

        for block in out.chunks_mut(MAX_BLOCK_SIZE) {
            self.render_block(block);
        }
    }

    fn render_block(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let frames = out.len();

        match self.chain.try_lock() {
            Some(mut chain) => {
                let mod_value = self.state.mod_value();
                if mod_value != self.mod_value {
                    chain.broadcast_modulation(mod_value);
                    self.mod_value = mod_value;
                }

                let bend = self.state.pitch_bend();
                let master = self.state.master_volume();
                let time_index = self.clock.index();
                let buffer = &mut self.voice_buffer[..frames];

                for voice in self.voices.iter() {
                    self.oscillator
                        .fill(voice.waveform, voice.note, bend, time_index, buffer);
                    chain.apply(voice.note, buffer);

                    let amplitude = voice.amplitude(master);
                    for (mixed, sample) in out.iter_mut().zip(buffer.iter()) {
                        *mixed += sample * amplitude;
                    }
                }
            }
            None => self.contended_cycles += 1,
        }

        self.clock.advance(frames);
    }

    pub fn voices(&self) -> &VoiceRegistry {
        &self.voices
    }

    /// Absolute index of the next sample to render
    pub fn time_index(&self) -> u64 {
        self.clock.index()
    }

    /// Blocks rendered as silence because control held the chain
    pub fn contended_cycles(&self) -> u64 {
        self.contended_cycles
    }
}
