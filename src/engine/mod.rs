//! Audio engine
//!
//! Wires the three stages together. Capture classifies events on the MIDI
//! thread, control applies them and owns every parameter write, render
//! produces audio in the output callback. Stages talk only through the
//! hand-off queues, the shared state and the locked module chain.

mod control;
mod dispatch;
mod midi;
mod player;
mod queue;
mod recorder;
mod render;
mod state;

pub use control::Controller;
pub use dispatch::{Binding, BindingDispatcher, BindingTarget, ControlEvent, RawEvent, SharedTarget};
pub use midi::{list_input_ports, CaptureHandler, MidiCapture};
pub use player::{default_device_name, list_output_devices, Player};
pub use queue::EventQueue;
pub use recorder::Recorder;
pub use render::Renderer;
pub use state::SharedState;

use crate::config::{PresetBank, SynthConfig};
use crate::error::Result;
use crate::synth::{GateEvent, ModuleChain, ModuleRegistry, Oscillator, ParamValue, VoiceRegistry};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// The assembled synth session
pub struct Engine {
    config: SynthConfig,
    dispatcher: BindingDispatcher,
    chain: Arc<Mutex<ModuleChain>>,
    state: Arc<SharedState>,
    gate_queue: EventQueue<ControlEvent>,
    voice_queue: EventQueue<GateEvent>,
}

impl Engine {
    /// Build the chain from the registry and restore saved module state
    pub fn new(config: SynthConfig, registry: &ModuleRegistry) -> Result<Self> {
        let chain = registry.build_chain(&config.modules, config.audio.sample_rate as f64)?;
        Self::with_chain(config, chain)
    }

    /// Use a prebuilt chain
    pub fn with_chain(config: SynthConfig, mut chain: ModuleChain) -> Result<Self> {
        let dispatcher = BindingDispatcher::new(&config.midi, &config.bindings)?;

        let failures = chain.apply_state(&config.module_data);
        if !failures.is_empty() {
            warn!("{} saved parameter(s) could not be restored", failures.len());
        }

        info!(
            "Loaded modules: {}",
            chain.names().collect::<Vec<_>>().join(", ")
        );

        let capacity = config.engine.queue_capacity;
        Ok(Self {
            state: Arc::new(SharedState::new(config.master.volume)),
            dispatcher,
            chain: Arc::new(Mutex::new(chain)),
            gate_queue: EventQueue::new(capacity),
            voice_queue: EventQueue::new(capacity),
            config,
        })
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.audio.sample_rate as f64
    }

    pub fn dispatcher(&self) -> &BindingDispatcher {
        &self.dispatcher
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn chain(&self) -> &Arc<Mutex<ModuleChain>> {
        &self.chain
    }

    /// Capture stage handler, to be moved onto the MIDI thread
    pub fn capture_handler(&self) -> CaptureHandler {
        CaptureHandler::new(
            self.dispatcher.clone(),
            self.gate_queue.clone(),
            Arc::clone(&self.state),
        )
    }

    pub fn controller(&self) -> Controller {
        Controller::new(
            self.dispatcher.clone(),
            self.gate_queue.clone(),
            self.voice_queue.clone(),
            Arc::clone(&self.chain),
            Arc::clone(&self.state),
            PresetBank::new(self.config.presets.clone()),
            &self.config.engine,
        )
    }

    pub fn renderer(&self) -> Renderer {
        Renderer::new(
            Oscillator::new(self.sample_rate()),
            VoiceRegistry::new(self.config.master.impact.scaling()),
            self.voice_queue.clone(),
            Arc::clone(&self.chain),
            Arc::clone(&self.state),
        )
    }

    /// Check if the session is still running
    pub fn is_running(&self) -> bool {
        !self.state.is_shutdown()
    }

    /// Ask control to end the session
    pub fn request_interrupt(&self) {
        self.state.request_interrupt();
    }

    /// Current parameter state of every module
    pub fn collect_state(&self) -> Vec<ParamValue> {
        self.chain.lock().collect_state()
    }

    /// Configuration to persist at session end
    pub fn snapshot(&self) -> SynthConfig {
        let mut config = self.config.clone();
        config.master.volume = self.state.master_volume();
        config.module_data = self.collect_state();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BindingConfig;
    use crate::error::Error;
    use crate::synth::{NoteState, SignalModule};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn engine(modules: &[&str]) -> Engine {
        let config = SynthConfig {
            modules: modules.iter().map(|m| m.to_string()).collect(),
            ..SynthConfig::default()
        };
        Engine::new(config, &ModuleRegistry::with_builtin()).unwrap()
    }

    /// Drive an event through capture and control
    fn send(engine: &Engine, controller: &mut Controller, bytes: &[u8]) {
        let mut capture = engine.capture_handler();
        capture.handle(RawEvent::from_bytes(bytes, 0.0).unwrap());
        controller.drain();
    }

    /// Fails every call
    struct Broken;

    impl SignalModule for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn process(&mut self, _note: u8, _buffer: &mut [f32]) -> Result<()> {
            Err(Error::ModuleFault {
                module: "broken".to_string(),
                reason: "test".to_string(),
            })
        }

        fn set_parameter(&mut self, setter: &str, _value: f32) -> Result<()> {
            Err(crate::synth::module::unknown_setter("broken", setter))
        }

        fn serialize(&self) -> Result<Vec<ParamValue>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_engine_creation() {
        let engine = engine(&["envelope", "band_pass", "reverberation"]);
        assert_eq!(engine.sample_rate(), 44100.0);
        assert!(engine.is_running());
        assert_eq!(engine.state().master_volume(), 50.0);
        assert_eq!(engine.chain().lock().len(), 3);
    }

    #[test]
    fn test_module_data_restored() {
        let config = SynthConfig {
            module_data: vec![
                ParamValue::new("reverberation", "set_reverb", 33.0),
                ParamValue::new("missing", "set_x", 1.0),
            ],
            ..SynthConfig::default()
        };
        let engine = Engine::new(config, &ModuleRegistry::with_builtin()).unwrap();

        assert!(engine
            .collect_state()
            .contains(&ParamValue::new("reverberation", "set_reverb", 33.0)));
    }

    #[test]
    fn test_invalid_binding_rejected() {
        let config = SynthConfig {
            bindings: vec![BindingConfig::new("volume", 176, 7)],
            ..SynthConfig::default()
        };
        assert!(matches!(
            Engine::new(config, &ModuleRegistry::with_builtin()),
            Err(Error::InvalidBinding(_))
        ));
    }

    #[test]
    fn test_sawtooth_a440_end_to_end() {
        let engine = engine(&[]);
        let mut controller = engine.controller();
        let mut renderer = engine.renderer();

        send(&engine, &mut controller, &[144, 69, 100]);

        let mut out = vec![0.0; 44100];
        renderer.render(&mut out);

        // Amplitude is master volume times impact: 50 * 100 / 20000
        let peak = out.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak - 0.25).abs() < 1e-3);

        // One ramp reset per period
        let resets = out.windows(2).filter(|w| w[1] < w[0] - 0.25).count();
        assert!((439..=441).contains(&resets), "resets = {}", resets);
    }

    #[test]
    fn test_note_off_silences_next_cycle() {
        let engine = engine(&["band_pass"]);
        let mut controller = engine.controller();
        let mut renderer = engine.renderer();

        send(&engine, &mut controller, &[146, 60, 90]);
        let mut out = vec![0.0; 1470];
        renderer.render(&mut out);
        assert!(out.iter().any(|&s| s != 0.0));

        send(&engine, &mut controller, &[130, 60, 0]);
        renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(renderer.voices().state(60), NoteState::Idle);
    }

    #[test]
    fn test_failing_module_keeps_voices() {
        let config = SynthConfig {
            modules: Vec::new(),
            ..SynthConfig::default()
        };
        let chain = ModuleChain::new().with(Broken);
        let engine = Engine::with_chain(config, chain).unwrap();
        let mut controller = engine.controller();
        let mut renderer = engine.renderer();

        send(&engine, &mut controller, &[146, 60, 100]);
        send(&engine, &mut controller, &[146, 64, 100]);

        let mut out = vec![0.0; 256];
        renderer.render(&mut out);

        // Two square voices in phase at the start: 2 * 0.25
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert_eq!(renderer.voices().len(), 2);
        assert_eq!(engine.chain().lock().module_faults("broken"), Some(2));
    }

    #[test]
    fn test_preset_recall_end_to_end() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"[["reverberation.set_reverb", 100]]"#).unwrap();

        let config = SynthConfig {
            presets: vec![file.path().to_path_buf()],
            ..SynthConfig::default()
        };
        let engine = Engine::new(config, &ModuleRegistry::with_builtin()).unwrap();
        let mut controller = engine.controller();

        send(&engine, &mut controller, &[192, 0, 0]);
        assert!(engine
            .collect_state()
            .contains(&ParamValue::new("reverberation", "set_reverb", 100.0)));
    }

    #[test]
    fn test_snapshot_carries_live_state() {
        let engine = engine(&["reverberation"]);
        let mut controller = engine.controller();

        send(&engine, &mut controller, &[176, 7, 90]);
        send(&engine, &mut controller, &[176, 91, 40]);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.master.volume, 90.0);
        assert_eq!(
            snapshot.module_data,
            vec![ParamValue::new("reverberation", "set_reverb", 40.0)]
        );
    }

    #[test]
    fn test_interrupt_stops_session() {
        let mut config = SynthConfig::default();
        config.engine.control_timeout_ms = 5;
        let engine = Engine::new(config, &ModuleRegistry::with_builtin()).unwrap();

        let handle = engine.controller().spawn().unwrap();
        engine.request_interrupt();
        handle.join().unwrap();

        assert!(!engine.is_running());
    }
}
