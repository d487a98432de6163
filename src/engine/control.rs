//! Control stage
//!
//! Sole writer of shared state and module parameters. Pulls classified
//! events from the capture queue, performs their effects, forwards gate
//! events to render, and decides when the session ends.

use super::dispatch::{BindingDispatcher, BindingTarget, ControlEvent, SharedTarget};
use super::queue::EventQueue;
use super::state::SharedState;
use crate::config::{EngineConfig, PresetBank};
use crate::synth::{pitch_bend_from_control, GateEvent, ModuleChain};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Controller {
    dispatcher: BindingDispatcher,
    gate_queue: EventQueue<ControlEvent>,
    voice_queue: EventQueue<GateEvent>,
    chain: Arc<Mutex<ModuleChain>>,
    state: Arc<SharedState>,
    presets: PresetBank,
    timeout: Duration,
    idle_shutdown: Option<u32>,
    reported_faults: u64,
    reported_gate_drops: u64,
    reported_voice_drops: u64,
}

impl Controller {
    pub fn new(
        dispatcher: BindingDispatcher,
        gate_queue: EventQueue<ControlEvent>,
        voice_queue: EventQueue<GateEvent>,
        chain: Arc<Mutex<ModuleChain>>,
        state: Arc<SharedState>,
        presets: PresetBank,
        settings: &EngineConfig,
    ) -> Self {
        Self {
            dispatcher,
            gate_queue,
            voice_queue,
            chain,
            state,
            presets,
            timeout: Duration::from_millis(settings.control_timeout_ms),
            idle_shutdown: settings.idle_shutdown,
            reported_faults: 0,
            reported_gate_drops: 0,
            reported_voice_drops: 0,
        }
    }

    /// Perform the effect of one classified event
    pub fn handle(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Gate(gate) => {
                self.chain.lock().broadcast_gate(&gate);
                self.voice_queue.push(gate);
            }
            ControlEvent::Binding { index, value } => self.apply_binding(index, value),
            ControlEvent::RecallPreset(number) => self.recall_preset(number as usize),
        }
    }

    fn apply_binding(&mut self, index: usize, value: u8) {
        let Some(binding) = self.dispatcher.binding(index) else {
            return;
        };

        match &binding.target {
            BindingTarget::Shared(SharedTarget::MasterVolume) => {
                self.state.set_master_volume(value as f32);
            }
            BindingTarget::Shared(SharedTarget::PitchWheel) => {
                self.state.set_pitch_bend(pitch_bend_from_control(value));
            }
            BindingTarget::Shared(SharedTarget::ModWheel) => {
                self.state.set_mod_value(value as f32);
            }
            BindingTarget::Module { module, setter } => {
                // A binding for a module that isn't loaded is not an error
                if let Err(e) = self.chain.lock().set_parameter(module, setter, value as f32) {
                    debug!("Ignoring {}.{} = {}: {}", module, setter, value, e);
                }
            }
        }
    }

    fn recall_preset(&mut self, index: usize) {
        match self.presets.load(index) {
            Ok(params) => {
                let failures = self.chain.lock().apply_state(&params);
                info!(
                    "Recalled preset {} ({} applied, {} failed)",
                    index,
                    params.len() - failures.len(),
                    failures.len()
                );
            }
            Err(e) => warn!("Preset {} not recalled: {}", index, e),
        }
    }

    /// Handle everything already queued without waiting
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.gate_queue.try_pop() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Process events until shutdown
    pub fn run(mut self) {
        info!("Control stage started");
        let mut idle = 0u32;

        while !self.state.is_shutdown() {
            if self.state.is_interrupted() {
                info!("Interrupt received, shutting down");
                self.state.signal_shutdown();
                break;
            }

            match self.gate_queue.pop_timeout(self.timeout) {
                Some(event) => {
                    idle = 0;
                    self.handle(event);
                }
                None => {
                    idle = idle.saturating_add(1);
                    self.report_diagnostics();

                    if self.idle_shutdown.is_some_and(|limit| idle >= limit) {
                        info!("No events for {} timeouts, shutting down", idle);
                        self.state.signal_shutdown();
                    }
                }
            }
        }

        self.report_diagnostics();
        info!("Control stage stopped");
    }

    /// Run on a dedicated thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("control".to_string())
            .spawn(move || self.run())
    }

    /// Log module faults and queue overflows seen since the last report
    fn report_diagnostics(&mut self) {
        let faults = self.chain.lock().fault_count();
        if faults > self.reported_faults {
            warn!("{} module fault(s) since last report", faults - self.reported_faults);
            self.reported_faults = faults;
        }

        let gate_drops = self.gate_queue.dropped();
        if gate_drops > self.reported_gate_drops {
            warn!("Dropped {} control event(s): queue full", gate_drops - self.reported_gate_drops);
            self.reported_gate_drops = gate_drops;
        }

        let voice_drops = self.voice_queue.dropped();
        if voice_drops > self.reported_voice_drops {
            warn!("Dropped {} gate event(s): queue full", voice_drops - self.reported_voice_drops);
            self.reported_voice_drops = voice_drops;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BindingConfig, MidiConfig};
    use crate::engine::dispatch::RawEvent;
    use crate::synth::{Envelope, GateStatus, Reverberation, Waveform};
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct Harness {
        controller: Controller,
        gate_queue: EventQueue<ControlEvent>,
        voice_queue: EventQueue<GateEvent>,
        chain: Arc<Mutex<ModuleChain>>,
        state: Arc<SharedState>,
        dispatcher: BindingDispatcher,
    }

    fn harness(bindings: &[BindingConfig], presets: PresetBank, settings: EngineConfig) -> Harness {
        let dispatcher = BindingDispatcher::new(&MidiConfig::default(), bindings).unwrap();
        let gate_queue = EventQueue::new(16);
        let voice_queue = EventQueue::new(16);
        let chain = Arc::new(Mutex::new(
            ModuleChain::new()
                .with(Envelope::new(44100.0))
                .with(Reverberation::new()),
        ));
        let state = Arc::new(SharedState::default());

        let controller = Controller::new(
            dispatcher.clone(),
            gate_queue.clone(),
            voice_queue.clone(),
            Arc::clone(&chain),
            Arc::clone(&state),
            presets,
            &settings,
        );

        Harness {
            controller,
            gate_queue,
            voice_queue,
            chain,
            state,
            dispatcher,
        }
    }

    impl Harness {
        fn send(&mut self, status: u8, data1: u8, data2: u8) {
            if let Some(event) = self.dispatcher.classify(&RawEvent::new(status, data1, data2)) {
                self.gate_queue.push(event);
            }
            self.controller.drain();
        }

        fn param(&self, binding: &str) -> Option<f32> {
            self.chain
                .lock()
                .collect_state()
                .into_iter()
                .find(|p| p.binding() == binding)
                .map(|p| p.value())
        }
    }

    #[test]
    fn test_gate_forwarded_to_render() {
        let mut h = harness(&[], PresetBank::default(), EngineConfig::default());
        h.send(145, 60, 100);

        let gate = h.voice_queue.try_pop().unwrap();
        assert_eq!(gate.status, GateStatus::On);
        assert_eq!(gate.waveform, Waveform::Triangle);
        assert_eq!(gate.impact, 100);
    }

    #[test]
    fn test_shared_bindings() {
        let mut h = harness(
            &[
                BindingConfig::new("master_volume", 176, 7),
                BindingConfig::new("pitch_wheel", 224, 0),
                BindingConfig::new("mod_wheel", 176, 1),
            ],
            PresetBank::default(),
            EngineConfig::default(),
        );

        h.send(176, 7, 100);
        h.send(224, 0, 127);
        h.send(177, 1, 64);

        assert_eq!(h.state.master_volume(), 100.0);
        assert!((h.state.pitch_bend() - 1.0).abs() < 1e-6);
        assert_eq!(h.state.mod_value(), 64.0);
    }

    #[test]
    fn test_only_first_matching_binding_applies() {
        let mut h = harness(
            &[
                BindingConfig::new("reverberation.set_reverb", 176, 20),
                BindingConfig::new("master_volume", 176, 20),
            ],
            PresetBank::default(),
            EngineConfig::default(),
        );

        h.send(176, 20, 90);
        assert_eq!(h.param("reverberation.set_reverb"), Some(90.0));
        assert_eq!(h.state.master_volume(), 50.0);
    }

    #[test]
    fn test_binding_for_missing_module_ignored() {
        let mut h = harness(
            &[BindingConfig::new("band_pass.set_low_pass", 176, 74)],
            PresetBank::default(),
            EngineConfig::default(),
        );

        h.send(176, 74, 10);
        assert_eq!(h.chain.lock().fault_count(), 0);
        assert!(h.param("band_pass.set_low_pass").is_none());
    }

    #[test]
    fn test_preset_recall() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"[["reverberation.set_reverb", 77], ["envelope.set_attack", 12], ["chorus.set_depth", 5]]"#)
            .unwrap();

        let mut h = harness(
            &[],
            PresetBank::new(vec![file.path().to_path_buf()]),
            EngineConfig::default(),
        );

        h.send(192, 0, 0);
        assert_eq!(h.param("reverberation.set_reverb"), Some(77.0));
        assert_eq!(h.param("envelope.set_attack"), Some(12.0));
    }

    #[test]
    fn test_preset_out_of_range_keeps_state() {
        let mut h = harness(&[], PresetBank::default(), EngineConfig::default());
        let before = h.chain.lock().collect_state();

        h.send(192, 4, 0);
        assert_eq!(h.chain.lock().collect_state(), before);
        assert!(!h.state.is_shutdown());
    }

    #[test]
    fn test_interrupt_shuts_down() {
        let settings = EngineConfig {
            control_timeout_ms: 5,
            ..EngineConfig::default()
        };
        let h = harness(&[], PresetBank::default(), settings);
        h.state.request_interrupt();

        let handle = h.controller.spawn().unwrap();
        handle.join().unwrap();
        assert!(h.state.is_shutdown());
    }

    #[test]
    fn test_idle_shutdown() {
        let settings = EngineConfig {
            control_timeout_ms: 2,
            idle_shutdown: Some(3),
            ..EngineConfig::default()
        };
        let h = harness(&[], PresetBank::default(), settings);

        h.controller.run();
        assert!(h.state.is_shutdown());
        assert!(!h.state.is_interrupted());
    }

    #[test]
    fn test_state_survives_dropped_events() {
        let mut h = harness(
            &[BindingConfig::new("master_volume", 176, 7)],
            PresetBank::default(),
            EngineConfig::default(),
        );

        // Overflow the 16-slot queue; the newest values survive
        for value in 0..40u8 {
            h.gate_queue.push(ControlEvent::Binding { index: 0, value });
        }
        h.controller.drain();

        assert_eq!(h.gate_queue.dropped(), 24);
        assert_eq!(h.state.master_volume(), 39.0);
    }
}
