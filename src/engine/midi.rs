//! MIDI capture
//!
//! Receives raw events on the MIDI driver's thread, classifies them and
//! hands them to control. Nothing here blocks or touches engine state.

use midir::{Ignore, MidiInput, MidiInputConnection};
use tracing::{debug, info};

use super::dispatch::{BindingDispatcher, ControlEvent, RawEvent};
use super::queue::EventQueue;
use super::state::SharedState;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Per-event capture logic, independent of the MIDI backend
pub struct CaptureHandler {
    dispatcher: BindingDispatcher,
    gate_queue: EventQueue<ControlEvent>,
    state: Arc<SharedState>,
    port_name: String,
    /// Seconds since the first event
    wallclock: f64,
    last_timestamp: Option<u64>,
}

impl CaptureHandler {
    pub fn new(
        dispatcher: BindingDispatcher,
        gate_queue: EventQueue<ControlEvent>,
        state: Arc<SharedState>,
    ) -> Self {
        Self {
            dispatcher,
            gate_queue,
            state,
            port_name: String::new(),
            wallclock: 0.0,
            last_timestamp: None,
        }
    }

    /// Classify one event and queue it for control
    pub fn handle(&mut self, event: RawEvent) {
        if self.state.is_shutdown() {
            return;
        }

        self.wallclock += event.delta_time;
        debug!(
            "[{}] @{:.6} {:?}",
            self.port_name,
            self.wallclock,
            [event.status, event.data1, event.data2]
        );

        if let Some(classified) = self.dispatcher.classify(&event) {
            self.gate_queue.push(classified);
        }
    }

    /// Backend entry point: timestamps are in microseconds
    fn on_message(&mut self, timestamp_us: u64, bytes: &[u8]) {
        let delta_time = match self.last_timestamp {
            Some(last) => timestamp_us.saturating_sub(last) as f64 / 1_000_000.0,
            None => 0.0,
        };
        self.last_timestamp = Some(timestamp_us);

        if let Some(event) = RawEvent::from_bytes(bytes, delta_time) {
            self.handle(event);
        }
    }

    pub fn wallclock(&self) -> f64 {
        self.wallclock
    }
}

/// Open connection to a MIDI input port
pub struct MidiCapture {
    connection: MidiInputConnection<()>,
    port_name: String,
}

impl MidiCapture {
    /// Connect to `port` (index or name fragment; None = first port)
    pub fn open(port: Option<&str>, mut handler: CaptureHandler) -> Result<Self> {
        let mut midi_in = MidiInput::new("patchsynth input").map_err(|e| Error::Midi(e.to_string()))?;
        midi_in.ignore(Ignore::Sysex | Ignore::Time);

        let ports = midi_in.ports();
        if ports.is_empty() {
            return Err(Error::Midi("no MIDI input ports available".to_string()));
        }

        let selected = match port {
            None => ports.first(),
            Some(wanted) => match wanted.parse::<usize>() {
                Ok(index) => ports.get(index),
                Err(_) => ports.iter().find(|p| {
                    midi_in
                        .port_name(p)
                        .map(|name| name.contains(wanted))
                        .unwrap_or(false)
                }),
            },
        }
        .cloned()
        .ok_or_else(|| Error::Midi(format!("MIDI port '{}' not found", port.unwrap_or_default())))?;

        let port_name = midi_in
            .port_name(&selected)
            .map_err(|e| Error::Midi(e.to_string()))?;
        handler.port_name = port_name.clone();

        let connection = midi_in
            .connect(
                &selected,
                "patchsynth-capture",
                move |timestamp, bytes, _| handler.on_message(timestamp, bytes),
                (),
            )
            .map_err(|e| Error::Midi(e.to_string()))?;

        info!("MIDI input connected to: {}", port_name);

        Ok(Self {
            connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Stop receiving events
    pub fn close(self) {
        self.connection.close();
        info!("MIDI input closed: {}", self.port_name);
    }
}

/// List available MIDI input ports
pub fn list_input_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new("patchsynth list").map_err(|e| Error::Midi(e.to_string()))?;

    let names = midi_in
        .ports()
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect();

    Ok(names)
}
