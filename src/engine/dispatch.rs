//! Binding dispatcher
//!
//! Classifies raw control events into note gates, preset recalls and
//! binding updates. Classification is pure: it runs on the capture thread
//! and leaves every side effect to the control stage.

use crate::config::{BindingConfig, MidiConfig};
use crate::error::Result;
use crate::synth::{split_binding_name, GateEvent, Waveform};
use std::sync::Arc;

/// Raw event as delivered by the note/control source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEvent {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
    /// Seconds since the previous event
    pub delta_time: f64,
}

impl RawEvent {
    pub fn new(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            status,
            data1,
            data2,
            delta_time: 0.0,
        }
    }

    /// Parse message bytes; missing data bytes read as zero
    pub fn from_bytes(bytes: &[u8], delta_time: f64) -> Option<Self> {
        let status = *bytes.first()?;
        Some(Self {
            status,
            data1: bytes.get(1).copied().unwrap_or(0) & 0x7F,
            data2: bytes.get(2).copied().unwrap_or(0) & 0x7F,
            delta_time,
        })
    }
}

/// Engine parameter driven by a reserved binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedTarget {
    MasterVolume,
    PitchWheel,
    ModWheel,
}

/// What a binding drives
#[derive(Debug, Clone, PartialEq)]
pub enum BindingTarget {
    Shared(SharedTarget),
    Module { module: String, setter: String },
}

impl BindingTarget {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "master_volume" => Ok(Self::Shared(SharedTarget::MasterVolume)),
            "pitch_wheel" => Ok(Self::Shared(SharedTarget::PitchWheel)),
            "mod_wheel" => Ok(Self::Shared(SharedTarget::ModWheel)),
            _ => {
                let (module, setter) = split_binding_name(name)?;
                Ok(Self::Module {
                    module: module.to_string(),
                    setter: setter.to_string(),
                })
            }
        }
    }
}

/// A binding matched against control events
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub target: BindingTarget,
    /// First of four consecutive status bytes
    pub status: u8,
    pub data: u8,
}

impl Binding {
    pub fn from_config(config: &BindingConfig) -> Result<Self> {
        Ok(Self {
            target: BindingTarget::parse(config.name())?,
            status: config.status(),
            data: config.data(),
        })
    }

    pub fn matches(&self, event: &RawEvent) -> bool {
        in_range(event.status, self.status) && event.data1 == self.data
    }
}

/// `status` falls within the four waveform sub-channels starting at `base`
fn in_range(status: u8, base: u8) -> bool {
    status >= base && status <= base.saturating_add(3)
}

/// Classified event, queued from capture to control
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    Gate(GateEvent),
    /// Binding at this table index fired with a control value
    Binding { index: usize, value: u8 },
    RecallPreset(u8),
}

/// Routes raw events by status and binding table
#[derive(Debug, Clone)]
pub struct BindingDispatcher {
    note_on: u8,
    note_off: u8,
    preset_recall: u8,
    bindings: Arc<[Binding]>,
}

impl BindingDispatcher {
    pub fn new(midi: &MidiConfig, bindings: &[BindingConfig]) -> Result<Self> {
        let bindings = bindings
            .iter()
            .map(Binding::from_config)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            note_on: midi.note_on,
            note_off: midi.note_off,
            preset_recall: midi.preset_recall,
            bindings: bindings.into(),
        })
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn binding(&self, index: usize) -> Option<&Binding> {
        self.bindings.get(index)
    }

    /// Classify an event; `None` means it matched nothing and is dropped
    pub fn classify(&self, event: &RawEvent) -> Option<ControlEvent> {
        if event.status == self.preset_recall {
            return Some(ControlEvent::RecallPreset(event.data1));
        }

        if in_range(event.status, self.note_on) {
            let waveform = Waveform::from_offset(event.status - self.note_on)?;
            let gate = if event.data2 == 0 {
                GateEvent::off(event.data1, waveform)
            } else {
                GateEvent::on(event.data1, waveform, event.data2)
            };
            return Some(ControlEvent::Gate(gate));
        }

        if in_range(event.status, self.note_off) {
            let waveform = Waveform::from_offset(event.status - self.note_off)?;
            return Some(ControlEvent::Gate(GateEvent::off(event.data1, waveform)));
        }

        // First match wins
        self.bindings
            .iter()
            .position(|binding| binding.matches(event))
            .map(|index| ControlEvent::Binding {
                index,
                value: event.data2,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::synth::GateStatus;

    fn dispatcher(bindings: &[BindingConfig]) -> BindingDispatcher {
        BindingDispatcher::new(&MidiConfig::default(), bindings).unwrap()
    }

    #[test]
    fn test_note_on_waveforms() {
        let d = dispatcher(&[]);
        for (offset, waveform) in Waveform::ALL.iter().enumerate() {
            let event = RawEvent::new(144 + offset as u8, 69, 100);
            assert_eq!(
                d.classify(&event),
                Some(ControlEvent::Gate(GateEvent::on(69, *waveform, 100)))
            );
        }
    }

    #[test]
    fn test_note_off_range() {
        let d = dispatcher(&[]);
        match d.classify(&RawEvent::new(130, 60, 0)) {
            Some(ControlEvent::Gate(gate)) => {
                assert_eq!(gate.status, GateStatus::Off);
                assert_eq!(gate.note, 60);
                assert_eq!(gate.waveform, Waveform::Square);
            }
            other => panic!("expected gate, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_velocity_note_on_is_off() {
        let d = dispatcher(&[]);
        match d.classify(&RawEvent::new(144, 60, 0)) {
            Some(ControlEvent::Gate(gate)) => assert_eq!(gate.status, GateStatus::Off),
            other => panic!("expected gate, got {:?}", other),
        }
    }

    #[test]
    fn test_preset_recall() {
        let d = dispatcher(&[]);
        assert_eq!(d.classify(&RawEvent::new(192, 3, 0)), Some(ControlEvent::RecallPreset(3)));
    }

    #[test]
    fn test_binding_match_range() {
        let d = dispatcher(&[BindingConfig::new("master_volume", 176, 7)]);

        // Any of the four sub-channels
        for status in 176..=179 {
            assert_eq!(
                d.classify(&RawEvent::new(status, 7, 90)),
                Some(ControlEvent::Binding { index: 0, value: 90 })
            );
        }
        assert_eq!(d.classify(&RawEvent::new(180, 7, 90)), None);
        assert_eq!(d.classify(&RawEvent::new(176, 8, 90)), None);
    }

    #[test]
    fn test_first_match_wins() {
        let d = dispatcher(&[
            BindingConfig::new("envelope.set_attack", 176, 20),
            BindingConfig::new("master_volume", 177, 20),
            BindingConfig::new("reverberation.set_reverb", 176, 20),
        ]);

        // Status 177 matches all three ranges
        assert_eq!(
            d.classify(&RawEvent::new(177, 20, 5)),
            Some(ControlEvent::Binding { index: 0, value: 5 })
        );
    }

    #[test]
    fn test_unmatched_dropped() {
        let d = dispatcher(&[BindingConfig::new("mod_wheel", 176, 1)]);
        assert_eq!(d.classify(&RawEvent::new(176, 64, 127)), None);
        assert_eq!(d.classify(&RawEvent::new(250, 0, 0)), None);
    }

    #[test]
    fn test_binding_targets() {
        assert_eq!(
            BindingTarget::parse("pitch_wheel").unwrap(),
            BindingTarget::Shared(SharedTarget::PitchWheel)
        );
        assert_eq!(
            BindingTarget::parse("band_pass.set_low_pass").unwrap(),
            BindingTarget::Module {
                module: "band_pass".to_string(),
                setter: "set_low_pass".to_string(),
            }
        );
        assert!(matches!(BindingTarget::parse("volume"), Err(Error::InvalidBinding(_))));
    }

    #[test]
    fn test_raw_event_from_bytes() {
        let event = RawEvent::from_bytes(&[0x90, 60, 100], 0.5).unwrap();
        assert_eq!(event.status, 0x90);
        assert_eq!(event.data1, 60);
        assert_eq!(event.data2, 100);
        assert_eq!(event.delta_time, 0.5);

        let short = RawEvent::from_bytes(&[0xC0, 4], 0.0).unwrap();
        assert_eq!(short.data2, 0);
        assert!(RawEvent::from_bytes(&[], 0.0).is_none());
    }
}
