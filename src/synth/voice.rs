//! Voice registry and note lifecycle
//!
//! One slot per note number. A note-on fills (or overwrites) the slot, the
//! matching note-off empties it, so a key can never sound twice.

use super::Waveform;

/// Gate direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    On,
    Off,
}

/// Note lifecycle message handed from capture to control to render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateEvent {
    pub status: GateStatus,
    pub note: u8,
    pub waveform: Waveform,
    /// Raw velocity-like intensity (0-127)
    pub impact: u8,
}

impl GateEvent {
    pub fn on(note: u8, waveform: Waveform, impact: u8) -> Self {
        Self {
            status: GateStatus::On,
            note: note & 0x7F,
            waveform,
            impact,
        }
    }

    pub fn off(note: u8, waveform: Waveform) -> Self {
        Self {
            status: GateStatus::Off,
            note: note & 0x7F,
            waveform,
            impact: 0,
        }
    }
}

/// How a triggering event's impact becomes an amplitude factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactScaling {
    /// Scale by impact; otherwise use `fixed`
    pub enabled: bool,
    /// Divisor applied to the raw impact
    pub weight: f32,
    /// Factor used when impact is disabled
    pub fixed: f32,
}

impl ImpactScaling {
    pub fn factor(&self, impact: u8) -> f32 {
        if self.enabled {
            impact as f32 / self.weight
        } else {
            self.fixed
        }
    }
}

impl Default for ImpactScaling {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 20000.0,
            fixed: 0.002,
        }
    }
}

/// An actively sounding note
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    pub note: u8,
    pub waveform: Waveform,
    /// Impact factor captured at note-on
    pub impact: f32,
}

impl Voice {
    /// Amplitude at the given master volume
    pub fn amplitude(&self, master_volume: f32) -> f32 {
        master_volume * self.impact
    }
}

/// Note state for a key
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteState {
    Idle,
    Sounding(Voice),
}

/// Currently sounding notes, keyed by note number
pub struct VoiceRegistry {
    slots: [Option<Voice>; 128],
    scaling: ImpactScaling,
}

impl VoiceRegistry {
    pub fn new(scaling: ImpactScaling) -> Self {
        Self {
            slots: [None; 128],
            scaling,
        }
    }

    /// Apply a gate event to the note state machine
    pub fn apply(&mut self, event: &GateEvent) {
        let slot = &mut self.slots[event.note as usize & 0x7F];
        match event.status {
            // Retrigger overwrites rather than layering
            GateStatus::On => {
                *slot = Some(Voice {
                    note: event.note,
                    waveform: event.waveform,
                    impact: self.scaling.factor(event.impact),
                });
            }
            GateStatus::Off => *slot = None,
        }
    }

    pub fn state(&self, note: u8) -> NoteState {
        match self.slots[note as usize & 0x7F] {
            Some(voice) => NoteState::Sounding(voice),
            None => NoteState::Idle,
        }
    }

    /// Sounding voices in note order
    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Silence every voice
    pub fn clear(&mut self) {
        self.slots = [None; 128];
    }
}

impl Default for VoiceRegistry {
    fn default() -> Self {
        Self::new(ImpactScaling::default())
    }
}
