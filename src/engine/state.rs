//! Session-wide shared state
//!
//! Written by the control stage, read by the render stage. A render cycle
//! may see a value one cycle late; word-sized atomics are all that's needed.

use atomic_float::AtomicF32;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct SharedState {
    /// 0-127 control value
    master_volume: AtomicF32,
    /// Bend fraction applied to every voice
    pitch_bend: AtomicF32,
    /// 0-127 mod wheel value
    mod_value: AtomicF32,
    /// Set once by control; every stage unwinds when it sees it
    shutdown: AtomicBool,
    /// External stop request (Ctrl-C), observed by control
    interrupt: AtomicBool,
}

impl SharedState {
    pub fn new(master_volume: f32) -> Self {
        Self {
            master_volume: AtomicF32::new(master_volume),
            pitch_bend: AtomicF32::new(0.0),
            mod_value: AtomicF32::new(0.0),
            shutdown: AtomicBool::new(false),
            interrupt: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn master_volume(&self) -> f32 {
        self.master_volume.load(Ordering::Relaxed)
    }

    pub fn set_master_volume(&self, value: f32) {
        self.master_volume.store(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn pitch_bend(&self) -> f32 {
        self.pitch_bend.load(Ordering::Relaxed)
    }

    pub fn set_pitch_bend(&self, bend: f32) {
        self.pitch_bend.store(bend, Ordering::Relaxed);
    }

    #[inline]
    pub fn mod_value(&self) -> f32 {
        self.mod_value.load(Ordering::Relaxed)
    }

    pub fn set_mod_value(&self, value: f32) {
        self.mod_value.store(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Acquire)
    }

    pub fn request_interrupt(&self) {
        self.interrupt.store(true, Ordering::Release);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(50.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SharedState::new(64.0);
        assert_eq!(state.master_volume(), 64.0);
        assert_eq!(state.pitch_bend(), 0.0);
        assert_eq!(state.mod_value(), 0.0);
        assert!(!state.is_shutdown());
        assert!(!state.is_interrupted());
    }

    #[test]
    fn test_flags_latch() {
        let state = SharedState::default();
        state.request_interrupt();
        state.signal_shutdown();
        assert!(state.is_interrupted());
        assert!(state.is_shutdown());
    }

    #[test]
    fn test_scalars() {
        let state = SharedState::default();
        state.set_master_volume(100.0);
        state.set_pitch_bend(-0.25);
        state.set_mod_value(12.0);
        assert_eq!(state.master_volume(), 100.0);
        assert_eq!(state.pitch_bend(), -0.25);
        assert_eq!(state.mod_value(), 12.0);
    }
}
