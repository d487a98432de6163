//! CLI interface for Patchsynth

use clap::{Parser, Subcommand};
use patchsynth::synth::Waveform;
use std::path::PathBuf;

/// Real-time polyphonic MIDI synthesizer
#[derive(Parser)]
#[command(name = "patchsynth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play live from a MIDI input port
    Play {
        /// Settings file path
        #[arg(short, long, default_value = "settings.yaml")]
        config: PathBuf,

        /// MIDI input port (index or name fragment)
        #[arg(short, long)]
        port: Option<String>,

        /// Impact weight: velocity is divided by this
        #[arg(short, long)]
        weight: Option<f32>,

        /// Ignore velocity and play every note at a fixed level
        #[arg(long)]
        no_impact: bool,

        /// Log every incoming event
        #[arg(short, long)]
        verbose: bool,
    },

    /// Render held notes offline to a WAV file
    Record {
        /// Settings file path
        #[arg(short, long, default_value = "settings.yaml")]
        config: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: f64,

        /// Note numbers to hold for the whole recording
        #[arg(short, long, value_delimiter = ',', default_value = "69")]
        notes: Vec<u8>,

        /// Oscillator waveform
        #[arg(long, default_value = "sawtooth")]
        waveform: Waveform,

        /// Velocity for every note
        #[arg(long, default_value = "100")]
        velocity: u8,
    },

    /// List audio outputs and MIDI inputs
    Devices,

    /// Validate a settings file
    Check {
        /// Settings file path
        #[arg(short, long, default_value = "settings.yaml")]
        config: PathBuf,
    },

    /// Generate an example settings file
    Init,
}
