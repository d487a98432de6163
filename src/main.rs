//! Patchsynth - Real-time polyphonic MIDI synthesizer

use anyhow::{Context, Result};
use clap::Parser;
use patchsynth::config;
use patchsynth::engine::{
    default_device_name, list_input_ports, list_output_devices, Engine, MidiCapture, Player, RawEvent, Recorder,
};
use patchsynth::synth::ModuleRegistry;
use std::sync::Arc;
use tracing::{error, info, Level};

mod cli;

use cli::{Cli, Commands};

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let registry = ModuleRegistry::with_builtin();

    match cli.command {
        Commands::Play {
            config: config_path,
            port,
            weight,
            no_impact,
            verbose,
        } => {
            init_logging(verbose);

            let mut cfg = config::load_or_default(&config_path, &registry)?;
            if port.is_some() {
                cfg.midi.port = port;
            }
            if let Some(weight) = weight {
                cfg.master.impact.weight = weight;
            }
            if no_impact {
                cfg.master.impact.enabled = false;
            }
            cfg.validate(&registry)?;

            info!("Starting Patchsynth...");
            info!("  Sample rate: {} Hz", cfg.audio.sample_rate);
            info!("  Master volume: {}", cfg.master.volume);

            let engine = Engine::new(cfg, &registry)?;

            let state = Arc::clone(engine.state());
            ctrlc::set_handler(move || state.request_interrupt())
                .context("failed to install Ctrl-C handler")?;

            let mut player = Player::new();
            player
                .start(engine.renderer(), &engine.config().audio)
                .context("failed to open audio output")?;

            let capture = MidiCapture::open(engine.config().midi.port.as_deref(), engine.capture_handler())
                .context("failed to open MIDI input")?;

            let control = engine.controller().spawn()?;
            info!("Playing from '{}'. Press Ctrl-C to stop.", capture.port_name());

            if control.join().is_err() {
                error!("Control stage panicked");
            }

            capture.close();
            player.stop();

            config::save_config(&config_path, &engine.snapshot())?;
            info!("Settings saved to {:?}", config_path);
        }

        Commands::Record {
            config: config_path,
            output,
            duration,
            notes,
            waveform,
            velocity,
        } => {
            init_logging(false);

            let cfg = config::load_or_default(&config_path, &registry)?;
            let engine = Engine::new(cfg, &registry)?;
            let audio = engine.config().audio.clone();

            info!("Recording {}s of {:?} ({}) to {:?}...", duration, notes, waveform, output);

            // Hold every note from the first sample
            let mut capture = engine.capture_handler();
            let status = engine.config().midi.note_on + waveform.offset();
            for &note in &notes {
                capture.handle(RawEvent::new(status, note, velocity));
            }
            engine.controller().drain();

            let mut renderer = engine.renderer();
            let mut recorder = Recorder::new(&output, audio.sample_rate, audio.buffer_size)?;

            let mut second = 0.0;
            while second < duration {
                second = (second + 1.0).min(duration);
                recorder.capture_until(&mut renderer, second)?;
                print!("\r  Progress: {:.0}s / {:.0}s", second, duration);
                use std::io::Write;
                std::io::stdout().flush()?;
            }

            recorder.finalize()?;
            println!("\nRecorded to {:?}", output);
        }

        Commands::Devices => {
            println!("Audio outputs:");
            if let Some(name) = default_device_name() {
                println!("  Default: {}", name);
            }
            for (name, config) in list_output_devices() {
                println!("  - {} ({} Hz, {} ch)", name, config.sample_rate.0, config.channels);
            }

            println!("\nMIDI inputs:");
            match list_input_ports() {
                Ok(ports) if ports.is_empty() => println!("  (none)"),
                Ok(ports) => {
                    for (index, name) in ports.iter().enumerate() {
                        println!("  {}: {}", index, name);
                    }
                }
                Err(e) => println!("  Error listing ports: {}", e),
            }
        }

        Commands::Check { config: config_path } => {
            println!("Checking settings at {:?}...", config_path);

            match config::load_config(&config_path, &registry) {
                Ok(cfg) => {
                    println!("Settings are valid!");
                    println!("  Sample rate: {} Hz", cfg.audio.sample_rate);
                    println!("  Buffer size: {}", cfg.audio.buffer_size);
                    println!("  Master volume: {}", cfg.master.volume);
                    if cfg.master.impact.enabled {
                        println!("  Impact weight: {}", cfg.master.impact.weight);
                    } else {
                        println!("  Impact: fixed at {}", cfg.master.impact.fixed);
                    }
                    println!("  Modules: {}", cfg.modules.join(" -> "));
                    println!("  Bindings: {}", cfg.bindings.len());
                    for binding in &cfg.bindings {
                        println!("    - {} <- {} / {}", binding.name(), binding.status(), binding.data());
                    }
                    println!("  Saved parameters: {}", cfg.module_data.len());
                    println!("  Presets: {}", cfg.presets.len());
                }
                Err(e) => {
                    println!("Settings are invalid: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Init => {
            let example_config = include_str!("../patchsynth.example.yaml");

            let path = "settings.yaml";
            if std::path::Path::new(path).exists() {
                println!("settings.yaml already exists. Not overwriting.");
            } else {
                std::fs::write(path, example_config)?;
                println!("Created settings.yaml with example configuration.");
            }
        }
    }

    Ok(())
}
