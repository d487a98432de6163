//! Real-time audio playback using cpal

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, SampleRate, Stream, StreamConfig};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use super::Renderer;
use crate::config::AudioConfig;
use crate::error::{Error, Result};
use crate::MAX_BLOCK_SIZE;

/// Real-time audio player
pub struct Player {
    stream: Option<Stream>,
    running: Arc<AtomicBool>,
}

impl Player {
    pub fn new() -> Self {
        Self {
            stream: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the output stream; the renderer moves into the audio callback
    pub fn start(&mut self, renderer: Renderer, audio: &AudioConfig) -> Result<()> {
        let device = select_device(audio.device.as_deref())?;
        let supported = device.default_output_config().map_err(audio_error)?;
        let sample_format = supported.sample_format();

        let stream_config = StreamConfig {
            channels: supported.channels(),
            sample_rate: SampleRate(audio.sample_rate),
            buffer_size: BufferSize::Fixed(audio.buffer_size as u32),
        };

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, renderer, running)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, renderer, running)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, renderer, running)?,
            other => return Err(Error::Audio(format!("unsupported sample format {:?}", other))),
        };

        stream.play().map_err(audio_error)?;
        self.stream = Some(stream);

        info!(
            "Audio output on '{}' at {} Hz, {} frames per cycle",
            device.name().unwrap_or_default(),
            audio.sample_rate,
            audio.buffer_size
        );

        Ok(())
    }

    /// Stop playback
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.stream = None;
    }

    /// Check if currently playing
    pub fn is_playing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

fn audio_error<E: std::fmt::Display>(e: E) -> Error {
    Error::Audio(e.to_string())
}

/// Output device by name fragment, or the host default
fn select_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    match name {
        None => host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string())),
        Some(wanted) => host
            .output_devices()
            .map_err(audio_error)?
            .find(|d| d.name().map(|n| n.contains(wanted)).unwrap_or(false))
            .ok_or_else(|| Error::Audio(format!("output device '{}' not found", wanted))),
    }
}

fn build_stream<T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    mut renderer: Renderer,
    running: Arc<AtomicBool>,
) -> Result<Stream> {
    let channels = config.channels as usize;
    let mut mono = vec![0.0f32; MAX_BLOCK_SIZE];

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if !running.load(Ordering::SeqCst) {
                    // Fill with silence when stopped
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(0.0f32);
                    }
                    return;
                }

                let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
                    for block in data.chunks_mut(channels * MAX_BLOCK_SIZE) {
                        let mono = &mut mono[..block.len() / channels];
                        renderer.render(mono);

                        for (frame, &sample) in block.chunks_mut(channels).zip(mono.iter()) {
                            for channel_sample in frame.iter_mut() {
                                *channel_sample = T::from_sample(sample);
                            }
                        }
                    }
                }));

                if rendered.is_err() {
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(0.0f32);
                    }
                }
            },
            |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(audio_error)?;

    Ok(stream)
}

/// Get the default output device name
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}

/// List all available output devices
pub fn list_output_devices() -> Vec<(String, StreamConfig)> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let (Ok(name), Ok(config)) = (device.name(), device.default_output_config()) {
                devices.push((name, config.into()));
            }
        }
    }

    devices
}
