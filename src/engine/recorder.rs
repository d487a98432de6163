//! Offline rendering to WAV

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use super::Renderer;

/// Writes rendered cycles to a mono 32-bit float WAV file
pub struct Recorder {
    writer: WavWriter<BufWriter<File>>,
    sample_rate: u32,
    frames_written: u64,
    block: Vec<f32>,
}

impl Recorder {
    /// Create a recorder rendering `block_size` frames per cycle
    pub fn new(path: &Path, sample_rate: u32, block_size: usize) -> Result<Self> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };

        let writer = WavWriter::create(path, spec)
            .with_context(|| format!("failed to create WAV file: {:?}", path))?;

        Ok(Self {
            writer,
            sample_rate,
            frames_written: 0,
            block: vec![0.0; block_size.max(1)],
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames_written as f64 / self.sample_rate as f64
    }

    /// Render `frames` frames in cycles and append them to the file
    pub fn capture(&mut self, renderer: &mut Renderer, frames: usize) -> Result<()> {
        let mut remaining = frames;
        while remaining > 0 {
            let n = remaining.min(self.block.len());
            let block = &mut self.block[..n];
            renderer.render(block);

            for &sample in block.iter() {
                self.writer
                    .write_sample(sample)
                    .context("failed to write sample")?;
            }
            self.frames_written += n as u64;
            remaining -= n;
        }
        Ok(())
    }

    /// Render until `secs` seconds have been recorded in total
    pub fn capture_until(&mut self, renderer: &mut Renderer, secs: f64) -> Result<()> {
        let target = (secs * self.sample_rate as f64).round() as u64;
        let frames = target.saturating_sub(self.frames_written) as usize;
        self.capture(renderer, frames)
    }

    /// Finalize the WAV file
    ///
    /// This must be called to properly close the file and write the header.
    pub fn finalize(self) -> Result<()> {
        self.writer.finalize().context("failed to finalize WAV file")
    }
}
