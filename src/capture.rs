use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::sync::{Arc, Mutex};

use crate::constants::audio::{FRAME_SAMPLES, INPUT_SAMPLE_RATE};

/// Microphone capture for the live conversation session
///
/// Samples are mixed down to mono in the audio callback, resampled to the
/// 16 kHz the live API expects, and handed out as fixed 4096-sample frames.
/// Whatever doesn't fill a frame yet is carried over to the next drain.
pub struct MicrophoneCapture {
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    /// Resampled samples not yet long enough for a full frame
    carry: Vec<f32>,
    stream: Option<Stream>,
}

impl MicrophoneCapture {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .context("No input device available")?;

        println!("Using audio input device: {}", device.name()?);

        let default_config = device
            .default_input_config()
            .context("Failed to get default input config")?;

        let mut config: StreamConfig = default_config.clone().into();

        // Prefer capturing at 16kHz directly when the device supports it
        let supported_configs = device
            .supported_input_configs()
            .context("Failed to query supported input configs")?;
        let mut found_16k = false;

        for supported_config in supported_configs {
            if supported_config.min_sample_rate().0 <= INPUT_SAMPLE_RATE
                && supported_config.max_sample_rate().0 >= INPUT_SAMPLE_RATE {
                found_16k = true;
                config.sample_rate = cpal::SampleRate(INPUT_SAMPLE_RATE);
                break;
            }
        }

        if !found_16k {
            println!("16kHz capture not supported, using {} Hz and resampling", config.sample_rate.0);
        }

        println!(
            "Capture config: {} channels, {} Hz, {:?}",
            config.channels, config.sample_rate.0, default_config.sample_format()
        );

        Ok(MicrophoneCapture {
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            carry: Vec::new(),
            stream: None,
        })
    }

    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(()); // Already capturing
        }

        self.buffer.lock().unwrap().clear();
        self.carry.clear();

        let buffer = Arc::clone(&self.buffer);
        let channels = self.config.channels as usize;

        let err_fn = |err| eprintln!("🔴 Audio stream error: {}", err);

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Handle poisoned mutex gracefully in audio callback
                    let Ok(mut buf) = buffer.lock() else {
                        eprintln!("⚠️  Capture buffer mutex poisoned, dropping audio data");
                        return;
                    };

                    // Convert to mono if needed and store samples
                    if channels == 1 {
                        buf.extend_from_slice(data);
                    } else {
                        // Average channels to get mono
                        for chunk in data.chunks(channels) {
                            let mono_sample: f32 = chunk.iter().sum::<f32>() / channels as f32;
                            buf.push(mono_sample);
                        }
                    }
                },
                err_fn,
                None,
            )
            .context("Failed to build input stream.\n\nThis is likely a microphone permissions issue.\nPlease grant microphone access to your terminal and try again.")?;

        stream.play().context("Failed to start audio stream")?;

        self.stream = Some(stream);
        println!("🎤 Microphone capture started");

        Ok(())
    }

    /// Take everything captured so far and return the complete 16 kHz frames
    /// it yields. Partial frames stay queued for the next call.
    pub fn drain_frames(&mut self) -> Vec<Vec<f32>> {
        let new_samples = {
            let mut buffer = self.buffer.lock().unwrap();
            std::mem::take(&mut *buffer)
        }; // Lock released here

        // Resample AFTER releasing the lock to avoid blocking the audio thread
        let actual_sample_rate = self.config.sample_rate.0;
        if actual_sample_rate == INPUT_SAMPLE_RATE {
            self.carry.extend_from_slice(&new_samples);
        } else {
            self.carry
                .extend(resample(&new_samples, actual_sample_rate, INPUT_SAMPLE_RATE));
        }

        let mut frames = Vec::new();
        while self.carry.len() >= FRAME_SAMPLES {
            let rest = self.carry.split_off(FRAME_SAMPLES);
            frames.push(std::mem::replace(&mut self.carry, rest));
        }
        frames
    }

    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            println!("🎤 Microphone capture stopped");
        }
        self.buffer.lock().unwrap().clear();
        self.carry.clear();
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

// Simple linear interpolation resampling
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (input.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f64 * ratio;
        let src_idx_floor = src_idx.floor() as usize;
        let src_idx_ceil = (src_idx_floor + 1).min(input.len() - 1);
        let frac = src_idx - src_idx_floor as f64;

        // Linear interpolation
        let sample = input[src_idx_floor] * (1.0 - frac) as f32
            + input[src_idx_ceil] * frac as f32;

        output.push(sample);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_halves_sample_count() {
        let input = vec![0.0; 32000];
        let output = resample(&input, 32000, 16000);
        assert_eq!(output.len(), 16000);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&input, 16000, 16000), input);
    }

    #[test]
    fn test_resample_interpolates_between_samples() {
        // Downsampling a ramp keeps it a ramp
        let input: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let output = resample(&input, 48000, 16000);

        for pair in output.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }
}
