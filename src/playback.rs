use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::capture::resample;
use crate::timeline::{ScheduledFragment, Timeline};

/// Gapless playback of streamed audio fragments
///
/// Fragments are queued in arrival order and the output callback consumes
/// them back to back, which realizes the timeline's scheduling: each
/// fragment starts where the previous one ended, or at the current clock
/// when playback had gone idle. An interruption drops the whole queue,
/// including the fragment currently feeding the hardware.
pub struct SpeakerPlayback {
    stream: Option<Stream>,
    shared: Arc<Mutex<PlaybackQueue>>,
    timeline: Timeline,
    device_rate: u32,
    source_rate: u32,
}

struct PlaybackQueue {
    fragments: VecDeque<QueuedFragment>,
    /// Output frames written since the stream started (the playback clock)
    played_frames: u64,
    /// Fragments fully consumed by the callback since the last drain
    finished: Vec<u64>,
}

struct QueuedFragment {
    id: u64,
    samples: Vec<f32>,
    position: usize,
}

impl SpeakerPlayback {
    /// Open the default output device. `source_rate` is the rate of the
    /// fragments that will be enqueued; they are resampled if the device
    /// cannot run at that rate.
    pub fn new(source_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No output device available")?;

        let default_config = device
            .default_output_config()
            .context("Failed to get default output config")?;
        let mut config: StreamConfig = default_config.into();

        let mut found_rate = false;
        for supported in device
            .supported_output_configs()
            .context("Failed to query supported output configs")?
        {
            if supported.min_sample_rate().0 <= source_rate
                && supported.max_sample_rate().0 >= source_rate
            {
                config.sample_rate = cpal::SampleRate(source_rate);
                found_rate = true;
                break;
            }
        }
        if !found_rate {
            println!(
                "{} Hz playback not supported, resampling to {} Hz",
                source_rate, config.sample_rate.0
            );
        }

        let device_rate = config.sample_rate.0;
        let shared = Arc::new(Mutex::new(PlaybackQueue {
            fragments: VecDeque::new(),
            played_frames: 0,
            finished: Vec::new(),
        }));

        let stream = Self::build_stream(&device, &config, Arc::clone(&shared))?;
        stream.play().context("Failed to start output stream")?;

        Ok(SpeakerPlayback {
            stream: Some(stream),
            shared,
            timeline: Timeline::new(),
            device_rate,
            source_rate,
        })
    }

    fn build_stream(
        device: &Device,
        config: &StreamConfig,
        shared: Arc<Mutex<PlaybackQueue>>,
    ) -> Result<Stream> {
        let channels = config.channels as usize;
        let err_fn = |err| eprintln!("🔴 Audio stream error: {}", err);

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut queue) = shared.lock() else {
                        data.fill(0.0);
                        return;
                    };

                    for frame in data.chunks_mut(channels) {
                        let sample = queue.next_sample();
                        for slot in frame.iter_mut() {
                            *slot = sample;
                        }
                        // The clock keeps running through silence, like a
                        // hardware playback position does
                        queue.played_frames += 1;
                    }
                },
                err_fn,
                None,
            )
            .context("Failed to build output stream")?;

        Ok(stream)
    }

    /// Queue a fragment of `source_rate` samples for gapless playback.
    /// Returns the slot it received on the timeline.
    pub fn enqueue(&mut self, samples: &[f32]) -> ScheduledFragment {
        let duration = samples.len() as f64 / self.source_rate as f64;
        let playable = if self.device_rate == self.source_rate {
            samples.to_vec()
        } else {
            resample(samples, self.source_rate, self.device_rate)
        };

        let mut queue = self.shared.lock().unwrap();
        for id in queue.finished.drain(..) {
            self.timeline.complete(id);
        }

        let clock = queue.played_frames as f64 / self.device_rate as f64;
        let fragment = self.timeline.schedule(clock, duration);

        queue.fragments.push_back(QueuedFragment {
            id: fragment.id,
            samples: playable,
            position: 0,
        });
        fragment
    }

    /// Stop everything scheduled or playing and rewind the timeline cursor
    pub fn interrupt(&mut self) {
        let mut queue = self.shared.lock().unwrap();
        queue.fragments.clear();
        queue.finished.clear();
        self.timeline.interrupt();
    }

    /// Number of fragments scheduled but not yet finished
    pub fn pending_count(&mut self) -> usize {
        let mut queue = self.shared.lock().unwrap();
        for id in queue.finished.drain(..) {
            self.timeline.complete(id);
        }
        self.timeline.pending_count()
    }

    pub fn is_idle(&mut self) -> bool {
        self.pending_count() == 0
    }

    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }
        self.interrupt();
    }
}

impl PlaybackQueue {
    fn next_sample(&mut self) -> f32 {
        loop {
            let Some(front) = self.fragments.front_mut() else {
                return 0.0;
            };
            if front.position < front.samples.len() {
                let sample = front.samples[front.position];
                front.position += 1;
                return sample;
            }
            // Fragment exhausted: record completion and move on
            let done = self.fragments.pop_front().unwrap();
            self.finished.push(done.id);
        }
    }
}

impl Drop for SpeakerPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_with(fragments: Vec<(u64, Vec<f32>)>) -> PlaybackQueue {
        PlaybackQueue {
            fragments: fragments
                .into_iter()
                .map(|(id, samples)| QueuedFragment { id, samples, position: 0 })
                .collect(),
            played_frames: 0,
            finished: Vec::new(),
        }
    }

    #[test]
    fn test_samples_flow_across_fragment_boundaries() {
        let mut queue = queue_with(vec![(1, vec![0.1, 0.2]), (2, vec![0.3])]);

        assert_eq!(queue.next_sample(), 0.1);
        assert_eq!(queue.next_sample(), 0.2);
        assert_eq!(queue.next_sample(), 0.3);
        assert_eq!(queue.next_sample(), 0.0); // silence after the queue drains
    }

    #[test]
    fn test_exhausted_fragments_are_reported_finished() {
        let mut queue = queue_with(vec![(7, vec![0.5]), (8, vec![0.6])]);

        queue.next_sample();
        queue.next_sample(); // crossing into fragment 8 finishes fragment 7
        assert_eq!(queue.finished, vec![7]);

        queue.next_sample(); // silence; fragment 8 is now exhausted too
        assert_eq!(queue.finished, vec![7, 8]);
    }

    #[test]
    fn test_empty_fragment_is_skipped() {
        let mut queue = queue_with(vec![(1, vec![]), (2, vec![0.9])]);

        assert_eq!(queue.next_sample(), 0.9);
        assert_eq!(queue.finished, vec![1]);
    }
}
