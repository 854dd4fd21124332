use std::time::Duration;

/// Linear, per-channel floating-point audio.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl DecodedBuffer {
    /// Build from planar channel data. Channels longer than the shortest one
    /// are truncated so every channel has the same frame count.
    pub fn new(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for channel in &mut channels {
            channel.truncate(frames);
        }

        Self {
            sample_rate,
            channels,
        }
    }

    pub fn from_interleaved(sample_rate: u32, channel_count: usize, samples: &[f32]) -> Self {
        let channel_count = channel_count.max(1);
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];

        for frame in samples.chunks_exact(channel_count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }

        Self {
            sample_rate,
            channels,
        }
    }

    pub fn silent(sample_rate: u32, channel_count: usize, frames: usize) -> Self {
        Self {
            sample_rate,
            channels: vec![vec![0.0; frames]; channel_count],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(Vec::as_slice)
    }

    pub(crate) fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_seconds())
    }
}
