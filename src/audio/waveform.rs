//! Peak-based waveform extraction.

use super::buffer::DecodedBuffer;

/// Peaks per second of audio; matches the 20ms live sampling cadence.
pub const PEAKS_PER_SECOND: u32 = 50;

/// Per-bucket maximum amplitudes in [0, 1].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakBuffer(Vec<f32>);

impl PeakBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, peak: f32) {
        self.0.push(peak.clamp(0.0, 1.0));
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for PeakBuffer {
    fn from(peaks: Vec<f32>) -> Self {
        Self(peaks.into_iter().map(|p| p.clamp(0.0, 1.0)).collect())
    }
}

/// Frames per peak bucket: `max(1, floor(sample_rate / peaks_per_second))`
pub fn bucket_width(sample_rate: u32, peaks_per_second: u32) -> usize {
    (sample_rate / peaks_per_second.max(1)).max(1) as usize
}

/// Reduce a buffer to one peak per bucket, across all channels.
///
/// A trailing partial bucket still yields a peak.
pub fn extract_peaks(buffer: &DecodedBuffer, peaks_per_second: u32) -> PeakBuffer {
    let frames = buffer.frame_count();
    let width = bucket_width(buffer.sample_rate(), peaks_per_second);
    let buckets = frames.div_ceil(width);
    let mut peaks = vec![0.0f32; buckets];

    for channel in buffer.channels() {
        for (peak, bucket) in peaks.iter_mut().zip(channel.chunks(width)) {
            *peak = bucket.iter().fold(*peak, |max, &s| max.max(s.abs()));
        }
    }

    PeakBuffer::from(peaks)
}

/// Peak absolute deviation from the zero line over a window of samples.
pub fn window_peak<I>(samples: I) -> f32
where
    I: IntoIterator<Item = f32>,
{
    samples
        .into_iter()
        .fold(0.0f32, |max, s| max.max(s.abs()))
        .min(1.0)
}
