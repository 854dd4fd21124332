use anyhow::{Context, Result};
use async_trait::async_trait;
use hound::{SampleFormat, WavReader};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::backend::{MediaDevices, MediaStream, StreamFormat};
use super::input::spawn_producer;
use crate::error::CaptureError;

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples in [-1, 1]
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to read audio samples")?
            }
        };

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}

/// Replays a WAV file as if it were a live microphone.
///
/// Every acquisition continues where the previous stream stopped, so
/// pausing and resuming walks through the file. Once the file is exhausted
/// the stream delivers silence.
pub struct FileInput {
    file: Arc<AudioFile>,
    buffer_duration: Duration,
    position: Arc<AtomicUsize>,
}

impl FileInput {
    pub fn new(file: AudioFile, buffer_duration_ms: u64) -> Self {
        Self {
            file: Arc::new(file),
            buffer_duration: Duration::from_millis(buffer_duration_ms.max(1)),
            position: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn open(path: impl AsRef<Path>, buffer_duration_ms: u64) -> Result<Self> {
        Ok(Self::new(AudioFile::open(path)?, buffer_duration_ms))
    }
}

#[async_trait]
impl MediaDevices for FileInput {
    async fn open_microphone(&self) -> Result<MediaStream, CaptureError> {
        if self.file.sample_rate == 0 || self.file.channels == 0 {
            return Err(CaptureError::Device(format!(
                "unusable audio file: {}",
                self.file.path
            )));
        }

        let format = StreamFormat {
            sample_rate: self.file.sample_rate,
            channels: self.file.channels,
        };
        let (stream, source) = MediaStream::new(format);

        info!("File input opened: {}", self.file.path);

        let file = Arc::clone(&self.file);
        let position = Arc::clone(&self.position);

        spawn_producer(source, format, self.buffer_duration, None, move |block| {
            let start = position.load(Ordering::SeqCst).min(file.samples.len());
            let end = (start + block.len()).min(file.samples.len());
            block[..end - start].copy_from_slice(&file.samples[start..end]);
            position.store(end, Ordering::SeqCst);
        });

        Ok(stream)
    }

    fn name(&self) -> &str {
        "file replay"
    }
}
