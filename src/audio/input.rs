// Synthetic microphone backend
//
// Generates a sine tone paced in real time (tokio time), so the capture
// pipeline can run without audio hardware. Also provides the pacing loop
// shared with the file backend.

use async_trait::async_trait;
use std::f32::consts::TAU;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};

use super::backend::{
    AudioBackendConfig, MediaDevices, MediaStream, PcmFrame, StreamFormat, StreamHandle,
    StreamSource,
};
use crate::error::CaptureError;

/// Tone generator standing in for a microphone.
pub struct SignalInput {
    config: AudioBackendConfig,
    frequency_hz: f32,
    amplitude: f32,
    permission_granted: bool,
    dropout_after: Option<Duration>,
    streams: Arc<Mutex<Vec<StreamHandle>>>,
}

impl SignalInput {
    pub fn new(config: AudioBackendConfig) -> Self {
        Self {
            config,
            frequency_hz: 440.0,
            amplitude: 0.5,
            permission_granted: true,
            dropout_after: None,
            streams: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A backend whose every acquisition is refused.
    pub fn denied(config: AudioBackendConfig) -> Self {
        Self {
            permission_granted: false,
            ..Self::new(config)
        }
    }

    pub fn with_tone(mut self, frequency_hz: f32, amplitude: f32) -> Self {
        self.frequency_hz = frequency_hz;
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    /// Simulate the device disappearing this long after each stream opens.
    pub fn with_dropout(mut self, after: Duration) -> Self {
        self.dropout_after = Some(after);
        self
    }

    /// Streams opened so far, live or not
    pub fn opened_streams(&self) -> usize {
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Streams not yet stopped by their owner
    pub fn active_streams(&self) -> usize {
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|handle| handle.is_live())
            .count()
    }
}

#[async_trait]
impl MediaDevices for SignalInput {
    async fn open_microphone(&self) -> Result<MediaStream, CaptureError> {
        if !self.permission_granted {
            return Err(CaptureError::PermissionDenied(
                "signal input refused access".to_string(),
            ));
        }

        let format = validate_format(&self.config)?;
        let (stream, source) = MediaStream::new(format);

        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(source.handle());

        info!(
            "Signal input opened: {}Hz tone, {}Hz, {} channels",
            self.frequency_hz, format.sample_rate, format.channels
        );

        let step = TAU * self.frequency_hz / format.sample_rate as f32;
        let amplitude = self.amplitude;
        let channels = format.channels as usize;
        let mut phase = 0.0f32;

        spawn_producer(
            source,
            format,
            Duration::from_millis(self.config.buffer_duration_ms.max(1)),
            self.dropout_after,
            move |block: &mut [f32]| {
                for frame in block.chunks_exact_mut(channels) {
                    let value = amplitude * phase.sin();
                    frame.fill(value);
                    phase = (phase + step) % TAU;
                }
            },
        );

        Ok(stream)
    }

    fn name(&self) -> &str {
        "signal generator"
    }
}

pub(crate) fn validate_format(config: &AudioBackendConfig) -> Result<StreamFormat, CaptureError> {
    if config.target_sample_rate == 0 || config.target_channels == 0 {
        return Err(CaptureError::Device(format!(
            "unsupported input format: {}Hz, {} channels",
            config.target_sample_rate, config.target_channels
        )));
    }

    Ok(StreamFormat {
        sample_rate: config.target_sample_rate,
        channels: config.target_channels,
    })
}

/// Deliver blocks of `block` duration until the stream is stopped.
///
/// `fill` receives a zeroed interleaved block to write samples into.
pub(crate) fn spawn_producer<F>(
    source: StreamSource,
    format: StreamFormat,
    block: Duration,
    dropout_after: Option<Duration>,
    mut fill: F,
) where
    F: FnMut(&mut [f32]) + Send + 'static,
{
    let frames_per_block =
        ((format.sample_rate as u128 * block.as_millis()) / 1000).max(1) as usize;
    let block_ms = block.as_millis() as u64;

    tokio::spawn(async move {
        let mut ticker = interval(block);
        let opened = Instant::now();
        let mut timestamp_ms = 0u64;

        loop {
            ticker.tick().await;

            if !source.is_live() {
                break;
            }

            if let Some(limit) = dropout_after {
                if opened.elapsed() >= limit {
                    warn!("Input device dropped out after {:?}", limit);
                    break;
                }
            }

            let mut samples = vec![0.0f32; frames_per_block * format.channels as usize];
            fill(&mut samples);

            let frame = PcmFrame {
                samples,
                sample_rate: format.sample_rate,
                channels: format.channels,
                timestamp_ms,
            };

            if !source.send(frame) {
                break;
            }

            timestamp_ms += block_ms;
        }

        debug!("Input producer finished after {}ms", timestamp_ms);
    });
}
