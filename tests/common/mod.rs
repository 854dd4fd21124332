// Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use voice_memo::audio::decode::DecodeError;
use voice_memo::audio::{
    AudioBackendConfig, AudioDecoder, ChunkEncoder, DecodedBuffer, EncoderFactory, L16Encoder,
    MediaDecoder, PcmFrame, Segment, SignalInput, StreamFormat,
};
use voice_memo::{SessionConfig, SessionEvent, Surface};

/// Appended to a segment's MIME type to make [`GatedDecoder`] hold it back
pub const SLOW_TAG: &str = ";tag=slow";

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Resize(u32, u32),
    Clear,
    Line(f32, f32, f32),
}

/// Surface that records every drawing call
pub struct RecordingSurface {
    pub width: f32,
    pub height: f32,
    pub ratio: f32,
    pub ops: Vec<SurfaceOp>,
}

impl RecordingSurface {
    pub fn new(width: f32, height: f32, ratio: f32) -> Self {
        Self {
            width,
            height,
            ratio,
            ops: Vec::new(),
        }
    }

    pub fn shared(self) -> Arc<Mutex<RecordingSurface>> {
        Arc::new(Mutex::new(self))
    }

    pub fn lines(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SurfaceOp::Line(..)))
            .count()
    }
}

impl Surface for RecordingSurface {
    fn css_size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.ratio
    }

    fn resize_backing(&mut self, width: u32, height: u32) {
        self.ops.push(SurfaceOp::Resize(width, height));
    }

    fn clear(&mut self) {
        self.ops.push(SurfaceOp::Clear);
    }

    fn vertical_line(&mut self, x: f32, y0: f32, y1: f32) {
        self.ops.push(SurfaceOp::Line(x, y0, y1));
    }
}

/// Fails its first `failures` decode calls, then decodes normally
pub struct FlakyDecoder {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyDecoder {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioDecoder for FlakyDecoder {
    async fn decode(&self, segment: &Segment) -> Result<DecodedBuffer, DecodeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(DecodeError::Malformed(format!("injected failure {}", call)));
        }
        MediaDecoder.decode(segment).await
    }
}

/// Holds back segments tagged with [`SLOW_TAG`] until the gate opens
pub struct GatedDecoder {
    gate: watch::Receiver<bool>,
}

impl GatedDecoder {
    pub fn new() -> (Self, watch::Sender<bool>) {
        let (tx, gate) = watch::channel(false);
        (Self { gate }, tx)
    }
}

#[async_trait]
impl AudioDecoder for GatedDecoder {
    async fn decode(&self, segment: &Segment) -> Result<DecodedBuffer, DecodeError> {
        if segment.mime_type().ends_with(SLOW_TAG) {
            let mut gate = self.gate.clone();
            gate.wait_for(|open| *open)
                .await
                .map_err(|e| DecodeError::Worker(e.to_string()))?;
        }
        MediaDecoder.decode(segment).await
    }
}

/// L16 encoder whose segments are held back by [`GatedDecoder`]
pub struct SlowTaggedEncoder(L16Encoder, String);

impl ChunkEncoder for SlowTaggedEncoder {
    fn mime_type(&self) -> &str {
        &self.1
    }

    fn encode(&mut self, frame: &PcmFrame) {
        self.0.encode(frame)
    }

    fn take_chunk(&mut self) -> Option<Vec<u8>> {
        self.0.take_chunk()
    }
}

pub struct SlowTaggedEncoders;

impl EncoderFactory for SlowTaggedEncoders {
    fn create(&self, format: StreamFormat) -> Box<dyn ChunkEncoder> {
        let encoder = L16Encoder::new(format);
        let mime_type = format!("{}{}", encoder.mime_type(), SLOW_TAG);
        Box::new(SlowTaggedEncoder(encoder, mime_type))
    }
}

pub const RATE: u32 = 8000;

pub fn mono() -> StreamFormat {
    StreamFormat {
        sample_rate: RATE,
        channels: 1,
    }
}

/// Encode `frames` frames of a constant value as an L16 segment
pub fn constant_segment(format: StreamFormat, frames: usize, value: f32) -> Segment {
    let mut encoder = L16Encoder::new(format);
    encoder.encode(&PcmFrame {
        samples: vec![value; frames * format.channels as usize],
        sample_rate: format.sample_rate,
        channels: format.channels,
        timestamp_ms: 0,
    });
    let data = encoder.take_chunk().unwrap_or_default();
    let duration = Duration::from_secs_f64(frames as f64 / format.sample_rate as f64);
    Segment::new(data, encoder.mime_type(), duration)
}

/// Same as [`constant_segment`] but held back by [`GatedDecoder`]
pub fn slow_segment(format: StreamFormat, frames: usize, value: f32) -> Segment {
    let segment = constant_segment(format, frames, value);
    let mime_type = format!("{}{}", segment.mime_type(), SLOW_TAG);
    Segment::new(segment.shared_data(), mime_type, segment.duration())
}

pub fn tone_input() -> SignalInput {
    SignalInput::new(AudioBackendConfig {
        target_sample_rate: RATE,
        target_channels: 1,
        buffer_duration_ms: 20,
    })
    .with_tone(220.0, 0.5)
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        timeslice: Duration::from_millis(250),
        tick_interval: Duration::from_secs(1),
        ..SessionConfig::default()
    }
}

/// Everything received so far, without waiting
pub fn drain(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

pub fn count_ready(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SessionEvent::RecordReady(_)))
        .count()
}

pub fn count_errors(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Error(_)))
        .count()
}
