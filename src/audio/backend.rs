use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::error::CaptureError;

/// Number of frames a lagging subscriber may fall behind before frames are dropped
const STREAM_CAPACITY: usize = 256;

/// Audio sample data (f32, interleaved)
#[derive(Debug, Clone)]
pub struct PcmFrame {
    /// Raw audio samples in [-1, 1], interleaved by channel
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since the stream was opened
    pub timestamp_ms: u64,
}

impl PcmFrame {
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Configuration for input backends
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Sample rate delivered by the backend
    pub target_sample_rate: u32,
    /// Channel count delivered by the backend (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Frame block size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 48000,
            target_channels: 1,
            buffer_duration_ms: 20,
        }
    }
}

impl From<&crate::config::CaptureConfig> for AudioBackendConfig {
    fn from(config: &crate::config::CaptureConfig) -> Self {
        Self {
            target_sample_rate: config.sample_rate,
            target_channels: config.channels,
            buffer_duration_ms: config.buffer_duration_ms,
        }
    }
}

/// A live microphone stream.
///
/// Any number of consumers may [`subscribe`](MediaStream::subscribe) to the
/// frames; none of them owns the stream. Stopping the stream tells the
/// producer to shut down, which closes every subscription.
pub struct MediaStream {
    id: Uuid,
    format: StreamFormat,
    frames: broadcast::Receiver<PcmFrame>,
    live: Arc<AtomicBool>,
}

impl MediaStream {
    /// Create a stream together with the producer half that feeds it.
    pub fn new(format: StreamFormat) -> (Self, StreamSource) {
        let (sender, frames) = broadcast::channel(STREAM_CAPACITY);
        let live = Arc::new(AtomicBool::new(true));
        let id = Uuid::new_v4();

        let stream = Self {
            id,
            format,
            frames,
            live: Arc::clone(&live),
        };
        let source = StreamSource { id, sender, live };

        (stream, source)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PcmFrame> {
        self.frames.resubscribe()
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Signal the producer to stop. Idempotent.
    pub fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            debug!("Media stream {} stopped", self.id);
        }
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Producer half of a [`MediaStream`], held by the backend task.
///
/// Dropping it while the stream is still live is how a backend reports that
/// the device went away.
pub struct StreamSource {
    id: Uuid,
    sender: broadcast::Sender<PcmFrame>,
    live: Arc<AtomicBool>,
}

impl StreamSource {
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Deliver a frame to every subscriber. Returns false once the stream is stopped.
    pub fn send(&self, frame: PcmFrame) -> bool {
        if !self.is_live() {
            return false;
        }
        // No receivers simply means nobody is listening right now
        let _ = self.sender.send(frame);
        true
    }

    pub fn handle(&self) -> StreamHandle {
        StreamHandle {
            id: self.id,
            live: Arc::clone(&self.live),
        }
    }
}

/// Observes whether a stream is still live without keeping it alive.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    id: Uuid,
    live: Arc<AtomicBool>,
}

impl StreamHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Microphone acquisition primitive
///
/// Implementations:
/// - `SignalInput`: synthetic tone generator (demo and tests)
/// - `FileInput`: replays a WAV file in real time
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open the microphone, returning a live stream or a permission/device error
    async fn open_microphone(&self) -> Result<MediaStream, CaptureError>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
