use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::audio::backend::MediaStream;
use crate::audio::encoder::ChunkEncoder;
use crate::audio::segment::Segment;
use crate::error::CaptureError;

use super::resources::TaskGuard;

/// The error a pass reports when its stream closes underneath it
pub(super) fn stream_ended() -> CaptureError {
    CaptureError::Device("microphone stream ended during capture".to_string())
}

#[derive(Debug)]
enum EncoderEvent {
    Chunk(Vec<u8>),
    Stopped,
    DeviceLost,
}

/// Records one continuous capture pass
///
/// Encodes frames from a shared stream and collects the encoder's chunks
/// (one per timeslice) until stopped, then joins them into a single segment.
pub struct SegmentRecorder {
    mime_type: String,
    timeslice: Duration,
    started: Instant,
    stop_tx: Option<oneshot::Sender<()>>,
    events: mpsc::UnboundedReceiver<EncoderEvent>,
    /// Set once, when the stream closed before the pass was stopped
    lost: watch::Receiver<Option<Instant>>,
    _task: TaskGuard,
}

impl SegmentRecorder {
    pub fn start(stream: &MediaStream, mut encoder: Box<dyn ChunkEncoder>, timeslice: Duration) -> Self {
        let mime_type = encoder.mime_type().to_string();
        let mut frames = stream.subscribe();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (lost_tx, lost) = watch::channel(None);
        let started = Instant::now();

        info!(
            "Segment recorder started: {} (chunks every {:?})",
            mime_type, timeslice
        );

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(started + timeslice, timeslice);
            let mut delivered = 0usize;

            loop {
                tokio::select! {
                    biased;

                    _ = &mut stop_rx => {
                        // Frames already buffered in the stream still belong to this pass
                        loop {
                            match frames.try_recv() {
                                Ok(frame) => encoder.encode(&frame),
                                Err(TryRecvError::Lagged(n)) => {
                                    warn!("Recorder lagged by {} frames while stopping", n)
                                }
                                Err(_) => break,
                            }
                        }
                        if let Some(chunk) = encoder.take_chunk() {
                            delivered += 1;
                            let _ = event_tx.send(EncoderEvent::Chunk(chunk));
                        }
                        let _ = event_tx.send(EncoderEvent::Stopped);
                        break;
                    }

                    frame = frames.recv() => match frame {
                        Ok(frame) => encoder.encode(&frame),
                        Err(RecvError::Lagged(n)) => {
                            warn!("Recorder lagged behind the stream, {} frames lost", n);
                        }
                        Err(RecvError::Closed) => {
                            warn!("Stream closed while recording");
                            let _ = lost_tx.send(Some(Instant::now()));
                            let _ = event_tx.send(EncoderEvent::DeviceLost);
                            break;
                        }
                    },

                    _ = ticker.tick() => {
                        if let Some(chunk) = encoder.take_chunk() {
                            delivered += 1;
                            debug!("Chunk {} delivered ({} bytes)", delivered, chunk.len());
                            let _ = event_tx.send(EncoderEvent::Chunk(chunk));
                        }
                    }
                }
            }

            debug!("Encoder task finished after {} chunks", delivered);
        });

        Self::from_task(mime_type, timeslice, started, stop_tx, events, lost, task)
    }

    fn from_task(
        mime_type: String,
        timeslice: Duration,
        started: Instant,
        stop_tx: oneshot::Sender<()>,
        events: mpsc::UnboundedReceiver<EncoderEvent>,
        lost: watch::Receiver<Option<Instant>>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            mime_type,
            timeslice,
            started,
            stop_tx: Some(stop_tx),
            events,
            lost,
            _task: TaskGuard::new("segment-encoder", task),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Time captured by this pass. Stops advancing if the stream is lost.
    pub fn elapsed(&self) -> Duration {
        self.lost_at()
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.started)
    }

    /// When the stream closed underneath this pass, if it did
    pub fn lost_at(&self) -> Option<Instant> {
        *self.lost.borrow()
    }

    /// Changes once, when the stream is lost
    pub fn device_lost(&self) -> watch::Receiver<Option<Instant>> {
        self.lost.clone()
    }

    /// Stop the pass and join its chunks into a segment.
    ///
    /// Chunks delivered within one timeslice of the stop request are kept;
    /// anything later is dropped. Returns `Ok(None)` if no chunk was produced.
    pub async fn stop(mut self) -> Result<Option<Segment>, CaptureError> {
        let duration = self.started.elapsed();

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        let deadline = Instant::now() + self.timeslice;
        let mut chunks: Vec<Vec<u8>> = Vec::new();

        loop {
            match timeout_at(deadline, self.events.recv()).await {
                Ok(Some(EncoderEvent::Chunk(chunk))) => chunks.push(chunk),
                Ok(Some(EncoderEvent::Stopped)) | Ok(None) => break,
                Ok(Some(EncoderEvent::DeviceLost)) => return Err(stream_ended()),
                Err(_) => {
                    warn!(
                        "Encoder did not stop within {:?}; later chunks are dropped",
                        self.timeslice
                    );
                    break;
                }
            }
        }

        if chunks.is_empty() {
            info!("Capture pass produced no data ({:?})", duration);
            return Ok(None);
        }

        let data = chunks.concat();
        info!(
            "Segment finalized: {} chunks, {} bytes, {:?}",
            chunks.len(),
            data.len(),
            duration
        );

        Ok(Some(Segment::new(data, self.mime_type, duration)))
    }
}
