use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::observer::SessionObserver;
use super::recorder::{self, SegmentRecorder};
use super::resources::{ResourceScope, TaskGuard};
use super::state::{Command, RecordingState};
use super::stats::SessionStats;
use super::visualizer::LiveVisualizer;
use crate::audio::backend::MediaDevices;
use crate::audio::decode::{AudioDecoder, MediaDecoder};
use crate::audio::encoder::{EncoderFactory, L16EncoderFactory};
use crate::audio::segment::Segment;
use crate::audio::waveform::PeakBuffer;
use crate::error::{CaptureError, SessionError};
use crate::preview::{ArtifactStore, PreviewArtifact, PreviewCoordinator, PreviewOutcome};
use crate::render::{ImageSurface, SharedSurface};

/// Resources of the pass currently capturing. Only exists while recording.
struct ActivePass {
    recorder: SegmentRecorder,
    visualizer: LiveVisualizer,
    resources: ResourceScope,
    /// Set by whoever reports a device loss first
    loss_reported: Arc<AtomicBool>,
}

enum Phase {
    Idle,
    Recording(ActivePass),
    Paused,
}

/// Everything captured since the last fresh start or delete
#[derive(Default)]
struct SessionData {
    /// Finalized segments in capture order
    segments: Vec<Segment>,

    /// Sum of finalized pass durations
    elapsed: Duration,

    /// When the first pass of this session started
    started_at: Option<DateTime<Utc>>,
}

/// Drives a voice memo session through idle, recording and paused.
///
/// Every pause or stop that produces audio appends a segment and schedules
/// a preview run over all segments so far. Transitions take `&mut self`, so
/// they are processed strictly in order.
pub struct CaptureController {
    /// Microphone acquisition
    devices: Arc<dyn MediaDevices>,

    /// Creates the chunk encoder for each pass
    encoders: Arc<dyn EncoderFactory>,

    /// External notification hooks
    observer: Arc<dyn SessionObserver>,

    /// Shared by the live visualizer and the merged preview
    surface: SharedSurface,

    preview: PreviewCoordinator,

    config: SessionConfig,

    phase: Phase,

    session: SessionData,

    /// Preview runs not yet collected by `settle()`. Finished runs are
    /// pruned whenever a new one is scheduled.
    pending: Vec<JoinHandle<PreviewOutcome>>,
}

impl CaptureController {
    pub fn builder(
        devices: Arc<dyn MediaDevices>,
        observer: Arc<dyn SessionObserver>,
    ) -> CaptureControllerBuilder {
        CaptureControllerBuilder {
            devices,
            observer,
            decoder: None,
            encoders: None,
            surface: None,
            store: None,
            config: SessionConfig::default(),
        }
    }

    pub fn state(&self) -> RecordingState {
        match self.phase {
            Phase::Idle => RecordingState::Idle,
            Phase::Recording(_) => RecordingState::Recording,
            Phase::Paused => RecordingState::Paused,
        }
    }

    /// Whether any segment has been finalized
    pub fn has_audio(&self) -> bool {
        !self.session.segments.is_empty()
    }

    pub fn can_delete(&self) -> bool {
        self.state().can_delete(self.has_audio())
    }

    /// Finalized pass durations plus the pass in progress
    pub fn elapsed(&self) -> Duration {
        match &self.phase {
            Phase::Recording(pass) => self.session.elapsed + pass.recorder.elapsed(),
            _ => self.session.elapsed,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.session.segments
    }

    /// The currently published preview, if any
    pub fn published(&self) -> Option<PreviewArtifact> {
        self.preview.published()
    }

    pub fn store(&self) -> &ArtifactStore {
        self.preview.store()
    }

    /// Live peaks of the pass in progress
    pub fn live_peaks(&self) -> Option<PeakBuffer> {
        match &self.phase {
            Phase::Recording(pass) => Some(pass.visualizer.snapshot()),
            _ => None,
        }
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            state: self.state(),
            started_at: self.session.started_at,
            elapsed_ms: self.elapsed().as_millis() as u64,
            segment_count: self.session.segments.len(),
            captured_bytes: self.session.segments.iter().map(Segment::len).sum(),
            published_url: self.preview.published().map(|a| a.source_url),
            preview_generation: self.preview.generation(),
        }
    }

    /// Begin a fresh session, discarding any previous segments and preview
    pub async fn start(&mut self) -> Result<(), SessionError> {
        self.check(Command::Start)?;

        // Nothing is touched until the microphone is ours
        let pass = self.begin_pass(Duration::ZERO).await?;

        self.preview.invalidate();
        self.session = SessionData {
            started_at: Some(Utc::now()),
            ..SessionData::default()
        };
        self.phase = Phase::Recording(pass);

        info!("Recording session started");
        Ok(())
    }

    /// Continue a paused session with a new pass
    pub async fn resume(&mut self) -> Result<(), SessionError> {
        self.check(Command::Resume)?;

        let pass = self.begin_pass(self.session.elapsed).await?;
        self.phase = Phase::Recording(pass);

        info!(
            "Recording resumed after {} segments ({:?})",
            self.session.segments.len(),
            self.session.elapsed
        );
        Ok(())
    }

    /// Finalize the current pass and hold
    pub async fn pause(&mut self) -> Result<(), SessionError> {
        self.check(Command::Pause)?;

        self.finish_pass().await?;
        self.phase = Phase::Paused;

        info!("Recording paused at {:?}", self.session.elapsed);
        Ok(())
    }

    /// End capture. Segments and the published preview are kept.
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        self.check(Command::Stop)?;

        if matches!(self.phase, Phase::Recording(_)) {
            self.finish_pass().await?;
        }
        self.phase = Phase::Idle;

        info!(
            "Recording stopped: {} segments, {:?}",
            self.session.segments.len(),
            self.session.elapsed
        );
        Ok(())
    }

    /// Discard everything captured and return to idle.
    ///
    /// In-flight preview runs become stale before this returns.
    pub fn delete(&mut self) -> Result<(), SessionError> {
        self.check(Command::Delete)?;

        // The live visualizer must be gone before the surface is cleared
        self.discard_pass();
        self.preview.invalidate();
        self.session = SessionData::default();

        info!("Recording deleted");
        self.observer.on_delete();
        Ok(())
    }

    /// Release every resource and make in-flight preview runs stale.
    /// Segments are kept.
    pub fn shutdown(&mut self) {
        self.discard_pass();
        self.preview.invalidate();
    }

    /// Wait for the preview runs still tracked and return their outcomes.
    ///
    /// Runs that had already finished when a later one was scheduled are no
    /// longer tracked and are not returned.
    pub async fn settle(&mut self) -> Vec<PreviewOutcome> {
        let mut outcomes = Vec::with_capacity(self.pending.len());

        for handle in std::mem::take(&mut self.pending) {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!("Preview run did not complete: {}", e),
            }
        }

        outcomes
    }

    fn check(&self, command: Command) -> Result<RecordingState, SessionError> {
        self.state()
            .apply(command, self.has_audio())
            .inspect_err(|e| warn!("Rejected: {}", e))
    }

    /// Acquire the microphone and start recording and visualizing from it.
    ///
    /// `base` is the elapsed time already captured in this session.
    async fn begin_pass(&self, base: Duration) -> Result<ActivePass, SessionError> {
        let mut resources = ResourceScope::new();

        let stream = match resources.acquire_microphone(self.devices.as_ref()).await {
            Ok(stream) => stream,
            Err(e) => return Err(self.report(e)),
        };

        let encoder = self.encoders.create(stream.format());
        let recorder = SegmentRecorder::start(stream, encoder, self.config.timeslice);
        let (visualizer, graph) = LiveVisualizer::start(
            stream,
            Arc::clone(&self.surface),
            self.config.sample_interval,
            self.config.window_size,
        );

        let loss_reported = Arc::new(AtomicBool::new(false));
        resources.attach_graph(graph);
        resources.attach_timer(self.spawn_pass_monitor(
            base,
            recorder.started(),
            recorder.device_lost(),
            Arc::clone(&loss_reported),
        ));

        Ok(ActivePass {
            recorder,
            visualizer,
            resources,
            loss_reported,
        })
    }

    /// Stop the active pass, append its segment and schedule a preview.
    ///
    /// On a capture error the pass is discarded and the controller falls
    /// back to paused (or idle, if nothing was captured yet).
    async fn finish_pass(&mut self) -> Result<(), SessionError> {
        let ActivePass {
            recorder,
            visualizer,
            mut resources,
            loss_reported,
        } = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Recording(pass) => pass,
            other => {
                self.phase = other;
                return Ok(());
            }
        };

        // The recorder must finish before the microphone goes away
        let result = recorder.stop().await;

        drop(visualizer);
        resources.release_all();

        match result {
            Ok(Some(segment)) => {
                self.session.elapsed += segment.duration();
                self.session.segments.push(segment);

                self.pending.retain(|handle| !handle.is_finished());
                let handle = self
                    .preview
                    .schedule(self.session.segments.clone(), self.session.elapsed);
                self.pending.push(handle);
                Ok(())
            }
            Ok(None) => {
                debug!("Pass ended without audio");
                Ok(())
            }
            Err(e) => {
                self.phase = if self.has_audio() {
                    Phase::Paused
                } else {
                    Phase::Idle
                };
                if loss_reported.swap(true, Ordering::SeqCst) {
                    debug!("Device loss already reported: {}", e);
                    Err(SessionError::Capture(e))
                } else {
                    Err(self.report(e))
                }
            }
        }
    }

    /// Drop the pass in progress without keeping its audio.
    ///
    /// A device loss nobody has reported yet is reported here.
    fn discard_pass(&mut self) {
        let Phase::Recording(pass) = std::mem::replace(&mut self.phase, Phase::Idle) else {
            return;
        };

        if pass.recorder.lost_at().is_some() && !pass.loss_reported.swap(true, Ordering::SeqCst) {
            self.report(recorder::stream_ended());
        }

        info!("Discarding pass in progress ({:?})", pass.recorder.elapsed());
        drop(pass);
    }

    /// Tick elapsed time while the pass captures. Reports a device loss
    /// and stops ticking if the stream goes away first.
    fn spawn_pass_monitor(
        &self,
        base: Duration,
        started: Instant,
        mut lost: watch::Receiver<Option<Instant>>,
        reported: Arc<AtomicBool>,
    ) -> TaskGuard {
        let observer = Arc::clone(&self.observer);
        let tick = self.config.tick_interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(started + tick, tick);
            let mut watching = true;

            loop {
                tokio::select! {
                    changed = lost.changed(), if watching => match changed {
                        Ok(()) => {
                            if !reported.swap(true, Ordering::SeqCst) {
                                warn!("Microphone lost after {:?}", base + started.elapsed());
                                observer.on_error(&SessionError::Capture(recorder::stream_ended()));
                            }
                            break;
                        }
                        // Encoder finished normally
                        Err(_) => watching = false,
                    },

                    _ = ticker.tick() => observer.on_elapsed(base + started.elapsed()),
                }
            }
        });

        TaskGuard::new("pass-monitor", task)
    }

    fn report(&self, error: CaptureError) -> SessionError {
        let error = SessionError::Capture(error);
        self.observer.on_error(&error);
        error
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Optional collaborators for a [`CaptureController`]
pub struct CaptureControllerBuilder {
    devices: Arc<dyn MediaDevices>,
    observer: Arc<dyn SessionObserver>,
    decoder: Option<Arc<dyn AudioDecoder>>,
    encoders: Option<Arc<dyn EncoderFactory>>,
    surface: Option<SharedSurface>,
    store: Option<ArtifactStore>,
    config: SessionConfig,
}

impl CaptureControllerBuilder {
    pub fn decoder(mut self, decoder: Arc<dyn AudioDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn encoders(mut self, encoders: Arc<dyn EncoderFactory>) -> Self {
        self.encoders = Some(encoders);
        self
    }

    pub fn surface(mut self, surface: SharedSurface) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn store(mut self, store: ArtifactStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> CaptureController {
        let surface: SharedSurface = self
            .surface
            .unwrap_or_else(|| ImageSurface::default().shared());
        let decoder: Arc<dyn AudioDecoder> =
            self.decoder.unwrap_or_else(|| Arc::new(MediaDecoder));

        let preview = PreviewCoordinator::new(
            decoder,
            self.store.unwrap_or_default(),
            Arc::clone(&surface),
            Arc::clone(&self.observer),
            self.config.peaks_per_second,
        );

        CaptureController {
            devices: self.devices,
            encoders: self
                .encoders
                .unwrap_or_else(|| Arc::new(L16EncoderFactory)),
            observer: self.observer,
            surface,
            preview,
            config: self.config,
            phase: Phase::Idle,
            session: SessionData::default(),
            pending: Vec::new(),
        }
    }
}
