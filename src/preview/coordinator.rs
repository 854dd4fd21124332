// Preview coordinator
//
// Every segment boundary schedules a run: merge -> (encode || peaks) ->
// publish. Runs may overlap; each is stamped with a generation number and
// only the run matching the current generation may publish. Superseded runs
// finish their work and are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audio::decode::AudioDecoder;
use crate::audio::merge::AudioMerger;
use crate::audio::segment::Segment;
use crate::audio::waveform::{extract_peaks, PeakBuffer};
use crate::audio::wav::{encode_wav, WAV_MIME_TYPE};
use crate::error::{PreviewError, SessionError};
use crate::render::{lock_surface, render_peaks, SharedSurface};
use crate::session::observer::SessionObserver;

use super::artifact::PreviewArtifact;
use super::store::ArtifactStore;

/// How a single preview run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// The run's artifact is now the published one
    Published(u64),
    /// A newer run started before this one could publish
    Superseded(u64),
    /// Nothing to merge
    Empty(u64),
    /// Merge or encode failed; the error was surfaced to the observer
    Failed(u64, PreviewError),
}

impl PreviewOutcome {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Published(g) | Self::Superseded(g) | Self::Empty(g) | Self::Failed(g, _) => *g,
        }
    }
}

#[derive(Clone)]
pub struct PreviewCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    generation: AtomicU64,
    merger: AudioMerger,
    store: ArtifactStore,
    published: Mutex<Option<PreviewArtifact>>,
    surface: SharedSurface,
    observer: Arc<dyn SessionObserver>,
    peaks_per_second: u32,
}

impl PreviewCoordinator {
    pub fn new(
        decoder: Arc<dyn AudioDecoder>,
        store: ArtifactStore,
        surface: SharedSurface,
        observer: Arc<dyn SessionObserver>,
        peaks_per_second: u32,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                generation: AtomicU64::new(0),
                merger: AudioMerger::new(decoder),
                store,
                published: Mutex::new(None),
                surface,
                observer,
                peaks_per_second,
            }),
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Start a run over a snapshot of the segment list.
    ///
    /// The generation is bumped before this returns, so any run scheduled
    /// earlier is already stale.
    pub fn schedule(&self, segments: Vec<Segment>, elapsed: Duration) -> JoinHandle<PreviewOutcome> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "Scheduling preview generation {} over {} segments",
            generation,
            segments.len()
        );

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run(generation, segments, elapsed).await })
    }

    /// Make every in-flight run stale and release the published artifact.
    pub fn invalidate(&self) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let previous = self.inner.lock_published().take();
        if let Some(artifact) = previous {
            self.inner.store.revoke(&artifact.source_url);
            info!(
                "Preview generation {} released (now at {})",
                artifact.generation, generation
            );
        }

        lock_surface(&self.inner.surface).clear();
    }

    pub fn published(&self) -> Option<PreviewArtifact> {
        self.inner.lock_published().clone()
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.inner.store
    }
}

impl Inner {
    async fn run(&self, generation: u64, segments: Vec<Segment>, elapsed: Duration) -> PreviewOutcome {
        if segments.is_empty() {
            debug!("Preview generation {} has no segments", generation);
            return PreviewOutcome::Empty(generation);
        }

        match self.build(&segments).await {
            Ok((wav, peaks)) => self.publish(generation, wav, peaks, elapsed),
            Err(e) => self.fail(generation, e),
        }
    }

    async fn build(&self, segments: &[Segment]) -> Result<(Vec<u8>, PeakBuffer), PreviewError> {
        let merged = Arc::new(self.merger.merge(segments).await?);

        let for_encode = Arc::clone(&merged);
        let peaks_per_second = self.peaks_per_second;

        let encode = tokio::task::spawn_blocking(move || encode_wav(&for_encode));
        let peaks = tokio::task::spawn_blocking(move || extract_peaks(&merged, peaks_per_second));

        let (wav, peaks) = tokio::try_join!(encode, peaks)
            .map_err(|e| PreviewError::Encode(format!("preview worker failed: {}", e)))?;

        Ok((wav?, peaks))
    }

    /// Observers are notified after the lock is released, so they may read
    /// the published artifact back.
    fn publish(&self, generation: u64, wav: Vec<u8>, peaks: PeakBuffer, elapsed: Duration) -> PreviewOutcome {
        // Checked under the same lock invalidate() takes
        let mut published = self.lock_published();

        let current = self.generation.load(Ordering::SeqCst);
        if current != generation {
            debug!(
                "Discarding preview generation {} (current is {})",
                generation, current
            );
            return PreviewOutcome::Superseded(generation);
        }

        let data: Arc<[u8]> = Arc::from(wav);
        let source_url = self.store.register(Arc::clone(&data));

        let artifact = PreviewArtifact {
            data,
            source_url,
            duration_ms: elapsed.as_millis() as u64,
            mime_type: WAV_MIME_TYPE.to_string(),
            generation,
            peaks,
        };

        if let Some(previous) = published.replace(artifact.clone()) {
            self.store.revoke(&previous.source_url);
        }

        render_peaks(&mut *lock_surface(&self.surface), artifact.peaks.as_slice());
        drop(published);

        info!(
            "Published preview generation {}: {} bytes, {}ms, {} peaks",
            generation,
            artifact.len(),
            artifact.duration_ms,
            artifact.peaks.len()
        );

        self.observer.on_record_ready(&artifact);

        PreviewOutcome::Published(generation)
    }

    fn fail(&self, generation: u64, error: PreviewError) -> PreviewOutcome {
        let current = {
            let _published = self.lock_published();
            self.generation.load(Ordering::SeqCst)
        };

        if current != generation {
            warn!(
                "Superseded preview generation {} failed: {}",
                generation, error
            );
            return PreviewOutcome::Superseded(generation);
        }

        error!("Preview generation {} failed: {}", generation, error);
        self.observer.on_error(&SessionError::Preview(error.clone()));

        PreviewOutcome::Failed(generation, error)
    }

    fn lock_published(&self) -> MutexGuard<'_, Option<PreviewArtifact>> {
        self.published.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
