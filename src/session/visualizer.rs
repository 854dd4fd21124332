use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::audio::backend::MediaStream;
use crate::audio::waveform::{window_peak, PeakBuffer};
use crate::render::{lock_surface, render_peaks, SharedSurface};

use super::resources::TaskGuard;

/// Real-time waveform of the current capture pass.
///
/// Every sampling interval the newest `window_size` samples of the stream are
/// reduced to one peak, appended to the live buffer and redrawn. The buffer
/// belongs to this pass only and is dropped with it.
pub struct LiveVisualizer {
    peaks: Arc<Mutex<PeakBuffer>>,
}

impl LiveVisualizer {
    /// Start sampling `stream`. The returned guard is the analysis task;
    /// dropping it stops sampling.
    pub fn start(
        stream: &MediaStream,
        surface: SharedSurface,
        sample_interval: Duration,
        window_size: usize,
    ) -> (Self, TaskGuard) {
        let peaks = Arc::new(Mutex::new(PeakBuffer::new()));
        let mut frames = stream.subscribe();
        let window_size = window_size.max(1);
        let task_peaks = Arc::clone(&peaks);

        let task = tokio::spawn(async move {
            let mut window: VecDeque<f32> = VecDeque::with_capacity(window_size);
            let mut ticker = interval(sample_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                loop {
                    match frames.try_recv() {
                        Ok(frame) => {
                            window.extend(frame.samples);
                            let excess = window.len().saturating_sub(window_size);
                            window.drain(..excess);
                        }
                        Err(TryRecvError::Lagged(n)) => {
                            warn!("Visualizer skipped {} frames", n);
                        }
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Closed) => {
                            debug!("Visualizer stream closed");
                            return;
                        }
                    }
                }

                let peak = window_peak(window.iter().copied());
                let mut live = lock_peaks(&task_peaks);
                live.push(peak);
                render_peaks(&mut *lock_surface(&surface), live.as_slice());
            }
        });

        (Self { peaks }, TaskGuard::new("live-visualizer", task))
    }

    /// Copy of the live peaks collected so far
    pub fn snapshot(&self) -> PeakBuffer {
        lock_peaks(&self.peaks).clone()
    }
}

fn lock_peaks(peaks: &Mutex<PeakBuffer>) -> MutexGuard<'_, PeakBuffer> {
    peaks.lock().unwrap_or_else(PoisonError::into_inner)
}
