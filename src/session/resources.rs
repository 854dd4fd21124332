// Scoped ownership of capture resources
//
// The microphone stream, the live analysis task ("processing graph") and
// the session timers are held by guards that release on drop. A pass keeps
// all of them in one ResourceScope, so every exit path (pause, stop,
// delete, error, teardown) releases the same way.

use std::ops::Deref;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::backend::{MediaDevices, MediaStream};
use crate::error::CaptureError;

/// Aborts a background task when dropped.
pub struct TaskGuard {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl TaskGuard {
    pub fn new(name: &'static str, handle: JoinHandle<()>) -> Self {
        Self {
            name,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Released task: {}", self.name);
        }
    }
}

/// Exclusive hold on the live microphone stream. Stops it when dropped.
pub struct MicrophoneGuard {
    stream: MediaStream,
}

impl Deref for MicrophoneGuard {
    type Target = MediaStream;

    fn deref(&self) -> &MediaStream {
        &self.stream
    }
}

impl Drop for MicrophoneGuard {
    fn drop(&mut self) {
        self.stream.stop();
        info!("Microphone stream {} released", self.stream.id());
    }
}

/// All resources held by one capture pass.
#[derive(Default)]
pub struct ResourceScope {
    microphone: Option<MicrophoneGuard>,
    graph: Option<TaskGuard>,
    timers: Vec<TaskGuard>,
}

impl ResourceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the microphone and hold it for the lifetime of this scope.
    pub async fn acquire_microphone(
        &mut self,
        devices: &dyn MediaDevices,
    ) -> Result<&MediaStream, CaptureError> {
        if self.microphone.is_some() {
            warn!("Microphone already held by this scope; releasing it first");
            self.release_microphone();
        }

        let stream = devices.open_microphone().await?;
        info!(
            "Microphone stream {} acquired from {} ({}Hz, {} channels)",
            stream.id(),
            devices.name(),
            stream.format().sample_rate,
            stream.format().channels
        );

        Ok(&**self.microphone.insert(MicrophoneGuard { stream }))
    }

    pub fn microphone(&self) -> Option<&MediaStream> {
        self.microphone.as_deref()
    }

    pub fn attach_graph(&mut self, guard: TaskGuard) {
        if let Some(previous) = self.graph.replace(guard) {
            warn!("Replacing processing graph {}", previous.name());
        }
    }

    pub fn attach_timer(&mut self, guard: TaskGuard) {
        self.timers.push(guard);
    }

    pub fn release_microphone(&mut self) {
        self.microphone = None;
    }

    /// Release everything: processing graph and timers first, then the
    /// microphone they were reading from.
    pub fn release_all(&mut self) {
        self.graph = None;
        self.timers.clear();
        self.release_microphone();
    }

    pub fn is_empty(&self) -> bool {
        self.microphone.is_none() && self.graph.is_none() && self.timers.is_empty()
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        self.release_all();
    }
}
