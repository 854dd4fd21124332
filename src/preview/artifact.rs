use std::sync::Arc;
use std::time::Duration;

use crate::audio::PeakBuffer;

/// The published, playable result of merging every segment of a session.
#[derive(Debug, Clone)]
pub struct PreviewArtifact {
    pub data: Arc<[u8]>,
    /// Object-reference handle registered in the artifact store
    pub source_url: String,
    /// Elapsed recording time when the run was scheduled
    pub duration_ms: u64,
    pub mime_type: String,
    /// Generation of the preview run that produced it
    pub generation: u64,
    pub peaks: PeakBuffer,
}

impl PreviewArtifact {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
