use std::sync::Arc;
use std::time::Duration;

/// One finalized capture pass: the platform-encoded bytes and their MIME type.
///
/// Segments are immutable; cloning shares the underlying bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    data: Arc<[u8]>,
    mime_type: String,
    duration: Duration,
}

impl Segment {
    /// `duration` is the wall-clock length of the capture pass.
    pub fn new(data: impl Into<Arc<[u8]>>, mime_type: impl Into<String>, duration: Duration) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
            duration,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn shared_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
