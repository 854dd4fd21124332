use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::RecordingState;

/// Snapshot of a recording session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub state: RecordingState,

    /// When the current session's first pass started
    pub started_at: Option<DateTime<Utc>>,

    /// Finalized segments plus the in-progress pass, in milliseconds
    pub elapsed_ms: u64,

    /// Number of finalized segments
    pub segment_count: usize,

    /// Encoded bytes across finalized segments
    pub captured_bytes: usize,

    /// Handle of the currently published preview, if any
    pub published_url: Option<String>,

    /// Generation of the most recently scheduled preview run
    pub preview_generation: u64,
}
