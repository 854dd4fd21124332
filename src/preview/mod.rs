//! Preview artifact generation
//!
//! This module turns the session's segment list into the single published
//! preview:
//! - Merge and decode of all segments
//! - WAV encoding and peak extraction
//! - Generation-stamped publication with stale-run discard
//! - Object-URL style handles for playback

mod artifact;
mod coordinator;
mod store;

pub use artifact::PreviewArtifact;
pub use coordinator::{PreviewCoordinator, PreviewOutcome};
pub use store::ArtifactStore;
