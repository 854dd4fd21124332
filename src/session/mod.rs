//! Recording session management
//!
//! This module provides the `CaptureController` that manages:
//! - The idle/recording/paused state machine
//! - One segment recorder and live visualizer per capture pass
//! - Scoped microphone, analysis and timer resources
//! - Preview scheduling on every pause/stop
//! - Session statistics and observer notifications

mod config;
mod controller;
pub mod observer;
mod recorder;
mod resources;
pub mod state;
mod stats;
mod visualizer;

pub use config::SessionConfig;
pub use controller::{CaptureController, CaptureControllerBuilder};
pub use observer::{ChannelObserver, SessionEvent, SessionObserver};
pub use recorder::SegmentRecorder;
pub use resources::{MicrophoneGuard, ResourceScope, TaskGuard};
pub use state::{Command, RecordingState};
pub use stats::SessionStats;
pub use visualizer::LiveVisualizer;
