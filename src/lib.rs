pub mod audio;
pub mod config;
pub mod error;
pub mod preview;
pub mod render;
pub mod session;

pub use audio::{
    AudioBackendConfig, AudioDecoder, AudioFile, AudioMerger, ChunkEncoder, DecodedBuffer,
    EncoderFactory, FileInput, MediaDecoder, MediaDevices, MediaStream, PcmFrame, PeakBuffer,
    Segment, SignalInput, StreamFormat,
};
pub use config::Config;
pub use error::{CaptureError, PreviewError, SessionError};
pub use preview::{ArtifactStore, PreviewArtifact, PreviewCoordinator, PreviewOutcome};
pub use render::{render_peaks, ImageSurface, SharedSurface, Surface};
pub use session::{
    CaptureController, ChannelObserver, Command, RecordingState, SessionConfig, SessionEvent,
    SessionObserver, SessionStats,
};
