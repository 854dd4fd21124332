use std::time::Duration;
use tokio::sync::mpsc;
use tracing::error;

use crate::error::SessionError;
use crate::preview::PreviewArtifact;

/// Notification hooks for the host of a recording session.
///
/// Hooks run synchronously on the engine's tasks and must not call back
/// into the controller.
pub trait SessionObserver: Send + Sync {
    /// A new preview artifact was published
    fn on_record_ready(&self, artifact: &PreviewArtifact);

    /// The user deleted the recording
    fn on_delete(&self);

    fn on_error(&self, error: &SessionError) {
        error!("Recording session error: {}", error);
    }

    /// Periodic elapsed-time update while recording
    fn on_elapsed(&self, _elapsed: Duration) {}
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    RecordReady(PreviewArtifact),
    Deleted,
    Error(SessionError),
    Elapsed(Duration),
}

/// Forwards every notification as a [`SessionEvent`] over a channel.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: SessionEvent) {
        // A dropped receiver means nobody is listening anymore
        let _ = self.tx.send(event);
    }
}

impl SessionObserver for ChannelObserver {
    fn on_record_ready(&self, artifact: &PreviewArtifact) {
        self.forward(SessionEvent::RecordReady(artifact.clone()));
    }

    fn on_delete(&self) {
        self.forward(SessionEvent::Deleted);
    }

    fn on_error(&self, error: &SessionError) {
        error!("Recording session error: {}", error);
        self.forward(SessionEvent::Error(error.clone()));
    }

    fn on_elapsed(&self, elapsed: Duration) {
        self.forward(SessionEvent::Elapsed(elapsed));
    }
}
