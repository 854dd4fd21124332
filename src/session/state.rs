use serde::{Deserialize, Serialize};

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    Idle,
    Recording,
    Paused,
}

/// User-initiated requests on a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Begin a fresh session, discarding previous segments
    Start,
    /// Continue a paused session
    Resume,
    Pause,
    /// End capture, keeping the segments and the published artifact
    Stop,
    Delete,
}

impl RecordingState {
    /// Next state for `command`, or `InvalidTransition`.
    ///
    /// `has_audio` is whether any segment has been finalized; it only
    /// matters for deleting from `Idle`.
    pub fn apply(self, command: Command, has_audio: bool) -> Result<RecordingState, SessionError> {
        use Command::*;
        use RecordingState::*;

        let next = match (self, command) {
            (Idle, Start) => Recording,
            (Paused, Resume) => Recording,
            (Recording, Pause) => Paused,
            (Recording | Paused, Stop) => Idle,
            (Recording | Paused, Delete) => Idle,
            (Idle, Delete) if has_audio => Idle,
            (state, command) => return Err(SessionError::InvalidTransition { state, command }),
        };

        Ok(next)
    }

    pub fn can_delete(self, has_audio: bool) -> bool {
        self.apply(Command::Delete, has_audio).is_ok()
    }
}
