use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::remote::VoiceSettings;
use crate::render::VideoSource;

/// Lifecycle of the remote avatar session
///
/// `Idle -> Acquiring -> Connecting -> Active <-> Speaking -> Ending -> Idle`,
/// with any non-idle state falling back to `Idle` on a remote disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    /// No session; only a start request is accepted
    Idle,
    /// Credential fetch in flight
    Acquiring,
    /// Remote session handshake in flight
    Connecting,
    /// Video source bound, no speech outstanding
    Active,
    /// A speech directive is outstanding
    Speaking,
    /// Close command sent
    Ending,
}

impl SessionState {
    /// States in which the video source is live and may be rendered
    pub fn has_video(self) -> bool {
        matches!(self, SessionState::Active | SessionState::Speaking)
    }

    pub fn is_idle(self) -> bool {
        self == SessionState::Idle
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Acquiring => "acquiring",
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Speaking => "speaking",
            SessionState::Ending => "ending",
        };
        f.write_str(name)
    }
}

/// The single live connection to the avatar service
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub presenter_id: String,
    pub voice: VoiceSettings,
    pub started_at: DateTime<Utc>,
    credential: Option<String>,
    video: Option<VideoSource>,
}

impl Session {
    pub fn new(presenter_id: String, voice: VoiceSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            presenter_id,
            voice,
            started_at: Utc::now(),
            credential: None,
            video: None,
        }
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    /// Store the credential; returns false if one was already bound
    pub fn bind_credential(&mut self, credential: String) -> bool {
        if self.credential.is_some() {
            return false;
        }
        self.credential = Some(credential);
        true
    }

    pub fn video(&self) -> Option<&VideoSource> {
        self.video.as_ref()
    }

    pub fn bind_video(&mut self, source: VideoSource) {
        self.video = Some(source);
    }

    pub fn unbind_video(&mut self) -> Option<VideoSource> {
        self.video.take()
    }
}

/// Observable view of the controller, published on every change
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub session_id: Option<Uuid>,
    /// Bound only while the session has a live stream
    pub video: Option<VideoSource>,
    /// Most recent error surfaced to the user; cleared on the next start
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    pub fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            session_id: None,
            video: None,
            last_error: None,
        }
    }

    /// The video source, if the session is in a state that may render it
    pub fn live_video(&self) -> Option<&VideoSource> {
        self.video.as_ref().filter(|_| self.state.has_video())
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}
