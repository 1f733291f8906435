//! Boundary to the remote avatar rendering service
//!
//! The service is consumed through four commands (`AvatarService`) and reports
//! back through a single `Notification` channel handed over at open time.
//! `LoopbackAvatarService` is a local stand-in that renders synthetic frames.

mod messages;
mod simulated;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RemoteCommandError;

pub use messages::{Notification, OpenSessionRequest, Quality, SpeechMode, SpeechRequest, VoiceSettings};
pub use simulated::{LoopbackAvatarService, LoopbackConfig};

/// Sending half of the per-session notification channel
pub type NotificationSender = mpsc::UnboundedSender<Notification>;

/// Imperative command surface of the avatar service
///
/// Notifications may be sent on `events` at any time after `open_session` is
/// called, including before it returns.
#[async_trait]
pub trait AvatarService: Send + Sync {
    async fn open_session(
        &self,
        request: OpenSessionRequest,
        events: NotificationSender,
    ) -> Result<(), RemoteCommandError>;

    async fn submit_speech(&self, request: SpeechRequest) -> Result<(), RemoteCommandError>;

    async fn interrupt_speech(&self) -> Result<(), RemoteCommandError>;

    async fn close_session(&self) -> Result<(), RemoteCommandError>;
}
