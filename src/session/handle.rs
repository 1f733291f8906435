use tokio::sync::{mpsc, oneshot, watch};

use super::controller::{Command, Reply};
use super::state::{SessionSnapshot, SessionState};
use crate::error::SessionError;

/// Cloneable front end of a running `SessionController`
///
/// Requests are queued in order. Each method returns once the controller has
/// accepted or rejected the request:
/// - `start` resolves as soon as the credential fetch is under way
/// - `speak` and `interrupt` resolve when the avatar service answers
/// - `stop` resolves when teardown is complete
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub(super) fn new(
        commands: mpsc::Sender<Command>,
        snapshot: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        Self { commands, snapshot }
    }

    /// Begin a new session; `script` is spoken automatically once the stream is ready
    pub async fn start(&self, script: Option<String>) -> Result<(), SessionError> {
        self.request(|reply| Command::Start { script, reply }).await
    }

    pub async fn speak(&self, text: impl Into<String>) -> Result<(), SessionError> {
        let text = text.into();
        self.request(|reply| Command::Speak { text, reply }).await
    }

    pub async fn interrupt(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Interrupt { reply }).await
    }

    pub async fn stop(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.borrow().state
    }

    /// A receiver that observes every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Wait until a snapshot satisfies `predicate` (checked against the current one first)
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, SessionError> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| SessionError::ControllerGone)?;
        Ok(snapshot.clone())
    }

    pub async fn wait_for_state(&self, state: SessionState) -> Result<SessionSnapshot, SessionError> {
        self.wait_for(|s| s.state == state).await
    }

    async fn request(&self, make: impl FnOnce(Reply) -> Command) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| SessionError::ControllerGone)?;
        response.await.map_err(|_| SessionError::ControllerGone)?
    }
}
