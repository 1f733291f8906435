use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::handle::SessionHandle;
use super::script::Script;
use super::state::{Session, SessionSnapshot, SessionState};
use crate::credential::CredentialSource;
use crate::error::{CredentialError, RemoteCommand, RemoteCommandError, SessionError};
use crate::event_log::EventLog;
use crate::remote::{AvatarService, Notification, OpenSessionRequest, SpeechRequest};

pub(super) type Reply = oneshot::Sender<Result<(), SessionError>>;

/// User-issued requests, processed strictly in the order they were sent
pub(super) enum Command {
    Start { script: Option<String>, reply: Reply },
    Speak { text: String, reply: Reply },
    Interrupt { reply: Reply },
    Stop { reply: Reply },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpeechOrigin {
    User,
    Auto,
}

/// Results of network calls and timers, posted back by the tasks running them
///
/// `epoch` identifies the session cycle that issued the call; anything from an
/// older cycle is stale.
enum Completion {
    Credential {
        epoch: u64,
        result: Result<String, CredentialError>,
    },
    Opened {
        epoch: u64,
        result: Result<(), RemoteCommandError>,
    },
    Spoke {
        epoch: u64,
        speech: u64,
        origin: SpeechOrigin,
        result: Result<(), RemoteCommandError>,
        reply: Option<Reply>,
    },
    Interrupted {
        epoch: u64,
        result: Result<(), RemoteCommandError>,
        reply: Reply,
    },
    Closed {
        epoch: u64,
        result: Result<(), RemoteCommandError>,
        reply: Option<Reply>,
    },
    AutoSpeak {
        epoch: u64,
    },
}

/// Owns the single avatar session and drives its state machine
///
/// Runs as one task that handles a single input at a time: user commands,
/// remote notifications, and completions of the network calls it spawned.
/// Network calls never block the loop, so a remote disconnect is handled even
/// while an open or close call is still pending.
pub struct SessionController {
    config: SessionConfig,
    credentials: Arc<dyn CredentialSource>,
    service: Arc<dyn AvatarService>,
    log: EventLog,

    state: SessionState,
    session: Option<Session>,
    epoch: u64,
    pending_script: Option<Script>,
    last_error: Option<String>,

    /// Sequence number of the most recently dispatched speech
    speech: u64,
    /// Whether speaking-started has been seen since that dispatch
    speech_started: bool,
    /// Speaking-stopped notifications still owed by interrupted speech
    stale_stops: u32,

    commands: mpsc::Receiver<Command>,
    notifications: Option<mpsc::UnboundedReceiver<Notification>>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    /// Create an idle controller and the handle used to command it
    pub fn new(
        config: SessionConfig,
        credentials: Arc<dyn CredentialSource>,
        service: Arc<dyn AvatarService>,
        log: EventLog,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands) = mpsc::channel(config.command_buffer.max(1));
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (snapshot, snapshot_rx) = watch::channel(SessionSnapshot::idle());

        let controller = Self {
            config,
            credentials,
            service,
            log,
            state: SessionState::Idle,
            session: None,
            epoch: 0,
            pending_script: None,
            last_error: None,
            speech: 0,
            speech_started: false,
            stale_stops: 0,
            commands,
            notifications: None,
            completions_tx,
            completions,
            snapshot,
        };

        (controller, SessionHandle::new(commands_tx, snapshot_rx))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the controller on its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process inputs until every handle is dropped
    pub async fn run(mut self) {
        info!("Session controller started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(completion) = self.completions.recv() => self.handle_completion(completion),
                notification = next_notification(&mut self.notifications) => match notification {
                    Some(notification) => self.handle_notification(notification),
                    None => self.notifications_closed(),
                },
            }
        }

        self.shutdown().await;
        info!("Session controller stopped");
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { script, reply } => {
                let _ = reply.send(self.start(script));
            }
            Command::Speak { text, reply } => self.speak(text, reply),
            Command::Interrupt { reply } => self.interrupt(reply),
            Command::Stop { reply } => self.stop(reply),
        }
    }

    fn start(&mut self, script: Option<String>) -> Result<(), SessionError> {
        if !self.state.is_idle() {
            return Err(self.reject("start"));
        }

        self.epoch += 1;
        self.last_error = None;
        self.pending_script = script.map(Script::new).filter(|s| !s.is_blank());

        let session = Session::new(self.config.presenter_id.clone(), self.config.voice.clone());
        info!("Starting session {}", session.id);
        self.session = Some(session);
        self.log.push("Starting session...");
        self.transition(SessionState::Acquiring);

        let credentials = Arc::clone(&self.credentials);
        let limit = self.config.command_timeout;
        let epoch = self.epoch;
        self.spawn_call(async move {
            let call = credentials.fetch_token();
            let result = match limit {
                Some(after) => timeout(after, call)
                    .await
                    .unwrap_or_else(|_| Err(CredentialError::TimedOut(after))),
                None => call.await,
            };
            Completion::Credential { epoch, result }
        });

        Ok(())
    }

    fn speak(&mut self, text: String, reply: Reply) {
        if self.state != SessionState::Active {
            let _ = reply.send(Err(self.reject("speak")));
            return;
        }

        let script = Script::new(text);
        if script.is_blank() {
            let _ = reply.send(Err(SessionError::EmptySpeech));
            return;
        }

        self.log.push("Sending speech request...");
        self.dispatch_speech(script, SpeechOrigin::User, Some(reply));
    }

    fn interrupt(&mut self, reply: Reply) {
        if self.state != SessionState::Speaking {
            let _ = reply.send(Err(self.reject("interrupt")));
            return;
        }

        // Optimistic: don't wait for the service to confirm with speaking-stopped
        if self.speech_started {
            self.stale_stops += 1;
        }
        self.speech_started = false;
        self.transition(SessionState::Active);

        let service = Arc::clone(&self.service);
        let limit = self.config.command_timeout;
        let epoch = self.epoch;
        self.spawn_call(async move {
            let result = bounded(RemoteCommand::Interrupt, limit, service.interrupt_speech()).await;
            Completion::Interrupted {
                epoch,
                result,
                reply,
            }
        });
    }

    fn stop(&mut self, reply: Reply) {
        if !self.state.has_video() {
            let _ = reply.send(Err(self.reject("stop")));
            return;
        }

        self.log.push("Ending session...");
        self.transition(SessionState::Ending);

        let service = Arc::clone(&self.service);
        let limit = self.config.command_timeout;
        let epoch = self.epoch;
        self.spawn_call(async move {
            let result = bounded(RemoteCommand::Close, limit, service.close_session()).await;
            Completion::Closed {
                epoch,
                result,
                reply: Some(reply),
            }
        });
    }

    fn dispatch_speech(&mut self, script: Script, origin: SpeechOrigin, reply: Option<Reply>) {
        self.speech += 1;
        self.speech_started = false;
        self.transition(SessionState::Speaking);

        let request = SpeechRequest::repeat(script.into_text());
        let service = Arc::clone(&self.service);
        let limit = self.config.command_timeout;
        let epoch = self.epoch;
        let speech = self.speech;
        self.spawn_call(async move {
            let result = bounded(RemoteCommand::Speak, limit, service.submit_speech(request)).await;
            Completion::Spoke {
                epoch,
                speech,
                origin,
                result,
                reply,
            }
        });
    }

    fn reject(&self, action: &'static str) -> SessionError {
        self.log
            .push(format!("Cannot {} while session is {}", action, self.state));
        SessionError::InvalidState {
            action,
            state: self.state,
        }
    }

    // ------------------------------------------------------------------
    // Completions
    // ------------------------------------------------------------------

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Credential { epoch, result } => self.on_credential(epoch, result),
            Completion::Opened { epoch, result } => self.on_opened(epoch, result),
            Completion::Spoke {
                epoch,
                speech,
                origin,
                result,
                reply,
            } => self.on_spoke(epoch, speech, origin, result, reply),
            Completion::Interrupted {
                epoch,
                result,
                reply,
            } => {
                let result = result.map_err(SessionError::from);
                match &result {
                    Ok(()) => self.log.push("Interrupted speech"),
                    Err(e) => {
                        self.log.push(format!("Interrupt failed: {}", e));
                        self.surface_error(epoch, e);
                    }
                }
                let _ = reply.send(result);
            }
            Completion::Closed {
                epoch,
                result,
                reply,
            } => self.on_closed(epoch, result, reply),
            Completion::AutoSpeak { epoch } => self.on_auto_speak(epoch),
        }
    }

    fn on_credential(&mut self, epoch: u64, result: Result<String, CredentialError>) {
        if !self.is_current(epoch, SessionState::Acquiring) {
            debug!("Ignoring stale credential result (epoch {})", epoch);
            return;
        }

        let token = match result {
            Ok(token) => token,
            Err(e) => {
                self.fail_to_idle(e.into());
                return;
            }
        };
        self.log.push("Got access token");

        let Some(session) = self.session.as_mut() else {
            warn!("Credential arrived without a session");
            return;
        };
        session.bind_credential(token.clone());
        let request = OpenSessionRequest {
            credential: token,
            presenter_id: session.presenter_id.clone(),
            voice: session.voice.clone(),
            quality: self.config.quality,
            language: self.config.language.clone(),
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.notifications = Some(events_rx);
        self.log.push(format!(
            "Creating session with avatar: {}, voice: {}",
            request.presenter_id, request.voice.voice_id
        ));
        self.transition(SessionState::Connecting);

        let service = Arc::clone(&self.service);
        let limit = self.config.command_timeout;
        self.spawn_call(async move {
            let result = bounded(
                RemoteCommand::Open,
                limit,
                service.open_session(request, events_tx),
            )
            .await;
            Completion::Opened { epoch, result }
        });
    }

    fn on_opened(&mut self, epoch: u64, result: Result<(), RemoteCommandError>) {
        if epoch != self.epoch || self.state.is_idle() {
            debug!("Ignoring open result for ended session (epoch {})", epoch);
            return;
        }

        match result {
            Ok(()) => self.log.push("Session created successfully"),
            Err(e) if self.state == SessionState::Connecting => self.fail_to_idle(e.into()),
            Err(e) => {
                // Stream already up; the service will report a disconnect if it matters
                self.log.push(format!("Open reported failure while {}: {}", self.state, e));
            }
        }
    }

    fn on_spoke(
        &mut self,
        epoch: u64,
        speech: u64,
        origin: SpeechOrigin,
        result: Result<(), RemoteCommandError>,
        reply: Option<Reply>,
    ) {
        let result = result.map_err(SessionError::from);
        match (&result, origin) {
            (Ok(()), SpeechOrigin::User) => self.log.push("Speech request sent"),
            (Ok(()), SpeechOrigin::Auto) => self.log.push("Auto-speak started"),
            (Err(e), SpeechOrigin::User) => {
                self.log.push(format!("Speech error: {}", e));
                self.surface_error(epoch, e);
            }
            (Err(e), SpeechOrigin::Auto) => self.log.push(format!("Auto-speak failed: {}", e)),
        }

        // A rejected directive never started; nothing is outstanding any more
        if result.is_err()
            && self.is_current(epoch, SessionState::Speaking)
            && speech == self.speech
            && !self.speech_started
        {
            self.transition(SessionState::Active);
        }

        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
    }

    fn on_closed(&mut self, epoch: u64, result: Result<(), RemoteCommandError>, reply: Option<Reply>) {
        if let Err(e) = &result {
            // The service may already have dropped the session on its side
            self.log.push(format!("Stop error (may be normal): {}", e));
        }

        if self.is_current(epoch, SessionState::Ending) {
            self.teardown();
            self.log.push("Session ended");
        }

        if let Some(reply) = reply {
            let _ = reply.send(result.map_err(SessionError::from));
        }
    }

    fn on_auto_speak(&mut self, epoch: u64) {
        if epoch != self.epoch {
            return;
        }
        let Some(script) = self.pending_script.take() else {
            return;
        };

        if self.state != SessionState::Active {
            self.log
                .push(format!("Auto-speak skipped: session is {}", self.state));
            return;
        }

        self.log.push(format!(
            "Auto-speaking script... ({} words, ~{}s)",
            script.word_count(),
            script.estimated_duration().as_secs()
        ));
        self.dispatch_speech(script, SpeechOrigin::Auto, None);
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    fn handle_notification(&mut self, notification: Notification) {
        debug!("Notification {} while {}", notification, self.state);

        match notification {
            Notification::StreamReady(source) => {
                if self.state != SessionState::Connecting {
                    debug!("Ignoring stream-ready while {}", self.state);
                    return;
                }

                self.log.push("Stream ready!");
                if let Some(session) = self.session.as_mut() {
                    session.bind_video(source);
                }
                self.transition(SessionState::Active);

                if self.pending_script.is_some() {
                    let delay = self.config.auto_speak_delay;
                    let epoch = self.epoch;
                    self.spawn_call(async move {
                        sleep(delay).await;
                        Completion::AutoSpeak { epoch }
                    });
                }
            }
            Notification::StreamDisconnected => {
                if self.state.is_idle() {
                    return;
                }
                self.log.push("Stream disconnected");
                self.teardown();
            }
            Notification::SpeakingStarted => {
                if self.state.has_video() {
                    self.speech_started = true;
                    self.log.push("Avatar started talking");
                    self.transition(SessionState::Speaking);
                } else {
                    debug!("Ignoring speaking-started while {}", self.state);
                }
            }
            Notification::SpeakingStopped => {
                if self.stale_stops > 0 {
                    self.stale_stops -= 1;
                    debug!("Ignoring speaking-stopped from interrupted speech");
                } else if self.state == SessionState::Speaking {
                    self.log.push("Avatar stopped talking");
                    self.transition(SessionState::Active);
                } else {
                    // No speech outstanding
                    debug!("Ignoring speaking-stopped while {}", self.state);
                }
            }
        }
    }

    fn notifications_closed(&mut self) {
        self.notifications = None;
        if !self.state.is_idle() {
            self.log.push("Stream disconnected (notification channel closed)");
            self.teardown();
        }
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    fn is_current(&self, epoch: u64, expected: SessionState) -> bool {
        epoch == self.epoch && self.state == expected
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!("Session state {} -> {}", self.state, next);
        }
        self.state = next;
        self.publish();
    }

    fn publish(&self) {
        self.snapshot.send_replace(SessionSnapshot {
            state: self.state,
            session_id: self.session.as_ref().map(|s| s.id),
            video: self.session.as_ref().and_then(|s| s.video().cloned()),
            last_error: self.last_error.clone(),
        });
    }

    fn surface_error(&mut self, epoch: u64, error: &SessionError) {
        if epoch == self.epoch {
            self.last_error = Some(error.to_string());
            self.publish();
        }
    }

    fn fail_to_idle(&mut self, error: SessionError) {
        let message = error.to_string();
        self.log.push(format!("Error: {}", message));
        self.last_error = Some(message);
        self.teardown();
    }

    /// Drop the session and its video binding and return to `Idle`
    fn teardown(&mut self) {
        self.notifications = None;
        self.pending_script = None;
        self.speech_started = false;
        self.stale_stops = 0;
        if let Some(mut session) = self.session.take() {
            if session.unbind_video().is_some() {
                debug!("Video source unbound for session {}", session.id);
            }
        }
        self.transition(SessionState::Idle);
    }

    async fn shutdown(&mut self) {
        if matches!(
            self.state,
            SessionState::Connecting | SessionState::Active | SessionState::Speaking
        ) {
            self.log.push("Ending session on shutdown...");
            let limit = self.config.command_timeout;
            if let Err(e) = bounded(RemoteCommand::Close, limit, self.service.close_session()).await {
                warn!("Stop error during shutdown: {}", e);
            }
        }

        if !self.state.is_idle() {
            self.teardown();
        }
    }

    fn spawn_call<F>(&self, call: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(call.await);
        });
    }
}

async fn next_notification(
    notifications: &mut Option<mpsc::UnboundedReceiver<Notification>>,
) -> Option<Notification> {
    match notifications {
        Some(rx) => rx.recv().await,
        None => futures::future::pending().await,
    }
}

/// Apply the optional command timeout to a remote call
async fn bounded<F>(
    command: RemoteCommand,
    limit: Option<Duration>,
    call: F,
) -> Result<(), RemoteCommandError>
where
    F: Future<Output = Result<(), RemoteCommandError>>,
{
    match limit {
        Some(after) => timeout(after, call)
            .await
            .unwrap_or_else(|_| Err(RemoteCommandError::TimedOut { command, after })),
        None => call.await,
    }
}
