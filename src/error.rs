//! Error taxonomy for the presenter pipeline
//!
//! - `ConfigurationError` - the boundary endpoint cannot run (missing secret)
//! - `CredentialError` - the credential fetch was rejected or malformed
//! - `RemoteCommandError` - the avatar service refused or dropped a command
//! - `SessionError` - what callers of the session controller see
//!
//! The compositor has no error path; `FrameError` only guards buffer construction.

use crate::session::SessionState;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{0} not configured")]
    MissingSecret(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// Non-2xx from the boundary endpoint; `message` is its `error` field verbatim
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("malformed credential response: {0}")]
    Malformed(String),

    #[error("credential request failed: {0}")]
    Transport(String),

    #[error("credential request timed out after {0:?}")]
    TimedOut(Duration),
}

/// The four imperative commands of the avatar service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    Open,
    Speak,
    Interrupt,
    Close,
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteCommand::Open => "open-session",
            RemoteCommand::Speak => "submit-speech",
            RemoteCommand::Interrupt => "interrupt-speech",
            RemoteCommand::Close => "close-session",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteCommandError {
    #[error("{command} rejected: {message}")]
    Rejected {
        command: RemoteCommand,
        message: String,
    },

    #[error("{command} timed out after {after:?}")]
    TimedOut {
        command: RemoteCommand,
        after: Duration,
    },
}

impl RemoteCommandError {
    pub fn rejected(command: RemoteCommand, message: impl Into<String>) -> Self {
        RemoteCommandError::Rejected {
            command,
            message: message.into(),
        }
    }

    pub fn command(&self) -> RemoteCommand {
        match self {
            RemoteCommandError::Rejected { command, .. } => *command,
            RemoteCommandError::TimedOut { command, .. } => *command,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot {action} while session is {state}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },

    #[error("speech text is empty")]
    EmptySpeech,

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Remote(#[from] RemoteCommandError),

    #[error("session controller is no longer running")]
    ControllerGone,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("expected {expected} bytes for a {width}x{height} RGBA frame, got {actual}")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}
