//! Presenter session lifecycle
//!
//! This module provides the `SessionController` state machine that manages:
//! - Credential acquisition through a `CredentialSource`
//! - Opening and closing the remote avatar session
//! - Speech dispatch, automatic script playback and interruption
//! - Reacting to stream and speaking notifications from the service
//!
//! Observers (render loop, CLI) follow the controller through `SessionSnapshot`.

mod config;
mod controller;
mod handle;
mod script;
mod state;

pub use config::SessionConfig;
pub use controller::SessionController;
pub use handle::SessionHandle;
pub use script::{Script, WORDS_PER_MINUTE};
pub use state::{Session, SessionSnapshot, SessionState};
