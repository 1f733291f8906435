pub mod compositor;
pub mod config;
pub mod credential;
pub mod error;
pub mod event_log;
pub mod http;
pub mod remote;
pub mod render;
pub mod session;

pub use compositor::{apply_chroma_key, EffectConfig, FrameBuffer};
pub use config::Config;
pub use credential::{CredentialClient, CredentialSource, StaticCredential};
pub use error::{ConfigurationError, CredentialError, RemoteCommandError, SessionError};
pub use event_log::{EventLog, LogEntry};
pub use http::{create_router, AppState};
pub use remote::{AvatarService, LoopbackAvatarService, Notification};
pub use render::{DisplaySurface, HeadlessSurface, RenderLoop, VideoSource};
pub use session::{SessionController, SessionHandle, SessionSnapshot, SessionState};
