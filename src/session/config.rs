use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::remote::{Quality, VoiceSettings};

/// Configuration for a presenter session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Avatar identity requested from the service (e.g., "Wayne_20240711")
    pub presenter_id: String,

    /// Voice identity, speaking rate and emotion
    pub voice: VoiceSettings,

    /// Requested stream quality
    pub quality: Quality,

    /// Spoken language code
    pub language: String,

    /// Delay between stream-ready and the automatic speech of the default script
    /// Default: 1 second
    pub auto_speak_delay: Duration,

    /// Upper bound on each remote call; `None` waits indefinitely
    pub command_timeout: Option<Duration>,

    /// Commands buffered between handles and the controller
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            presenter_id: "Wayne_20240711".to_string(),
            voice: VoiceSettings::default(),
            quality: Quality::High,
            language: "en".to_string(),
            auto_speak_delay: Duration::from_secs(1),
            command_timeout: None,
            command_buffer: 16,
        }
    }
}
