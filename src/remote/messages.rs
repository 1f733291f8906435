use serde::{Deserialize, Serialize};
use std::fmt;

use crate::render::VideoSource;

/// Requested stream quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
}

/// Voice used by the presenter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub voice_id: String,
    /// Speaking rate multiplier (1.0 = normal)
    pub rate: f32,
    /// Optional delivery style (e.g., "excited", "broadcaster")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice_id: "1bd001e7e50f421d891986aad5158bc8".to_string(),
            rate: 1.0,
            emotion: Some("excited".to_string()),
        }
    }
}

/// Parameters of the open-session command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSessionRequest {
    pub credential: String,
    pub presenter_id: String,
    pub voice: VoiceSettings,
    pub quality: Quality,
    pub language: String,
}

/// How the service should treat the submitted text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechMode {
    /// Speak the text verbatim
    Repeat,
}

/// A speech directive; immutable once submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub mode: SpeechMode,
}

impl SpeechRequest {
    pub fn repeat(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: SpeechMode::Repeat,
        }
    }
}

/// Inbound notifications from the avatar service
#[derive(Debug, Clone)]
pub enum Notification {
    /// The video stream is live
    StreamReady(VideoSource),
    /// The service dropped the stream; authoritative over local state
    StreamDisconnected,
    SpeakingStarted,
    SpeakingStopped,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Notification::StreamReady(_) => "stream-ready",
            Notification::StreamDisconnected => "stream-disconnected",
            Notification::SpeakingStarted => "speaking-started",
            Notification::SpeakingStopped => "speaking-stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_request_serialization() {
        let json = serde_json::to_string(&SpeechRequest::repeat("hello")).unwrap();
        assert_eq!(json, r#"{"text":"hello","mode":"repeat"}"#);
    }

    #[test]
    fn test_quality_deserialization() {
        let quality: Quality = serde_json::from_str(r#""medium""#).unwrap();
        assert_eq!(quality, Quality::Medium);
    }

    #[test]
    fn test_voice_without_emotion() {
        let voice = VoiceSettings {
            voice_id: "v".to_string(),
            rate: 1.5,
            emotion: None,
        };
        let json = serde_json::to_string(&voice).unwrap();
        assert!(!json.contains("emotion"));
    }
}
