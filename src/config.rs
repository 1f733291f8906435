use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::compositor::EffectConfig;
use crate::event_log::DEFAULT_CAPACITY;
use crate::remote::{Quality, VoiceSettings};
use crate::render::DEFAULT_FRAME_INTERVAL;
use crate::session::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub credential: CredentialConfig,
    #[serde(default)]
    pub presenter: PresenterConfig,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub effect: EffectConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Boundary endpoint the client fetches tokens from
    pub endpoint: String,
    /// Upstream token-creation API called by the boundary endpoint
    pub upstream_url: String,
    /// Environment variable holding the API secret
    pub secret_env: String,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3000/api/session-token".to_string(),
            upstream_url: "https://api.heygen.com/v1/streaming.create_token".to_string(),
            secret_env: "HEYGEN_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PresenterConfig {
    pub presenter_id: String,
    pub voice_id: String,
    pub voice_rate: f32,
    pub voice_emotion: Option<String>,
    pub quality: Quality,
    pub language: String,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            presenter_id: session.presenter_id,
            voice_id: session.voice.voice_id,
            voice_rate: session.voice.rate,
            voice_emotion: session.voice.emotion,
            quality: session.quality,
            language: session.language,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub auto_speak_delay_ms: u64,
    /// Unset: remote calls may wait forever
    pub command_timeout_ms: Option<u64>,
    /// Default script spoken once the stream is ready
    pub script: Option<String>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            auto_speak_delay_ms: 1000,
            command_timeout_ms: None,
            script: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub frame_interval_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: DEFAULT_FRAME_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub capacity: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Session controller settings assembled from the presenter and session sections
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            presenter_id: self.presenter.presenter_id.clone(),
            voice: VoiceSettings {
                voice_id: self.presenter.voice_id.clone(),
                rate: self.presenter.voice_rate,
                emotion: self.presenter.voice_emotion.clone(),
            },
            quality: self.presenter.quality,
            language: self.presenter.language.clone(),
            auto_speak_delay: Duration::from_millis(self.session.auto_speak_delay_ms),
            command_timeout: self.session.command_timeout_ms.map(Duration::from_millis),
            ..SessionConfig::default()
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.render.frame_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[service]
name = "avatar-stage"

[service.http]
bind = "127.0.0.1"
port = 3000

[presenter]
presenter_id = "Anna_public_3_20240108"
quality = "medium"

[session]
command_timeout_ms = 5000

[effect]
threshold = 100
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let cfg = Config::load(path).unwrap();

        assert_eq!(cfg.service.http.port, 3000);
        assert_eq!(cfg.credential.secret_env, "HEYGEN_API_KEY");
        assert!(cfg.effect.enabled);
        assert_eq!(cfg.effect.threshold, 100);
        assert_eq!(cfg.log.capacity, 10);

        let session = cfg.session_config();
        assert_eq!(session.presenter_id, "Anna_public_3_20240108");
        assert_eq!(session.quality, Quality::Medium);
        assert_eq!(session.auto_speak_delay, Duration::from_secs(1));
        assert_eq!(session.command_timeout, Some(Duration::from_secs(5)));
        assert_eq!(cfg.frame_interval(), DEFAULT_FRAME_INTERVAL);
    }
}
