// Loopback avatar service
//
// Implements the avatar service contract in-process: it renders a simple
// presenter figure over a green studio background, raises stream-ready shortly
// after open, and reports speaking start/stop for each speech request based on
// its word count.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info};

use super::messages::{Notification, OpenSessionRequest, SpeechRequest};
use super::{AvatarService, NotificationSender};
use crate::compositor::FrameBuffer;
use crate::error::{RemoteCommand, RemoteCommandError};
use crate::render::{VideoFeed, VideoSource};

const STUDIO_GREEN: [u8; 4] = [0, 177, 64, 255];
const SUIT: [u8; 4] = [30, 40, 90, 255];
const SKIN: [u8; 4] = [224, 172, 105, 255];
const MOUTH: [u8; 4] = [120, 40, 40, 255];

/// Configuration for the loopback service
#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    /// Rendered frame size
    pub width: u32,
    pub height: u32,
    /// Time between rendered frames (default: ~30fps)
    pub frame_interval: Duration,
    /// Delay between open and stream-ready
    pub ready_delay: Duration,
    /// Simulated speaking time per word (default: 400ms, i.e. 150 words/minute)
    pub time_per_word: Duration,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 180,
            frame_interval: Duration::from_millis(33),
            ready_delay: Duration::from_millis(250),
            time_per_word: Duration::from_millis(400),
        }
    }
}

struct LiveStream {
    events: NotificationSender,
    speaking: Arc<AtomicBool>,
    frames_task: JoinHandle<()>,
    speech_task: Option<JoinHandle<()>>,
}

/// In-process avatar service producing synthetic green-screen video
pub struct LoopbackAvatarService {
    config: LoopbackConfig,
    stream: Mutex<Option<LiveStream>>,
}

impl LoopbackAvatarService {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config,
            stream: Mutex::new(None),
        }
    }

    /// Render one frame of the presenter; the mouth opens on alternate ticks while speaking
    pub fn render_frame(width: u32, height: u32, speaking: bool, tick: u64) -> FrameBuffer {
        let mut frame = FrameBuffer::filled(width, height, STUDIO_GREEN);

        let body_w = width / 3;
        let body_x = (width - body_w) / 2;
        let body_y = height * 3 / 5;
        frame.fill_rect(body_x, body_y, body_w, height - body_y, SUIT);

        let head_w = width / 6;
        let head_h = height / 3;
        let head_x = (width - head_w) / 2;
        let head_y = body_y.saturating_sub(head_h);
        frame.fill_rect(head_x, head_y, head_w, head_h, SKIN);

        let mouth_open = speaking && tick % 2 == 0;
        let mouth_h = if mouth_open { (head_h / 6).max(1) } else { 1 };
        frame.fill_rect(
            head_x + head_w / 4,
            head_y + head_h * 2 / 3,
            head_w / 2,
            mouth_h,
            MOUTH,
        );

        frame
    }

    fn spawn_frames(
        &self,
        feed: VideoFeed,
        source: VideoSource,
        events: NotificationSender,
        speaking: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        let config = self.config.clone();
        tokio::spawn(async move {
            sleep(config.ready_delay).await;
            feed.push(Self::render_frame(config.width, config.height, false, 0));
            if events.send(Notification::StreamReady(source)).is_err() {
                return;
            }
            info!("Loopback stream ready ({}x{})", config.width, config.height);

            let mut ticker = interval(config.frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut tick = 0u64;
            loop {
                ticker.tick().await;
                tick += 1;
                let frame = Self::render_frame(
                    config.width,
                    config.height,
                    speaking.load(Ordering::SeqCst),
                    tick,
                );
                feed.push(frame);
            }
        })
    }
}

impl Default for LoopbackAvatarService {
    fn default() -> Self {
        Self::new(LoopbackConfig::default())
    }
}

#[async_trait]
impl AvatarService for LoopbackAvatarService {
    async fn open_session(
        &self,
        request: OpenSessionRequest,
        events: NotificationSender,
    ) -> Result<(), RemoteCommandError> {
        if request.credential.trim().is_empty() {
            return Err(RemoteCommandError::rejected(
                RemoteCommand::Open,
                "invalid session token",
            ));
        }

        let mut stream = self.stream.lock().await;
        if stream.is_some() {
            return Err(RemoteCommandError::rejected(
                RemoteCommand::Open,
                "a session is already open",
            ));
        }

        info!(
            "Loopback session opened: avatar={}, voice={}, quality={:?}, language={}",
            request.presenter_id, request.voice.voice_id, request.quality, request.language
        );

        let (feed, source) = VideoSource::channel();
        let speaking = Arc::new(AtomicBool::new(false));
        let frames_task = self.spawn_frames(feed, source, events.clone(), Arc::clone(&speaking));

        *stream = Some(LiveStream {
            events,
            speaking,
            frames_task,
            speech_task: None,
        });

        Ok(())
    }

    async fn submit_speech(&self, request: SpeechRequest) -> Result<(), RemoteCommandError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or_else(|| {
            RemoteCommandError::rejected(RemoteCommand::Speak, "no active session")
        })?;

        if let Some(previous) = stream.speech_task.take() {
            previous.abort();
        }

        let words = request.text.split_whitespace().count() as u32;
        let duration = self.config.time_per_word * words.max(1);
        debug!("Loopback speaking {} words for {:?}", words, duration);

        stream.speaking.store(true, Ordering::SeqCst);
        let _ = stream.events.send(Notification::SpeakingStarted);

        let speaking = Arc::clone(&stream.speaking);
        let events = stream.events.clone();
        stream.speech_task = Some(tokio::spawn(async move {
            sleep(duration).await;
            speaking.store(false, Ordering::SeqCst);
            let _ = events.send(Notification::SpeakingStopped);
        }));

        Ok(())
    }

    async fn interrupt_speech(&self) -> Result<(), RemoteCommandError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or_else(|| {
            RemoteCommandError::rejected(RemoteCommand::Interrupt, "no active session")
        })?;

        if let Some(task) = stream.speech_task.take() {
            task.abort();
        }
        if stream.speaking.swap(false, Ordering::SeqCst) {
            let _ = stream.events.send(Notification::SpeakingStopped);
        }

        Ok(())
    }

    async fn close_session(&self) -> Result<(), RemoteCommandError> {
        let stream = self.stream.lock().await.take().ok_or_else(|| {
            RemoteCommandError::rejected(RemoteCommand::Close, "no active session")
        })?;

        stream.frames_task.abort();
        if let Some(task) = stream.speech_task {
            task.abort();
        }
        let _ = stream.events.send(Notification::StreamDisconnected);
        info!("Loopback session closed");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::apply_chroma_key;
    use crate::remote::{Quality, VoiceSettings};
    use tokio::sync::mpsc;

    fn open_request(credential: &str) -> OpenSessionRequest {
        OpenSessionRequest {
            credential: credential.to_string(),
            presenter_id: "presenter".to_string(),
            voice: VoiceSettings::default(),
            quality: Quality::Low,
            language: "en".to_string(),
        }
    }

    fn fast_config() -> LoopbackConfig {
        LoopbackConfig {
            width: 32,
            height: 18,
            frame_interval: Duration::from_millis(10),
            ready_delay: Duration::from_millis(5),
            time_per_word: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_rendered_background_is_keyed_out() {
        let frame = LoopbackAvatarService::render_frame(60, 30, false, 0);
        let keyed = apply_chroma_key(&frame, 90);

        assert_eq!(keyed.pixel(0, 0).map(|p| p[3]), Some(0));
        // center of the body
        assert_eq!(keyed.pixel(30, 28).map(|p| p[3]), Some(255));
        assert!(keyed.transparent_pixels() < keyed.pixel_count());
    }

    #[tokio::test]
    async fn test_open_rejects_blank_credential() {
        let service = LoopbackAvatarService::new(fast_config());
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = service.open_session(open_request(" "), tx).await.unwrap_err();
        assert_eq!(err.command(), RemoteCommand::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cycle_notifications() {
        let service = LoopbackAvatarService::new(fast_config());
        let (tx, mut rx) = mpsc::unbounded_channel();

        service.open_session(open_request("token"), tx).await.unwrap();
        match rx.recv().await {
            Some(Notification::StreamReady(source)) => {
                assert_eq!(source.dimensions(), Some((32, 18)));
            }
            other => panic!("expected stream-ready, got {:?}", other),
        }

        service
            .submit_speech(SpeechRequest::repeat("two words"))
            .await
            .unwrap();
        assert!(matches!(rx.recv().await, Some(Notification::SpeakingStarted)));
        assert!(matches!(rx.recv().await, Some(Notification::SpeakingStopped)));

        service.close_session().await.unwrap();
        assert!(matches!(rx.recv().await, Some(Notification::StreamDisconnected)));
        assert!(service.close_session().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_stops_speaking() {
        let service = LoopbackAvatarService::new(fast_config());
        let (tx, mut rx) = mpsc::unbounded_channel();

        service.open_session(open_request("token"), tx).await.unwrap();
        assert!(matches!(rx.recv().await, Some(Notification::StreamReady(_))));

        service
            .submit_speech(SpeechRequest::repeat("a long sentence to read out"))
            .await
            .unwrap();
        assert!(matches!(rx.recv().await, Some(Notification::SpeakingStarted)));

        service.interrupt_speech().await.unwrap();
        assert!(matches!(rx.recv().await, Some(Notification::SpeakingStopped)));

        // no second stop after the aborted timer would have fired
        sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }
}
