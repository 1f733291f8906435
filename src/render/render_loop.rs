use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info};

use super::display::DisplaySurface;
use crate::compositor::{apply_chroma_key_into, EffectConfig, FrameBuffer};
use crate::session::SessionSnapshot;

/// Default pacing: one composited frame per ~60Hz display refresh
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Composites the live video source onto a display surface
///
/// The loop owns its frame ticker. It runs only while the session has a live
/// stream and the effect is enabled; dropping the ticker is how it stops, so a
/// halted loop has no pending frame callback. With the effect disabled the
/// surface is switched to raw passthrough instead.
pub struct RenderLoop<D: DisplaySurface> {
    surface: D,
    session: watch::Receiver<SessionSnapshot>,
    effect: watch::Receiver<EffectConfig>,
    frame_interval: Duration,
    ticker: Option<Interval>,
    scratch: FrameBuffer,
    frames_rendered: u64,
}

impl<D: DisplaySurface> RenderLoop<D> {
    pub fn new(
        surface: D,
        session: watch::Receiver<SessionSnapshot>,
        effect: watch::Receiver<EffectConfig>,
        frame_interval: Duration,
    ) -> Self {
        Self {
            surface,
            session,
            effect,
            frame_interval,
            ticker: None,
            scratch: FrameBuffer::new(0, 0),
            frames_rendered: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn surface(&self) -> &D {
        &self.surface
    }

    pub fn into_surface(self) -> D {
        self.surface
    }

    /// Re-evaluate session and effect state, starting or halting the loop
    ///
    /// Must be called from within a tokio runtime.
    pub fn sync(&mut self) {
        let source = self.session.borrow().live_video().cloned();
        let effect = *self.effect.borrow();

        match source {
            Some(_) if effect.enabled => {
                self.surface.show_source(None);
                self.resume();
            }
            Some(source) => {
                self.halt();
                self.surface.show_source(Some(&source));
            }
            None => {
                self.halt();
                self.surface.show_source(None);
            }
        }
    }

    /// Composite and present the newest frame
    ///
    /// Returns false when the loop should not schedule another iteration.
    pub fn render_frame(&mut self) -> bool {
        let effect = *self.effect.borrow();
        if !effect.enabled {
            return false;
        }

        let source = match self.session.borrow().live_video() {
            Some(source) => source.clone(),
            None => return false,
        };
        if source.is_ended() {
            debug!("Video source ended");
            return false;
        }

        // Stream is live but the first frame has not arrived yet
        let Some(frame) = source.latest() else {
            return true;
        };

        let (width, height) = frame.dimensions();
        if self.surface.dimensions() != (width, height) {
            self.surface.resize(width, height);
        }

        apply_chroma_key_into(&frame, effect.threshold, &mut self.scratch);
        self.surface.present(&self.scratch);
        self.frames_rendered += 1;

        true
    }

    /// Drive the loop until the session or effect channel closes
    ///
    /// Returns the loop so callers can inspect the surface afterwards.
    pub async fn run(mut self) -> Self {
        self.sync();

        loop {
            tokio::select! {
                changed = self.session.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.sync();
                }
                changed = self.effect.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.sync();
                }
                _ = next_tick(&mut self.ticker) => {
                    if !self.render_frame() {
                        self.halt();
                    }
                }
            }
        }

        self.halt();
        info!("Render loop finished after {} frames", self.frames_rendered);
        self
    }

    fn resume(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let mut ticker = interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
        info!("Render loop started ({:?} per frame)", self.frame_interval);
    }

    fn halt(&mut self) {
        if self.ticker.take().is_some() {
            info!("Render loop stopped");
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => futures::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{HeadlessSurface, VideoSource};
    use crate::session::SessionState;

    fn live(state: SessionState, source: &VideoSource) -> SessionSnapshot {
        SessionSnapshot {
            state,
            session_id: None,
            video: Some(source.clone()),
            last_error: None,
        }
    }

    #[tokio::test]
    async fn test_sync_starts_only_with_live_video_and_effect() {
        let (feed, source) = VideoSource::channel();
        feed.push(FrameBuffer::filled(4, 4, [0, 255, 0, 255]));
        let (session_tx, session_rx) = watch::channel(SessionSnapshot::idle());
        let (effect_tx, effect_rx) = watch::channel(EffectConfig::default());

        let mut render = RenderLoop::new(
            HeadlessSurface::new(0, 0),
            session_rx,
            effect_rx,
            DEFAULT_FRAME_INTERVAL,
        );

        render.sync();
        assert!(!render.is_running());

        session_tx.send_replace(live(SessionState::Connecting, &source));
        render.sync();
        assert!(!render.is_running());

        session_tx.send_replace(live(SessionState::Speaking, &source));
        render.sync();
        assert!(render.is_running());

        effect_tx.send_replace(EffectConfig {
            enabled: false,
            ..EffectConfig::default()
        });
        render.sync();
        assert!(!render.is_running());
        assert!(render.surface().is_passthrough());

        session_tx.send_replace(SessionSnapshot::idle());
        render.sync();
        assert!(!render.surface().is_passthrough());
    }

    #[tokio::test]
    async fn test_render_frame_keys_and_resizes() {
        let (feed, source) = VideoSource::channel();
        let mut frame = FrameBuffer::filled(3, 2, [0, 255, 0, 255]);
        frame.set_pixel(1, 1, [255, 0, 0, 255]);
        feed.push(frame);

        let (_session_tx, session_rx) = watch::channel(live(SessionState::Active, &source));
        let (_effect_tx, effect_rx) = watch::channel(EffectConfig::default());
        let mut render = RenderLoop::new(
            HeadlessSurface::new(1280, 720),
            session_rx,
            effect_rx,
            DEFAULT_FRAME_INTERVAL,
        );

        assert!(render.render_frame());

        let surface = render.surface();
        assert_eq!(surface.dimensions(), (3, 2));
        let presented = surface.last_frame().unwrap();
        assert_eq!(presented.transparent_pixels(), 5);
        assert_eq!(presented.pixel(1, 1), Some([255, 0, 0, 255]));
    }

    #[tokio::test]
    async fn test_render_frame_waits_for_first_frame() {
        let (_feed, source) = VideoSource::channel();
        let (_session_tx, session_rx) = watch::channel(live(SessionState::Active, &source));
        let (_effect_tx, effect_rx) = watch::channel(EffectConfig::default());
        let mut render = RenderLoop::new(
            HeadlessSurface::default(),
            session_rx,
            effect_rx,
            DEFAULT_FRAME_INTERVAL,
        );

        assert!(render.render_frame());
        assert_eq!(render.frames_rendered(), 0);
    }

    #[tokio::test]
    async fn test_render_frame_stops_when_source_ends() {
        let (feed, source) = VideoSource::channel();
        feed.push(FrameBuffer::new(2, 2));
        let (_session_tx, session_rx) = watch::channel(live(SessionState::Active, &source));
        let (_effect_tx, effect_rx) = watch::channel(EffectConfig::default());
        let mut render = RenderLoop::new(
            HeadlessSurface::default(),
            session_rx,
            effect_rx,
            DEFAULT_FRAME_INTERVAL,
        );

        drop(feed);
        assert!(!render.render_frame());
    }
}
