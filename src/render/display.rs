use tracing::debug;

use super::source::VideoSource;
use crate::compositor::FrameBuffer;

/// Where composited frames end up
///
/// Implementations are driven from a single render task, so they only need to
/// be `Send`.
pub trait DisplaySurface: Send {
    /// Current width and height in pixels
    fn dimensions(&self) -> (u32, u32);

    /// Resize the drawable area to match the incoming video
    fn resize(&mut self, width: u32, height: u32);

    /// Draw one composited frame
    fn present(&mut self, frame: &FrameBuffer);

    /// Show the raw video source directly (effect disabled), or clear it with `None`
    fn show_source(&mut self, source: Option<&VideoSource>);
}

/// Display that keeps the last presented frame and counts presentations
///
/// Used by the `present` command and by tests.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    width: u32,
    height: u32,
    frames_presented: u64,
    last_frame: Option<FrameBuffer>,
    passthrough: Option<VideoSource>,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn last_frame(&self) -> Option<&FrameBuffer> {
        self.last_frame.as_ref()
    }

    /// Whether raw video is currently shown instead of composited frames
    pub fn is_passthrough(&self) -> bool {
        self.passthrough.is_some()
    }
}

impl DisplaySurface for HeadlessSurface {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        debug!("Display resized to {}x{}", width, height);
        self.width = width;
        self.height = height;
    }

    fn present(&mut self, frame: &FrameBuffer) {
        self.frames_presented += 1;
        match self.last_frame.as_mut() {
            Some(last) => last.clone_from(frame),
            None => self.last_frame = Some(frame.clone()),
        }

        if self.frames_presented % 300 == 0 {
            debug!(
                "Presented {} frames ({} of {} pixels keyed out in latest)",
                self.frames_presented,
                frame.transparent_pixels(),
                frame.pixel_count()
            );
        }
    }

    fn show_source(&mut self, source: Option<&VideoSource>) {
        self.passthrough = source.cloned();
    }
}
