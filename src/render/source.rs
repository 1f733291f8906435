use std::sync::Arc;
use tokio::sync::watch;

use crate::compositor::FrameBuffer;

/// Read-only view of a live video stream: always yields the newest frame
///
/// Cloning is cheap; every clone observes the same stream. The stream has
/// ended once the producing `VideoFeed` is dropped.
#[derive(Debug, Clone)]
pub struct VideoSource {
    frames: watch::Receiver<Option<Arc<FrameBuffer>>>,
}

/// Producer side of a `VideoSource`, held by whoever decodes or renders frames
#[derive(Debug)]
pub struct VideoFeed {
    frames: watch::Sender<Option<Arc<FrameBuffer>>>,
}

impl VideoSource {
    /// Create a connected feed/source pair with no frame yet
    pub fn channel() -> (VideoFeed, VideoSource) {
        let (tx, rx) = watch::channel(None);
        (VideoFeed { frames: tx }, VideoSource { frames: rx })
    }

    /// Newest frame, or `None` before the first frame arrives
    pub fn latest(&self) -> Option<Arc<FrameBuffer>> {
        self.frames.borrow().clone()
    }

    /// Dimensions of the newest frame
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.frames.borrow().as_ref().map(|f| f.dimensions())
    }

    pub fn is_ended(&self) -> bool {
        self.frames.has_changed().is_err()
    }
}

impl VideoFeed {
    /// Replace the current frame; a no-op once every source is gone
    pub fn push(&self, frame: FrameBuffer) {
        self.frames.send_replace(Some(Arc::new(frame)));
    }

    pub fn has_viewers(&self) -> bool {
        !self.frames.is_closed()
    }
}
