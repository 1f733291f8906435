//! Video sources, display surfaces and the compositing render loop

mod display;
mod render_loop;
mod source;

pub use display::{DisplaySurface, HeadlessSurface};
pub use render_loop::{RenderLoop, DEFAULT_FRAME_INTERVAL};
pub use source::{VideoFeed, VideoSource};
