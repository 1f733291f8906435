//! Frame buffers and the chroma-key transform
//!
//! `apply_chroma_key` is a pure per-pixel function: same source and threshold,
//! same output, with output dimensions always equal to the source's.

mod chroma;
mod frame;

pub use chroma::{apply_chroma_key, apply_chroma_key_into, is_background, EffectConfig, DEFAULT_THRESHOLD};
pub use frame::{FrameBuffer, BYTES_PER_PIXEL};
