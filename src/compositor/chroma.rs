// Chroma-key compositor
//
// Removes the avatar service's saturated-green studio background by making
// matching pixels transparent. The cutoff is a hard threshold with no
// softening, so pixels on the presenter's outline can show a green fringe.

use serde::{Deserialize, Serialize};

use super::frame::{FrameBuffer, BYTES_PER_PIXEL};

/// Calibrated against the service's green studio background
pub const DEFAULT_THRESHOLD: u8 = 90;

/// Background-removal settings, read by the render loop on every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    /// When false, the raw video source is shown instead of composited frames
    pub enabled: bool,
    /// Color-proximity threshold for the background test
    pub threshold: u8,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// True when a pixel counts as background at the given threshold
#[inline]
pub fn is_background(red: u8, green: u8, blue: u8, threshold: u8) -> bool {
    green > threshold && red < threshold && blue < threshold
}

/// Composite `source` into a new frame of the same dimensions
pub fn apply_chroma_key(source: &FrameBuffer, threshold: u8) -> FrameBuffer {
    let mut output = FrameBuffer::new(source.width(), source.height());
    apply_chroma_key_into(source, threshold, &mut output);
    output
}

/// Composite `source` into `output`, reshaping `output` to the source dimensions first
///
/// Background pixels get alpha 0; every other pixel keeps its color and is made
/// fully opaque.
pub fn apply_chroma_key_into(source: &FrameBuffer, threshold: u8, output: &mut FrameBuffer) {
    output.reshape(source.width(), source.height());
    if source.is_empty() {
        return;
    }

    for (src, dst) in source
        .as_bytes()
        .chunks_exact(BYTES_PER_PIXEL)
        .zip(output.as_bytes_mut().chunks_exact_mut(BYTES_PER_PIXEL))
    {
        let (red, green, blue) = (src[0], src[1], src[2]);
        dst[0] = red;
        dst[1] = green;
        dst[2] = blue;
        dst[3] = if is_background(red, green, blue, threshold) {
            0
        } else {
            u8::MAX
        };
    }
}
