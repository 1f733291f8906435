use crate::error::FrameError;

/// Bytes per RGBA8 pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// One rendered video frame: a `width` x `height` grid of RGBA8 pixels, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Create a fully transparent black frame
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; Self::byte_len(width, height)],
        }
    }

    /// Create a frame where every pixel has the same color
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(Self::byte_len(width, height))
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// Wrap raw RGBA bytes, rejecting buffers whose length does not match the dimensions
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        let expected = Self::byte_len(width, height);
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn pixel_count(&self) -> usize {
        self.data.len() / BYTES_PER_PIXEL
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Returns `None` when the coordinate is outside the frame
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let offset = self.offset(x, y)?;
        let px = &self.data[offset..offset + BYTES_PER_PIXEL];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Out-of-bounds writes are ignored
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if let Some(offset) = self.offset(x, y) {
            self.data[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&rgba);
        }
    }

    /// Fill an axis-aligned rectangle, clipped to the frame
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, rgba: [u8; 4]) {
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        for row in y.min(y_end)..y_end {
            for col in x.min(x_end)..x_end {
                self.set_pixel(col, row, rgba);
            }
        }
    }

    /// Number of pixels whose alpha channel is 0
    pub fn transparent_pixels(&self) -> usize {
        self.data
            .chunks_exact(BYTES_PER_PIXEL)
            .filter(|px| px[3] == 0)
            .count()
    }

    /// Reallocate to new dimensions if they differ; contents are zeroed on change
    pub(crate) fn reshape(&mut self, width: u32, height: u32) {
        if self.dimensions() != (width, height) {
            self.width = width;
            self.height = height;
            self.data.clear();
            self.data.resize(Self::byte_len(width, height), 0);
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL)
    }

    fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba_rejects_wrong_length() {
        let err = FrameBuffer::from_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            FrameError::LengthMismatch {
                width: 2,
                height: 2,
                expected: 16,
                actual: 15,
            }
        );
    }

    #[test]
    fn test_pixel_access_is_row_major() {
        let mut frame = FrameBuffer::new(3, 2);
        frame.set_pixel(2, 1, [1, 2, 3, 4]);

        assert_eq!(frame.pixel(2, 1), Some([1, 2, 3, 4]));
        assert_eq!(&frame.as_bytes()[20..24], &[1, 2, 3, 4]);
        assert_eq!(frame.pixel(3, 0), None);
    }

    #[test]
    fn test_fill_rect_clips_to_frame() {
        let mut frame = FrameBuffer::filled(4, 4, [0, 0, 0, 255]);
        frame.fill_rect(2, 2, 10, 10, [255, 255, 255, 255]);

        assert_eq!(frame.pixel(1, 1), Some([0, 0, 0, 255]));
        assert_eq!(frame.pixel(3, 3), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_zero_sized_frame() {
        let frame = FrameBuffer::filled(0, 0, [0, 255, 0, 255]);
        assert!(frame.is_empty());
        assert_eq!(frame.pixel_count(), 0);
        assert_eq!(frame.pixel(0, 0), None);
    }
}
