//! In-memory frame buffer.

use super::Display;
use crate::error::{Result, VmError};

/// Default plane width in pixels.
pub const DEFAULT_WIDTH: usize = 64;

/// Default plane height in pixels.
pub const DEFAULT_HEIGHT: usize = 32;

/// A monochrome pixel plane stored one byte per pixel.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    /// Create a blank `width × height` plane.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
        }
    }

    /// Turn every pixel off.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Pixel at `(x, y)`, `false` outside the plane.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.pixels[self.width * y + x] != 0
    }

    /// Rows of the plane, top first.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.pixels.chunks(self.width.max(1))
    }

    /// Raw pixel bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Number of lit pixels.
    pub fn lit(&self) -> usize {
        self.pixels.iter().filter(|p| **p != 0).count()
    }

    /// Render as text, one line per row.
    pub fn to_text(&self, on: char, off: char) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for row in self.rows() {
            out.extend(row.iter().map(|p| if *p != 0 { on } else { off }));
            out.push('\n');
        }
        out
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl Display for FrameBuffer {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn get(&self, offset: usize) -> Result<u8> {
        self.pixels
            .get(offset)
            .copied()
            .ok_or(VmError::OutOfRangeAddress(offset))
    }

    fn set(&mut self, offset: usize, value: u8) -> Result<()> {
        let pixel = self
            .pixels
            .get_mut(offset)
            .ok_or(VmError::OutOfRangeAddress(offset))?;
        *pixel = u8::from(value != 0);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        FrameBuffer::clear(self);
        Ok(())
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("lit", &self.lit())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let mut fb = FrameBuffer::default();
        fb.set(64 * 2 + 3, 1).unwrap();

        assert_eq!(fb.get(64 * 2 + 3), Ok(1));
        assert!(fb.pixel(3, 2));
        assert!(!fb.pixel(2, 3));
        assert_eq!(fb.lit(), 1);
    }

    #[test]
    fn test_set_normalises() {
        let mut fb = FrameBuffer::new(4, 4);
        fb.set(0, 0xFF).unwrap();
        assert_eq!(fb.get(0), Ok(1));
    }

    #[test]
    fn test_out_of_range() {
        let mut fb = FrameBuffer::new(8, 4);
        assert_eq!(fb.get(32), Err(VmError::OutOfRangeAddress(32)));
        assert_eq!(fb.set(32, 1), Err(VmError::OutOfRangeAddress(32)));
        assert!(!fb.pixel(8, 0));
    }

    #[test]
    fn test_to_text() {
        let mut fb = FrameBuffer::new(3, 2);
        fb.set(0, 1).unwrap();
        fb.set(5, 1).unwrap();
        assert_eq!(fb.to_text('#', '.'), "#..\n..#\n");
    }

    #[test]
    fn test_clear() {
        let mut fb = FrameBuffer::new(2, 2);
        fb.set(3, 1).unwrap();
        fb.clear();
        assert_eq!(fb.lit(), 0);
    }
}
