//! Raw captured frames.
//!
//! A [`Frame`] is produced anew by every capture and moved into the
//! encoder, so no two pipeline stages ever share pixel memory.

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for raw captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha (scrap / DXGI default).
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

// ── Frame ────────────────────────────────────────────────────────

/// One raw screen image.
///
/// `data` holds `height` rows of `stride` bytes each. `stride` may be
/// larger than `width * bytes_per_pixel` when the capture backend pads
/// rows.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row pitch in bytes.
    pub stride: usize,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Raw pixel data.
    pub data: Vec<u8>,
}

impl Frame {
    /// Builds a frame whose rows are tightly packed.
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width as usize * format.bytes_per_pixel(),
            format,
            data,
        }
    }

    /// Bytes in one row without padding.
    pub fn row_len(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Bytes the buffer must hold for every row to be addressable.
    pub fn required_len(&self) -> usize {
        self.stride * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    /// Returns row `y` without its padding bytes.
    ///
    /// # Panics
    ///
    /// Panics if `y` is out of bounds or the buffer is shorter than
    /// [`required_len`](Self::required_len).
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.row_len()]
    }
}
