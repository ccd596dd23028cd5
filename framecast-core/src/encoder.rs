//! JPEG frame encoder.
//!
//! Converts a raw [`Frame`] to packed RGB and compresses it with the
//! `image` crate's baseline JPEG encoder at [`JPEG_QUALITY`].

use std::io::Cursor;

use image::codecs::jpeg;
use image::{ImageBuffer, RgbImage};

use crate::error::EncodeError;
use crate::frame::{Frame, PixelFormat};

/// JPEG quality (1-100). Fixed at maximum fidelity; not configurable.
pub const JPEG_QUALITY: u8 = 100;

// ── EncodedPayload ───────────────────────────────────────────────

/// A compressed frame ready to be framed and written.
#[derive(Debug, Clone)]
pub struct EncodedPayload {
    /// Source width in pixels.
    pub width: u32,
    /// Source height in pixels.
    pub height: u32,
    /// JPEG bytes.
    pub data: Vec<u8>,
}

impl EncodedPayload {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ── JpegEncoder ──────────────────────────────────────────────────

/// Stateless JPEG encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegEncoder;

impl JpegEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Quality every frame is encoded at.
    pub fn quality(&self) -> u8 {
        JPEG_QUALITY
    }

    /// Encode `frame` as JPEG.
    pub fn encode(&self, frame: &Frame) -> Result<EncodedPayload, EncodeError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(EncodeError::EmptyFrame {
                width: frame.width,
                height: frame.height,
            });
        }
        let expected = frame.required_len();
        if frame.stride < frame.row_len() || frame.data.len() < expected {
            return Err(EncodeError::BufferTooShort {
                expected: expected.max(frame.row_len() * frame.height as usize),
                actual: frame.data.len(),
            });
        }

        let rgb = to_rgb(frame);
        let img: RgbImage = ImageBuffer::from_raw(frame.width, frame.height, rgb).ok_or(
            EncodeError::BufferTooShort {
                expected: frame.width as usize * frame.height as usize * 3,
                actual: 0,
            },
        )?;

        let mut buf = Cursor::new(Vec::new());
        let encoder = jpeg::JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
        img.write_with_encoder(encoder)?;

        Ok(EncodedPayload {
            width: frame.width,
            height: frame.height,
            data: buf.into_inner(),
        })
    }
}

/// Repack any supported layout into tightly packed RGB.
fn to_rgb(frame: &Frame) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(frame.width as usize * frame.height as usize * 3);
    for y in 0..frame.height {
        let row = frame.row(y);
        match frame.format {
            PixelFormat::Rgb8 => rgb.extend_from_slice(row),
            PixelFormat::Rgba8 => {
                for px in row.chunks_exact(4) {
                    rgb.extend_from_slice(&px[..3]);
                }
            }
            PixelFormat::Bgra8 => {
                for px in row.chunks_exact(4) {
                    rgb.extend_from_slice(&[px[2], px[1], px[0]]);
                }
            }
        }
    }
    rgb
}

// ── Tests ────────────────────────────────────────────────────────
