//! Error types for the capture-encode-transmit pipeline.
//!
//! Every fallible stage has its own typed error. [`StreamError`] is the
//! terminal outcome of a streaming session and carries the stage error
//! that ended it. [`StopReason`] is its copyable discriminant, used for
//! status reporting.

use std::io;

use thiserror::Error;

// ── StopReason ───────────────────────────────────────────────────

/// Why a session left the `Streaming` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The caller signalled cancellation. Not an error.
    CallerCancelled,
    /// The TCP connection could not be established.
    ConnectFailed,
    /// The capture source failed or faulted.
    CaptureFailed,
    /// The frame could not be encoded.
    EncodeFailed,
    /// The connection reported a write error.
    WriteFailed,
    /// The connection accepted only part of a message.
    ShortWrite,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CallerCancelled => write!(f, "cancelled"),
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::CaptureFailed => write!(f, "capture failed"),
            Self::EncodeFailed => write!(f, "encode failed"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::ShortWrite => write!(f, "short write"),
        }
    }
}

// ── StreamError ──────────────────────────────────────────────────

/// Terminal failure of a streaming session.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The target could not be reached. No session was started.
    #[error("cannot connect to {target}: {source}")]
    ConnectFailed {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("capture failed: {0}")]
    CaptureFailed(#[from] CaptureError),

    #[error("encode failed: {0}")]
    EncodeFailed(#[from] EncodeError),

    #[error("write failed: {0}")]
    WriteFailed(#[source] io::Error),

    /// Fewer bytes than the full message reached the connection.
    #[error("short write: {written} of {expected} bytes written")]
    ShortWrite { written: usize, expected: usize },

    /// The payload cannot be described by a `u32` length prefix.
    #[error("payload too large for a u32 length prefix: {size} bytes")]
    PayloadTooLarge { size: usize },
}

impl StreamError {
    /// The terminal reason this error maps to.
    pub fn reason(&self) -> StopReason {
        match self {
            Self::ConnectFailed { .. } => StopReason::ConnectFailed,
            Self::CaptureFailed(_) => StopReason::CaptureFailed,
            Self::EncodeFailed(_) => StopReason::EncodeFailed,
            Self::WriteFailed(_) | Self::PayloadTooLarge { .. } => StopReason::WriteFailed,
            Self::ShortWrite { .. } => StopReason::ShortWrite,
        }
    }
}

// ── CaptureError ─────────────────────────────────────────────────

/// Failure of a [`CaptureSource`](crate::capture::CaptureSource).
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The requested display index is not currently active.
    #[error("display {index} is not active ({count} active)")]
    InvalidDisplay { index: usize, count: usize },

    /// The backend returned no image.
    #[error("capture returned an empty image")]
    EmptyImage,

    /// The platform capture API failed.
    #[error("capture backend error: {0}")]
    Backend(#[from] io::Error),

    /// Screen capture is not compiled in for this build.
    #[error("screen capture is not supported in this build")]
    Unsupported,

    /// The capture backend panicked.
    #[error("capture fault: {0}")]
    Fault(String),
}

// ── EncodeError ──────────────────────────────────────────────────

/// Failure of the [`JpegEncoder`](crate::encoder::JpegEncoder).
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("frame has zero dimensions ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    /// The pixel buffer cannot hold `height` rows of `stride` bytes.
    #[error("pixel buffer too short: need {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("jpeg codec error: {0}")]
    Codec(#[from] image::ImageError),

    /// The encoder panicked.
    #[error("encode fault: {0}")]
    Fault(String),
}

// ── CodecError ───────────────────────────────────────────────────

/// Failure while decoding the length-prefixed wire format.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("payload too large for a u32 length prefix: {size} bytes")]
    PayloadTooLarge { size: usize },

    #[error("connection error: {0}")]
    Io(#[from] io::Error),
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
