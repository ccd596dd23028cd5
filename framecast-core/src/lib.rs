//! # framecast-core
//!
//! Streams periodic screen captures to a remote listener over one TCP
//! connection, each JPEG image preceded by a 4-byte big-endian length.
//!
//! This crate contains:
//! - **Capture**: the `CaptureSource` trait and the `scrap`-backed `ScrapSource`
//! - **Encoder**: `JpegEncoder`, fixed at maximum quality
//! - **Codec**: `WireMessage` and `FrameCodec` for the length-prefixed stream
//! - **Transmitter**: the capture-encode-write loop with cooperative cancellation
//! - **Controller**: `StreamController::start` / `stop` entry points
//! - **State**: the observable `SessionPhase`
//! - **Error**: `StreamError` and its per-stage causes, `thiserror`-based

pub mod capture;
pub mod codec;
pub mod controller;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod state;
pub mod transmitter;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use capture::{CaptureSource, ScrapSource};
pub use codec::{FrameCodec, MAX_PAYLOAD_SIZE, PREFIX_LEN, WireMessage};
pub use controller::StreamController;
pub use encoder::{EncodedPayload, JPEG_QUALITY, JpegEncoder};
pub use error::{CaptureError, CodecError, EncodeError, StopReason, StreamError};
pub use frame::{Frame, PixelFormat};
pub use state::SessionPhase;
pub use transmitter::{DisplaySettings, Transmitter};
