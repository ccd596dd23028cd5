//! The capture-encode-transmit loop.
//!
//! Each iteration:
//!
//! 1. Stop if cancelled.
//! 2. Re-read the selected display and reset it to 0 (persisting the
//!    correction) if it is no longer active.
//! 3. Capture a [`Frame`] on the blocking pool.
//! 4. Encode it as JPEG on the blocking pool.
//! 5. Build `[u32 BE length | payload]` in one buffer.
//! 6. Stop without writing if cancelled.
//! 7. Write the buffer; a write error or a short write is terminal.
//!
//! Cancellation is checked at steps 1 and 6 and also races the write in
//! step 7, so a write stalled on a peer that stopped reading still ends
//! when the caller stops. The connection is then closed with the message
//! cut short.
//! Panics inside the capture backend or the encoder are caught at the
//! `spawn_blocking` boundary and become [`CaptureError::Fault`] or
//! [`EncodeError::Fault`].

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::{CaptureSource, resolve_display};
use crate::codec::{WireMessage, write_message};
use crate::encoder::{EncodedPayload, JpegEncoder};
use crate::error::{CaptureError, EncodeError, StopReason, StreamError, panic_message};
use crate::frame::Frame;
use crate::state::SessionPhase;

// ── DisplaySettings ──────────────────────────────────────────────

/// Configuration provider owning the persisted display selection.
///
/// The transmitter reads the index once per iteration and never keeps
/// its own copy, so a front end may change it while streaming.
pub trait DisplaySettings: Send + Sync + 'static {
    /// Currently selected display.
    fn display_index(&self) -> usize;

    /// Store a corrected display index.
    fn persist_display_index(&self, index: usize) -> io::Result<()>;
}

// ── Transmitter ──────────────────────────────────────────────────

/// Runs one streaming session over an already connected writer.
pub struct Transmitter<S, D> {
    source: Arc<S>,
    settings: Arc<D>,
    encoder: JpegEncoder,
    cancel: CancellationToken,
    phase: Option<Arc<watch::Sender<SessionPhase>>>,
    frames_sent: u64,
}

impl<S, D> Transmitter<S, D>
where
    S: CaptureSource,
    D: DisplaySettings,
{
    pub fn new(source: Arc<S>, settings: Arc<D>, cancel: CancellationToken) -> Self {
        Self {
            source,
            settings,
            encoder: JpegEncoder::new(),
            cancel,
            phase: None,
            frames_sent: 0,
        }
    }

    /// Publish phase changes on `phase`.
    pub fn with_phase(mut self, phase: Arc<watch::Sender<SessionPhase>>) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Stream until cancelled or until any step fails.
    ///
    /// Returns `Ok(())` only when the caller cancelled. The connection is
    /// shut down and dropped before this returns, whatever the outcome.
    pub async fn run<W>(mut self, mut conn: W) -> Result<(), StreamError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.publish(SessionPhase::Streaming { frames_sent: 0 });
        info!("streaming started");

        let result = self.stream(&mut conn).await;

        if let Err(e) = conn.shutdown().await {
            debug!("connection shutdown: {e}");
        }
        drop(conn);

        let reason = match &result {
            Ok(()) => StopReason::CallerCancelled,
            Err(e) => e.reason(),
        };
        match &result {
            Ok(()) => info!(frames = self.frames_sent, "streaming stopped: {reason}"),
            Err(e) => warn!(frames = self.frames_sent, "streaming stopped: {e}"),
        }
        self.publish(SessionPhase::Stopped(reason));
        result
    }

    async fn stream<W>(&mut self, conn: &mut W) -> Result<(), StreamError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let frame = self.capture().await?;
            let payload = self.encode(frame).await?;

            let size = payload.len();
            let message =
                WireMessage::new(payload.data).map_err(|_| StreamError::PayloadTooLarge { size })?;
            let buf = message.to_bytes();

            if self.cancel.is_cancelled() {
                debug!("cancelled before write; dropping {size} byte frame");
                return Ok(());
            }

            let written = tokio::select! {
                written = write_message(conn, &buf) => written.map_err(StreamError::WriteFailed)?,
                _ = self.cancel.cancelled() => {
                    debug!("cancelled during write; abandoning {size} byte frame");
                    return Ok(());
                }
            };
            if written != buf.len() {
                return Err(StreamError::ShortWrite {
                    written,
                    expected: buf.len(),
                });
            }

            self.frames_sent += 1;
            debug!(frame = self.frames_sent, bytes = written, "frame sent");
            self.publish(SessionPhase::Streaming {
                frames_sent: self.frames_sent,
            });
        }
    }

    /// Resolve the display and capture it on the blocking pool.
    async fn capture(&self) -> Result<Frame, CaptureError> {
        let source = Arc::clone(&self.source);
        let settings = Arc::clone(&self.settings);

        tokio::task::spawn_blocking(move || {
            let selected = settings.display_index();
            let active = source.active_display_count()?;
            let (index, corrected) = resolve_display(selected, active);
            if corrected {
                warn!("display {selected} not active ({active} active); using display {index}");
                if let Err(e) = settings.persist_display_index(index) {
                    warn!("failed to persist display {index}: {e}");
                }
            }

            let frame = source.capture_display(index)?;
            if frame.is_empty() {
                return Err(CaptureError::EmptyImage);
            }
            Ok(frame)
        })
        .await
        .unwrap_or_else(|e| Err(CaptureError::Fault(join_fault(e))))
    }

    async fn encode(&self, frame: Frame) -> Result<EncodedPayload, EncodeError> {
        let encoder = self.encoder;
        tokio::task::spawn_blocking(move || encoder.encode(&frame))
            .await
            .unwrap_or_else(|e| Err(EncodeError::Fault(join_fault(e))))
    }

    fn publish(&self, phase: SessionPhase) {
        if let Some(tx) = &self.phase {
            tx.send_replace(phase);
        }
    }
}

/// Describe why a blocking task did not return.
pub(crate) fn join_fault(e: JoinError) -> String {
    if e.is_panic() {
        panic_message(e.into_panic().as_ref())
    } else {
        "task cancelled".to_string()
    }
}

// ── Tests ────────────────────────────────────────────────────────
