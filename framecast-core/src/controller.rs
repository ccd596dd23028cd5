//! Session entry points: [`StreamController::start`] and
//! [`StreamController::stop`].
//!
//! `start` connects, spawns the [`Transmitter`] on its own task and
//! waits for its terminal result. `stop` cancels the active session's
//! token; the loop notices before its next capture or write, or abandons
//! a write stalled on backpressure, closes the connection and `start`
//! returns `Ok(())`.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use framecast_core::{ScrapSource, StreamController, DisplaySettings};
//! # async fn example(settings: Arc<impl DisplaySettings>) {
//! let controller = Arc::new(StreamController::new(ScrapSource::new()));
//! let stopper = Arc::clone(&controller);
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     stopper.stop();
//! });
//! if let Err(e) = controller.start("127.0.0.1:56565", settings).await {
//!     eprintln!("stream ended: {e}");
//! }
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::CaptureSource;
use crate::error::{CaptureError, StopReason, StreamError};
use crate::state::SessionPhase;
use crate::transmitter::{DisplaySettings, Transmitter, join_fault};

/// Token of the session currently running, tagged so a finishing
/// session never clears its successor.
struct ActiveSession {
    id: u64,
    cancel: CancellationToken,
}

// ── StreamController ─────────────────────────────────────────────

/// Starts and stops streaming sessions for one capture source.
///
/// One session at a time is expected; the caller enforces that.
pub struct StreamController<S> {
    source: Arc<S>,
    active: Mutex<Option<ActiveSession>>,
    next_id: AtomicU64,
    phase: Arc<watch::Sender<SessionPhase>>,
}

impl<S: CaptureSource> StreamController<S> {
    pub fn new(source: S) -> Self {
        Self::with_shared_source(Arc::new(source))
    }

    pub fn with_shared_source(source: Arc<S>) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Idle);
        Self {
            source,
            active: Mutex::new(None),
            next_id: AtomicU64::new(0),
            phase: Arc::new(phase),
        }
    }

    /// The capture source sessions read from.
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Subscribe to phase changes.
    pub fn phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// Whether a session is between `start` and its terminal result.
    pub fn is_active(&self) -> bool {
        self.lock_active().is_some()
    }

    /// Connect to `target` (`host:port`) and stream until stopped.
    ///
    /// The display to capture is read from `settings` on every
    /// iteration. Returns `Ok(())` when the session ended through
    /// [`stop`](Self::stop), otherwise the error that ended it. A
    /// connection failure is returned before any loop is spawned.
    pub async fn start<D>(&self, target: &str, settings: Arc<D>) -> Result<(), StreamError>
    where
        D: DisplaySettings,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        *self.lock_active() = Some(ActiveSession {
            id,
            cancel: cancel.clone(),
        });

        self.phase.send_replace(SessionPhase::Connecting);
        info!("connecting to {target}");

        let conn = match TcpStream::connect(target).await {
            Ok(conn) => conn,
            Err(source) => {
                warn!("cannot connect to {target}: {source}");
                self.finish(id);
                self.phase
                    .send_replace(SessionPhase::Stopped(StopReason::ConnectFailed));
                return Err(StreamError::ConnectFailed {
                    target: target.to_string(),
                    source,
                });
            }
        };
        if let Err(e) = conn.set_nodelay(true) {
            debug!("set_nodelay: {e}");
        }
        info!("connected to {target}");

        let transmitter = Transmitter::new(Arc::clone(&self.source), settings, cancel)
            .with_phase(Arc::clone(&self.phase));
        let handle = tokio::spawn(transmitter.run(conn));

        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                // The loop task itself faulted; the connection went down with it.
                let err = StreamError::CaptureFailed(CaptureError::Fault(join_fault(e)));
                warn!("streaming task failed: {err}");
                self.phase.send_replace(SessionPhase::Stopped(err.reason()));
                Err(err)
            }
        };

        self.finish(id);
        result
    }

    /// Signal the active session to stop. Idempotent; a no-op when no
    /// session is active.
    pub fn stop(&self) {
        match self.lock_active().as_ref() {
            Some(session) if !session.cancel.is_cancelled() => {
                info!("stopping stream");
                session.cancel.cancel();
            }
            _ => debug!("stop: no active session"),
        }
    }

    fn finish(&self, id: u64) {
        let mut active = self.lock_active();
        if active.as_ref().is_some_and(|s| s.id == id) {
            *active = None;
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
