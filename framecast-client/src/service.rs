//! Streaming service: ties the configuration to a [`StreamController`].
//!
//! Reads the target from [`SharedConfig`], starts a session and logs
//! phase changes until the session ends. The controller handle doubles
//! as the stop handle for Ctrl-C.

use std::sync::Arc;

use framecast_core::{CaptureSource, SessionPhase, StreamController, StreamError};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::SharedConfig;

/// Frames between progress log lines.
const PROGRESS_INTERVAL: u64 = 100;

// ── StreamService ────────────────────────────────────────────────

pub struct StreamService<S> {
    controller: Arc<StreamController<S>>,
    config: Arc<SharedConfig>,
}

impl<S: CaptureSource> StreamService<S> {
    pub fn new(source: S, config: Arc<SharedConfig>) -> Self {
        Self {
            controller: Arc::new(StreamController::new(source)),
            config,
        }
    }

    /// Handle that can stop the session from another task.
    pub fn stop_handle(&self) -> Arc<StreamController<S>> {
        Arc::clone(&self.controller)
    }

    /// Signal the running session to stop.
    pub fn stop(&self) {
        self.controller.stop();
    }

    /// Stream to the configured target until stopped or failed.
    ///
    /// Returns `Ok(())` when stopped through [`stop`](Self::stop).
    pub async fn run(&self) -> Result<(), StreamError> {
        let target = self.config.snapshot().target.address();
        let watcher = tokio::spawn(log_phases(self.controller.phase()));

        let result = self.controller.start(&target, Arc::clone(&self.config)).await;

        watcher.abort();
        result
    }
}

async fn log_phases(mut phase: watch::Receiver<SessionPhase>) {
    while phase.changed().await.is_ok() {
        let current = *phase.borrow_and_update();
        match current {
            SessionPhase::Streaming { frames_sent: 0 } => info!("connected; capturing"),
            SessionPhase::Streaming { frames_sent: 1 } => info!("first frame sent"),
            SessionPhase::Streaming { frames_sent } if frames_sent % PROGRESS_INTERVAL == 0 => {
                debug!("{frames_sent} frames sent")
            }
            SessionPhase::Streaming { .. } => {}
            other => info!("session: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use framecast_core::{CaptureError, Frame, PixelFormat, StopReason};
    use futures::StreamExt;
    use tokio::net::TcpListener;
    use tokio_util::codec::FramedRead;

    use super::*;
    use crate::config::ClientConfig;

    struct Gray;

    impl CaptureSource for Gray {
        fn active_display_count(&self) -> Result<usize, CaptureError> {
            Ok(1)
        }

        fn capture_display(&self, _index: usize) -> Result<Frame, CaptureError> {
            Ok(Frame::packed(8, 8, PixelFormat::Rgb8, vec![0x7F; 8 * 8 * 3]))
        }
    }

    fn shared_config(dir: &tempfile::TempDir, port: u16, display: usize) -> Arc<SharedConfig> {
        let mut cfg = ClientConfig::default();
        cfg.target.port = port;
        cfg.capture.display = display;
        Arc::new(SharedConfig::new(dir.path().join("framecast.toml"), cfg))
    }

    #[tokio::test]
    async fn streams_until_stopped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let dir = tempfile::tempdir().unwrap();
        let config = shared_config(&dir, port, 4);

        let service = Arc::new(StreamService::new(Gray, Arc::clone(&config)));
        let stop = service.stop_handle();

        let session = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.run().await }
        });

        let (stream, _) = listener.accept().await.unwrap();
        let mut frames = FramedRead::new(stream, framecast_core::FrameCodec::new());
        let first = frames.next().await.unwrap().unwrap();
        assert!(!first.is_empty());

        stop.stop();
        while let Some(Ok(_)) = frames.next().await {}

        assert!(session.await.unwrap().is_ok());
        // Display 4 was not active; the correction was saved.
        assert_eq!(ClientConfig::load(config.path()).capture.display, 0);
        assert_eq!(
            *stop.phase().borrow(),
            SessionPhase::Stopped(StopReason::CallerCancelled)
        );
    }

    #[tokio::test]
    async fn unreachable_target_reports_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        let service = StreamService::new(Gray, shared_config(&dir, port, 0));
        let err = service.run().await.unwrap_err();
        assert_eq!(err.reason(), StopReason::ConnectFailed);
    }
}
