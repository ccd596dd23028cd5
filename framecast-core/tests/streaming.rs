//! Integration tests: full sessions over a real TCP connection on
//! localhost: connect failure, capture faults, cancellation and the
//! listener's view of the wire format.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;

use framecast_core::{
    CaptureError, CaptureSource, DisplaySettings, Frame, FrameCodec, PixelFormat, SessionPhase,
    StopReason, StreamController, StreamError,
};

// ── Helpers ──────────────────────────────────────────────────────

/// Capture source whose behaviour is scripted per call number.
#[derive(Default)]
struct ScriptedSource {
    captures: AtomicUsize,
    /// Panic on this call (0-based), like a faulting capture driver.
    fault_at: Option<usize>,
    /// On this call, report `reached` and wait for `resume`.
    pause_at: Option<usize>,
    reached: Option<mpsc::Sender<()>>,
    resume: Option<Mutex<mpsc::Receiver<()>>>,
}

impl ScriptedSource {
    fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

impl CaptureSource for ScriptedSource {
    fn active_display_count(&self) -> Result<usize, CaptureError> {
        Ok(1)
    }

    fn capture_display(&self, _index: usize) -> Result<Frame, CaptureError> {
        let call = self.captures.fetch_add(1, Ordering::SeqCst);
        if self.fault_at == Some(call) {
            panic!("capture driver fault");
        }
        if self.pause_at == Some(call) {
            if let Some(reached) = &self.reached {
                reached.blocking_send(()).unwrap();
            }
            if let Some(resume) = &self.resume {
                resume.lock().unwrap().blocking_recv();
            }
        }
        // Vary the content so every payload differs.
        let shade = (call * 40 % 256) as u8;
        Ok(Frame::packed(
            16,
            12,
            PixelFormat::Bgra8,
            vec![shade; 16 * 12 * 4],
        ))
    }
}

/// Incompressible frames, so a peer that stops reading fills the socket
/// buffers after a few messages.
#[derive(Default)]
struct NoiseSource {
    captures: AtomicUsize,
}

impl CaptureSource for NoiseSource {
    fn active_display_count(&self) -> Result<usize, CaptureError> {
        Ok(1)
    }

    fn capture_display(&self, _index: usize) -> Result<Frame, CaptureError> {
        let call = self.captures.fetch_add(1, Ordering::SeqCst) as u32;
        let mut state = 0x9E37_79B9u32 ^ call;
        let data = (0..256 * 256 * 4)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect();
        Ok(Frame::packed(256, 256, PixelFormat::Bgra8, data))
    }
}

struct Settings(AtomicUsize);

impl DisplaySettings for Settings {
    fn display_index(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn persist_display_index(&self, index: usize) -> io::Result<()> {
        self.0.store(index, Ordering::SeqCst);
        Ok(())
    }
}

fn settings() -> Arc<Settings> {
    Arc::new(Settings(AtomicUsize::new(0)))
}

/// Bind an OS-assigned port and collect every payload the first client
/// sends until it closes the connection.
async fn collecting_listener() -> (String, JoinHandle<Vec<Bytes>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut frames = FramedRead::new(stream, FrameCodec::new());
        let mut payloads = Vec::new();
        while let Some(payload) = frames.next().await {
            match payload {
                Ok(p) => payloads.push(p),
                Err(_) => break,
            }
        }
        payloads
    });
    (addr, handle)
}

/// An address nothing is listening on.
async fn unreachable_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

async fn with_timeout<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(10), fut)
        .await
        .expect("timeout")
}

// ── Connect ──────────────────────────────────────────────────────

#[tokio::test]
async fn unreachable_target_fails_without_streaming() {
    let addr = unreachable_addr().await;
    let controller = StreamController::new(ScriptedSource::default());
    let mut phase = controller.phase();

    let err = with_timeout(controller.start(&addr, settings()))
        .await
        .unwrap_err();

    assert!(matches!(err, StreamError::ConnectFailed { .. }));
    assert_eq!(err.reason(), StopReason::ConnectFailed);
    assert_eq!(controller.source().captures(), 0);
    assert!(!controller.is_active());

    // Only Connecting and the terminal phase were ever published.
    assert!(phase.has_changed().unwrap());
    assert_eq!(
        *phase.borrow_and_update(),
        SessionPhase::Stopped(StopReason::ConnectFailed)
    );
}

// ── Failures ─────────────────────────────────────────────────────

#[tokio::test]
async fn capture_fault_after_three_frames() {
    let (addr, listener) = collecting_listener().await;
    let controller = StreamController::new(ScriptedSource {
        fault_at: Some(3),
        ..Default::default()
    });

    let err = with_timeout(controller.start(&addr, settings()))
        .await
        .unwrap_err();
    assert_eq!(err.reason(), StopReason::CaptureFailed);
    assert!(matches!(err, StreamError::CaptureFailed(CaptureError::Fault(ref m)) if m.contains("driver fault")));

    let payloads = with_timeout(listener).await.unwrap();
    assert_eq!(payloads.len(), 3);
    assert_eq!(controller.source().captures(), 4);
}

#[tokio::test]
async fn listener_hangup_is_write_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);
    });

    let controller = StreamController::new(ScriptedSource::default());
    let err = with_timeout(controller.start(&addr, settings()))
        .await
        .unwrap_err();
    assert_eq!(err.reason(), StopReason::WriteFailed);
}

// ── Cancellation ─────────────────────────────────────────────────

#[tokio::test]
async fn stop_before_third_write_sends_two_frames() {
    let (addr, listener) = collecting_listener().await;
    let (reached_tx, mut reached_rx) = mpsc::channel(1);
    let (resume_tx, resume_rx) = mpsc::channel(1);

    let controller = Arc::new(StreamController::new(ScriptedSource {
        pause_at: Some(2),
        reached: Some(reached_tx),
        resume: Some(Mutex::new(resume_rx)),
        ..Default::default()
    }));

    let session = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.start(&addr, settings()).await }
    });

    // Third capture is in progress: two frames are on the wire.
    with_timeout(reached_rx.recv()).await.unwrap();
    controller.stop();
    controller.stop();
    resume_tx.send(()).await.unwrap();

    let result = with_timeout(session).await.unwrap();
    assert!(result.is_ok());
    assert_eq!(
        *controller.phase().borrow(),
        SessionPhase::Stopped(StopReason::CallerCancelled)
    );

    // The listener only returns once the connection is closed.
    let payloads = with_timeout(listener).await.unwrap();
    assert_eq!(payloads.len(), 2);
    assert_eq!(controller.source().captures(), 3);
}

#[tokio::test]
async fn stop_from_another_task_closes_connection() {
    let (addr, listener) = collecting_listener().await;
    let controller = Arc::new(StreamController::new(ScriptedSource::default()));

    let session = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.start(&addr, settings()).await }
    });

    let mut phase = controller.phase();
    with_timeout(phase.wait_for(|p| p.frames_sent() >= 3))
        .await
        .unwrap();
    controller.stop();

    assert!(with_timeout(session).await.unwrap().is_ok());
    let payloads = with_timeout(listener).await.unwrap();
    assert!(payloads.len() >= 3);
    assert!(!controller.is_active());
}

#[tokio::test]
async fn stop_ends_write_stalled_on_silent_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let controller = Arc::new(StreamController::new(NoiseSource::default()));

    let session = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.start(&addr, settings()).await }
    });

    // Accept and hold the connection without ever reading from it.
    let (_silent, _) = with_timeout(listener.accept()).await.unwrap();

    // Wait until no frame has completed for a while: the write is stalled.
    // Socket buffers can take many frames to fill in unoptimized builds.
    let mut phase = controller.phase();
    let stalled = async {
        loop {
            match tokio::time::timeout(Duration::from_secs(1), phase.changed()).await {
                Ok(changed) => changed.unwrap(),
                Err(_) => break,
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(120), stalled)
        .await
        .expect("writes never stalled");
    assert!(phase.borrow().is_streaming());

    controller.stop();
    let result = tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .expect("stop did not end the stalled session")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(
        *controller.phase().borrow(),
        SessionPhase::Stopped(StopReason::CallerCancelled)
    );
    assert!(!controller.is_active());
}

// ── Wire format ──────────────────────────────────────────────────

#[tokio::test]
async fn listener_receives_decodable_jpegs() {
    let (addr, listener) = collecting_listener().await;
    let controller = StreamController::new(ScriptedSource {
        fault_at: Some(2),
        ..Default::default()
    });

    let _ = with_timeout(controller.start(&addr, settings())).await;
    let payloads = with_timeout(listener).await.unwrap();
    assert_eq!(payloads.len(), 2);

    for payload in payloads {
        assert_eq!(&payload[..2], &[0xFF, 0xD8]);
        assert_eq!(image_dimensions(&payload), (16, 12));
    }
}

fn image_dimensions(jpeg: &[u8]) -> (u32, u32) {
    let mut codec = FrameCodec::new();
    // Round-trip through the codec once more to cover the encoder half.
    let mut buf = bytes::BytesMut::new();
    tokio_util::codec::Encoder::encode(
        &mut codec,
        framecast_core::WireMessage::new(jpeg.to_vec()).unwrap(),
        &mut buf,
    )
    .unwrap();
    let decoded = tokio_util::codec::Decoder::decode(&mut codec, &mut buf)
        .unwrap()
        .unwrap();
    assert_eq!(&decoded[..], jpeg);

    let img = image::load_from_memory_with_format(&decoded, image::ImageFormat::Jpeg).unwrap();
    (img.width(), img.height())
}
