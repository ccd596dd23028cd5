//! Screen capture sources.
//!
//! [`CaptureSource`] is the seam between the transmitter and the
//! platform. Calls block until the backend produces an image, so the
//! transmitter always invokes them on Tokio's blocking pool.
//!
//! # Platform
//!
//! [`ScrapSource`] captures through the `scrap` crate when the `scrap`
//! feature is enabled. Without it the type is still defined but reports
//! no displays and fails every capture with
//! [`CaptureError::Unsupported`].

use crate::error::CaptureError;
use crate::frame::Frame;

// ── CaptureSource ────────────────────────────────────────────────

/// Produces the current contents of a display as a [`Frame`].
pub trait CaptureSource: Send + Sync + 'static {
    /// Number of displays that can currently be captured.
    fn active_display_count(&self) -> Result<usize, CaptureError>;

    /// Capture display `index`.
    ///
    /// Fails with [`CaptureError::InvalidDisplay`] when `index` is not an
    /// active display. Callers remap stale indices before calling.
    fn capture_display(&self, index: usize) -> Result<Frame, CaptureError>;
}

/// Picks the display to capture: `selected` when it is active, else 0.
///
/// Returns the index to use and whether a correction was made.
pub fn resolve_display(selected: usize, active: usize) -> (usize, bool) {
    if selected >= active {
        (0, selected != 0)
    } else {
        (selected, false)
    }
}

// ── ScrapSource ──────────────────────────────────────────────────

/// Capture source backed by `scrap`.
///
/// A fresh capturer is opened for every frame, so the source holds no
/// platform handles and is freely shareable across threads.
///
/// # Cost
///
/// Every call enumerates displays and sets up a new duplication session
/// (DXGI on Windows, XShm on X11, a display stream on macOS). That setup
/// usually costs more than grabbing the frame itself and bounds the frame
/// rate well below the display refresh rate. It also means a display
/// unplugged between frames is noticed on the next capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrapSource;

impl ScrapSource {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "scrap")]
mod platform {
    use std::io::ErrorKind::WouldBlock;
    use std::time::Duration;

    use scrap::{Capturer, Display};
    use tracing::trace;

    use super::*;
    use crate::frame::PixelFormat;

    /// Back-off while the compositor has no new frame ready.
    const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(5);

    impl CaptureSource for ScrapSource {
        fn active_display_count(&self) -> Result<usize, CaptureError> {
            Ok(Display::all()?.len())
        }

        fn capture_display(&self, index: usize) -> Result<Frame, CaptureError> {
            let mut displays = Display::all()?;
            let count = displays.len();
            if index >= count {
                return Err(CaptureError::InvalidDisplay { index, count });
            }
            let display = displays.swap_remove(index);

            let mut capturer = Capturer::new(display)?;
            let width = capturer.width();
            let height = capturer.height();
            if width == 0 || height == 0 {
                return Err(CaptureError::EmptyImage);
            }

            loop {
                match capturer.frame() {
                    Ok(buffer) => {
                        if buffer.is_empty() {
                            return Err(CaptureError::EmptyImage);
                        }
                        // scrap pads rows on some platforms.
                        let stride = buffer.len() / height;
                        return Ok(Frame {
                            width: width as u32,
                            height: height as u32,
                            stride,
                            format: PixelFormat::Bgra8,
                            data: buffer.to_vec(),
                        });
                    }
                    Err(ref e) if e.kind() == WouldBlock => {
                        trace!("display {index}: frame not ready");
                        std::thread::sleep(FRAME_POLL_INTERVAL);
                    }
                    Err(e) => return Err(CaptureError::Backend(e)),
                }
            }
        }
    }
}

#[cfg(not(feature = "scrap"))]
impl CaptureSource for ScrapSource {
    fn active_display_count(&self) -> Result<usize, CaptureError> {
        Ok(0)
    }

    fn capture_display(&self, _index: usize) -> Result<Frame, CaptureError> {
        Err(CaptureError::Unsupported)
    }
}
