//! Reference listener for the framecast wire format.
//!
//! Accepts one sender at a time, decodes the length-prefixed stream with
//! [`FrameCodec`] and optionally stores every payload as
//! `frame-NNNNNN.jpg`. Mainly useful for checking a client end to end.

use std::path::{Path, PathBuf};

use framecast_core::{CodecError, FrameCodec};
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::net::TcpListener;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// File name for the `index`-th received frame.
pub fn frame_file_name(index: u64) -> String {
    format!("frame-{index:06}.jpg")
}

/// Decode frames from `reader` until the sender closes the stream.
///
/// Frames are numbered from `first_index`; when `out_dir` is set each one
/// is written there. Returns the number of frames received.
pub async fn receive_frames<R>(
    reader: R,
    out_dir: Option<&Path>,
    first_index: u64,
) -> Result<u64, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut frames = FramedRead::new(reader, FrameCodec::new());
    let mut received = 0;

    while let Some(payload) = frames.next().await {
        let payload = payload?;
        let index = first_index + received;
        debug!(frame = index, bytes = payload.len(), "frame received");
        if let Some(dir) = out_dir {
            tokio::fs::write(dir.join(frame_file_name(index)), &payload).await?;
        }
        received += 1;
    }

    Ok(received)
}

/// Accept senders on `bind` until `shutdown` is cancelled.
pub async fn listen(
    bind: &str,
    out_dir: Option<PathBuf>,
    shutdown: CancellationToken,
) -> Result<u64, CodecError> {
    if let Some(dir) = &out_dir {
        tokio::fs::create_dir_all(dir).await?;
    }

    let listener = TcpListener::bind(bind).await?;
    info!("listening on {}", listener.local_addr()?);

    let mut total = 0;
    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown.cancelled() => break,
        };
        info!("sender connected from {peer}");

        let received = tokio::select! {
            r = receive_frames(stream, out_dir.as_deref(), total) => r,
            _ = shutdown.cancelled() => break,
        };
        match received {
            Ok(n) => {
                total += n;
                info!("{peer} closed the stream after {n} frames");
            }
            Err(e) => warn!("stream from {peer} aborted: {e}"),
        }
    }

    info!("listener stopped; {total} frames received");
    Ok(total)
}
