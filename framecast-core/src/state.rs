//! Observable session phase.
//!
//! ```text
//!  Idle ──► Connecting ──► Streaming ──► Stopped(reason)
//!                │                            ▲
//!                └──── Stopped(ConnectFailed) ┘
//! ```
//!
//! The phase is published through a `tokio::sync::watch` channel by
//! [`StreamController`](crate::controller::StreamController) so front
//! ends can render status without touching the session.

use crate::error::StopReason;

/// Current phase of the streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No session has been started yet.
    #[default]
    Idle,

    /// Opening the TCP connection.
    Connecting,

    /// Connected and running the capture loop.
    Streaming {
        /// Messages fully written so far.
        frames_sent: u64,
    },

    /// The session ended. Terminal for that session.
    Stopped(StopReason),
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Streaming { frames_sent } => write!(f, "Streaming ({frames_sent} frames)"),
            Self::Stopped(reason) => write!(f, "Stopped ({reason})"),
        }
    }
}

impl SessionPhase {
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped(_))
    }

    /// The terminal reason, once stopped.
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            Self::Stopped(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Frames written so far; zero outside `Streaming`.
    pub fn frames_sent(&self) -> u64 {
        match self {
            Self::Streaming { frames_sent } => *frames_sent,
            _ => 0,
        }
    }
}
