//! Progress events flowing from a pipeline to the presentation boundary.
//!
//! A pipeline owns an [`EventSink`] and publishes [`ProgressEvent`]s in stage
//! order; the boundary drains the matching receiver in a simple loop. No
//! acknowledgment is expected, and a dropped receiver is not an error.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc;

/// One event emitted by a pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Human-readable stage description.
    Status {
        /// Message text.
        message: String,
    },
    /// Percent complete of the current stage (0-100).
    Percent {
        /// Rounded percentage.
        percent: u8,
    },
    /// Playlist manifest resolved.
    PlaylistInfo {
        /// Playlist title.
        title: String,
        /// Number of entries.
        count: usize,
    },
    /// A playlist entry started.
    PlaylistItem {
        /// Entry title.
        title: String,
        /// 1-based index of the entry.
        current: usize,
        /// Total number of entries.
        total: usize,
    },
    /// The invocation produced its output (a file, or a folder for playlists).
    Completed {
        /// Output path.
        path: PathBuf,
    },
    /// The invocation was cancelled.
    Cancelled,
    /// The invocation failed.
    Error {
        /// User-facing message.
        message: String,
    },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { message } => write!(f, "{message}"),
            Self::Percent { percent } => write!(f, "{percent}%"),
            Self::PlaylistInfo { title, count } => {
                write!(f, "Playlist \"{title}\" ({count} videos)")
            }
            Self::PlaylistItem {
                title,
                current,
                total,
            } => write!(f, "[{current}/{total}] {title}"),
            Self::Completed { path } => write!(f, "Saved to {}", path.display()),
            Self::Cancelled => write!(f, "Download cancelled"),
            Self::Error { message } => write!(f, "Error: {message}"),
        }
    }
}

/// Aggregate result of a playlist run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Entries downloaded successfully.
    pub succeeded: usize,
    /// Entries that failed.
    pub failed: usize,
}

impl BatchSummary {
    /// Total number of processed entries.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Playlist download complete! {} succeeded, {} failed.",
            self.succeeded, self.failed
        )
    }
}

/// Sending half of a pipeline's event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl EventSink {
    /// Create a sink and the receiver the boundary should drain.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publish an event. Ignored when the receiver is gone.
    pub fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }

    /// Publish a status message.
    pub fn status(&self, message: impl Into<String>) {
        self.emit(ProgressEvent::Status {
            message: message.into(),
        });
    }

    /// Publish a percent value, clamped to 0-100.
    pub fn percent(&self, percent: u8) {
        self.emit(ProgressEvent::Percent {
            percent: percent.min(100),
        });
    }

    /// Publish a completion event.
    pub fn completed(&self, path: impl Into<PathBuf>) {
        self.emit(ProgressEvent::Completed { path: path.into() });
    }

    /// Publish a cancellation event.
    pub fn cancelled(&self) {
        self.emit(ProgressEvent::Cancelled);
    }

    /// Publish an error event.
    pub fn error(&self, message: impl Into<String>) {
        self.emit(ProgressEvent::Error {
            message: message.into(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (sink, mut rx) = EventSink::channel();
        sink.status("Downloading audio...");
        sink.percent(42);
        sink.completed("/tmp/song.mp3");

        assert_eq!(
            rx.try_recv().unwrap(),
            ProgressEvent::Status {
                message: "Downloading audio...".to_string()
            }
        );
        assert_eq!(rx.try_recv().unwrap(), ProgressEvent::Percent { percent: 42 });
        assert_eq!(
            rx.try_recv().unwrap(),
            ProgressEvent::Completed {
                path: PathBuf::from("/tmp/song.mp3")
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_percent_is_clamped() {
        let (sink, mut rx) = EventSink::channel();
        sink.percent(250);
        assert_eq!(rx.try_recv().unwrap(), ProgressEvent::Percent { percent: 100 });
    }

    #[test]
    fn test_emit_without_receiver_does_not_panic() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.status("nobody listening");
    }

    #[test]
    fn test_event_json_shape() {
        let event = ProgressEvent::PlaylistItem {
            title: "Song".to_string(),
            current: 2,
            total: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "playlist_item");
        assert_eq!(json["current"], 2);
        assert_eq!(json["total"], 5);
    }

    #[test]
    fn test_summary_display() {
        let summary = BatchSummary {
            succeeded: 4,
            failed: 1,
        };
        assert_eq!(
            summary.to_string(),
            "Playlist download complete! 4 succeeded, 1 failed."
        );
        assert_eq!(summary.total(), 5);
    }
}
