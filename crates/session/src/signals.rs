//! Notifications published to the presentation layer.

use crate::blobs::BlobUrl;
use crate::state::SessionState;

/// Everything a front end needs to render the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSignal {
    StateChanged(SessionState),
    /// Pre-roll countdown value.
    CountdownTick(u32),
    /// Recording budget countdown value.
    RecordingTick { remaining: u32 },
    /// A new clip became current.
    ClipReady { url: BlobUrl, duration_secs: f64 },
    /// The current clip's duration changed without new bytes.
    DurationChanged { duration_secs: f64 },
    TrimCommitted { duration_secs: f64, deferred: bool },
    TrimUndone { duration_secs: f64 },
    /// Preview should seek here after a trim handle moved.
    Seek { position_secs: f64 },
    Progress(u8),
    /// A recoverable downgrade.
    Warning(String),
    /// A surfaced failure; `retryable` failures come with a retry action.
    Error { message: String, retryable: bool },
    ArtifactReady { url: BlobUrl, file_name: String },
}
