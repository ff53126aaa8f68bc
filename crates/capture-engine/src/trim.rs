//! Trim commit and undo.
//!
//! The preferred path replays the clip from `start` and re-records it until
//! playback passes `end`. Hosts that cannot re-capture a playing element get
//! a deferred trim instead: the bytes stay as they are and the cut is left for
//! the transcoder.

use std::sync::Arc;
use std::time::Duration;

use gifnew_clip_model::clip::{ClipHandle, TrimRange};
use gifnew_common::error::{GifnewError, GifnewResult};

/// How often playback position is sampled during re-capture (one frame).
pub const POSITION_POLL: Duration = Duration::from_millis(16);

/// Slack allowed on top of the window length before re-capture is abandoned.
pub const STALL_GRACE: Duration = Duration::from_secs(2);

/// Platform primitive that records a playing clip.
#[async_trait::async_trait]
pub trait PlaybackCapture: Send + Sync {
    /// Whether the host can re-capture playback at all.
    fn is_supported(&self) -> bool;

    /// Seek to `start_secs`, start playback, and start recording it.
    async fn begin(&self, clip: &ClipHandle, start_secs: f64) -> GifnewResult<()>;

    /// Current playback position in seconds.
    fn position_secs(&self) -> f64;

    /// Pause playback, stop recording, and return the recorded bytes.
    async fn finish(&self) -> GifnewResult<Vec<u8>>;
}

/// Result of a trim commit.
#[derive(Debug, Clone)]
pub enum TrimOutcome {
    /// New bytes covering only the window.
    Committed(ClipHandle),
    /// Bytes unchanged; `range` (on the bytes' own timeline) is cut at
    /// transcode time.
    Deferred { clip: ClipHandle, range: TrimRange },
}

impl TrimOutcome {
    pub fn clip(&self) -> &ClipHandle {
        match self {
            TrimOutcome::Committed(clip) => clip,
            TrimOutcome::Deferred { clip, .. } => clip,
        }
    }

    pub fn into_clip(self) -> ClipHandle {
        match self {
            TrimOutcome::Committed(clip) => clip,
            TrimOutcome::Deferred { clip, .. } => clip,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, TrimOutcome::Deferred { .. })
    }
}

/// Commits trims and keeps the pre-trim clip for undo.
pub struct TrimController {
    capture: Arc<dyn PlaybackCapture>,
    original: Option<ClipHandle>,
}

impl TrimController {
    pub fn new(capture: Arc<dyn PlaybackCapture>) -> Self {
        Self {
            capture,
            original: None,
        }
    }

    /// Trim `clip` to `range`, given on the clip's visible timeline.
    pub async fn commit(&mut self, clip: &ClipHandle, range: TrimRange) -> GifnewResult<TrimOutcome> {
        let range = TrimRange::new(range.start, range.end, clip.duration_secs())?;
        if self.original.is_none() {
            self.original = Some(clip.clone());
        }

        let source = clip.to_source_range(range);
        match self.recapture(clip, source).await {
            Ok(bytes) => {
                let trimmed = clip.materialized_trim(bytes, range);
                tracing::info!(
                    start = source.start,
                    end = source.end,
                    duration_secs = trimmed.duration_secs(),
                    "Trim re-captured"
                );
                Ok(TrimOutcome::Committed(trimmed))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    start = source.start,
                    end = source.end,
                    "Trim re-capture unavailable, deferring cut to transcode"
                );
                Ok(TrimOutcome::Deferred {
                    clip: clip.deferred_trim(source),
                    range: source,
                })
            }
        }
    }

    async fn recapture(&self, clip: &ClipHandle, source: TrimRange) -> GifnewResult<Vec<u8>> {
        if !self.capture.is_supported() {
            return Err(GifnewError::trim_unsupported("playback capture not available"));
        }
        self.capture.begin(clip, source.start).await?;

        let budget = Duration::from_secs_f64(source.len_secs()) + STALL_GRACE;
        let reached = tokio::time::timeout(budget, async {
            while self.capture.position_secs() < source.end {
                tokio::time::sleep(POSITION_POLL).await;
            }
        })
        .await;

        let bytes = self.capture.finish().await?;
        if reached.is_err() {
            return Err(GifnewError::trim_unsupported(format!(
                "playback stalled before {:.2}s",
                source.end
            )));
        }
        if bytes.is_empty() {
            return Err(GifnewError::trim_unsupported("re-capture produced no data"));
        }
        Ok(bytes)
    }

    /// Restore the pre-trim clip. `None` when nothing was trimmed.
    pub fn undo(&mut self) -> Option<ClipHandle> {
        let original = self.original.take()?;
        tracing::info!(duration_secs = original.duration_secs(), "Trim undone");
        Some(original)
    }

    /// The clip an undo would restore.
    pub fn original(&self) -> Option<&ClipHandle> {
        self.original.as_ref()
    }

    /// Forget the retained original (new recording).
    pub fn reset(&mut self) {
        self.original = None;
    }
}
