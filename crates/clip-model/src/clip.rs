//! Recorded clips and trim windows.
//!
//! A [`ClipHandle`] is cheap to clone: the encoded bytes sit behind an `Arc`
//! so the pre-trim clip can be kept around for undo without copying.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gifnew_common::error::{GifnewError, GifnewResult};
use serde::{Deserialize, Serialize};

/// Shortest clip the recorder will report.
pub const MIN_CLIP_SECS: f64 = 0.1;

/// Recording budget ceiling.
pub const MAX_CLIP_SECS: f64 = 10.0;

/// Tolerance used when comparing range endpoints against a duration.
const RANGE_EPSILON: f64 = 1e-6;

static NEXT_CLIP_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique clip identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipId(u64);

impl ClipId {
    fn next() -> Self {
        Self(NEXT_CLIP_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Where a clip's duration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationSource {
    /// Derived from the recording countdown. Authoritative.
    Timer,
    /// Derived from a committed trim range. Authoritative.
    Trim,
    /// Read from container metadata (clips loaded from storage).
    Metadata,
    /// Not known yet.
    Unknown,
}

impl DurationSource {
    /// Whether container metadata may replace a duration from this source.
    pub fn accepts_metadata(self) -> bool {
        matches!(self, DurationSource::Metadata | DurationSource::Unknown)
    }
}

/// A `[start, end]` window in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimRange {
    pub start: f64,
    pub end: f64,
}

impl TrimRange {
    /// The whole of a clip.
    pub fn full(duration_secs: f64) -> Self {
        Self {
            start: 0.0,
            end: duration_secs,
        }
    }

    /// Validate `0 <= start < end <= duration`.
    pub fn new(start: f64, end: f64, duration_secs: f64) -> GifnewResult<Self> {
        let valid = start.is_finite()
            && end.is_finite()
            && start >= 0.0
            && end <= duration_secs + RANGE_EPSILON;
        let clamped_end = end.min(duration_secs);
        if !valid || start >= clamped_end {
            return Err(GifnewError::InvalidTrimRange {
                start,
                end,
                duration_secs,
            });
        }
        Ok(Self {
            start,
            end: clamped_end,
        })
    }

    /// Length of the window in seconds.
    pub fn len_secs(&self) -> f64 {
        self.end - self.start
    }

    /// Whether this window covers the whole of a `duration_secs` timeline.
    pub fn is_full(&self, duration_secs: f64) -> bool {
        self.start.abs() <= RANGE_EPSILON && (self.end - duration_secs).abs() <= RANGE_EPSILON
    }

    /// Shift the window forward by `offset_secs`.
    pub fn offset_by(&self, offset_secs: f64) -> Self {
        Self {
            start: self.start + offset_secs,
            end: self.end + offset_secs,
        }
    }

    /// Where playback should continue when previewing a trimmed window:
    /// positions past `end` wrap back to `start`.
    pub fn loop_position(&self, position_secs: f64) -> f64 {
        if position_secs >= self.end {
            self.start
        } else {
            position_secs
        }
    }

    /// Preview seek target after the user moved a handle from `previous`.
    ///
    /// When both handles moved, the one that moved further wins.
    pub fn seek_target(&self, previous: &TrimRange) -> Option<f64> {
        let start_delta = (self.start - previous.start).abs();
        let end_delta = (self.end - previous.end).abs();
        match (start_delta > 0.0, end_delta > 0.0) {
            (false, false) => None,
            (true, false) => Some(self.start),
            (false, true) => Some(self.end),
            (true, true) if end_delta > start_delta => Some(self.end),
            (true, true) => Some(self.start),
        }
    }
}

/// The current (or retained original) recording.
#[derive(Debug, Clone)]
pub struct ClipHandle {
    id: ClipId,
    bytes: Arc<[u8]>,
    mime: String,
    duration_secs: f64,
    source_duration_secs: f64,
    duration_source: DurationSource,
    trimmed: bool,
    pending_cut: Option<TrimRange>,
    recorded_at: DateTime<Utc>,
}

impl ClipHandle {
    /// A freshly recorded clip whose duration comes from the recording timer.
    pub fn recorded(bytes: Vec<u8>, mime: impl Into<String>, timer_duration_secs: f64) -> Self {
        let duration = timer_duration_secs.clamp(MIN_CLIP_SECS, MAX_CLIP_SECS);
        Self {
            id: ClipId::next(),
            bytes: bytes.into(),
            mime: mime.into(),
            duration_secs: duration,
            source_duration_secs: duration,
            duration_source: DurationSource::Timer,
            trimmed: false,
            pending_cut: None,
            recorded_at: Utc::now(),
        }
    }

    /// A clip loaded from storage. Container metadata is the only duration
    /// source available, and it may arrive later.
    pub fn from_storage(
        bytes: Vec<u8>,
        mime: impl Into<String>,
        metadata_duration_secs: Option<f64>,
    ) -> Self {
        let mut clip = Self {
            id: ClipId::next(),
            bytes: bytes.into(),
            mime: mime.into(),
            duration_secs: 0.0,
            source_duration_secs: 0.0,
            duration_source: DurationSource::Unknown,
            trimmed: false,
            pending_cut: None,
            recorded_at: Utc::now(),
        };
        if let Some(secs) = metadata_duration_secs {
            clip.apply_metadata_duration(secs);
        }
        clip
    }

    /// Reconcile a duration reported by container metadata.
    ///
    /// Returns `false` (and leaves the clip untouched) when the current
    /// duration is timer- or trim-derived, or the reported value is unusable.
    pub fn apply_metadata_duration(&mut self, metadata_secs: f64) -> bool {
        if !self.duration_source.accepts_metadata() {
            tracing::debug!(
                clip = self.id.get(),
                metadata_secs,
                duration_secs = self.duration_secs,
                source = ?self.duration_source,
                "Ignoring metadata duration; authoritative duration already set"
            );
            return false;
        }
        if !metadata_secs.is_finite() || metadata_secs <= 0.0 {
            return false;
        }
        self.duration_secs = metadata_secs;
        self.source_duration_secs = metadata_secs;
        self.duration_source = DurationSource::Metadata;
        true
    }

    /// New clip holding re-encoded bytes of `range` only.
    pub fn materialized_trim(&self, bytes: Vec<u8>, range: TrimRange) -> Self {
        Self {
            id: ClipId::next(),
            bytes: bytes.into(),
            mime: self.mime.clone(),
            duration_secs: range.len_secs(),
            source_duration_secs: range.len_secs(),
            duration_source: DurationSource::Trim,
            trimmed: true,
            pending_cut: None,
            recorded_at: self.recorded_at,
        }
    }

    /// New clip sharing these bytes, with `source_range` recorded as a cut the
    /// transcoder must apply. `source_range` is relative to the bytes' own
    /// untrimmed timeline.
    pub fn deferred_trim(&self, source_range: TrimRange) -> Self {
        Self {
            id: ClipId::next(),
            bytes: Arc::clone(&self.bytes),
            mime: self.mime.clone(),
            duration_secs: source_range.len_secs(),
            source_duration_secs: self.source_duration_secs,
            duration_source: DurationSource::Trim,
            trimmed: true,
            pending_cut: Some(source_range),
            recorded_at: self.recorded_at,
        }
    }

    /// Translate a window on this clip's visible timeline into the timeline
    /// of the underlying bytes.
    pub fn to_source_range(&self, range: TrimRange) -> TrimRange {
        match self.pending_cut {
            Some(cut) => range.offset_by(cut.start),
            None => range,
        }
    }

    /// The single cut the transcoder must apply to the bytes, if any.
    ///
    /// Composes the pending (deferred) cut with `range`, which is expressed on
    /// the visible timeline. Returns `None` when the composed window covers
    /// the whole source.
    pub fn effective_cut(&self, range: Option<TrimRange>) -> Option<TrimRange> {
        let visible = range.unwrap_or_else(|| TrimRange::full(self.duration_secs));
        let source = self.to_source_range(visible);
        if self.source_duration_secs > 0.0 && source.is_full(self.source_duration_secs) {
            None
        } else if self.source_duration_secs <= 0.0 && range.is_none() {
            None
        } else {
            Some(source)
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the encoded bytes.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Length of the underlying bytes' timeline.
    pub fn source_duration_secs(&self) -> f64 {
        self.source_duration_secs
    }

    pub fn duration_source(&self) -> DurationSource {
        self.duration_source
    }

    pub fn has_known_duration(&self) -> bool {
        self.duration_secs > 0.0
    }

    pub fn is_trimmed(&self) -> bool {
        self.trimmed
    }

    /// Cut recorded by a deferred trim.
    pub fn pending_cut(&self) -> Option<TrimRange> {
        self.pending_cut
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// Whether two handles point at the same byte buffer.
    pub fn shares_bytes_with(&self, other: &ClipHandle) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ten_second_clip() -> ClipHandle {
        ClipHandle::recorded(vec![1, 2, 3, 4], "video/webm", 10.0)
    }

    #[test]
    fn test_trim_range_rejects_inverted_window() {
        assert!(TrimRange::new(5.0, 5.0, 10.0).is_err());
        assert!(TrimRange::new(6.0, 2.0, 10.0).is_err());
        assert!(TrimRange::new(-0.5, 2.0, 10.0).is_err());
        assert!(TrimRange::new(0.0, 10.5, 10.0).is_err());
        assert!(TrimRange::new(0.0, f64::NAN, 10.0).is_err());
    }

    #[test]
    fn test_trim_range_end_clamp_keeps_window_nonempty() {
        assert!(TrimRange::new(10.0, 10.000_000_5, 10.0).is_err());

        let range = TrimRange::new(9.5, 10.000_000_5, 10.0).unwrap();
        assert_eq!(range.end, 10.0);
        assert!(range.start < range.end);
    }

    #[test]
    fn test_recorded_duration_is_clamped() {
        assert_eq!(
            ClipHandle::recorded(vec![], "video/webm", 0.0).duration_secs(),
            MIN_CLIP_SECS
        );
        assert_eq!(
            ClipHandle::recorded(vec![], "video/webm", 12.0).duration_secs(),
            MAX_CLIP_SECS
        );
    }

    #[test]
    fn test_metadata_never_overrides_timer_duration() {
        let mut clip = ClipHandle::recorded(vec![0; 8], "video/webm", 3.0);
        assert!(!clip.apply_metadata_duration(3.48));
        assert_eq!(clip.duration_secs(), 3.0);
        assert_eq!(clip.duration_source(), DurationSource::Timer);
    }

    #[test]
    fn test_metadata_fills_unknown_storage_duration() {
        let mut clip = ClipHandle::from_storage(vec![0; 8], "video/mp4", None);
        assert!(!clip.has_known_duration());
        assert!(!clip.apply_metadata_duration(f64::INFINITY));
        assert!(clip.apply_metadata_duration(4.2));
        assert_eq!(clip.duration_secs(), 4.2);
        assert_eq!(clip.duration_source(), DurationSource::Metadata);
    }

    #[test]
    fn test_deferred_trim_keeps_bytes_and_records_cut() {
        let clip = ten_second_clip();
        let range = TrimRange::new(2.0, 8.0, 10.0).unwrap();
        let trimmed = clip.deferred_trim(range);
        assert!(trimmed.is_trimmed());
        assert!(trimmed.shares_bytes_with(&clip));
        assert_eq!(trimmed.duration_secs(), 6.0);
        assert_eq!(trimmed.source_duration_secs(), 10.0);
        assert_eq!(trimmed.pending_cut(), Some(range));
    }

    #[test]
    fn test_effective_cut_is_not_applied_twice() {
        let clip = ten_second_clip();
        let trimmed = clip.deferred_trim(TrimRange::new(2.0, 8.0, 10.0).unwrap());

        // The editor re-seeds its range to the full visible (6s) timeline.
        let cut = trimmed.effective_cut(Some(TrimRange::full(trimmed.duration_secs())));
        assert_eq!(cut, Some(TrimRange { start: 2.0, end: 8.0 }));

        // A narrower window on the visible timeline composes with the cut.
        let narrower = TrimRange::new(1.0, 4.0, 6.0).unwrap();
        assert_eq!(
            trimmed.effective_cut(Some(narrower)),
            Some(TrimRange { start: 3.0, end: 6.0 })
        );
    }

    #[test]
    fn test_effective_cut_skips_full_range() {
        let clip = ten_second_clip();
        assert_eq!(clip.effective_cut(Some(TrimRange::full(10.0))), None);
        assert_eq!(clip.effective_cut(None), None);
        assert_eq!(
            clip.effective_cut(Some(TrimRange::new(0.0, 9.0, 10.0).unwrap())),
            Some(TrimRange { start: 0.0, end: 9.0 })
        );
    }

    #[test]
    fn test_seek_target_follows_moved_handle() {
        let prev = TrimRange::full(10.0);
        assert_eq!(TrimRange { start: 2.0, end: 10.0 }.seek_target(&prev), Some(2.0));
        assert_eq!(TrimRange { start: 0.0, end: 7.0 }.seek_target(&prev), Some(7.0));
        assert_eq!(TrimRange { start: 1.0, end: 6.0 }.seek_target(&prev), Some(6.0));
        assert_eq!(prev.seek_target(&prev), None);
    }

    #[test]
    fn test_loop_position_wraps_at_end() {
        let range = TrimRange { start: 2.0, end: 8.0 };
        assert_eq!(range.loop_position(5.0), 5.0);
        assert_eq!(range.loop_position(8.0), 2.0);
    }

    proptest! {
        #[test]
        fn prop_valid_ranges_hold_invariant(
            duration in 0.1f64..=10.0,
            a in 0.0f64..=1.0,
            b in 0.0f64..=1.0,
        ) {
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            let (start, end) = (lo * duration, hi * duration);
            match TrimRange::new(start, end, duration) {
                Ok(range) => {
                    prop_assert!(range.start >= 0.0);
                    prop_assert!(range.start < range.end);
                    prop_assert!(range.end <= duration);
                    let clip = ClipHandle::recorded(vec![7; 4], "video/webm", duration);
                    let trimmed = clip.deferred_trim(range);
                    prop_assert!((trimmed.duration_secs() - (range.end - range.start)).abs() < 1e-9);
                }
                Err(_) => prop_assert!(start >= end),
            }
        }
    }
}
