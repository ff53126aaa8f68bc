//! Conversion jobs and their progress.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::clip::{ClipHandle, TrimRange};
use crate::overlay::TextOverlay;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Coarse pipeline milestones, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Started,
    InputWritten,
    FontsLoaded,
    Normalized,
    OverlaysBurned,
    Encoded,
    Done,
}

impl Milestone {
    pub fn percent(self) -> u8 {
        match self {
            Milestone::Started => 10,
            Milestone::InputWritten => 30,
            Milestone::FontsLoaded => 50,
            Milestone::Normalized => 70,
            Milestone::OverlaysBurned => 85,
            Milestone::Encoded => 90,
            Milestone::Done => 100,
        }
    }
}

/// Progress that never moves backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversionProgress(u8);

impl ConversionProgress {
    pub fn value(self) -> u8 {
        self.0
    }

    /// Raise progress to `percent`. Regressions are ignored; returns whether
    /// the value changed.
    pub fn advance(&mut self, percent: u8) -> bool {
        let percent = percent.min(100);
        if percent > self.0 {
            self.0 = percent;
            true
        } else {
            false
        }
    }

    pub fn reach(&mut self, milestone: Milestone) -> bool {
        self.advance(milestone.percent())
    }

    pub fn is_complete(self) -> bool {
        self.0 == 100
    }
}

/// One transcode attempt over read-only snapshots of the session.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    id: u64,
    clip: ClipHandle,
    trim: Option<TrimRange>,
    overlays: Vec<TextOverlay>,
}

impl ConversionJob {
    /// `trim` is on the clip's visible timeline; `None` means the whole clip.
    pub fn new(clip: ClipHandle, trim: Option<TrimRange>, overlays: Vec<TextOverlay>) -> Self {
        Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            clip,
            trim,
            overlays,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn clip(&self) -> &ClipHandle {
        &self.clip
    }

    pub fn trim(&self) -> Option<TrimRange> {
        self.trim
    }

    pub fn overlays(&self) -> &[TextOverlay] {
        &self.overlays
    }

    /// The one absolute window to cut from the clip bytes, if any.
    pub fn source_cut(&self) -> Option<TrimRange> {
        self.clip.effective_cut(self.trim)
    }
}
