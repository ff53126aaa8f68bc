//! Backends for hosts without live media primitives.

use std::time::Duration;

use gifnew_clip_model::clip::ClipHandle;
use gifnew_common::error::{GifnewError, GifnewResult};

use crate::device::{CaptureConstraints, CaptureDevice, DeviceError, StreamHandle};
use crate::recorder::Recorder;
use crate::trim::PlaybackCapture;

/// Camera backend for hosts with no camera access.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedCaptureDevice;

#[async_trait::async_trait]
impl CaptureDevice for UnsupportedCaptureDevice {
    async fn acquire(&self, _constraints: &CaptureConstraints) -> Result<StreamHandle, DeviceError> {
        Err(DeviceError::Unavailable(
            "no camera backend on this host".to_string(),
        ))
    }
}

/// Recorder for hosts that can only work on stored clips.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedRecorder;

#[async_trait::async_trait]
impl Recorder for UnsupportedRecorder {
    async fn start(&mut self, _stream: &StreamHandle, _slice: Duration) -> GifnewResult<()> {
        Err(GifnewError::capture("no media recorder on this host"))
    }

    async fn stop(&mut self) -> GifnewResult<Vec<Vec<u8>>> {
        Err(GifnewError::capture("no media recorder on this host"))
    }

    fn mime(&self) -> &str {
        "video/webm"
    }
}

/// Playback re-capture backend that always declines, so trims are deferred.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedPlaybackCapture;

#[async_trait::async_trait]
impl PlaybackCapture for UnsupportedPlaybackCapture {
    fn is_supported(&self) -> bool {
        false
    }

    async fn begin(&self, _clip: &ClipHandle, _start_secs: f64) -> GifnewResult<()> {
        Err(GifnewError::trim_unsupported("playback capture not available"))
    }

    fn position_secs(&self) -> f64 {
        0.0
    }

    async fn finish(&self) -> GifnewResult<Vec<u8>> {
        Err(GifnewError::trim_unsupported("playback capture not available"))
    }
}
