//! Camera acquisition.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use gifnew_common::config::CaptureDefaults;
use gifnew_common::error::{GifnewError, GifnewResult};
use gifnew_common::retry::{AttemptCounter, RetryDecision, RetryPolicy};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Kind of media carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// One track of a live capture stream.
pub trait MediaTrack: Send + Sync {
    fn kind(&self) -> TrackKind;

    /// Whether the track is live and enabled.
    fn is_enabled(&self) -> bool;

    /// Stop the underlying source. Called at most once per handle.
    fn stop(&self);
}

/// A live capture stream. Clones share the release state.
#[derive(Clone)]
pub struct StreamHandle {
    id: u64,
    tracks: Arc<Vec<Arc<dyn MediaTrack>>>,
    released: Arc<AtomicBool>,
}

impl StreamHandle {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
            tracks: Arc::new(tracks),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    /// A permission grant is useless without at least one enabled video track.
    pub fn has_live_video(&self) -> bool {
        !self.is_released()
            && self
                .tracks
                .iter()
                .any(|t| t.kind() == TrackKind::Video && t.is_enabled())
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Stop every track. Safe to call repeatedly and on any clone.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        for track in self.tracks.iter() {
            track.stop();
        }
        tracing::debug!(stream = self.id, tracks = self.tracks.len(), "Released capture stream");
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.id)
            .field("tracks", &self.tracks.len())
            .field("released", &self.is_released())
            .finish()
    }
}

/// Resolution and camera hints passed to the device.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub aspect_ratio: f64,
    pub facing_mode: String,
    pub audio: bool,
}

impl From<&CaptureDefaults> for CaptureConstraints {
    fn from(defaults: &CaptureDefaults) -> Self {
        Self {
            ideal_width: defaults.ideal_width,
            ideal_height: defaults.ideal_height,
            aspect_ratio: defaults.aspect_ratio,
            facing_mode: defaults.facing_mode.clone(),
            audio: false,
        }
    }
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self::from(&CaptureDefaults::default())
    }
}

/// Failure reported by a capture device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device unavailable: {0}")]
    Unavailable(String),
}

/// Platform camera primitive.
#[async_trait::async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn acquire(&self, constraints: &CaptureConstraints) -> Result<StreamHandle, DeviceError>;
}

/// Owns the camera stream for a session and retries acquisition.
pub struct DeviceSession {
    device: Arc<dyn CaptureDevice>,
    constraints: CaptureConstraints,
    counter: AttemptCounter,
    stream: Option<StreamHandle>,
    has_permission: bool,
}

impl DeviceSession {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        constraints: CaptureConstraints,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            device,
            constraints,
            counter: AttemptCounter::new(retry),
            stream: None,
            has_permission: false,
        }
    }

    /// Acquire (or reuse) a stream with an enabled video track.
    ///
    /// Fails with `PermissionDenied` when the last attempt was refused, and
    /// `DeviceUnavailable` otherwise, once the retry budget is spent.
    pub async fn acquire(&mut self) -> GifnewResult<StreamHandle> {
        if let Some(stream) = &self.stream {
            if stream.has_live_video() {
                return Ok(stream.clone());
            }
        }
        self.release();
        self.counter.reset();

        loop {
            let attempt = self.counter.begin_attempt();
            let failure = match self.device.acquire(&self.constraints).await {
                Ok(stream) if stream.has_live_video() => {
                    tracing::info!(stream = stream.id(), attempt, "Camera stream acquired");
                    self.has_permission = true;
                    self.stream = Some(stream.clone());
                    return Ok(stream);
                }
                Ok(stream) => {
                    stream.release();
                    DeviceError::Unavailable("stream has no enabled video track".into())
                }
                Err(e) => e,
            };

            if matches!(failure, DeviceError::PermissionDenied(_)) {
                self.has_permission = false;
            }
            tracing::warn!(attempt, error = %failure, "Camera acquisition failed");

            match self.counter.record_failure() {
                RetryDecision::RetryAfter(delay) => tokio::time::sleep(delay).await,
                RetryDecision::Exhausted => {
                    return Err(match failure {
                        DeviceError::PermissionDenied(message) => {
                            GifnewError::PermissionDenied { message }
                        }
                        DeviceError::Unavailable(message) => GifnewError::DeviceUnavailable {
                            attempts: attempt,
                            message,
                        },
                    });
                }
            }
        }
    }

    /// Stop the current stream, if any.
    pub fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.release();
        }
    }

    pub fn stream(&self) -> Option<&StreamHandle> {
        self.stream.as_ref()
    }

    /// Cached for the rest of the session so callers can skip re-prompting.
    pub fn has_permission(&self) -> bool {
        self.has_permission
    }

    /// Attempts made by the latest acquisition.
    pub fn attempts(&self) -> u32 {
        self.counter.attempts()
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct FakeTrack {
        kind: TrackKind,
        enabled: bool,
        stops: Arc<AtomicUsize>,
    }

    impl MediaTrack for FakeTrack {
        fn kind(&self) -> TrackKind {
            self.kind
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    enum Reply {
        Live,
        Dead,
        Denied,
        Busy,
    }

    struct ScriptedDevice {
        replies: Mutex<VecDeque<Reply>>,
        stops: Arc<AtomicUsize>,
    }

    impl ScriptedDevice {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                stops: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn stream(&self, enabled: bool) -> StreamHandle {
            StreamHandle::new(vec![Arc::new(FakeTrack {
                kind: TrackKind::Video,
                enabled,
                stops: Arc::clone(&self.stops),
            })])
        }
    }

    #[async_trait::async_trait]
    impl CaptureDevice for ScriptedDevice {
        async fn acquire(
            &self,
            _constraints: &CaptureConstraints,
        ) -> Result<StreamHandle, DeviceError> {
            let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Busy);
            match reply {
                Reply::Live => Ok(self.stream(true)),
                Reply::Dead => Ok(self.stream(false)),
                Reply::Denied => Err(DeviceError::PermissionDenied("NotAllowedError".into())),
                Reply::Busy => Err(DeviceError::Unavailable("NotReadableError".into())),
            }
        }
    }

    fn session(device: Arc<ScriptedDevice>) -> DeviceSession {
        DeviceSession::new(device, CaptureConstraints::default(), RetryPolicy::new(4, 2000))
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_track_is_retried() {
        let device = ScriptedDevice::new(vec![Reply::Dead, Reply::Live]);
        let mut session = session(Arc::clone(&device));

        let started = tokio::time::Instant::now();
        let stream = session.acquire().await.unwrap();
        assert!(stream.has_live_video());
        assert_eq!(session.attempts(), 2);
        assert!(session.has_permission());
        assert_eq!(started.elapsed(), std::time::Duration::from_secs(2));
        // The dead stream was stopped before retrying.
        assert_eq!(device.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface_unavailable() {
        let device = ScriptedDevice::new(vec![Reply::Busy, Reply::Busy, Reply::Busy, Reply::Busy]);
        let mut session = session(device);

        let err = session.acquire().await.unwrap_err();
        assert!(matches!(err, GifnewError::DeviceUnavailable { attempts: 4, .. }));
        assert!(!session.has_permission());
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_denial_surfaces_permission_denied() {
        let device =
            ScriptedDevice::new(vec![Reply::Busy, Reply::Busy, Reply::Busy, Reply::Denied]);
        let mut session = session(device);

        let err = session.acquire().await.unwrap_err();
        assert!(matches!(err, GifnewError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let device = ScriptedDevice::new(vec![Reply::Live]);
        let mut session = session(Arc::clone(&device));
        let stream = session.acquire().await.unwrap();

        session.release();
        session.release();
        stream.release();
        assert!(stream.is_released());
        assert_eq!(device.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_live_stream_is_reused() {
        let device = ScriptedDevice::new(vec![Reply::Live]);
        let mut session = session(device);
        let first = session.acquire().await.unwrap();
        let second = session.acquire().await.unwrap();
        assert_eq!(first.id(), second.id());
    }
}
