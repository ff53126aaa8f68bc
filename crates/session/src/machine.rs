//! The session state machine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gifnew_capture_engine::device::{CaptureConstraints, CaptureDevice, DeviceSession};
use gifnew_capture_engine::recorder::{RecordedMedia, Recorder};
use gifnew_capture_engine::timer::{RecordingTimer, TimerEvent};
use gifnew_capture_engine::trim::{PlaybackCapture, TrimController};
use gifnew_clip_model::artifact::Artifact;
use gifnew_clip_model::clip::{ClipHandle, TrimRange};
use gifnew_clip_model::drag::{DragController, Rect};
use gifnew_clip_model::job::ConversionJob;
use gifnew_clip_model::overlay::{LegacyOverlay, OverlayModel, TextOverlay};
use gifnew_common::config::CaptureDefaults;
use gifnew_common::error::{GifnewError, GifnewResult};
use gifnew_render_engine::engine::EngineHandle;
use gifnew_render_engine::pipeline::{PipelineEvent, TranscodePipeline};
use tokio::sync::{broadcast, Notify};

use crate::blobs::{BlobStore, BlobUrl};
use crate::signals::SessionSignal;
use crate::state::SessionState;

const SIGNAL_CAPACITY: usize = 256;

/// Requests a manual stop of the recording in progress.
///
/// Cloned out of the machine before `record` is awaited, since the machine
/// itself is mutably borrowed for the whole recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingStopper {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl RecordingStopper {
    pub fn stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    async fn notified(&self) {
        self.notify.notified().await
    }
}

/// Collaborators the machine drives.
pub struct SessionDeps {
    pub device: Arc<dyn CaptureDevice>,
    pub recorder: Box<dyn Recorder>,
    pub playback: Arc<dyn PlaybackCapture>,
    pub pipeline: TranscodePipeline,
    pub blobs: Arc<dyn BlobStore>,
}

enum RecordStep {
    StopRequested,
    Timer(Option<TimerEvent>),
}

/// Owns one capture/edit/convert session.
pub struct SessionMachine {
    capture: CaptureDefaults,
    device: DeviceSession,
    recorder: Box<dyn Recorder>,
    trim: TrimController,
    pipeline: TranscodePipeline,
    blobs: Arc<dyn BlobStore>,
    signals: broadcast::Sender<SessionSignal>,
    stopper: RecordingStopper,

    state: SessionState,
    clip: Option<ClipHandle>,
    clip_url: Option<BlobUrl>,
    trim_range: Option<TrimRange>,
    overlays: OverlayModel,
    drag: DragController,
    artifact: Option<Artifact>,
    artifact_url: Option<BlobUrl>,
    last_error: Option<String>,
}

impl SessionMachine {
    pub fn new(deps: SessionDeps, capture: CaptureDefaults) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        let device = DeviceSession::new(
            deps.device,
            CaptureConstraints::from(&capture),
            capture.device_retry,
        );
        Self {
            device,
            recorder: deps.recorder,
            trim: TrimController::new(deps.playback),
            pipeline: deps.pipeline,
            blobs: deps.blobs,
            signals,
            stopper: RecordingStopper::default(),
            capture,
            state: SessionState::Idle,
            clip: None,
            clip_url: None,
            trim_range: None,
            overlays: OverlayModel::new(),
            drag: DragController::new(),
            artifact: None,
            artifact_url: None,
            last_error: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionSignal> {
        self.signals.subscribe()
    }

    pub fn stopper(&self) -> RecordingStopper {
        self.stopper.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn clip(&self) -> Option<&ClipHandle> {
        self.clip.as_ref()
    }

    pub fn clip_url(&self) -> Option<&BlobUrl> {
        self.clip_url.as_ref()
    }

    /// The clip an undo would restore.
    pub fn original_clip(&self) -> Option<&ClipHandle> {
        self.trim.original()
    }

    pub fn trim_range(&self) -> Option<TrimRange> {
        self.trim_range
    }

    pub fn overlays(&self) -> Vec<TextOverlay> {
        self.overlays.snapshot()
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn artifact_url(&self) -> Option<&BlobUrl> {
        self.artifact_url.as_ref()
    }

    pub fn has_permission(&self) -> bool {
        self.device.has_permission()
    }

    pub fn engine(&self) -> &Arc<EngineHandle> {
        self.pipeline.engine()
    }

    /// Message of the last surfaced failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Acquire the camera and show a live preview.
    pub async fn start_preview(&mut self) -> GifnewResult<()> {
        match self.state {
            SessionState::Previewing => return Ok(()),
            SessionState::Idle => {}
            other => return Err(GifnewError::invalid_transition(other.name(), "start preview")),
        }
        match self.device.acquire().await {
            Ok(_) => {
                self.set_state(SessionState::Previewing);
                Ok(())
            }
            Err(e) => {
                self.device.release();
                self.set_state(SessionState::Idle);
                self.surface(&e);
                Err(e)
            }
        }
    }

    /// Count down, record until the budget runs out or [`RecordingStopper::stop`]
    /// is called, then enter `Edited` with the timer-derived duration.
    ///
    /// Recording over an existing clip discards the old session first.
    pub async fn record(&mut self) -> GifnewResult<()> {
        match self.state {
            SessionState::Idle | SessionState::Previewing => {}
            SessionState::Edited { .. } | SessionState::Result => {
                tracing::info!("Discarding current session for a new recording");
                self.reset();
            }
            other => return Err(GifnewError::invalid_transition(other.name(), "record")),
        }
        self.stopper.clear();

        for remaining in (1..=self.capture.countdown_secs).rev() {
            self.set_state(SessionState::Countdown { remaining });
            self.emit(SessionSignal::CountdownTick(remaining));
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        if self.stopper.is_requested() {
            tracing::info!("Recording cancelled during countdown");
            let state = if self.device.stream().is_some() {
                SessionState::Previewing
            } else {
                SessionState::Idle
            };
            self.set_state(state);
            return Ok(());
        }

        let stream = match self.device.acquire().await {
            Ok(stream) => stream,
            Err(e) => return Err(self.abort_capture(e)),
        };
        let slice = Duration::from_millis(self.capture.slice_interval_ms);
        if let Err(e) = self.recorder.start(&stream, slice).await {
            return Err(self.abort_capture(e));
        }

        let budget = self.capture.budget_secs;
        let mut timer = RecordingTimer::start(budget);
        self.set_state(SessionState::Recording { remaining: budget });
        tracing::info!(budget_secs = budget, stream = stream.id(), "Recording started");

        let stopper = self.stopper.clone();
        loop {
            let step = tokio::select! {
                biased;
                _ = stopper.notified() => RecordStep::StopRequested,
                event = timer.next_event() => RecordStep::Timer(event),
            };
            match step {
                RecordStep::StopRequested if stopper.is_requested() => {
                    tracing::info!(remaining = timer.remaining(), "Recording stopped manually");
                    break;
                }
                RecordStep::StopRequested => {}
                RecordStep::Timer(Some(TimerEvent::Tick { remaining })) => {
                    self.state = SessionState::Recording { remaining };
                    self.emit(SessionSignal::RecordingTick { remaining });
                }
                RecordStep::Timer(Some(TimerEvent::Expired)) | RecordStep::Timer(None) => {
                    self.emit(SessionSignal::RecordingTick { remaining: 0 });
                    break;
                }
            }
        }

        let duration_secs = timer.stop();
        let media = match self.recorder.stop().await {
            Ok(chunks) => RecordedMedia::assemble(chunks, self.recorder.mime()),
            Err(e) => Err(e),
        };
        self.device.release();
        let media = match media {
            Ok(media) => media,
            Err(e) => return Err(self.abort_capture(e)),
        };

        tracing::info!(duration_secs, bytes = media.bytes.len(), "Recording finished");
        self.trim.reset();
        self.install_clip(ClipHandle::recorded(media.bytes, media.mime, duration_secs));
        self.set_state(SessionState::Edited { trim_mode: false });
        Ok(())
    }

    fn abort_capture(&mut self, e: GifnewError) -> GifnewError {
        self.device.release();
        self.set_state(SessionState::Idle);
        self.surface(&e);
        e
    }

    /// Enter `Edited` with a clip from storage. Its duration can only come
    /// from container metadata, which may arrive later.
    pub fn load_clip(
        &mut self,
        bytes: Vec<u8>,
        mime: &str,
        metadata_duration_secs: Option<f64>,
    ) -> GifnewResult<()> {
        if matches!(
            self.state,
            SessionState::Converting | SessionState::Countdown { .. } | SessionState::Recording { .. }
        ) {
            return Err(GifnewError::invalid_transition(self.state.name(), "load a clip"));
        }
        if bytes.is_empty() {
            return Err(GifnewError::capture("clip is empty"));
        }
        self.reset();
        self.install_clip(ClipHandle::from_storage(bytes, mime, metadata_duration_secs));
        self.set_state(SessionState::Edited { trim_mode: false });
        Ok(())
    }

    /// Late container metadata for the current clip. Ignored whenever the
    /// current duration came from the recording timer or a trim.
    pub fn on_metadata_duration(&mut self, secs: f64) -> bool {
        let Some(clip) = self.clip.as_mut() else {
            return false;
        };
        if !clip.apply_metadata_duration(secs) {
            return false;
        }
        let duration_secs = clip.duration_secs();
        self.trim_range = Some(TrimRange::full(duration_secs));
        self.emit(SessionSignal::DurationChanged { duration_secs });
        true
    }

    /// Enter trim mode with the range seeded to the whole clip.
    pub fn enter_trim_mode(&mut self) -> GifnewResult<()> {
        self.require_state(SessionState::Edited { trim_mode: false }, "trim")?;
        let duration = self.current_clip()?.duration_secs();
        if duration <= 0.0 {
            return Err(GifnewError::invalid_transition(
                "waiting for the clip duration",
                "trim",
            ));
        }
        self.trim_range = Some(TrimRange::full(duration));
        self.set_state(SessionState::Edited { trim_mode: true });
        Ok(())
    }

    /// Move the trim handles. Returns where the preview should seek.
    pub fn set_trim_range(&mut self, start: f64, end: f64) -> GifnewResult<Option<f64>> {
        self.require_state(SessionState::Edited { trim_mode: true }, "adjust the trim")?;
        let duration = self.current_clip()?.duration_secs();
        let range = TrimRange::new(start, end, duration)?;
        let previous = self.trim_range.unwrap_or_else(|| TrimRange::full(duration));
        self.trim_range = Some(range);
        let seek = range.seek_target(&previous);
        if let Some(position_secs) = seek {
            self.emit(SessionSignal::Seek { position_secs });
        }
        Ok(seek)
    }

    /// "Done": leave trim mode, committing the range if it changed.
    pub async fn finish_trim(&mut self) -> GifnewResult<()> {
        self.require_state(SessionState::Edited { trim_mode: true }, "finish trimming")?;
        let clip = self.current_clip()?.clone();
        let range = self
            .trim_range
            .unwrap_or_else(|| TrimRange::full(clip.duration_secs()));

        if range.is_full(clip.duration_secs()) {
            self.set_state(SessionState::Edited { trim_mode: false });
            return Ok(());
        }

        let outcome = self.trim.commit(&clip, range).await?;
        let deferred = outcome.is_deferred();
        if deferred {
            self.emit(SessionSignal::Warning(
                "Trim will be applied when converting".to_string(),
            ));
        }
        let trimmed = outcome.into_clip();
        let duration_secs = trimmed.duration_secs();
        self.install_clip(trimmed);
        self.emit(SessionSignal::TrimCommitted {
            duration_secs,
            deferred,
        });
        self.set_state(SessionState::Edited { trim_mode: false });
        Ok(())
    }

    /// Leave trim mode without committing.
    pub fn cancel_trim(&mut self) -> GifnewResult<()> {
        self.require_state(SessionState::Edited { trim_mode: true }, "cancel trimming")?;
        self.trim_range = self
            .clip
            .as_ref()
            .filter(|c| c.has_known_duration())
            .map(|c| TrimRange::full(c.duration_secs()));
        self.set_state(SessionState::Edited { trim_mode: false });
        Ok(())
    }

    /// Restore the pre-trim clip. Returns `false` when nothing was trimmed.
    pub fn undo_trim(&mut self) -> GifnewResult<bool> {
        self.require_state(SessionState::Edited { trim_mode: false }, "undo the trim")?;
        let Some(original) = self.trim.undo() else {
            return Ok(false);
        };
        let duration_secs = original.duration_secs();
        self.install_clip(original);
        self.emit(SessionSignal::TrimUndone { duration_secs });
        Ok(true)
    }

    /// A new overlay with default styling, not yet added.
    pub fn create_overlay(&self) -> TextOverlay {
        self.overlays.create()
    }

    /// Add or replace an overlay. Blank text is ignored (`Ok(false)`).
    pub fn upsert_overlay(&mut self, overlay: TextOverlay) -> GifnewResult<bool> {
        self.require_editing("edit overlays")?;
        Ok(self.overlays.upsert(overlay))
    }

    pub fn remove_overlay(&mut self, id: &str) -> GifnewResult<Option<TextOverlay>> {
        self.require_editing("remove overlays")?;
        if self.drag.overlay_id() == Some(id) {
            self.drag.end();
        }
        Ok(self.overlays.remove(id))
    }

    pub fn move_overlay(&mut self, id: &str, x: f64, y: f64) -> GifnewResult<bool> {
        self.require_editing("move overlays")?;
        Ok(self.overlays.move_to(id, x, y))
    }

    /// Fold a legacy single overlay into the overlay model.
    pub fn ingest_legacy_overlay(&mut self, legacy: Option<LegacyOverlay>) {
        self.overlays.set_legacy(legacy);
    }

    pub fn begin_drag(&mut self, id: &str, bounds: Rect) -> GifnewResult<()> {
        self.require_editing("drag overlays")?;
        if self.overlays.get(id).is_none() {
            return Err(GifnewError::invalid_transition(
                self.state.name(),
                format!("drag unknown overlay {id}"),
            ));
        }
        self.drag.begin(id, bounds);
        Ok(())
    }

    /// Pointer moved during a drag. Returns the overlay's new center.
    pub fn drag_to(&mut self, pointer_x: f64, pointer_y: f64) -> Option<(f64, f64)> {
        let (id, x, y) = self.drag.pointer_moved(pointer_x, pointer_y)?;
        let id = id.to_string();
        self.overlays.move_to(&id, x, y).then_some((x, y))
    }

    pub fn end_drag(&mut self) -> Option<String> {
        self.drag.end()
    }

    /// Initialize the transcoding engine ahead of the first conversion.
    pub async fn preload_engine(&mut self) -> GifnewResult<()> {
        let result = self.pipeline.engine().ensure_loaded().await.map(|_| ());
        if let Err(e) = &result {
            self.surface(e);
        }
        result
    }

    /// Manual retry after an engine load failure: resets the attempt
    /// counter and loads again.
    pub async fn retry_engine(&mut self) -> GifnewResult<()> {
        self.last_error = None;
        let result = self.pipeline.engine().retry().await.map(|_| ());
        if let Err(e) = &result {
            self.surface(e);
        }
        result
    }

    /// Convert the current clip with its trim and overlays.
    ///
    /// On failure the session returns to `Edited` with clip, trim and
    /// overlays untouched, and the error is surfaced.
    pub async fn convert(&mut self) -> GifnewResult<()> {
        self.require_state(SessionState::Edited { trim_mode: false }, "convert")?;
        let clip = self.current_clip()?.clone();
        let job = ConversionJob::new(clip, self.trim_range, self.overlays.snapshot());

        self.release_artifact();
        self.last_error = None;
        self.set_state(SessionState::Converting);

        let signals = self.signals.clone();
        let on_event = move |event: PipelineEvent| {
            let signal = match event {
                PipelineEvent::Progress(p) => SessionSignal::Progress(p),
                PipelineEvent::Warning(w) => SessionSignal::Warning(w),
            };
            let _ = signals.send(signal);
        };

        match self.pipeline.run(&job, &on_event).await {
            Ok(artifact) => {
                let url = self.blobs.publish(artifact.shared_bytes(), artifact.mime());
                let file_name = artifact.file_name().to_string();
                self.artifact = Some(artifact);
                self.artifact_url = Some(url.clone());
                self.set_state(SessionState::Result);
                self.emit(SessionSignal::ArtifactReady { url, file_name });
                Ok(())
            }
            Err(e) => {
                self.set_state(SessionState::Edited { trim_mode: false });
                self.surface(&e);
                Err(e)
            }
        }
    }

    /// Drop the artifact and return to editing the same clip.
    pub fn back_to_editor(&mut self) -> GifnewResult<()> {
        self.require_state(SessionState::Result, "go back to the editor")?;
        self.release_artifact();
        self.set_state(SessionState::Edited { trim_mode: false });
        Ok(())
    }

    /// Release everything and return to `Idle`.
    pub fn reset(&mut self) {
        self.device.release();
        self.release_artifact();
        if let Some(url) = self.clip_url.take() {
            self.blobs.revoke(&url);
        }
        self.clip = None;
        self.trim.reset();
        self.trim_range = None;
        self.overlays.clear();
        self.drag.end();
        self.last_error = None;
        self.set_state(SessionState::Idle);
    }

    fn install_clip(&mut self, clip: ClipHandle) {
        self.release_artifact();
        if let Some(url) = self.clip_url.take() {
            self.blobs.revoke(&url);
        }
        let url = self.blobs.publish(clip.shared_bytes(), clip.mime());
        self.trim_range = clip
            .has_known_duration()
            .then(|| TrimRange::full(clip.duration_secs()));
        self.emit(SessionSignal::ClipReady {
            url: url.clone(),
            duration_secs: clip.duration_secs(),
        });
        self.clip_url = Some(url);
        self.clip = Some(clip);
    }

    fn release_artifact(&mut self) {
        if let Some(url) = self.artifact_url.take() {
            self.blobs.revoke(&url);
        }
        self.artifact = None;
    }

    fn current_clip(&self) -> GifnewResult<&ClipHandle> {
        self.clip
            .as_ref()
            .ok_or_else(|| GifnewError::invalid_transition(self.state.name(), "edit without a clip"))
    }

    fn require_state(&self, expected: SessionState, action: &str) -> GifnewResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(GifnewError::invalid_transition(self.state.name(), action))
        }
    }

    fn require_editing(&self, action: &str) -> GifnewResult<()> {
        if self.state.is_editing() {
            Ok(())
        } else {
            Err(GifnewError::invalid_transition(self.state.name(), action))
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            tracing::debug!(from = self.state.name(), to = state.name(), "Session state changed");
        }
        self.state = state;
        self.emit(SessionSignal::StateChanged(state));
    }

    fn surface(&mut self, error: &GifnewError) {
        tracing::error!(error = %error, retryable = error.is_user_retryable(), "Session error");
        let message = error.to_string();
        self.last_error = Some(message.clone());
        self.emit(SessionSignal::Error {
            message,
            retryable: error.is_user_retryable(),
        });
    }

    fn emit(&self, signal: SessionSignal) {
        tracing::debug!(?signal, "Session signal");
        // No subscribers is fine.
        let _ = self.signals.send(signal);
    }
}

impl Drop for SessionMachine {
    fn drop(&mut self) {
        self.release_artifact();
        if let Some(url) = self.clip_url.take() {
            self.blobs.revoke(&url);
        }
    }
}
