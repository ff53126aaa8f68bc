//! Test doubles for session scenarios.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gifnew_capture_engine::backend::UnsupportedPlaybackCapture;
use gifnew_capture_engine::device::{
    CaptureConstraints, CaptureDevice, DeviceError, MediaTrack, StreamHandle, TrackKind,
};
use gifnew_capture_engine::recorder::Recorder;
use gifnew_capture_engine::trim::PlaybackCapture;
use gifnew_clip_model::clip::ClipHandle;
use gifnew_common::config::{CaptureDefaults, EngineConfig, TranscodeSettings};
use gifnew_common::error::{GifnewError, GifnewResult};
use gifnew_render_engine::engine::{CoreAssets, EngineHandle, StoreEntry, TranscodeEngine};
use gifnew_render_engine::fonts::FontSource;
use gifnew_render_engine::pipeline::TranscodePipeline;
use gifnew_session::{InMemoryBlobStore, SessionDeps, SessionMachine};

pub struct CameraTrack {
    stops: Arc<AtomicUsize>,
}

impl MediaTrack for CameraTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Camera that grants access unless told to deny it.
#[derive(Default)]
pub struct FakeCamera {
    pub deny: AtomicBool,
    pub acquisitions: AtomicUsize,
    pub stops: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl CaptureDevice for FakeCamera {
    async fn acquire(&self, _constraints: &CaptureConstraints) -> Result<StreamHandle, DeviceError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if self.deny.load(Ordering::SeqCst) {
            return Err(DeviceError::PermissionDenied("NotAllowedError".into()));
        }
        Ok(StreamHandle::new(vec![Arc::new(CameraTrack {
            stops: Arc::clone(&self.stops),
        })]))
    }
}

/// Recorder that emits one chunk per started slice.
#[derive(Default)]
pub struct FakeRecorder {
    started: Option<tokio::time::Instant>,
    slice: Duration,
}

#[async_trait::async_trait]
impl Recorder for FakeRecorder {
    async fn start(&mut self, _stream: &StreamHandle, slice: Duration) -> GifnewResult<()> {
        self.started = Some(tokio::time::Instant::now());
        self.slice = slice;
        Ok(())
    }

    async fn stop(&mut self) -> GifnewResult<Vec<Vec<u8>>> {
        let started = self
            .started
            .take()
            .ok_or_else(|| GifnewError::capture("recorder not started"))?;
        let slices = (started.elapsed().as_millis() / self.slice.as_millis().max(1)) as u8 + 1;
        Ok((0..slices).map(|i| vec![0x1a, i]).collect())
    }

    fn mime(&self) -> &str {
        "video/webm"
    }
}

/// Playback that re-records at real speed (on the paused test clock).
#[derive(Default)]
pub struct RealtimePlayback {
    started: Mutex<Option<(tokio::time::Instant, f64)>>,
}

#[async_trait::async_trait]
impl PlaybackCapture for RealtimePlayback {
    fn is_supported(&self) -> bool {
        true
    }

    async fn begin(&self, _clip: &ClipHandle, start_secs: f64) -> GifnewResult<()> {
        *self.started.lock().unwrap() = Some((tokio::time::Instant::now(), start_secs));
        Ok(())
    }

    fn position_secs(&self) -> f64 {
        match *self.started.lock().unwrap() {
            Some((at, from)) => from + at.elapsed().as_secs_f64(),
            None => 0.0,
        }
    }

    async fn finish(&self) -> GifnewResult<Vec<u8>> {
        Ok(b"recaptured".to_vec())
    }
}

/// In-memory transcoder. Each exec writes its last argument.
#[derive(Default)]
pub struct MemoryEngine {
    pub failing_loads: AtomicU32,
    pub loads: AtomicU32,
    pub fail_exec_containing: Mutex<Option<String>>,
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub execs: Mutex<Vec<Vec<String>>>,
}

impl MemoryEngine {
    pub fn execs(&self) -> Vec<Vec<String>> {
        self.execs.lock().unwrap().clone()
    }

    pub fn fail_exec(&self, needle: Option<&str>) {
        *self.fail_exec_containing.lock().unwrap() = needle.map(str::to_string);
    }
}

#[async_trait::async_trait]
impl TranscodeEngine for MemoryEngine {
    async fn load(&self, _assets: &CoreAssets) -> GifnewResult<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_loads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_loads.store(remaining - 1, Ordering::SeqCst);
            return Err(GifnewError::engine("failed to fetch ffmpeg-core.wasm"));
        }
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> GifnewResult<()> {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn read_file(&self, name: &str) -> GifnewResult<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| GifnewError::FileNotFound { path: name.into() })
    }

    async fn list_dir(&self, _path: &str) -> GifnewResult<Vec<StoreEntry>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .map(|name| StoreEntry {
                name: name.clone(),
                is_dir: false,
            })
            .collect())
    }

    async fn delete_file(&self, name: &str) -> GifnewResult<()> {
        self.files.lock().unwrap().remove(name);
        Ok(())
    }

    async fn exec(&self, args: &[String]) -> GifnewResult<()> {
        self.execs.lock().unwrap().push(args.to_vec());
        let needle = self.fail_exec_containing.lock().unwrap().clone();
        if let Some(needle) = needle {
            if args.iter().any(|a| a.contains(&needle)) {
                return Err(GifnewError::engine("exit code 1"));
            }
        }
        if let Some(out) = args.last() {
            self.files
                .lock()
                .unwrap()
                .insert(out.clone(), b"GIF89a-test".to_vec());
        }
        Ok(())
    }
}

/// Every catalog font is available.
pub struct AllFonts;

#[async_trait::async_trait]
impl FontSource for AllFonts {
    async fn fetch(&self, _file: &str) -> GifnewResult<Vec<u8>> {
        Ok(b"ttf".to_vec())
    }
}

pub struct Harness {
    pub machine: SessionMachine,
    pub camera: Arc<FakeCamera>,
    pub engine: Arc<MemoryEngine>,
    pub blobs: Arc<InMemoryBlobStore>,
}

pub fn harness() -> Harness {
    harness_with(Arc::new(UnsupportedPlaybackCapture))
}

pub fn harness_with(playback: Arc<dyn PlaybackCapture>) -> Harness {
    let camera = Arc::new(FakeCamera::default());
    let engine = Arc::new(MemoryEngine::default());
    let blobs = Arc::new(InMemoryBlobStore::new());

    let handle = EngineHandle::from_config(engine.clone(), &EngineConfig::default());
    let pipeline = TranscodePipeline::new(
        Arc::new(handle),
        Arc::new(AllFonts),
        TranscodeSettings::default(),
    );
    let machine = SessionMachine::new(
        SessionDeps {
            device: camera.clone(),
            recorder: Box::new(FakeRecorder::default()),
            playback,
            pipeline,
            blobs: blobs.clone(),
        },
        CaptureDefaults::default(),
    );
    Harness {
        machine,
        camera,
        engine,
        blobs,
    }
}

/// Pre-recorded "storage" bytes.
pub fn stored_clip_bytes() -> Vec<u8> {
    vec![0x1a, 0x45, 0xdf, 0xa3]
}
