//! Trim, caption and convert a stored clip.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gifnew_capture_engine::{UnsupportedCaptureDevice, UnsupportedPlaybackCapture, UnsupportedRecorder};
use gifnew_common::config::AppConfig;
use gifnew_render_engine::engine::EngineHandle;
use gifnew_render_engine::ffmpeg::probe_duration_secs;
use gifnew_render_engine::fonts::DirectoryFontSource;
use gifnew_render_engine::pipeline::TranscodePipeline;
use gifnew_render_engine::FfmpegProcessEngine;
use gifnew_session::{InMemoryBlobStore, SessionDeps, SessionMachine, SessionSignal};

pub struct ConvertOptions {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub texts: Vec<String>,
    pub font: String,
    pub font_size: Option<u32>,
    pub color: String,
    pub background: bool,
    pub fonts: Option<PathBuf>,
    pub fps: Option<u32>,
    pub width: Option<u32>,
}

/// A caption given as `TEXT` or `TEXT@X,Y`.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionSpec {
    pub text: String,
    pub position: Option<(f64, f64)>,
}

impl CaptionSpec {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let Some((text, position)) = raw.rsplit_once('@') else {
            return Ok(Self {
                text: raw.to_string(),
                position: None,
            });
        };
        let Some((x, y)) = position.split_once(',') else {
            // An '@' inside the caption itself.
            return Ok(Self {
                text: raw.to_string(),
                position: None,
            });
        };
        let x: f64 = x
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid caption x position in {raw:?}"))?;
        let y: f64 = y
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid caption y position in {raw:?}"))?;
        Ok(Self {
            text: text.to_string(),
            position: Some((x, y)),
        })
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") | Some("m4v") | Some("mov") => "video/mp4",
        _ => "video/webm",
    }
}

pub async fn run(options: ConvertOptions) -> anyhow::Result<()> {
    let captions = options
        .texts
        .iter()
        .map(|raw| CaptionSpec::parse(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut config = AppConfig::load();
    if let Some(fps) = options.fps {
        config.transcode.fps = fps;
    }
    if let Some(width) = options.width {
        config.transcode.max_width = width;
    }
    let font_dir = options
        .fonts
        .clone()
        .unwrap_or_else(|| config.fonts.asset_dir.clone());

    println!("Converting clip: {}", options.input.display());
    let bytes = tokio::fs::read(&options.input)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", options.input.display()))?;
    let duration = probe_duration_secs(&options.input).await;
    match duration {
        Some(secs) => println!("  Duration: {secs:.2}s"),
        None => println!("  Duration: unknown"),
    }

    let engine = FfmpegProcessEngine::new()?;
    if !engine.is_available() {
        return Err(anyhow::anyhow!("ffmpeg not found on PATH. Run `gifnew check`."));
    }
    let handle = EngineHandle::from_config(Arc::new(engine), &config.engine);
    let pipeline = TranscodePipeline::new(
        Arc::new(handle),
        Arc::new(DirectoryFontSource::new(font_dir)),
        config.transcode.clone(),
    );
    let mut machine = SessionMachine::new(
        SessionDeps {
            device: Arc::new(UnsupportedCaptureDevice),
            recorder: Box::new(UnsupportedRecorder),
            playback: Arc::new(UnsupportedPlaybackCapture),
            pipeline,
            blobs: Arc::new(InMemoryBlobStore::new()),
        },
        config.capture.clone(),
    );

    let mut signals = machine.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(signal) = signals.recv().await {
            match signal {
                SessionSignal::Progress(p) => print!("\r  Progress: {p}%  "),
                SessionSignal::Warning(message) => println!("\n  [WARN] {message}"),
                SessionSignal::Error { message, .. } => println!("\n  [ERROR] {message}"),
                _ => {}
            }
        }
    });

    machine.load_clip(bytes, mime_for(&options.input), duration)?;

    if options.start.is_some() || options.end.is_some() {
        let Some(secs) = duration else {
            return Err(anyhow::anyhow!(
                "Cannot trim: clip duration unknown (is ffprobe installed?)"
            ));
        };
        let start = options.start.unwrap_or(0.0);
        let end = options.end.unwrap_or(secs).min(secs);
        machine.enter_trim_mode()?;
        machine.set_trim_range(start, end)?;
        machine.finish_trim().await?;
        println!("  Trim: {start:.2}s to {end:.2}s");
    }

    for caption in captions {
        let mut overlay = machine.create_overlay();
        overlay.text = caption.text;
        if let Some((x, y)) = caption.position {
            overlay.set_position(x, y);
        }
        overlay.font_family = options.font.clone();
        overlay.font_color = options.color.clone();
        overlay.show_background = options.background;
        if let Some(size) = options.font_size {
            overlay.font_size = size;
        }
        if !machine.upsert_overlay(overlay)? {
            tracing::warn!("Skipping blank caption");
        }
    }

    let result = machine.convert().await;
    // Dropping the machine closes the signal channel.
    let artifact = machine.artifact().cloned();
    drop(machine);
    let _ = printer.await;
    result?;

    let artifact = artifact.ok_or_else(|| anyhow::anyhow!("Conversion produced no artifact"))?;
    let output = options
        .output
        .unwrap_or_else(|| PathBuf::from(artifact.file_name()));
    tokio::fs::write(&output, artifact.bytes())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", output.display()))?;
    println!("\nConversion complete: {} ({} bytes)", output.display(), artifact.len());

    Ok(())
}
