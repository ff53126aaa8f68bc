//! The GIF transcode pipeline.
//!
//! Stages run strictly in order against a single engine: write input, load
//! fonts, normalize, burn overlays, palette encode. The palette encode falls
//! back to a direct encode; every other failure abandons the job.

use std::collections::HashSet;
use std::sync::Arc;

use gifnew_clip_model::artifact::Artifact;
use gifnew_clip_model::clip::TrimRange;
use gifnew_clip_model::job::{ConversionJob, ConversionProgress, Milestone};
use gifnew_clip_model::overlay::{burn_instructions, ApproximateMetrics, BurnInstruction};
use gifnew_common::config::TranscodeSettings;
use gifnew_common::error::{GifnewError, GifnewResult};

use crate::engine::{store_contains, EngineHandle, TranscodeEngine};
use crate::fonts::{font_file_for, FontSource};

pub const NORMALIZED_FILE: &str = "temp.mp4";
pub const PALETTE_FILE: &str = "palette.png";
pub const OUTPUT_FILE: &str = "output.gif";

/// Notifications emitted while a job runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// New progress value, 0–100, never decreasing.
    Progress(u8),
    /// A recoverable downgrade (skipped overlay, palette fallback).
    Warning(String),
}

/// Runs conversion jobs against the shared engine.
pub struct TranscodePipeline {
    engine: Arc<EngineHandle>,
    fonts: Arc<dyn FontSource>,
    settings: TranscodeSettings,
}

/// Per-job mutable bookkeeping.
struct JobRun<'a> {
    engine: Arc<dyn TranscodeEngine>,
    progress: ConversionProgress,
    on_event: &'a (dyn Fn(PipelineEvent) + Send + Sync),
    written: Vec<String>,
}

impl JobRun<'_> {
    fn reach(&mut self, milestone: Milestone) {
        if self.progress.reach(milestone) {
            (self.on_event)(PipelineEvent::Progress(self.progress.value()));
        }
    }

    fn warn(&self, message: String) {
        (self.on_event)(PipelineEvent::Warning(message));
    }

    async fn exec(&mut self, stage: &str, args: Vec<String>) -> GifnewResult<()> {
        if let Some(output) = args.last() {
            self.written.push(output.clone());
        }
        tracing::debug!(stage, ?args, "Running engine operation");
        self.engine
            .exec(&args)
            .await
            .map_err(|e| GifnewError::encode(stage, e.to_string()))
    }

    async fn verify(&self, stage: &str, file: &str) -> GifnewResult<()> {
        let present = store_contains(self.engine.as_ref(), file)
            .await
            .map_err(|e| GifnewError::encode(stage, e.to_string()))?;
        if present {
            Ok(())
        } else {
            Err(GifnewError::encode(stage, format!("{file} was not created")))
        }
    }
}

impl TranscodePipeline {
    pub fn new(
        engine: Arc<EngineHandle>,
        fonts: Arc<dyn FontSource>,
        settings: TranscodeSettings,
    ) -> Self {
        Self {
            engine,
            fonts,
            settings,
        }
    }

    pub fn engine(&self) -> &Arc<EngineHandle> {
        &self.engine
    }

    pub fn settings(&self) -> &TranscodeSettings {
        &self.settings
    }

    /// Run `job` to completion. No artifact is produced unless every
    /// required stage succeeded.
    pub async fn run(
        &self,
        job: &ConversionJob,
        on_event: &(dyn Fn(PipelineEvent) + Send + Sync),
    ) -> GifnewResult<Artifact> {
        let engine = self.engine.ensure_loaded().await?;
        let stale = [NORMALIZED_FILE, PALETTE_FILE, OUTPUT_FILE].map(String::from);
        cleanup(engine.as_ref(), &stale).await;
        let mut run = JobRun {
            engine,
            progress: ConversionProgress::default(),
            on_event,
            written: Vec::new(),
        };
        run.reach(Milestone::Started);
        tracing::info!(
            job = job.id(),
            clip = job.clip().id().get(),
            overlays = job.overlays().len(),
            "Starting conversion"
        );

        let result = self.run_stages(job, &mut run).await;
        cleanup(run.engine.as_ref(), &run.written).await;

        match &result {
            Ok(artifact) => tracing::info!(
                job = job.id(),
                bytes = artifact.len(),
                file = artifact.file_name(),
                "Conversion finished"
            ),
            Err(e) => tracing::error!(job = job.id(), error = %e, "Conversion failed"),
        }
        result
    }

    async fn run_stages(&self, job: &ConversionJob, run: &mut JobRun<'_>) -> GifnewResult<Artifact> {
        let input = input_file_name(job.clip().mime());
        run.written.push(input.to_string());
        run.engine
            .write_file(input, job.clip().bytes())
            .await
            .map_err(|e| GifnewError::encode("input", e.to_string()))?;
        run.reach(Milestone::InputWritten);

        let loaded_fonts = self.load_fonts(job, run).await;
        run.reach(Milestone::FontsLoaded);

        let cut = job.source_cut();
        run.exec("normalize", normalize_args(input, cut, &self.settings))
            .await?;
        run.verify("normalize", NORMALIZED_FILE).await?;
        run.reach(Milestone::Normalized);

        // Pixel offsets here are only logged; the drawtext expressions use W/H.
        let instructions = burn_instructions(
            job.overlays(),
            self.settings.max_width,
            approx_frame_height(self.settings.max_width),
            &ApproximateMetrics,
        );
        let mut current = NORMALIZED_FILE.to_string();
        for (index, instruction) in instructions.iter().enumerate() {
            let font_file = font_file_for(&instruction.font_family);
            if !loaded_fonts.contains(font_file) {
                tracing::warn!(
                    overlay = %instruction.overlay_id,
                    font = font_file,
                    "Font asset missing, skipping overlay"
                );
                run.warn(format!(
                    "Skipped text \"{}\": font {font_file} is unavailable",
                    instruction.text
                ));
                continue;
            }
            tracing::debug!(
                overlay = %instruction.overlay_id,
                x = instruction.x,
                y = instruction.y,
                "Burning overlay"
            );
            let output = format!("temp_text_{index}.mp4");
            let args = vec![
                "-i".to_string(),
                current.clone(),
                "-vf".to_string(),
                drawtext_filter(instruction, font_file),
                "-y".to_string(),
                output.clone(),
            ];
            run.exec("overlay", args).await?;
            current = output;
        }
        run.reach(Milestone::OverlaysBurned);

        if let Err(e) = self.palette_encode(run, &current).await {
            tracing::warn!(error = %e, "Palette encode failed, falling back to direct encode");
            run.warn("Palette encode failed; used direct encode".to_string());
            let args = vec![
                "-i".to_string(),
                current.clone(),
                "-f".to_string(),
                "gif".to_string(),
                "-y".to_string(),
                OUTPUT_FILE.to_string(),
            ];
            run.exec("encode", args).await?;
        }
        run.verify("encode", OUTPUT_FILE).await?;
        run.reach(Milestone::Encoded);

        let bytes = run
            .engine
            .read_file(OUTPUT_FILE)
            .await
            .map_err(|e| GifnewError::encode("output", e.to_string()))?;
        if bytes.is_empty() {
            return Err(GifnewError::encode("output", "output is empty"));
        }
        run.reach(Milestone::Done);
        Ok(Artifact::gif(bytes, self.settings.output_mime.clone()))
    }

    /// Write the font assets the overlays need. Returns the files now present.
    async fn load_fonts(&self, job: &ConversionJob, run: &mut JobRun<'_>) -> HashSet<&'static str> {
        let mut loaded = HashSet::new();
        let mut tried = HashSet::new();

        for overlay in job.overlays() {
            let file = font_file_for(&overlay.font_family);
            if !tried.insert(file) {
                continue;
            }
            let written = match self.fonts.fetch(file).await {
                Ok(bytes) => run.engine.write_file(file, &bytes).await,
                Err(e) => Err(e),
            };
            match written {
                Ok(()) => {
                    run.written.push(file.to_string());
                    loaded.insert(file);
                }
                Err(e) => tracing::warn!(font = file, error = %e, "Font unavailable"),
            }
        }
        loaded
    }

    async fn palette_encode(&self, run: &mut JobRun<'_>, input: &str) -> GifnewResult<()> {
        let palettegen = vec![
            "-i".to_string(),
            input.to_string(),
            "-vf".to_string(),
            format!("palettegen=max_colors={}", self.settings.max_colors),
            "-y".to_string(),
            PALETTE_FILE.to_string(),
        ];
        run.exec("palette", palettegen).await?;
        run.verify("palette", PALETTE_FILE).await?;

        let paletteuse = vec![
            "-i".to_string(),
            input.to_string(),
            "-i".to_string(),
            PALETTE_FILE.to_string(),
            "-lavfi".to_string(),
            format!("paletteuse=dither={}", self.settings.dither),
            "-loop".to_string(),
            self.settings.loop_count.to_string(),
            "-y".to_string(),
            OUTPUT_FILE.to_string(),
        ];
        run.exec("palette", paletteuse).await
    }
}

/// Remove this job's files so nothing stale satisfies a later existence check.
async fn cleanup(engine: &dyn TranscodeEngine, files: &[String]) {
    let mut seen = HashSet::new();
    for file in files.iter().filter(|f| seen.insert(f.as_str())) {
        if let Err(e) = engine.delete_file(file).await {
            tracing::debug!(file = %file, error = %e, "Could not remove engine file");
        }
    }
}

/// Frame height assumed for a 16:9 output `width` wide.
pub fn approx_frame_height(width: u32) -> u32 {
    (u64::from(width) * 9 / 16) as u32
}

fn input_file_name(mime: &str) -> &'static str {
    if mime.contains("mp4") {
        "input.mp4"
    } else {
        "input.webm"
    }
}

fn format_secs(secs: f64) -> String {
    let s = format!("{secs:.3}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Arguments of the normalize stage. `cut` is on the input's own timeline.
pub fn normalize_args(input: &str, cut: Option<TrimRange>, settings: &TranscodeSettings) -> Vec<String> {
    let mut args = vec!["-i".to_string(), input.to_string()];
    if let Some(cut) = cut {
        args.extend([
            "-ss".to_string(),
            format_secs(cut.start),
            "-t".to_string(),
            format_secs(cut.len_secs()),
        ]);
    }
    args.extend([
        "-vf".to_string(),
        format!("fps={},scale={}:-1:flags=lanczos", settings.fps, settings.max_width),
        "-y".to_string(),
        NORMALIZED_FILE.to_string(),
    ]);
    args
}

/// Escape text for the single-quoted drawtext `text` value.
///
/// A quote cannot appear inside a quoted value, so it closes the quote,
/// emits an escaped quote and reopens it.
pub fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("'\\''"),
            '"' => out.push_str("\\\""),
            ':' => out.push_str("\\:"),
            '%' => out.push_str("\\%"),
            '\n' | '\r' => out.push(' '),
            other => out.push(other),
        }
    }
    out
}

/// drawtext filter placing the text's center at the overlay center.
///
/// The engine measures the rendered text itself, so the center-anchored
/// offset is passed as an expression over `W`, `H`, `text_w` and `text_h`.
pub fn drawtext_filter(instruction: &BurnInstruction, font_file: &str) -> String {
    let mut filter = format!(
        "drawtext=fontfile={font_file}:text='{}':x=({}*W/100-text_w/2):y=({}*H/100-text_h/2):fontsize={}:fontcolor={}",
        escape_drawtext(&instruction.text),
        instruction.center_x,
        instruction.center_y,
        instruction.font_size,
        instruction.font_color.trim_start_matches('#'),
    );
    if let Some((color, opacity)) = &instruction.background {
        filter.push_str(&format!(
            ":box=1:boxcolor={}@{}:boxborderw=5",
            color.trim_start_matches('#'),
            opacity
        ));
    }
    filter
}
