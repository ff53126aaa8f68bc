//! Native engine backed by the `ffmpeg` binary and a scratch directory.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use gifnew_common::error::{GifnewError, GifnewResult};
use tokio::process::Command;

use crate::engine::{CoreAssets, StoreEntry, TranscodeEngine};

/// Runs each operation as an `ffmpeg` process inside a private temp dir.
///
/// The core asset URLs are ignored; loading just checks the binary works.
pub struct FfmpegProcessEngine {
    binary: String,
    store: tempfile::TempDir,
}

impl FfmpegProcessEngine {
    pub fn new() -> GifnewResult<Self> {
        Self::with_binary("ffmpeg")
    }

    pub fn with_binary(binary: impl Into<String>) -> GifnewResult<Self> {
        let store = tempfile::Builder::new().prefix("gifnew-engine-").tempdir()?;
        Ok(Self {
            binary: binary.into(),
            store,
        })
    }

    pub fn is_available(&self) -> bool {
        command_exists(&self.binary)
    }

    /// Scratch directory backing the file store.
    pub fn store_dir(&self) -> &Path {
        self.store.path()
    }

    fn path_for(&self, name: &str) -> GifnewResult<PathBuf> {
        let name = name.trim_start_matches('/');
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return Err(GifnewError::engine(format!("invalid store file name: {name}")));
        }
        Ok(self.store.path().join(name))
    }
}

#[async_trait::async_trait]
impl TranscodeEngine for FfmpegProcessEngine {
    async fn load(&self, _assets: &CoreAssets) -> GifnewResult<()> {
        let output = Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| GifnewError::engine(format!("failed to start {}: {e}", self.binary)))?;
        if !output.status.success() {
            return Err(GifnewError::engine(format!(
                "{} -version exited with {}",
                self.binary, output.status
            )));
        }
        let banner = String::from_utf8_lossy(&output.stdout);
        tracing::debug!(version = banner.lines().next().unwrap_or_default(), "ffmpeg available");
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> GifnewResult<()> {
        tokio::fs::write(self.path_for(name)?, data).await?;
        Ok(())
    }

    async fn read_file(&self, name: &str) -> GifnewResult<Vec<u8>> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(GifnewError::FileNotFound { path })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_dir(&self, _path: &str) -> GifnewResult<Vec<StoreEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(self.store.path()).await?;
        while let Some(entry) = dir.next_entry().await? {
            entries.push(StoreEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type().await?.is_dir(),
            });
        }
        Ok(entries)
    }

    async fn delete_file(&self, name: &str) -> GifnewResult<()> {
        match tokio::fs::remove_file(self.path_for(name)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exec(&self, args: &[String]) -> GifnewResult<()> {
        tracing::debug!(?args, "Running ffmpeg");
        let output = Command::new(&self.binary)
            .current_dir(self.store.path())
            .args(["-hide_banner", "-loglevel", "error"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| GifnewError::engine(format!("failed to start ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GifnewError::engine(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    std::process::Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Container duration of a media file, via `ffprobe`.
pub async fn probe_duration_secs(path: &Path) -> Option<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let raw = String::from_utf8(output.stdout).ok()?;
    let secs = raw.lines().next()?.trim().parse::<f64>().ok()?;
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_round_trip_and_delete() {
        let engine = FfmpegProcessEngine::new().unwrap();
        engine.write_file("/input.webm", b"abc").await.unwrap();

        let names: Vec<_> = engine
            .list_dir("/")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["input.webm".to_string()]);
        assert_eq!(engine.read_file("input.webm").await.unwrap(), b"abc");

        engine.delete_file("input.webm").await.unwrap();
        engine.delete_file("input.webm").await.unwrap();
        assert!(matches!(
            engine.read_file("input.webm").await,
            Err(GifnewError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_paths_outside_store() {
        let engine = FfmpegProcessEngine::new().unwrap();
        assert!(engine.write_file("../escape", b"x").await.is_err());
        assert!(engine.write_file("a/b", b"x").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_load() {
        let engine = FfmpegProcessEngine::with_binary("gifnew-no-such-ffmpeg").unwrap();
        assert!(!engine.is_available());
        let assets = CoreAssets::from_base_url("unused");
        assert!(engine.load(&assets).await.is_err());
    }
}
