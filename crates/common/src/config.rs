//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::retry::RetryPolicy;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera and recording parameters.
    pub capture: CaptureDefaults,

    /// Transcoding engine initialization.
    pub engine: EngineConfig,

    /// Output encoding parameters.
    pub transcode: TranscodeSettings,

    /// Font asset lookup.
    pub fonts: FontConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default recording parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureDefaults {
    /// Recording budget in seconds (the countdown starts here).
    pub budget_secs: u32,

    /// Pre-roll countdown before recording starts.
    pub countdown_secs: u32,

    /// Ideal capture resolution hint.
    pub ideal_width: u32,
    pub ideal_height: u32,

    /// Ideal aspect ratio hint.
    pub aspect_ratio: f64,

    /// Camera facing mode hint ("user" = front camera).
    pub facing_mode: String,

    /// Recorder slice interval in milliseconds.
    pub slice_interval_ms: u64,

    /// Camera acquisition retries.
    pub device_retry: RetryPolicy,
}

/// Transcoding engine load settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-attempt load timeout in seconds.
    pub load_timeout_secs: u64,

    /// Load attempts and delay between them.
    pub retry: RetryPolicy,

    /// Base URL the engine core assets are fetched from.
    pub core_base_url: String,
}

/// Parameters for the GIF encode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeSettings {
    /// Output frame rate.
    pub fps: u32,

    /// Maximum output width; height follows the source aspect ratio.
    pub max_width: u32,

    /// Palette size for the two-pass encode.
    pub max_colors: u32,

    /// Error-diffusion dither mode used when applying the palette.
    pub dither: String,

    /// Loop count written into the output (0 = infinite).
    pub loop_count: u32,

    /// MIME type of the produced artifact.
    pub output_mime: String,
}

/// Font asset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Directory holding the `.ttf` assets referenced by the font catalog.
    pub asset_dir: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "gifnew_session=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            budget_secs: 10,
            countdown_secs: 3,
            ideal_width: 1280,
            ideal_height: 720,
            aspect_ratio: 16.0 / 9.0,
            facing_mode: "user".to_string(),
            slice_interval_ms: 1000,
            device_retry: RetryPolicy::new(4, 2000),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            load_timeout_secs: 10,
            retry: RetryPolicy::new(3, 2000),
            core_base_url: "https://unpkg.com/@ffmpeg/core@0.12.6/dist/umd".to_string(),
        }
    }
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            fps: 15,
            max_width: 640,
            max_colors: 256,
            dither: "sierra2_4a".to_string(),
            loop_count: 0,
            output_mime: "image/gif".to_string(),
        }
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("public/fonts"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("gifnew").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_capture_budget() {
        let config = AppConfig::default();
        assert_eq!(config.capture.budget_secs, 10);
        assert_eq!(config.capture.countdown_secs, 3);
        assert_eq!(config.capture.device_retry.max_attempts, 4);
        assert_eq!(config.engine.retry.max_attempts, 3);
        assert_eq!(config.engine.load_timeout_secs, 10);
        assert_eq!(config.transcode.fps, 15);
        assert_eq!(config.transcode.output_mime, "image/gif");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let raw = r#"{ "transcode": { "fps": 12 }, "logging": { "level": "debug" } }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.transcode.fps, 12);
        assert_eq!(config.transcode.max_width, 640);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.capture.budget_secs, 10);
    }
}
