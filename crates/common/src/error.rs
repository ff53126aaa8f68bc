//! Error types shared across gifnew crates.

use std::path::PathBuf;

/// Top-level error type for gifnew operations.
#[derive(Debug, thiserror::Error)]
pub enum GifnewError {
    #[error("Camera permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Camera unavailable after {attempts} attempt(s): {message}")]
    DeviceUnavailable { attempts: u32, message: String },

    #[error("Transcoding engine did not load within {timeout_secs}s")]
    EngineLoadTimeout { timeout_secs: u64 },

    #[error("Transcoding engine failed to load after {attempts} attempt(s): {message}")]
    EngineLoadFailure { attempts: u32, message: String },

    #[error("Trim re-capture unsupported: {message}")]
    TrimCaptureUnsupported { message: String },

    #[error("Encode failed during {stage}: {message}")]
    EncodeFailure { stage: String, message: String },

    #[error("Font asset missing: {file}")]
    FontAssetMissing { file: String },

    #[error("Cannot {action} while {state}")]
    InvalidTransition { state: String, action: String },

    #[error("Invalid trim range [{start}, {end}] for a {duration_secs}s clip")]
    InvalidTrimRange {
        start: f64,
        end: f64,
        duration_secs: f64,
    },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Engine error: {message}")]
    Engine { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using GifnewError.
pub type GifnewResult<T> = Result<T, GifnewError>;

impl GifnewError {
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine {
            message: msg.into(),
        }
    }

    pub fn encode(stage: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::EncodeFailure {
            stage: stage.into(),
            message: msg.into(),
        }
    }

    pub fn trim_unsupported(msg: impl Into<String>) -> Self {
        Self::TrimCaptureUnsupported {
            message: msg.into(),
        }
    }

    pub fn invalid_transition(state: impl Into<String>, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            state: state.into(),
            action: action.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Conditions that downgrade silently to a documented fallback.
    pub fn is_recovered(&self) -> bool {
        matches!(
            self,
            Self::TrimCaptureUnsupported { .. } | Self::FontAssetMissing { .. }
        )
    }

    /// Conditions surfaced to the user together with a manual retry action.
    pub fn is_user_retryable(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. }
                | Self::DeviceUnavailable { .. }
                | Self::EngineLoadFailure { .. }
                | Self::EngineLoadTimeout { .. }
                | Self::EncodeFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_conditions_are_recovered() {
        assert!(GifnewError::trim_unsupported("no captureStream").is_recovered());
        assert!(GifnewError::FontAssetMissing {
            file: "anton.ttf".into()
        }
        .is_recovered());
        assert!(!GifnewError::encode("palette", "boom").is_recovered());
    }

    #[test]
    fn test_resource_failures_are_retryable() {
        let err = GifnewError::EngineLoadFailure {
            attempts: 3,
            message: "timed out".into(),
        };
        assert!(err.is_user_retryable());
        assert!(GifnewError::permission_denied("denied").is_user_retryable());
        assert!(!GifnewError::invalid_transition("Converting", "convert").is_user_retryable());
    }

    #[test]
    fn test_display_mentions_attempts() {
        let err = GifnewError::DeviceUnavailable {
            attempts: 4,
            message: "no video track".into(),
        };
        assert_eq!(
            err.to_string(),
            "Camera unavailable after 4 attempt(s): no video track"
        );
    }
}
