//! Session states.

use serde::Serialize;

/// Where the session is. The single source of truth for what the user may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing acquired, nothing recorded.
    Idle,
    /// Camera stream live, not recording.
    Previewing,
    /// Pre-roll countdown before recording starts.
    Countdown { remaining: u32 },
    /// Recording; `remaining` is the budget countdown.
    Recording { remaining: u32 },
    /// A clip is ready for editing.
    Edited { trim_mode: bool },
    /// A conversion job is in flight.
    Converting,
    /// An artifact is available.
    Result,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Previewing => "previewing",
            SessionState::Countdown { .. } => "counting down",
            SessionState::Recording { .. } => "recording",
            SessionState::Edited { trim_mode: true } => "trimming",
            SessionState::Edited { trim_mode: false } => "editing",
            SessionState::Converting => "converting",
            SessionState::Result => "showing a result",
        }
    }

    /// Whether a clip is loaded and editable.
    pub fn is_editing(&self) -> bool {
        matches!(self, SessionState::Edited { .. })
    }

    pub fn is_capturing(&self) -> bool {
        matches!(
            self,
            SessionState::Countdown { .. } | SessionState::Recording { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_tagged() {
        let json = serde_json::to_string(&SessionState::Edited { trim_mode: true }).unwrap();
        assert_eq!(json, r#"{"state":"edited","trim_mode":true}"#);
    }
}
