//! gifnew Session
//!
//! The state machine that owns a capture session end to end:
//!
//! ```text
//! Idle ─▶ Previewing ─▶ Countdown(3..1) ─▶ Recording ─▶ Edited{trim_mode}
//!   ▲                                                     │      ▲
//!   │                                                     ▼      │
//!   └──────────── reset ◀──────────── Result ◀──────── Converting
//! ```
//!
//! The machine exclusively owns the current clip, trim range and overlays.
//! The transcode pipeline only ever sees snapshots of them.

pub mod blobs;
pub mod machine;
pub mod signals;
pub mod state;

pub use blobs::*;
pub use machine::*;
pub use signals::*;
pub use state::*;
