//! gifnew Render Engine
//!
//! Turns a recorded clip plus editing decisions into an animated GIF by
//! driving an external transcoding engine one operation at a time.
//!
//! # Pipeline Architecture
//!
//! ```text
//! input.webm ──┐
//!              ├── Normalize (cut, fps=15, scale=640:-1)
//! trim range ──┘         │
//!                        ▼
//!                    temp.mp4
//!                        │
//! overlays ──────────────├── drawtext × N (center-anchored)
//! fonts/*.ttf ───────────┘         │
//!                                  ├── palettegen ─▶ palette.png
//!                                  │                    │
//!                                  ├── paletteuse ◀─────┘
//!                                  │   (or direct encode fallback)
//!                                  ▼
//!                              output.gif
//! ```

pub mod engine;
pub mod ffmpeg;
pub mod fonts;
pub mod pipeline;

pub use engine::*;
pub use ffmpeg::FfmpegProcessEngine;
pub use fonts::*;
pub use pipeline::*;
