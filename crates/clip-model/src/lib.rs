//! gifnew Clip Model
//!
//! Defines the data contracts shared by capture, editing, and transcoding:
//! - **Clip:** recorded bytes with an authoritative duration and trim state
//! - **Trim:** `[start, end]` windows over a clip's timeline
//! - **Overlay:** center-anchored text annotations in a 0–100 coordinate space
//! - **Job:** one conversion attempt with monotonic progress
//! - **Artifact:** the finished animated image handed to the presentation layer
//!
//! Overlay positions are percentages of the frame so they survive any
//! change in preview or output resolution.

pub mod artifact;
pub mod clip;
pub mod drag;
pub mod job;
pub mod overlay;

pub use artifact::*;
pub use clip::*;
pub use drag::*;
pub use job::*;
pub use overlay::*;
