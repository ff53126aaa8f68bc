//! gifnew Capture Engine
//!
//! Everything that talks to live media during a session:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 capture-engine               │
//! │  ┌───────────────┐   ┌────────────────────┐  │
//! │  │ DeviceSession │──▶│ Recorder (chunks)  │  │
//! │  │  (retrying)   │   └─────────┬──────────┘  │
//! │  └───────────────┘             │             │
//! │  ┌───────────────┐             ▼             │
//! │  │RecordingTimer │──▶ authoritative duration │
//! │  └───────────────┘                           │
//! │  ┌───────────────┐                           │
//! │  │TrimController │──▶ Committed | Deferred   │
//! │  └───────────────┘                           │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Platform primitives (camera, recorder, playback re-capture) are traits so
//! hosts without them can plug in the unsupported backends.

pub mod backend;
pub mod device;
pub mod recorder;
pub mod timer;
pub mod trim;

pub use backend::{UnsupportedCaptureDevice, UnsupportedPlaybackCapture, UnsupportedRecorder};
pub use device::*;
pub use recorder::*;
pub use timer::*;
pub use trim::*;
