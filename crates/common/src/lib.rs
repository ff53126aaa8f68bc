//! gifnew Common Utilities
//!
//! Shared infrastructure for all gifnew crates:
//! - Error types and result aliases
//! - Bounded retry bookkeeping for device and engine initialization
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;

pub use config::*;
pub use error::*;
pub use retry::*;
