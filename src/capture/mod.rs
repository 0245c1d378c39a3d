//! Capture of the target application's window.
//!
//! This module provides:
//! - Focus and window geometry queries (`WindowLocator`)
//! - The per-tick capture gate (`decide`)
//! - Region capture and persistence (`FrameCapturer`)

pub mod gate;
pub mod screenshot;
pub mod window;

pub use gate::{decide, CaptureDecision};
pub use screenshot::{FrameCapturer, PixelSource, ScreencaptureSource};
pub use window::{OsaScriptLocator, WindowLocator};
