//! Decides, once per tick, whether the target window should be captured.

use super::window::{WindowLocator, WindowRect};

/// Outcome of the capture gate for a single tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureDecision {
    /// Target is frontmost and its window resolved to this rectangle.
    Proceed(WindowRect),
    /// Some other application holds focus, or focus could not be queried.
    SkipNotFrontmost,
    /// Target is frontmost but its window geometry could not be resolved.
    SkipWindowNotFound,
}

/// Runs the two-step gate for `target`.
///
/// The geometry query only runs once the target is known to be frontmost,
/// so the returned rectangle always comes from the same cycle as the focus
/// check. Query failures degrade to the matching skip variant.
pub fn decide<L: WindowLocator + ?Sized>(locator: &L, target: &str) -> CaptureDecision {
    match locator.frontmost_application_name() {
        Ok(name) if name == target => {}
        Ok(_) => return CaptureDecision::SkipNotFrontmost,
        Err(e) => {
            log::debug!("Frontmost application query failed: {}", e);
            return CaptureDecision::SkipNotFrontmost;
        }
    }

    match locator.window_rect(target) {
        Ok(rect) => CaptureDecision::Proceed(rect),
        Err(e) => {
            log::debug!("Window query for {} failed: {}", target, e);
            CaptureDecision::SkipWindowNotFound
        }
    }
}
