//! Fixed-interval poll loop.
//!
//! The loop is a two-state machine: `Running` until a stop request arrives,
//! then `Stopped`. Each tick runs the capture gate, captures when allowed and
//! logs exactly one status line. Tick errors never leave the tick.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::capture::{decide, CaptureDecision, FrameCapturer, PixelSource, WindowLocator};
use crate::config::CaptureConfig;
use crate::error::CaptureError;

/// Poll loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Sending half of the stop channel. Cheap to clone into a signal handler.
#[derive(Debug, Clone)]
pub struct StopHandle {
    sender: Sender<()>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        // Receiver gone means the loop already ended
        let _ = self.sender.send(());
    }
}

/// Receiving half of the stop channel, waited on between ticks.
#[derive(Debug)]
pub struct StopSignal {
    receiver: Receiver<()>,
}

/// Creates a connected stop handle and signal.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (sender, receiver) = mpsc::channel();
    (StopHandle { sender }, StopSignal { receiver })
}

impl StopSignal {
    /// Waits up to `timeout`. Returns `true` if a stop was requested.
    ///
    /// Wakes immediately when a stop request arrives, including one sent
    /// before the wait started.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                // No handle left to stop us; keep the cadence
                std::thread::sleep(timeout);
                false
            }
        }
    }
}

/// What happened in one tick.
#[derive(Debug)]
pub enum TickOutcome {
    Captured(PathBuf),
    SkippedNotFrontmost,
    SkippedWindowNotFound,
    Failed(CaptureError),
}

/// Status line for a tick, rendered against the target application name.
pub struct TickStatus<'a> {
    outcome: &'a TickOutcome,
    target_app: &'a str,
}

impl std::fmt::Display for TickStatus<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.outcome {
            TickOutcome::Captured(path) => write!(f, "Screenshot saved: {}", path.display()),
            TickOutcome::SkippedNotFrontmost => write!(
                f,
                "{} is not the frontmost application. Skipping screenshot.",
                self.target_app
            ),
            TickOutcome::SkippedWindowNotFound => write!(
                f,
                "{} window not found. Skipping screenshot.",
                self.target_app
            ),
            TickOutcome::Failed(e) => write!(f, "Error capturing screenshot: {}", e),
        }
    }
}

impl TickOutcome {
    pub fn status<'a>(&'a self, target_app: &'a str) -> TickStatus<'a> {
        TickStatus {
            outcome: self,
            target_app,
        }
    }
}

/// Polls the target application and captures its window on a fixed cadence.
pub struct PollLoop<'a, L, S> {
    config: &'a CaptureConfig,
    locator: L,
    capturer: FrameCapturer<S>,
    stop: StopSignal,
    state: LoopState,
}

impl<'a, L: WindowLocator, S: PixelSource> PollLoop<'a, L, S> {
    pub fn new(config: &'a CaptureConfig, locator: L, source: S, stop: StopSignal) -> Self {
        Self {
            config,
            locator,
            capturer: FrameCapturer::new(source, config),
            stop,
            state: LoopState::Running,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    #[cfg(test)]
    fn capturer_source(&self) -> &S {
        self.capturer.source()
    }

    /// Runs one decide/capture cycle and logs its status line.
    pub fn tick(&self) -> TickOutcome {
        let outcome = match decide(&self.locator, &self.config.target_app) {
            CaptureDecision::Proceed(rect) => {
                log::debug!("Capturing {} at {}", self.config.target_app, rect);
                match self.capturer.capture(&rect) {
                    Ok(path) => TickOutcome::Captured(path),
                    Err(e) => TickOutcome::Failed(e),
                }
            }
            CaptureDecision::SkipNotFrontmost => TickOutcome::SkippedNotFrontmost,
            CaptureDecision::SkipWindowNotFound => TickOutcome::SkippedWindowNotFound,
        };

        log::info!("{}", outcome.status(&self.config.target_app));
        outcome
    }

    /// Ticks until a stop is requested.
    ///
    /// Ticks start `interval` apart; a tick that overruns its slot is followed
    /// immediately by the next one.
    pub fn run(&mut self) {
        let interval = self.config.interval();

        while self.state == LoopState::Running {
            let tick_start = Instant::now();
            self.tick();

            let remaining = interval.saturating_sub(tick_start.elapsed());
            if self.stop.wait(remaining) {
                self.state = LoopState::Stopped;
            }
        }

        log::info!("Screenshot automation stopped");
    }
}
