//! Window discovery via macOS System Events.
//!
//! Both queries shell out to `osascript`. Every call is a fresh round trip;
//! nothing is cached because the target window can move or resize between
//! polls.

use std::process::Command;

use crate::error::LocatorError;

/// Sentinel the geometry script prints when AppleScript raises.
const ERROR_SENTINEL: &str = "ERROR";

const FRONTMOST_SCRIPT: &str = r#"
tell application "System Events"
    set frontApp to name of first application process whose frontmost is true
end tell
return frontApp
"#;

// The process name arrives as argv so it is never spliced into script text.
const WINDOW_BOUNDS_SCRIPT: &str = r#"
on run argv
    set appName to item 1 of argv
    tell application "System Events"
        try
            set appProcess to first process whose name is appName
            tell appProcess
                set theWindow to front window
                set winPosition to position of theWindow
                set winSize to size of theWindow
                set x to item 1 of winPosition
                set y to item 2 of winPosition
                set w to item 1 of winSize
                set h to item 2 of winSize
                return (x as string) & "," & (y as string) & "," & (w as string) & "," & (h as string)
            end tell
        on error
            return "ERROR"
        end try
    end tell
end run
"#;

/// Screen-space bounding box of a window.
///
/// Always `right > left` and `bottom > top`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowRect {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl WindowRect {
    /// Builds a rectangle from a position and size. Returns `None` for an
    /// empty or negative size.
    pub fn from_origin_size(x: i32, y: i32, width: i32, height: i32) -> Option<Self> {
        if width <= 0 || height <= 0 {
            return None;
        }
        Some(Self {
            left: x,
            top: y,
            right: x.checked_add(width)?,
            bottom: y.checked_add(height)?,
        })
    }

    pub fn left(&self) -> i32 {
        self.left
    }

    pub fn top(&self) -> i32 {
        self.top
    }

    pub fn right(&self) -> i32 {
        self.right
    }

    pub fn bottom(&self) -> i32 {
        self.bottom
    }

    pub fn width(&self) -> u32 {
        self.right.abs_diff(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.abs_diff(self.top)
    }
}

impl std::fmt::Display for WindowRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Source of focus and window geometry information.
pub trait WindowLocator {
    /// Name of the process currently holding input focus.
    fn frontmost_application_name(&self) -> Result<String, LocatorError>;

    /// Rectangle of the front window of `app_name`.
    fn window_rect(&self, app_name: &str) -> Result<WindowRect, LocatorError>;
}

/// [`WindowLocator`] backed by `osascript` and System Events.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsaScriptLocator;

impl OsaScriptLocator {
    pub fn new() -> Self {
        Self
    }
}

impl WindowLocator for OsaScriptLocator {
    fn frontmost_application_name(&self) -> Result<String, LocatorError> {
        let stdout = run_osascript(FRONTMOST_SCRIPT, &[])?;
        parse_frontmost_output(&stdout)
    }

    fn window_rect(&self, app_name: &str) -> Result<WindowRect, LocatorError> {
        let stdout = run_osascript(WINDOW_BOUNDS_SCRIPT, &[app_name])?;
        parse_bounds_output(&stdout)
    }
}

/// Runs an AppleScript and returns its trimmed stdout.
fn run_osascript(script: &str, args: &[&str]) -> Result<String, LocatorError> {
    let output = Command::new("osascript")
        .arg("-e")
        .arg(script)
        .args(args)
        .output()
        .map_err(|e| LocatorError::QueryUnavailable(format!("failed to run osascript: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LocatorError::QueryUnavailable(format!(
            "osascript exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    String::from_utf8(output.stdout)
        .map(|s| s.trim().to_string())
        .map_err(|e| LocatorError::QueryUnavailable(format!("non-UTF-8 osascript output: {}", e)))
}

fn parse_frontmost_output(output: &str) -> Result<String, LocatorError> {
    let name = output.trim();
    if name.is_empty() {
        return Err(LocatorError::QueryUnavailable(
            "empty frontmost application name".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Parses `x,y,w,h` (possibly fractional) or the error sentinel.
fn parse_bounds_output(output: &str) -> Result<WindowRect, LocatorError> {
    let output = output.trim();
    if output == ERROR_SENTINEL {
        return Err(LocatorError::WindowNotFound);
    }

    let fields: Vec<&str> = output.split(',').map(str::trim).collect();
    let [x, y, w, h] = fields.as_slice() else {
        return Err(LocatorError::QueryUnavailable(format!(
            "unexpected window bounds output: {:?}",
            output
        )));
    };

    let x = parse_coordinate(x)?;
    let y = parse_coordinate(y)?;
    let w = parse_coordinate(w)?;
    let h = parse_coordinate(h)?;

    WindowRect::from_origin_size(x, y, w, h).ok_or(LocatorError::WindowNotFound)
}

/// Parses a possibly fractional coordinate, truncating toward zero.
fn parse_coordinate(field: &str) -> Result<i32, LocatorError> {
    let value: f64 = field.parse().map_err(|_| {
        LocatorError::QueryUnavailable(format!("invalid coordinate: {:?}", field))
    })?;
    if !value.is_finite() || value < i32::MIN as f64 || value > i32::MAX as f64 {
        return Err(LocatorError::QueryUnavailable(format!(
            "coordinate out of range: {:?}",
            field
        )));
    }
    Ok(value.trunc() as i32)
}
