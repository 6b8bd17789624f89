//! Platform abstraction for overlay windows
//!
//! Every backend produces the same kind of window: borderless, covering one
//! display, always on top, never focused, excluded from the taskbar and
//! transparent to mouse input.

use backdrop_core::DisplayRegion;

#[cfg(all(unix, not(target_os = "macos")))]
pub mod x11;

#[cfg(target_os = "windows")]
pub mod windows;

/// Information about a connected monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    /// Unique identifier for this monitor (platform-specific)
    pub id: String,
    /// X position of the monitor in virtual screen space
    pub x: i32,
    /// Y position of the monitor in virtual screen space
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Whether this is the primary monitor
    pub is_primary: bool,
}

impl MonitorInfo {
    pub fn to_region(&self) -> DisplayRegion {
        DisplayRegion {
            id: self.id.clone(),
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// Regions worth covering, primary display first.
///
/// Monitors without area are skipped, as are exact duplicates of a rectangle
/// already listed (mirrored outputs).
pub fn display_regions(monitors: &[MonitorInfo]) -> Vec<DisplayRegion> {
    let mut ordered: Vec<&MonitorInfo> = monitors
        .iter()
        .filter(|m| m.width > 0 && m.height > 0)
        .collect();
    ordered.sort_by_key(|m| !m.is_primary);

    let mut regions: Vec<DisplayRegion> = Vec::with_capacity(ordered.len());
    for m in ordered {
        let mirrored = regions
            .iter()
            .any(|r| (r.x, r.y, r.width, r.height) == (m.x, m.y, m.width, m.height));
        if !mirrored {
            regions.push(m.to_region());
        }
    }
    regions
}

/// Configuration for creating an overlay window
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Absolute X position in virtual screen space
    pub x: i32,
    /// Absolute Y position in virtual screen space
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Window title / class name, used for window rules
    pub namespace: String,
    /// Display this window covers (for logging)
    pub monitor_id: String,
}

impl OverlayConfig {
    pub fn for_region(region: &DisplayRegion) -> Self {
        Self {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            namespace: format!("backdrop-{}", region.id),
            monitor_id: region.id.clone(),
        }
    }
}

/// Errors that can occur in platform operations
#[derive(Debug)]
pub enum PlatformError {
    /// Failed to connect to display server
    ConnectionFailed(String),
    /// Required protocol/feature not available
    UnsupportedFeature(String),
    /// Buffer/memory allocation failed
    BufferError(String),
    /// Generic platform error
    Other(String),
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformError::ConnectionFailed(s) => write!(f, "Connection failed: {}", s),
            PlatformError::UnsupportedFeature(s) => write!(f, "Unsupported feature: {}", s),
            PlatformError::BufferError(s) => write!(f, "Buffer error: {}", s),
            PlatformError::Other(s) => write!(f, "Platform error: {}", s),
        }
    }
}

impl std::error::Error for PlatformError {}

/// Trait that all platform backends must implement
pub trait OverlayPlatform: Sized {
    /// Create and show a new overlay window
    fn new(config: OverlayConfig) -> Result<Self, PlatformError>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Get mutable access to the pixel buffer (premultiplied RGBA)
    /// Returns None if buffer is not ready
    fn pixel_buffer(&mut self) -> Option<&mut [u8]>;

    /// Commit the current pixel buffer to the screen
    fn commit(&mut self);

    /// Process pending platform events (non-blocking)
    /// Returns false if the overlay should close
    fn poll_events(&mut self) -> bool;

    /// Whether the window system asked for a repaint since the last call
    fn take_needs_redraw(&mut self) -> bool {
        false
    }

    /// Re-apply topmost, no-activate, click-through and taskbar exclusion.
    /// Other applications (fullscreen games especially) reset these.
    fn reassert_attributes(&mut self);
}

/// Re-export the appropriate platform for the current target
#[cfg(all(unix, not(target_os = "macos")))]
pub use x11::X11Overlay as NativeOverlay;

#[cfg(target_os = "windows")]
pub use windows::WindowsOverlay as NativeOverlay;

/// Get all connected monitors without requiring an existing overlay window
#[cfg(all(unix, not(target_os = "macos")))]
pub fn get_all_monitors() -> Vec<MonitorInfo> {
    x11::get_all_monitors()
}

#[cfg(target_os = "windows")]
pub fn get_all_monitors() -> Vec<MonitorInfo> {
    windows::get_all_monitors()
}
