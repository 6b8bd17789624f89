//! Backdrop Overlay Library
//!
//! Native, click-through, always-on-top windows that show one composite per
//! display.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      spawn                          │
//! │      one thread per display, owns its window        │
//! ├─────────────────────────────────────────────────────┤
//! │                     manager                         │
//! │                  OverlayWindow                      │
//! │     (window + renderer, backdrop-core Presenter)    │
//! ├─────────────────────────────────────────────────────┤
//! │                     renderer                        │
//! │         tiny-skia, premultiply + opacity            │
//! ├─────────────────────────────────────────────────────┤
//! │                    platform/                        │
//! │                   x11, windows                      │
//! │             (OS window management)                  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod manager;
pub mod platform;
pub mod renderer;
pub mod spawn;

// Re-export commonly used types
pub use manager::OverlayWindow;
pub use platform::{
    MonitorInfo, NativeOverlay, OverlayConfig, OverlayPlatform, PlatformError, display_regions,
    get_all_monitors,
};
pub use renderer::Renderer;
pub use spawn::{SurfaceCommand, SurfaceHandle, spawn_surface, spawn_surface_with_factory};
