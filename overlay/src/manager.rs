//! Overlay window: a native window plus the renderer that fills it
//!
//! `OverlayWindow` is the platform `Presenter` behind each display surface.

use backdrop_core::{CompositeImage, Presenter};
use tracing::warn;

use crate::platform::{NativeOverlay, OverlayConfig, OverlayPlatform, PlatformError};
use crate::renderer::Renderer;

/// A managed overlay window with its own renderer
pub struct OverlayWindow<P = NativeOverlay> {
    platform: P,
    renderer: Renderer,
}

impl<P: OverlayPlatform> OverlayWindow<P> {
    /// Create a new overlay window drawing at `opacity`
    pub fn new(config: OverlayConfig, opacity: f32) -> Result<Self, PlatformError> {
        let platform = P::new(config)?;
        Ok(Self {
            platform,
            renderer: Renderer::new(opacity),
        })
    }

    pub fn width(&self) -> u32 {
        self.platform.width()
    }

    pub fn height(&self) -> u32 {
        self.platform.height()
    }

    /// Draw a composite into the back buffer (does not commit)
    pub fn draw_composite(&mut self, image: &CompositeImage) {
        let width = self.platform.width();
        let height = self.platform.height();
        let Some(buffer) = self.platform.pixel_buffer() else {
            return;
        };
        if !self.renderer.draw_composite(buffer, width, height, image) {
            warn!(width, height, "pixel buffer does not match window size");
        }
    }

    /// Commit the current frame to the screen
    pub fn commit(&mut self) {
        self.platform.commit();
    }

    /// Poll for events (non-blocking)
    /// Returns false if the window should close
    pub fn poll_events(&mut self) -> bool {
        self.platform.poll_events()
    }

    /// Whether the window system asked for a repaint
    pub fn take_needs_redraw(&mut self) -> bool {
        self.platform.take_needs_redraw()
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }
}

impl<P: OverlayPlatform> Presenter for OverlayWindow<P> {
    fn present(&mut self, image: &CompositeImage) {
        self.draw_composite(image);
        self.commit();
    }

    fn reassert_attributes(&mut self) {
        self.platform.reassert_attributes();
    }
}
