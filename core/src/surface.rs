//! The on-screen side of one display.
//!
//! An `OverlaySurface` is owned by exactly one thread. It keeps the image
//! currently shown and hands it to a platform `Presenter`; installing a new
//! composite drops the old one before presenting.

use tracing::{debug, warn};

use crate::composite::CompositeImage;
use crate::geometry::DisplayRegion;

/// Platform capability behind a surface
pub trait Presenter {
    /// Show `image` (already sized to the region)
    fn present(&mut self, image: &CompositeImage);

    /// Re-apply window attributes the platform may have reset
    /// (topmost, click-through, no activation). Best effort.
    fn reassert_attributes(&mut self);
}

pub struct OverlaySurface<P> {
    region: DisplayRegion,
    presenter: P,
    current: Option<CompositeImage>,
    installs: u64,
}

impl<P: Presenter> OverlaySurface<P> {
    pub fn new(region: DisplayRegion, presenter: P) -> Self {
        Self {
            region,
            presenter,
            current: None,
            installs: 0,
        }
    }

    pub fn region(&self) -> &DisplayRegion {
        &self.region
    }

    /// Image currently on screen, if any tick has succeeded yet
    pub fn current(&self) -> Option<&CompositeImage> {
        self.current.as_ref()
    }

    /// Number of composites installed so far
    pub fn installs(&self) -> u64 {
        self.installs
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    /// Replace the displayed image.
    ///
    /// Returns false (and keeps the previous image) if the composite was
    /// built for a different size than this surface's region.
    pub fn install(&mut self, image: CompositeImage) -> bool {
        if image.size() != self.region.size() {
            warn!(
                display = %self.region.id,
                expected = ?self.region.size(),
                got = ?image.size(),
                "discarding composite with wrong size"
            );
            return false;
        }

        // Release the old frame before the new one is presented
        self.current = None;
        self.presenter.present(&image);
        self.current = Some(image);
        self.installs += 1;

        debug!(display = %self.region.id, installs = self.installs, "installed composite");
        true
    }

    /// Present the current image again (after an expose, for example)
    pub fn redraw(&mut self) {
        if let Some(image) = &self.current {
            self.presenter.present(image);
        }
    }

    pub fn maintain(&mut self) {
        self.presenter.reassert_attributes();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[derive(Default)]
    struct RecordingPresenter {
        presented: Vec<[u8; 4]>,
        reasserted: usize,
    }

    impl Presenter for RecordingPresenter {
        fn present(&mut self, image: &CompositeImage) {
            self.presented.push(image.as_rgba().get_pixel(0, 0).0);
        }

        fn reassert_attributes(&mut self) {
            self.reasserted += 1;
        }
    }

    fn region(width: u32, height: u32) -> DisplayRegion {
        DisplayRegion {
            id: "DP-1".to_string(),
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    fn frame(width: u32, height: u32, shade: u8) -> CompositeImage {
        RgbaImage::from_pixel(width, height, Rgba([shade, shade, shade, 255])).into()
    }

    #[test]
    fn test_repeated_installs_keep_only_latest() {
        let mut surface = OverlaySurface::new(region(8, 4), RecordingPresenter::default());

        for shade in 1..=5 {
            assert!(surface.install(frame(8, 4, shade)));
        }

        assert_eq!(surface.installs(), 5);
        assert_eq!(surface.current(), Some(&frame(8, 4, 5)));
        assert_eq!(surface.presenter().presented, vec![
            [1, 1, 1, 255],
            [2, 2, 2, 255],
            [3, 3, 3, 255],
            [4, 4, 4, 255],
            [5, 5, 5, 255],
        ]);
    }

    #[test]
    fn test_wrong_size_is_rejected() {
        let mut surface = OverlaySurface::new(region(8, 4), RecordingPresenter::default());
        assert!(surface.install(frame(8, 4, 9)));

        assert!(!surface.install(frame(4, 8, 1)));

        assert_eq!(surface.current(), Some(&frame(8, 4, 9)));
        assert_eq!(surface.installs(), 1);
    }

    #[test]
    fn test_redraw_without_image_is_noop() {
        let mut surface = OverlaySurface::new(region(2, 2), RecordingPresenter::default());

        surface.redraw();
        surface.maintain();

        assert!(surface.presenter().presented.is_empty());
        assert_eq!(surface.presenter().reasserted, 1);
    }
}
