//! Software renderer using tiny-skia
//!
//! Turns a finished composite (straight RGBA) into the premultiplied RGBA
//! buffer the platform backends expect, applying the window-wide opacity on
//! the way.

use backdrop_core::CompositeImage;
use tiny_skia::{
    BlendMode, Color, ColorU8, FilterQuality, Pixmap, PixmapMut, PixmapPaint, Transform,
};

/// A software renderer for overlay content
#[derive(Debug, Clone)]
pub struct Renderer {
    /// Opacity of everything drawn into the window (0.0 - 1.0)
    opacity: f32,
}

impl Renderer {
    pub fn new(opacity: f32) -> Self {
        Self {
            opacity: opacity.clamp(0.0, 1.0),
        }
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Create a new pixel buffer (RGBA format)
    pub fn create_buffer(width: u32, height: u32) -> Vec<u8> {
        vec![0u8; (width as usize) * (height as usize) * 4]
    }

    /// Replace the buffer contents with `image` at the window opacity.
    ///
    /// The image is drawn at the origin; anything outside the buffer is
    /// clipped. Returns false if the buffer does not match `width`/`height`.
    pub fn draw_composite(
        &self,
        buffer: &mut [u8],
        width: u32,
        height: u32,
        image: &CompositeImage,
    ) -> bool {
        let Some(mut target) = PixmapMut::from_bytes(buffer, width, height) else {
            return false;
        };
        target.fill(Color::TRANSPARENT);

        let Some(source) = premultiplied_pixmap(image) else {
            return true;
        };

        let paint = PixmapPaint {
            opacity: self.opacity,
            blend_mode: BlendMode::SourceOver,
            quality: FilterQuality::Nearest,
        };
        target.draw_pixmap(0, 0, source.as_ref(), &paint, Transform::identity(), None);
        true
    }
}

/// Copy a straight-alpha composite into a premultiplied tiny-skia pixmap
pub fn premultiplied_pixmap(image: &CompositeImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())?;
    for (dst, src) in pixmap
        .pixels_mut()
        .iter_mut()
        .zip(image.as_rgba().pixels())
    {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Some(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> CompositeImage {
        RgbaImage::from_pixel(width, height, Rgba(rgba)).into()
    }

    fn pixel(buffer: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * width + x) * 4) as usize;
        [buffer[i], buffer[i + 1], buffer[i + 2], buffer[i + 3]]
    }

    fn close(a: [u8; 4], b: [u8; 4]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| x.abs_diff(*y) <= 1)
    }

    #[test]
    fn test_full_opacity_copies_opaque_pixels() {
        let renderer = Renderer::new(1.0);
        let mut buffer = Renderer::create_buffer(4, 3);

        assert!(renderer.draw_composite(&mut buffer, 4, 3, &solid(4, 3, [10, 120, 240, 255])));

        assert_eq!(pixel(&buffer, 4, 3, 2), [10, 120, 240, 255]);
    }

    #[test]
    fn test_output_is_premultiplied() {
        let renderer = Renderer::new(1.0);
        let mut buffer = Renderer::create_buffer(2, 2);

        renderer.draw_composite(&mut buffer, 2, 2, &solid(2, 2, [200, 100, 50, 102]));

        // 102/255 = 0.4
        assert!(close(pixel(&buffer, 2, 0, 0), [80, 40, 20, 102]));
    }

    #[test]
    fn test_window_opacity_scales_everything() {
        let renderer = Renderer::new(0.1);
        let mut buffer = Renderer::create_buffer(2, 2);

        renderer.draw_composite(&mut buffer, 2, 2, &solid(2, 2, [255, 255, 255, 255]));

        let [r, g, b, a] = pixel(&buffer, 2, 1, 1);
        assert!((24..=27).contains(&a), "alpha {a}");
        assert_eq!((r, g, b), (a, a, a));
    }

    #[test]
    fn test_previous_frame_is_cleared() {
        let renderer = Renderer::new(1.0);
        let mut buffer = vec![255u8; 2 * 2 * 4];

        renderer.draw_composite(&mut buffer, 2, 2, &solid(2, 2, [0, 0, 0, 0]));

        assert!(buffer.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_mismatched_buffer_is_rejected() {
        let renderer = Renderer::new(1.0);
        let mut buffer = vec![7u8; 10];

        assert!(!renderer.draw_composite(&mut buffer, 4, 4, &solid(4, 4, [1, 2, 3, 255])));
        assert!(buffer.iter().all(|&b| b == 7));
    }

    #[test]
    fn test_opacity_is_clamped() {
        assert_eq!(Renderer::new(3.0).opacity(), 1.0);
        assert_eq!(Renderer::new(-1.0).opacity(), 0.0);
    }
}
