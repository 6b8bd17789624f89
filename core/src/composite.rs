//! Two-layer composite: a blurred crop-to-fill backdrop under the sharp,
//! letterboxed original.

use image::RgbaImage;
use image::imageops::{self, FilterType};
use serde::Deserialize;

use crate::blur::{BlurParams, blur};
use crate::geometry::{Placement, Size, SourceRect, center, cover_scale, fit_scale, visible_source};

/// A decoded source bitmap, alive for one refresh tick only
pub type RawImage = RgbaImage;

/// Filter used to scale the foreground layer
const FOREGROUND_FILTER: FilterType = FilterType::CatmullRom;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompositeStyle {
    pub blur: BlurParams,
    /// Opacity the blurred background is drawn with (0.0 - 1.0)
    pub background_opacity: f32,
}

impl Default for CompositeStyle {
    fn default() -> Self {
        Self {
            blur: BlurParams::default(),
            background_opacity: 0.4,
        }
    }
}

/// Finished frame for one display, straight (non-premultiplied) RGBA
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeImage {
    pixels: RgbaImage,
}

impl CompositeImage {
    pub fn size(&self) -> Size {
        Size::of(&self.pixels)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }
}

impl From<RgbaImage> for CompositeImage {
    fn from(pixels: RgbaImage) -> Self {
        Self { pixels }
    }
}

/// Placement of both layers for a given source and canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerPlan {
    /// Blurred layer, covers the canvas and may overhang it
    pub background: Placement,
    /// Source pixels of the background that land on the canvas
    pub background_crop: SourceRect,
    /// Sharp layer, fits inside the canvas
    pub foreground: Placement,
}

impl LayerPlan {
    pub fn new(source: Size, target: Size) -> Self {
        let background = center(source, target, cover_scale(source, target));
        Self {
            background,
            background_crop: visible_source(source, target, background),
            foreground: center(source, target, fit_scale(source, target)),
        }
    }
}

/// Build the composite for `target` from `original`.
///
/// `original` and `target` must both be non-empty; the caller derives
/// `target` from a display region.
pub fn build_composite(original: &RawImage, target: Size, style: &CompositeStyle) -> CompositeImage {
    let plan = LayerPlan::new(Size::of(original), target);
    let mut canvas = RgbaImage::new(target.width, target.height);

    // Only the visible part of the cover layer is rendered; the full layer
    // can be arbitrarily large for extreme aspect ratios.
    let crop = plan.background_crop;
    let visible = imageops::crop_imm(original, crop.x, crop.y, crop.width, crop.height);
    let background = blur(&*visible, target, &style.blur);
    draw_over(&mut canvas, &background, Placement::at_origin(target), style.background_opacity);
    drop(background);

    let foreground = imageops::resize(
        original,
        plan.foreground.width,
        plan.foreground.height,
        FOREGROUND_FILTER,
    );
    draw_over(&mut canvas, &foreground, plan.foreground, 1.0);

    CompositeImage { pixels: canvas }
}

/// Source-over `layer` onto `canvas` at the placement's offset, clipped to
/// the canvas, with the layer's alpha scaled by `opacity`.
pub fn draw_over(canvas: &mut RgbaImage, layer: &RgbaImage, at: Placement, opacity: f32) {
    let op = (opacity.clamp(0.0, 1.0) * 255.0).round() as u16;
    if op == 0 {
        return;
    }

    let (canvas_w, canvas_h) = (i64::from(canvas.width()), i64::from(canvas.height()));
    let (layer_w, layer_h) = (i64::from(layer.width()), i64::from(layer.height()));

    // Visible rectangle in canvas coordinates
    let left = at.x.max(0);
    let top = at.y.max(0);
    let right = (at.x + layer_w).min(canvas_w);
    let bottom = (at.y + layer_h).min(canvas_h);
    if left >= right || top >= bottom {
        return;
    }

    let span = ((right - left) * 4) as usize;
    let canvas_stride = (canvas_w * 4) as usize;
    let layer_stride = (layer_w * 4) as usize;
    let src = layer.as_raw();
    let dst: &mut [u8] = canvas;

    for y in top..bottom {
        let dst_start = y as usize * canvas_stride + left as usize * 4;
        let src_start = (y - at.y) as usize * layer_stride + (left - at.x) as usize * 4;
        let dst_row = &mut dst[dst_start..dst_start + span];
        let src_row = &src[src_start..src_start + span];

        for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
            let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], op);
            d.copy_from_slice(&out);
        }
    }
}

/// Straight-alpha source-over with an extra 0-255 opacity on the source
fn over(dst: [u8; 4], src: [u8; 4], op: u16) -> [u8; 4] {
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return [src[0], src[1], src[2], 255];
    }

    let da = mul_div255(u16::from(dst[3]), 255 - u16::from(sa));
    let out_a = u32::from(sa) + u32::from(da);

    let mut out = [0u8; 4];
    for i in 0..3 {
        let num = u32::from(src[i]) * u32::from(sa) + u32::from(dst[i]) * u32::from(da);
        out[i] = ((num + out_a / 2) / out_a).min(255) as u8;
    }
    out[3] = out_a.min(255) as u8;
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, px: [u8; 4]) -> RawImage {
        RgbaImage::from_pixel(width, height, Rgba(px))
    }

    #[test]
    fn test_composite_matches_target_size() {
        let targets = [
            Size::new(1, 1),
            Size::new(64, 36),
            Size::new(36, 64),
            Size::new(5, 300),
        ];
        let sources = [
            solid(1, 1, [9, 9, 9, 255]),
            solid(40, 30, [9, 9, 9, 255]),
            solid(3, 50, [9, 9, 9, 255]),
        ];

        for target in targets {
            for source in &sources {
                let composite = build_composite(source, target, &CompositeStyle::default());
                assert_eq!(composite.size(), target);
            }
        }
    }

    #[test]
    fn test_layer_plan_for_landscape_photo() {
        let plan = LayerPlan::new(Size::new(4000, 3000), Size::new(1920, 1080));

        assert_eq!(plan.background.size(), Size::new(1920, 1440));
        assert_eq!((plan.background.x, plan.background.y), (0, -180));
        assert_eq!(plan.foreground.size(), Size::new(1440, 1080));
        assert_eq!((plan.foreground.x, plan.foreground.y), (240, 0));
        assert_eq!(
            plan.background_crop,
            SourceRect {
                x: 0,
                y: 375,
                width: 4000,
                height: 2250
            }
        );
    }

    #[test]
    fn test_extreme_aspect_source_builds_without_full_cover_layer() {
        // Cover layer would be 1920 x 192,000,000
        let source = RgbaImage::from_fn(1, 100_000, |_, y| {
            if y < 50_000 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let target = Size::new(1920, 1080);

        let composite = build_composite(&source, target, &CompositeStyle::default());

        assert_eq!(composite.size(), target);
        // Bars outside the 1 px wide foreground show the translucent background
        let bar = composite.as_rgba().get_pixel(0, 540).0;
        assert_eq!(bar[3], 102);
        assert_eq!(bar[1], 0);
    }

    #[test]
    fn test_background_shows_only_visible_part_of_source() {
        // Tall source: top third red, middle green, bottom third blue.
        // Cover crops to the middle band on a wide canvas.
        let source = RgbaImage::from_fn(30, 90, |_, y| match y {
            0..30 => Rgba([255, 0, 0, 255]),
            30..60 => Rgba([0, 255, 0, 255]),
            _ => Rgba([0, 0, 255, 255]),
        });
        let style = CompositeStyle::default();

        let composite = build_composite(&source, Size::new(90, 30), &style);

        // Left bar, vertically centered, away from crop edges
        assert_eq!(composite.as_rgba().get_pixel(2, 15).0, [0, 255, 0, 102]);
    }

    #[test]
    fn test_letterbox_shows_translucent_background() {
        // 40x30 source on a 64x36 canvas: foreground is 48x36 at x=8
        let source = solid(40, 30, [200, 100, 50, 255]);
        let composite = build_composite(&source, Size::new(64, 36), &CompositeStyle::default());
        let rgba = composite.as_rgba();

        assert_eq!(rgba.get_pixel(32, 18).0, [200, 100, 50, 255]);
        assert_eq!(rgba.get_pixel(2, 18).0, [200, 100, 50, 102]);
        assert_eq!(rgba.get_pixel(61, 0).0, [200, 100, 50, 102]);
    }

    #[test]
    fn test_zero_background_opacity_leaves_bars_transparent() {
        let source = solid(40, 30, [200, 100, 50, 255]);
        let style = CompositeStyle {
            background_opacity: 0.0,
            ..CompositeStyle::default()
        };

        let composite = build_composite(&source, Size::new(64, 36), &style);

        assert_eq!(composite.as_rgba().get_pixel(1, 1).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_matching_aspect_is_fully_covered_by_foreground() {
        let source = solid(32, 18, [1, 2, 3, 255]);
        let composite = build_composite(&source, Size::new(64, 36), &CompositeStyle::default());

        assert!(composite.as_rgba().pixels().all(|p| p.0 == [1, 2, 3, 255]));
    }

    #[test]
    fn test_draw_over_clips_negative_offsets() {
        let mut canvas = solid(4, 4, [0, 0, 0, 0]);
        let layer = solid(6, 6, [50, 60, 70, 255]);
        let at = Placement {
            x: -1,
            y: -3,
            width: 6,
            height: 6,
        };

        draw_over(&mut canvas, &layer, at, 1.0);

        // Rows 0..3 are covered (layer rows 3..6), row 3 is past the layer
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(canvas.get_pixel(x, y).0, [50, 60, 70, 255]);
            }
        }
        assert_eq!(canvas.get_pixel(0, 3).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_draw_over_outside_canvas_is_noop() {
        let mut canvas = solid(4, 4, [1, 1, 1, 255]);
        let layer = solid(2, 2, [9, 9, 9, 255]);
        let at = Placement {
            x: 10,
            y: 0,
            width: 2,
            height: 2,
        };

        draw_over(&mut canvas, &layer, at, 1.0);

        assert!(canvas.pixels().all(|p| p.0 == [1, 1, 1, 255]));
    }

    #[test]
    fn test_over_blends_translucent_source() {
        assert_eq!(over([0, 0, 0, 0], [100, 110, 120, 200], 255), [100, 110, 120, 200]);
        assert_eq!(over([10, 20, 30, 40], [255, 255, 255, 0], 255), [10, 20, 30, 40]);
        assert_eq!(over([0, 0, 0, 255], [255, 0, 0, 255], 255), [255, 0, 0, 255]);

        // Half white over opaque black lands mid-grey and stays opaque
        let out = over([0, 0, 0, 255], [255, 255, 255, 128], 255);
        assert_eq!(out[3], 255);
        assert!((126..=129).contains(&out[0]));
    }
}
