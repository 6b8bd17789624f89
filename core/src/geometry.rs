//! Display regions and the scale/centering math shared by the composite layers.

use image::RgbaImage;

/// Width and height of a canvas or bitmap in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Coordinate space of one physical display, fixed once enumerated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRegion {
    /// Platform identifier of the display (output name, device name)
    pub id: String,
    /// X position in virtual screen space
    pub x: i32,
    /// Y position in virtual screen space
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl DisplayRegion {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Where a scaled layer lands on the canvas.
///
/// Offsets can be negative when the layer is larger than the canvas
/// (the overhang is cropped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    /// A layer of exactly `size` drawn at the canvas origin
    pub fn at_origin(size: Size) -> Self {
        Self {
            x: 0,
            y: 0,
            width: size.width,
            height: size.height,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Smallest scale at which `source` covers `target` completely (crop-to-fill)
pub fn cover_scale(source: Size, target: Size) -> f64 {
    let (sx, sy) = axis_scales(source, target);
    sx.max(sy)
}

/// Largest scale at which `source` fits inside `target` (letterbox-to-fit)
pub fn fit_scale(source: Size, target: Size) -> f64 {
    let (sx, sy) = axis_scales(source, target);
    sx.min(sy)
}

fn axis_scales(source: Size, target: Size) -> (f64, f64) {
    (
        f64::from(target.width) / f64::from(source.width),
        f64::from(target.height) / f64::from(source.height),
    )
}

/// Scale `source` by `scale` and center the result on `target`.
///
/// Scaled dimensions are rounded rather than truncated: an axis whose exact
/// scaled length equals the target must land on the target, not one pixel
/// short of it because of float error.
pub fn center(source: Size, target: Size, scale: f64) -> Placement {
    let width = scale_dimension(source.width, scale);
    let height = scale_dimension(source.height, scale);
    Placement {
        x: (i64::from(target.width) - i64::from(width)) / 2,
        y: (i64::from(target.height) - i64::from(height)) / 2,
        width,
        height,
    }
}

/// Rectangle of source pixels, in source coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Source pixels that end up inside `target` when `source` is scaled to
/// `layer`'s size and placed at its offset.
///
/// Partially visible edge pixels are included, so the result is never empty
/// and never exceeds `source`.
pub fn visible_source(source: Size, target: Size, layer: Placement) -> SourceRect {
    let (x, width) = visible_span(source.width, layer.width, layer.x, target.width);
    let (y, height) = visible_span(source.height, layer.height, layer.y, target.height);
    SourceRect {
        x,
        y,
        width,
        height,
    }
}

fn visible_span(length: u32, scaled: u32, offset: i64, canvas: u32) -> (u32, u32) {
    let scaled = u64::from(scaled.max(1));
    let first = (-offset).max(0).unsigned_abs().min(scaled);
    let last = (first + u64::from(canvas)).min(scaled);

    // Layer pixel p samples source pixels [p * length / scaled, ...)
    let length = u64::from(length.max(1));
    let start = (first * length / scaled).min(length - 1);
    let end = (last * length).div_ceil(scaled).clamp(start + 1, length);
    (start as u32, (end - start) as u32)
}

fn scale_dimension(length: u32, scale: f64) -> u32 {
    let scaled = (f64::from(length) * scale).round();
    // Clamp keeps tiny scales from producing an empty intermediate
    scaled.clamp(1.0, f64::from(u32::MAX)) as u32
}
