//! Approximate box blur for the background layer.
//!
//! The work happens on a buffer downsampled to a quarter of the requested
//! size in each dimension. Each pass samples a 3x3 grid of taps spaced
//! `radius` apart around every other pixel and writes the average into the
//! whole 2x2 block, so the effective blur resolution is half the downsampled
//! buffer. The result is upsampled back with the same interpolation filter.

use image::{GenericImageView, Rgba, RgbaImage};
use image::imageops::{self, FilterType};
use serde::Deserialize;

use crate::geometry::Size;

/// Filter used for both the downsample and the upsample
pub const RESAMPLE_FILTER: FilterType = FilterType::CatmullRom;

/// Block edge written per sample position
const BLOCK: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BlurParams {
    /// Number of passes over the downsampled buffer
    pub passes: u32,
    /// Distance in pixels between neighbouring taps
    pub radius: u32,
    /// Linear downsample factor applied before blurring
    pub downscale: u32,
}

impl Default for BlurParams {
    fn default() -> Self {
        Self {
            passes: 3,
            radius: 2,
            downscale: 4,
        }
    }
}

/// Blur `source` and return a fully opaque image of exactly `size`.
///
/// `size` must be non-empty. `source` can be a view (e.g. a crop), so only
/// the downsampled and final buffers are allocated.
pub fn blur<I>(source: &I, size: Size, params: &BlurParams) -> RgbaImage
where
    I: GenericImageView<Pixel = Rgba<u8>>,
{
    let downscale = params.downscale.max(1);
    let small_width = (size.width / downscale).max(1);
    let small_height = (size.height / downscale).max(1);

    let mut current = imageops::resize(source, small_width, small_height, RESAMPLE_FILTER);
    let mut scratch = RgbaImage::new(small_width, small_height);

    for _ in 0..params.passes {
        blur_pass(&current, &mut scratch, params.radius);
        std::mem::swap(&mut current, &mut scratch);
    }

    // The pass forces alpha to opaque; without passes the resize output must match
    if params.passes == 0 {
        force_opaque(&mut current);
    }

    imageops::resize(&current, size.width, size.height, RESAMPLE_FILTER)
}

/// Run a single blur pass from `src` into `dst`.
///
/// Both buffers must have the same dimensions. Every pixel of `dst` is
/// overwritten, so it can be reused between passes without clearing.
pub fn blur_pass(src: &RgbaImage, dst: &mut RgbaImage, radius: u32) {
    debug_assert_eq!(src.dimensions(), dst.dimensions());

    let (width, height) = src.dimensions();
    let (width, height) = (width as usize, height as usize);
    if width == 0 || height == 0 {
        return;
    }

    let stride = width * 4;
    let radius = radius as isize;
    let taps = [-radius, 0, radius];
    let input = src.as_raw();
    let output: &mut [u8] = dst;

    for block_y in (0..height).step_by(BLOCK) {
        for block_x in (0..width).step_by(BLOCK) {
            let mut total = [0u32; 3];
            let mut count = 0u32;

            for dy in taps {
                let row = clamp_coord(block_y, dy, height) * stride;
                for dx in taps {
                    let idx = row + clamp_coord(block_x, dx, width) * 4;
                    total[0] += u32::from(input[idx]);
                    total[1] += u32::from(input[idx + 1]);
                    total[2] += u32::from(input[idx + 2]);
                    count += 1;
                }
            }

            let pixel = [
                (total[0] / count) as u8,
                (total[1] / count) as u8,
                (total[2] / count) as u8,
                u8::MAX,
            ];

            for y in block_y..(block_y + BLOCK).min(height) {
                let row = y * stride;
                for x in block_x..(block_x + BLOCK).min(width) {
                    let idx = row + x * 4;
                    output[idx..idx + 4].copy_from_slice(&pixel);
                }
            }
        }
    }
}

#[inline]
fn clamp_coord(base: usize, offset: isize, len: usize) -> usize {
    (base as isize + offset).clamp(0, len as isize - 1) as usize
}

fn force_opaque(image: &mut RgbaImage) {
    for px in image.chunks_exact_mut(4) {
        px[3] = u8::MAX;
    }
}
