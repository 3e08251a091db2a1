//! Deterministic per-batch image augmentation.
//!
//! The pipeline is a pure function of `(batch, seed pair)`: batch `b` of a
//! stream is augmented with the pair `(2b, 2b + 1)`, so re-iterating a
//! stream reproduces the exact same augmented tensors. The first seed
//! drives the spatial transforms (flip, translation), the second the
//! intensity transforms (brightness, contrast).
//!
//! Brightness always moves every pixel by at least [`BRIGHTNESS_FLOOR`], so
//! an augmented batch is never pointwise equal to its input.

use ndarray::{Array3, Axis};

use crate::stream::{Batch, Xorshift64};

/// Maximum translation in pixels along either image axis.
pub const MAX_SHIFT: i64 = 2;

/// Minimum absolute brightness delta, in pixel-intensity units.
pub const BRIGHTNESS_FLOOR: f32 = 4.0;

/// Maximum absolute brightness delta.
pub const BRIGHTNESS_MAX: f32 = 24.0;

/// Contrast scale range around the per-image mean.
pub const CONTRAST_RANGE: (f32, f32) = (0.8, 1.2);

/// Augment one image batch with the seed pair `(spatial_seed,
/// intensity_seed)`.
///
/// Shapes and labels are preserved; pixel intensities stay in `[0, 255]`.
pub fn augment_batch(
    batch: &Batch<Array3<f32>>,
    spatial_seed: u64,
    intensity_seed: u64,
) -> Batch<Array3<f32>> {
    let mut spatial = Xorshift64::new(spatial_seed);
    let mut intensity = Xorshift64::new(intensity_seed);

    let features = batch
        .features
        .iter()
        .map(|image| {
            let mut image = image.clone();
            if spatial.next_f32() < 0.5 {
                flip_horizontal(&mut image);
            }
            let dy = spatial.next_below((2 * MAX_SHIFT + 1) as usize) as i64 - MAX_SHIFT;
            let dx = spatial.next_below((2 * MAX_SHIFT + 1) as usize) as i64 - MAX_SHIFT;
            let image = translate(&image, dy, dx);
            let mut image = adjust_brightness(image, &mut intensity);
            adjust_contrast(&mut image, &mut intensity);
            clamp_pixels(&mut image);
            image
        })
        .collect();

    Batch { features, labels: batch.labels.clone() }
}

fn flip_horizontal(image: &mut Array3<f32>) {
    image.invert_axis(Axis(1));
}

/// Shift the image by `(dy, dx)` pixels, filling vacated pixels with zero.
fn translate(image: &Array3<f32>, dy: i64, dx: i64) -> Array3<f32> {
    let (height, width, channels) = image.dim();
    let mut shifted = Array3::zeros((height, width, channels));
    for y in 0..height as i64 {
        let sy = y - dy;
        if sy < 0 || sy >= height as i64 {
            continue;
        }
        for x in 0..width as i64 {
            let sx = x - dx;
            if sx < 0 || sx >= width as i64 {
                continue;
            }
            for c in 0..channels {
                shifted[[y as usize, x as usize, c]] = image[[sy as usize, sx as usize, c]];
            }
        }
    }
    shifted
}

/// Add a brightness delta whose magnitude is at least [`BRIGHTNESS_FLOOR`].
fn adjust_brightness(mut image: Array3<f32>, rng: &mut Xorshift64) -> Array3<f32> {
    let magnitude = rng.next_f32_range(BRIGHTNESS_FLOOR, BRIGHTNESS_MAX);
    let delta = if rng.next_f32() < 0.5 { -magnitude } else { magnitude };
    image.mapv_inplace(|p| p + delta);
    image
}

/// Scale pixel deviations from the per-image mean.
fn adjust_contrast(image: &mut Array3<f32>, rng: &mut Xorshift64) {
    let scale = rng.next_f32_range(CONTRAST_RANGE.0, CONTRAST_RANGE.1);
    let mean = image.mean().unwrap_or(0.0);
    image.mapv_inplace(|p| mean + (p - mean) * scale);
}

fn clamp_pixels(image: &mut Array3<f32>) {
    image.mapv_inplace(|p| p.clamp(0.0, 255.0));
}
