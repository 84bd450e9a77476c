//! Non-local means colour denoising
//!
//! The model was trained on images smoothed with non-local means in CIELAB
//! space: the lightness plane filtered with strength `h`, the two chroma planes
//! jointly with `h_color`. Inference must apply the exact same filter, so the
//! parameters live in [`DenoiseParams`] with the training-time values as default.
//!
//! For every pixel, each candidate in the search window contributes with weight
//! `exp(-(ssd / template²) / (h² · channels))`, where `ssd` is the sum of squared
//! differences between the two template patches. Patch distances for one search
//! offset are read from an integral image, which keeps the cost independent of
//! the template size.

use image::{Rgb, RgbImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Weights below this are treated as zero
const WEIGHT_THRESHOLD: f64 = 0.001;

/// Filter strengths and window sizes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DenoiseParams {
    /// Strength for the lightness plane
    pub h: f32,
    /// Strength for the two chroma planes
    pub h_color: f32,
    /// Side of the square patch compared between pixels (odd)
    pub template_window: usize,
    /// Side of the square area searched for similar patches (odd)
    pub search_window: usize,
}

impl Default for DenoiseParams {
    fn default() -> Self {
        Self {
            h: 10.0,
            h_color: 10.0,
            template_window: 7,
            search_window: 21,
        }
    }
}

/// Denoise an RGB image with non-local means on its CIELAB representation
pub fn denoise_colored(image: &RgbImage, params: &DenoiseParams) -> RgbImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return image.clone();
    }

    let mut lightness = Vec::with_capacity(w * h);
    let mut chroma = Vec::with_capacity(w * h * 2);
    for pixel in image.pixels() {
        let [l, a, b] = quantize_lab(rgb_to_lab(pixel.0));
        lightness.push(l);
        chroma.push(a);
        chroma.push(b);
    }

    let lightness = non_local_means(
        &lightness,
        w,
        h,
        1,
        params.h,
        params.template_window,
        params.search_window,
    );
    let chroma = non_local_means(
        &chroma,
        w,
        h,
        2,
        params.h_color,
        params.template_window,
        params.search_window,
    );

    RgbImage::from_fn(width, height, |x, y| {
        let i = y as usize * w + x as usize;
        let lab = quantize_lab([lightness[i], chroma[2 * i], chroma[2 * i + 1]]);
        Rgb(lab_to_rgb(lab))
    })
}

/// Non-local means over an interleaved plane of `channels` values per pixel
pub(crate) fn non_local_means(
    plane: &[f32],
    width: usize,
    height: usize,
    channels: usize,
    h: f32,
    template_window: usize,
    search_window: usize,
) -> Vec<f32> {
    debug_assert_eq!(plane.len(), width * height * channels);

    let tr = template_window / 2;
    let sr = search_window / 2;
    let tw = 2 * tr + 1;
    let border = tr + sr;
    let pw = width + 2 * border;
    let ph = height + 2 * border;

    let mut padded = vec![0.0f32; pw * ph * channels];
    for py in 0..ph {
        let sy = reflect_101(py as isize - border as isize, height);
        for px in 0..pw {
            let sx = reflect_101(px as isize - border as isize, width);
            let src = (sy * width + sx) * channels;
            let dst = (py * pw + px) * channels;
            padded[dst..dst + channels].copy_from_slice(&plane[src..src + channels]);
        }
    }

    // Region whose template sums are needed: the image plus a template radius.
    let dw = width + 2 * tr;
    let dh = height + 2 * tr;
    let stride = dw + 1;

    let h = h as f64;
    let scale = 1.0 / ((tw * tw) as f64 * h * h * channels as f64);

    let sr = sr as isize;
    let offsets: Vec<(isize, isize)> = (-sr..=sr)
        .flat_map(|dy| (-sr..=sr).map(move |dx| (dy, dx)))
        .collect();

    let pixels = width * height;
    let (sums, weights) = offsets
        .par_iter()
        .fold(
            || {
                (
                    vec![0.0f64; pixels * channels],
                    vec![0.0f64; pixels],
                    vec![0.0f64; stride * (dh + 1)],
                )
            },
            |(mut sums, mut weights, mut integral), &(dy, dx)| {
                for y in 0..dh {
                    let u = y + sr as usize;
                    let un = (u as isize + dy) as usize;
                    let mut row = 0.0f64;
                    for x in 0..dw {
                        let v = x + sr as usize;
                        let vn = (v as isize + dx) as usize;
                        let a = (u * pw + v) * channels;
                        let b = (un * pw + vn) * channels;
                        for c in 0..channels {
                            let diff = (padded[a + c] - padded[b + c]) as f64;
                            row += diff * diff;
                        }
                        integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row;
                    }
                }

                for y in 0..height {
                    for x in 0..width {
                        let ssd = integral[(y + tw) * stride + x + tw]
                            - integral[y * stride + x + tw]
                            - integral[(y + tw) * stride + x]
                            + integral[y * stride + x];
                        let weight = (-ssd * scale).exp();
                        if weight < WEIGHT_THRESHOLD {
                            continue;
                        }

                        let ny = (y + border) as isize + dy;
                        let nx = (x + border) as isize + dx;
                        let n = (ny as usize * pw + nx as usize) * channels;
                        let i = y * width + x;
                        for c in 0..channels {
                            sums[i * channels + c] += weight * padded[n + c] as f64;
                        }
                        weights[i] += weight;
                    }
                }

                (sums, weights, integral)
            },
        )
        .map(|(sums, weights, _)| (sums, weights))
        .reduce(
            || (vec![0.0f64; pixels * channels], vec![0.0f64; pixels]),
            |(mut sums, mut weights), (other_sums, other_weights)| {
                sums.iter_mut().zip(&other_sums).for_each(|(a, b)| *a += b);
                weights.iter_mut().zip(&other_weights).for_each(|(a, b)| *a += b);
                (sums, weights)
            },
        );

    // The zero offset always contributes weight 1, so no division by zero.
    sums.iter()
        .enumerate()
        .map(|(i, s)| (s / weights[i / channels]) as f32)
        .collect()
}

/// Border index with reflect-101 semantics (`gfedcb|abcdefgh|gfedcba`)
fn reflect_101(i: isize, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let n = n as isize;
    let period = 2 * (n - 1);
    let m = i.rem_euclid(period);
    (if m >= n { period - m } else { m }) as usize
}

/// Round and clamp Lab values onto the 8-bit grid
fn quantize_lab(lab: [f32; 3]) -> [f32; 3] {
    lab.map(|v| v.round().clamp(0.0, 255.0))
}

const D65_X: f32 = 0.950456;
const D65_Z: f32 = 1.088754;
const LAB_EPSILON: f32 = 0.008856;
const LAB_KAPPA: f32 = 903.3;

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn lab_f(t: f32) -> f32 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(f: f32) -> f32 {
    let t = f * f * f;
    if t > LAB_EPSILON {
        t
    } else {
        (f - 16.0 / 116.0) / 7.787
    }
}

/// sRGB to CIELAB scaled to 8-bit ranges: `L·255/100`, `a+128`, `b+128`
pub(crate) fn rgb_to_lab(rgb: [u8; 3]) -> [f32; 3] {
    let [r, g, b] = rgb.map(|c| srgb_to_linear(c as f32 / 255.0));

    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / D65_X;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / D65_Z;

    let l = if y > LAB_EPSILON {
        116.0 * y.cbrt() - 16.0
    } else {
        LAB_KAPPA * y
    };
    let a = 500.0 * (lab_f(x) - lab_f(y));
    let bb = 200.0 * (lab_f(y) - lab_f(z));

    [l * 255.0 / 100.0, a + 128.0, bb + 128.0]
}

/// Inverse of [`rgb_to_lab`]
pub(crate) fn lab_to_rgb(lab: [f32; 3]) -> [u8; 3] {
    let l = lab[0] * 100.0 / 255.0;
    let a = lab[1] - 128.0;
    let b = lab[2] - 128.0;

    let fy = (l + 16.0) / 116.0;
    let y = if l > LAB_KAPPA * LAB_EPSILON {
        fy * fy * fy
    } else {
        l / LAB_KAPPA
    };
    let x = lab_f_inv(fy + a / 500.0) * D65_X;
    let z = lab_f_inv(fy - b / 200.0) * D65_Z;

    let r = 3.240479 * x - 1.537150 * y - 0.498535 * z;
    let g = -0.969256 * x + 1.875991 * y + 0.041556 * z;
    let bl = 0.055648 * x - 0.204043 * y + 1.057311 * z;

    [r, g, bl].map(|c| (linear_to_srgb(c.clamp(0.0, 1.0)) * 255.0).round().clamp(0.0, 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn mean_abs_deviation(image: &RgbImage, target: u8) -> f64 {
        let total: f64 = image
            .pixels()
            .flat_map(|p| p.0)
            .map(|c| (c as f64 - target as f64).abs())
            .sum();
        total / (image.width() * image.height() * 3) as f64
    }

    #[test]
    fn test_default_params_match_training() {
        let params = DenoiseParams::default();
        assert_eq!(params.h, 10.0);
        assert_eq!(params.h_color, 10.0);
        assert_eq!(params.template_window, 7);
        assert_eq!(params.search_window, 21);
    }

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(0, 5), 0);
        assert_eq!(reflect_101(4, 5), 4);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        // Pads wider than the image bounce back and forth
        assert_eq!(reflect_101(-9, 5), 1);
        assert_eq!(reflect_101(7, 1), 0);
    }

    #[test]
    fn test_lab_roundtrip() {
        for rgb in [[0, 0, 0], [255, 255, 255], [200, 30, 40], [12, 180, 90], [70, 70, 230]] {
            let back = lab_to_rgb(rgb_to_lab(rgb));
            for c in 0..3 {
                assert!(
                    (back[c] as i32 - rgb[c] as i32).abs() <= 1,
                    "{:?} came back as {:?}",
                    rgb,
                    back
                );
            }
        }
    }

    #[test]
    fn test_lab_scaling() {
        let white = rgb_to_lab([255, 255, 255]);
        assert!((white[0] - 255.0).abs() < 0.5);
        assert!((white[1] - 128.0).abs() < 0.5);
        assert!((white[2] - 128.0).abs() < 0.5);
    }

    #[test]
    fn test_constant_plane_is_unchanged() {
        let plane = vec![42.0f32; 12 * 9];
        let out = non_local_means(&plane, 12, 9, 1, 10.0, 7, 21);
        assert_eq!(out.len(), plane.len());
        assert!(out.iter().all(|v| (v - 42.0).abs() < 1e-4));
    }

    #[test]
    fn test_distinct_regions_are_preserved() {
        // Strong edge: patches across it are far apart and get ~zero weight.
        let (w, h) = (16, 16);
        let plane: Vec<f32> = (0..w * h)
            .map(|i| if i % w < w / 2 { 20.0 } else { 220.0 })
            .collect();
        let out = non_local_means(&plane, w, h, 1, 10.0, 7, 21);
        assert!((out[0] - 20.0).abs() < 1.0);
        assert!((out[w - 1] - 220.0).abs() < 1.0);
    }

    #[test]
    fn test_uniform_image_stays_uniform() {
        let image = RgbImage::from_pixel(20, 14, Rgb([90, 140, 200]));
        let out = denoise_colored(&image, &DenoiseParams::default());

        assert_eq!(out.dimensions(), (20, 14));
        let first = out.get_pixel(0, 0).0;
        for c in 0..3 {
            assert!((first[c] as i32 - [90, 140, 200][c]).abs() <= 3);
        }
        assert!(out.pixels().all(|p| p.0 == first));
    }

    #[test]
    fn test_noise_is_reduced() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let noisy = RgbImage::from_fn(32, 32, |_, _| {
            let v = (128 + rng.gen_range(-12i32..=12)) as u8;
            Rgb([v, v, v])
        });

        let before = mean_abs_deviation(&noisy, 128);
        let after = mean_abs_deviation(&denoise_colored(&noisy, &DenoiseParams::default()), 128);

        assert!(after < before * 0.6, "before {:.2}, after {:.2}", before, after);
    }

    #[test]
    fn test_empty_image() {
        let image = RgbImage::new(0, 0);
        assert_eq!(denoise_colored(&image, &DenoiseParams::default()).dimensions(), (0, 0));
    }
}
