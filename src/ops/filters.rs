// ============================================================================
// IMAGE FILTERS — convolution, pixelation, Gaussian blur
// ============================================================================

use image::imageops;
use rayon::prelude::*;

use crate::canvas::Layer;
use crate::selection::SelectionMask;

/// Classic 3×3 sharpen kernel (already normalized).
pub const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

/// 3×3 box-blur kernel.
pub const BOX_BLUR_KERNEL: [f32; 9] = [1.0 / 9.0; 9];

/// Apply a square convolution kernel to the layer's RGB channels; alpha is
/// passed through unmodified. Out-of-bounds neighbor samples contribute
/// nothing (edge pixels receive a partial sum — kernel normalization is the
/// caller's responsibility). Masked-out pixels are copied unchanged.
///
/// `kernel` must be `n × n` with odd `n`; anything else is a no-op.
pub fn convolve(layer: &mut Layer, kernel: &[f32], selection: &SelectionMask) {
    let n = (kernel.len() as f64).sqrt() as usize;
    if n * n != kernel.len() || n % 2 == 0 || n == 0 {
        return;
    }
    let half = (n / 2) as i64;

    let w = layer.surface.width() as usize;
    let h = layer.surface.height() as usize;
    let (off_x, off_y) = layer.offset();
    let stride = w * 4;

    let src = layer.surface.raw().to_vec();
    let raw: &mut [u8] = layer.surface.as_image_mut();

    raw.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        let gy = (y as f32 + off_y).floor() as i64;
        for x in 0..w {
            let gx = (x as f32 + off_x).floor() as i64;
            if selection.excludes(gx, gy) {
                continue; // row already holds the source bytes
            }
            let mut acc = [0.0f32; 3];
            for ky in 0..n {
                let sy = y as i64 + ky as i64 - half;
                if sy < 0 || sy >= h as i64 {
                    continue;
                }
                for kx in 0..n {
                    let sx = x as i64 + kx as i64 - half;
                    if sx < 0 || sx >= w as i64 {
                        continue;
                    }
                    let weight = kernel[ky * n + kx];
                    let si = (sy as usize * w + sx as usize) * 4;
                    acc[0] += src[si] as f32 * weight;
                    acc[1] += src[si + 1] as f32 * weight;
                    acc[2] += src[si + 2] as f32 * weight;
                }
            }
            let i = x * 4;
            row[i] = acc[0].round().clamp(0.0, 255.0) as u8;
            row[i + 1] = acc[1].round().clamp(0.0, 255.0) as u8;
            row[i + 2] = acc[2].round().clamp(0.0, 255.0) as u8;
            // alpha untouched
        }
    });
}

/// Partition the surface into `block_size × block_size` tiles; every output
/// pixel takes the color sampled at its tile's top-left source pixel.
/// Masked-out pixels retain their original value instead of the tile sample.
pub fn pixelate(layer: &mut Layer, block_size: u32, selection: &SelectionMask) {
    if block_size <= 1 {
        return;
    }
    let w = layer.surface.width() as usize;
    let (off_x, off_y) = layer.offset();
    let stride = w * 4;
    let b = block_size as usize;

    let src = layer.surface.raw().to_vec();
    let raw: &mut [u8] = layer.surface.as_image_mut();

    raw.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        let gy = (y as f32 + off_y).floor() as i64;
        let ty = (y / b) * b;
        for x in 0..w {
            let gx = (x as f32 + off_x).floor() as i64;
            if selection.excludes(gx, gy) {
                continue;
            }
            let tx = (x / b) * b;
            let si = (ty * w + tx) * 4;
            let i = x * 4;
            row[i..i + 4].copy_from_slice(&src[si..si + 4]);
        }
    });
}

/// Gaussian blur, delegated to the `image` crate's raster primitive. The
/// *effect* is masked: when a selection is active, unselected pixels keep
/// their original content and only selected pixels receive blur output.
pub fn gaussian_blur(layer: &mut Layer, sigma: f32, selection: &SelectionMask) {
    if sigma <= 0.0 {
        return;
    }
    let blurred = imageops::blur(layer.surface.as_image(), sigma);

    if !selection.has_selection() {
        layer.surface = crate::canvas::Surface::from_image(blurred);
        return;
    }

    let (w, h) = (layer.surface.width(), layer.surface.height());
    let (off_x, off_y) = layer.offset();
    for y in 0..h {
        let gy = (y as f32 + off_y).floor() as i64;
        for x in 0..w {
            let gx = (x as f32 + off_x).floor() as i64;
            if selection.is_selected(gx, gy) {
                layer.surface.set_pixel(x, y, *blurred.get_pixel(x, y));
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn layer_filled(w: u32, h: u32, color: Rgba<u8>) -> Layer {
        let mut layer = Layer::new(1, "L".into(), w, h);
        layer.surface.fill(color);
        layer
    }

    #[test]
    fn identity_kernel_changes_nothing() {
        let mut layer = layer_filled(6, 6, Rgba([40, 80, 120, 200]));
        layer.surface.set_pixel(2, 2, Rgba([1, 2, 3, 4]));
        let before = layer.surface.raw().to_vec();
        let identity = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        convolve(&mut layer, &identity, &SelectionMask::new(6, 6));
        assert_eq!(layer.surface.raw(), &before[..]);
    }

    #[test]
    fn edge_pixels_receive_a_partial_sum() {
        // Unnormalized all-ones kernel on a uniform value of 10: interior
        // pixels sum 9 samples, the corner only 4.
        let mut layer = layer_filled(5, 5, Rgba([10, 10, 10, 255]));
        let ones = [1.0; 9];
        convolve(&mut layer, &ones, &SelectionMask::new(5, 5));
        assert_eq!(layer.surface.pixel(2, 2)[0], 90);
        assert_eq!(layer.surface.pixel(0, 0)[0], 40);
        // Alpha passes through unmodified.
        assert_eq!(layer.surface.pixel(2, 2)[3], 255);
    }

    #[test]
    fn convolution_skips_masked_pixels() {
        let mut layer = layer_filled(6, 6, Rgba([10, 10, 10, 255]));
        let mut mask = SelectionMask::new(6, 6);
        mask.select_rect(0, 0, 3, 6);
        convolve(&mut layer, &[1.0; 9], &mask);
        assert_ne!(layer.surface.pixel(1, 1), Rgba([10, 10, 10, 255]));
        assert_eq!(layer.surface.pixel(5, 1), Rgba([10, 10, 10, 255]));
    }

    #[test]
    fn non_square_kernel_is_a_no_op() {
        let mut layer = layer_filled(4, 4, Rgba([9, 9, 9, 255]));
        let before = layer.surface.raw().to_vec();
        convolve(&mut layer, &[1.0; 6], &SelectionMask::new(4, 4));
        assert_eq!(layer.surface.raw(), &before[..]);
    }

    #[test]
    fn pixelate_samples_the_tile_top_left() {
        let mut layer = layer_filled(8, 8, Rgba([0, 0, 0, 255]));
        layer.surface.set_pixel(4, 4, Rgba([255, 0, 0, 255]));
        pixelate(&mut layer, 4, &SelectionMask::new(8, 8));
        // (4,4) is the top-left of its tile: the whole tile takes its color.
        assert_eq!(layer.surface.pixel(7, 7), Rgba([255, 0, 0, 255]));
        assert_eq!(layer.surface.pixel(3, 3), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn pixelate_keeps_masked_out_pixels() {
        let mut layer = layer_filled(8, 8, Rgba([0, 0, 0, 255]));
        layer.surface.set_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let mut mask = SelectionMask::new(8, 8);
        mask.select_rect(0, 0, 8, 4); // bottom half excluded
        pixelate(&mut layer, 8, &mask);
        assert_eq!(layer.surface.pixel(7, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(layer.surface.pixel(7, 7), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn blur_effect_is_masked_not_the_algorithm() {
        let mut layer = layer_filled(16, 16, Rgba([0, 0, 0, 255]));
        for y in 0..16 {
            for x in 8..16 {
                layer.surface.set_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let mut mask = SelectionMask::new(16, 16);
        mask.select_rect(0, 0, 16, 8); // top half only
        let before = layer.surface.raw().to_vec();
        gaussian_blur(&mut layer, 2.0, &mask);
        // Bottom half (unselected) byte-identical.
        let half = 16 * 8 * 4;
        assert_eq!(&layer.surface.raw()[half..], &before[half..]);
        // Top-half boundary pixels picked up blur output.
        assert_ne!(layer.surface.pixel(8, 4), Rgba([255, 255, 255, 255]));
    }
}
