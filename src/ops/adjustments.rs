// ============================================================================
// ADJUSTMENT OPERATIONS — pixel-level color adjustments (selection aware)
// ============================================================================
//
// All operations work on one layer's surface. If a selection is active, only
// selected pixels (checked in global coordinates through the layer offset)
// are modified. Rows are parallelized via rayon.
// ============================================================================

use rayon::prelude::*;

use crate::canvas::Layer;
use crate::selection::SelectionMask;

/// Apply a per-pixel transform to the layer's surface. The transform
/// receives and returns (r, g, b, a) as f32 in the 0–255 range; results are
/// rounded and clamped. Mask-alpha-0 pixels are left untouched.
pub fn apply_pixel_transform<F>(layer: &mut Layer, selection: &SelectionMask, transform: F)
where
    F: Fn(f32, f32, f32, f32) -> (f32, f32, f32, f32) + Sync,
{
    let w = layer.surface.width() as usize;
    let (off_x, off_y) = layer.offset();
    let stride = w * 4;

    let raw: &mut [u8] = layer.surface.as_image_mut();
    raw.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        let gy = (y as f32 + off_y).floor() as i64;
        for x in 0..w {
            let gx = (x as f32 + off_x).floor() as i64;
            if selection.excludes(gx, gy) {
                continue;
            }
            let i = x * 4;
            let (nr, ng, nb, na) = transform(
                row[i] as f32,
                row[i + 1] as f32,
                row[i + 2] as f32,
                row[i + 3] as f32,
            );
            row[i] = nr.round().clamp(0.0, 255.0) as u8;
            row[i + 1] = ng.round().clamp(0.0, 255.0) as u8;
            row[i + 2] = nb.round().clamp(0.0, 255.0) as u8;
            row[i + 3] = na.round().clamp(0.0, 255.0) as u8;
        }
    });
}

/// 255 − channel for R, G, B; alpha preserved.
pub fn invert(layer: &mut Layer, selection: &SelectionMask) {
    apply_pixel_transform(layer, selection, |r, g, b, a| {
        (255.0 - r, 255.0 - g, 255.0 - b, a)
    });
}

/// Replace R, G, B with their arithmetic mean.
pub fn grayscale(layer: &mut Layer, selection: &SelectionMask) {
    apply_pixel_transform(layer, selection, |r, g, b, a| {
        let avg = (r + g + b) / 3.0;
        (avg, avg, avg, a)
    });
}

/// Classic sepia matrix, each output channel clamped to [0, 255].
pub fn sepia(layer: &mut Layer, selection: &SelectionMask) {
    apply_pixel_transform(layer, selection, |r, g, b, a| {
        (
            (r * 0.393 + g * 0.769 + b * 0.189).min(255.0),
            (r * 0.349 + g * 0.686 + b * 0.168).min(255.0),
            (r * 0.272 + g * 0.534 + b * 0.131).min(255.0),
            a,
        )
    });
}

/// Additive brightness: `value` is added to R, G, B and clamped.
pub fn brightness(layer: &mut Layer, selection: &SelectionMask, value: i32) {
    let v = value as f32;
    apply_pixel_transform(layer, selection, move |r, g, b, a| {
        (r + v, g + v, b + v, a)
    });
}

/// Rotate hue by `degrees`: convert to HSL, add `degrees/360` to hue modulo
/// 1, convert back. Saturation, lightness and alpha are preserved.
pub fn hue_shift(layer: &mut Layer, selection: &SelectionMask, degrees: f32) {
    let shift = degrees / 360.0;
    apply_pixel_transform(layer, selection, move |r, g, b, a| {
        let (h, s, l) = rgb_to_hsl(r, g, b);
        let (nr, ng, nb) = hsl_to_rgb((h + shift).rem_euclid(1.0), s, l);
        (nr, ng, nb, a)
    });
}

// ============================================================================
// RGB ↔ HSL
// ============================================================================

/// RGB in 0–255 to HSL in 0–1.
pub fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let r = r / 255.0;
    let g = g / 255.0;
    let b = b / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h / 6.0, s, l)
}

/// HSL in 0–1 to RGB in 0–255.
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s == 0.0 {
        let v = l * 255.0;
        return (v, v, v);
    }

    fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            return p + (q - p) * 6.0 * t;
        }
        if t < 1.0 / 2.0 {
            return q;
        }
        if t < 2.0 / 3.0 {
            return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
        }
        p
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    (
        hue_to_rgb(p, q, h + 1.0 / 3.0) * 255.0,
        hue_to_rgb(p, q, h) * 255.0,
        hue_to_rgb(p, q, h - 1.0 / 3.0) * 255.0,
    )
}

// ============================================================================
// TESTS
// ============================================================================
