// ============================================================================
// SHAPE OPERATIONS — rect / circle / line rasterizers (selection aware)
// ============================================================================
//
// Commit rasterizers write opaque geometry onto one layer's surface, gated by
// the selection in global coordinates like every other destructive op. The
// dashed variants draw one-pixel outlines onto a plain document-space surface
// and carry no mask; they exist for in-progress tool previews.
// ============================================================================

use image::Rgba;

use crate::canvas::{Layer, Surface};
use crate::coords::GlobalPoint;
use crate::selection::SelectionMask;

/// Dash pattern for outlines: 5 px on, 5 px off.
const DASH: i64 = 5;

/// Filled axis-aligned rectangle spanning the two corners, in any order.
/// Pixels are overwritten, not blended.
pub fn fill_rect(
    layer: &mut Layer,
    a: GlobalPoint,
    b: GlobalPoint,
    color: Rgba<u8>,
    selection: &SelectionMask,
) {
    let (off_x, off_y) = layer.offset();
    let x0 = a.x.min(b.x).floor() as i64;
    let y0 = a.y.min(b.y).floor() as i64;
    let x1 = a.x.max(b.x).ceil() as i64;
    let y1 = a.y.max(b.y).ceil() as i64;

    for gy in y0..y1 {
        for gx in x0..x1 {
            if selection.excludes(gx, gy) {
                continue;
            }
            let lx = (gx as f32 - off_x).floor() as i64;
            let ly = (gy as f32 - off_y).floor() as i64;
            layer.surface.put(lx, ly, color);
        }
    }
}

/// Filled circle around `center`.
pub fn fill_circle(
    layer: &mut Layer,
    center: GlobalPoint,
    radius: f32,
    color: Rgba<u8>,
    selection: &SelectionMask,
) {
    let (off_x, off_y) = layer.offset();
    let (cx, cy) = center.pixel();
    let r = radius.max(0.0);
    let ri = r.ceil() as i64;
    let r2 = r * r;

    for gy in (cy - ri)..=(cy + ri) {
        for gx in (cx - ri)..=(cx + ri) {
            let dx = (gx - cx) as f32;
            let dy = (gy - cy) as f32;
            if dx * dx + dy * dy > r2 {
                continue;
            }
            if selection.excludes(gx, gy) {
                continue;
            }
            let lx = (gx as f32 - off_x).floor() as i64;
            let ly = (gy as f32 - off_y).floor() as i64;
            layer.surface.put(lx, ly, color);
        }
    }
}

/// Straight line of the given stroke width: discs of radius `width / 2`
/// stamped at roughly one-pixel spacing from `a` to `b` inclusive.
pub fn stroke_line(
    layer: &mut Layer,
    a: GlobalPoint,
    b: GlobalPoint,
    width: f32,
    color: Rgba<u8>,
    selection: &SelectionMask,
) {
    let radius = (width / 2.0).max(0.5);
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let steps = dx.hypot(dy).ceil().max(1.0) as u32;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let q = GlobalPoint::new(a.x + dx * t, a.y + dy * t);
        fill_circle(layer, q, radius, color, selection);
    }
}

// ============================================================================
// Dashed preview outlines
// ============================================================================

/// One-pixel dashed segment between the two points.
pub fn dashed_line(surface: &mut Surface, a: GlobalPoint, b: GlobalPoint, color: Rgba<u8>) {
    let mut phase = 0;
    plot_dashed(surface, a, b, color, &mut phase);
}

/// Dashed rectangle outline through the two corners, in any order.
pub fn dashed_rect(surface: &mut Surface, a: GlobalPoint, b: GlobalPoint, color: Rgba<u8>) {
    let x0 = a.x.min(b.x);
    let y0 = a.y.min(b.y);
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let corners = [
        GlobalPoint::new(x0, y0),
        GlobalPoint::new(x1, y0),
        GlobalPoint::new(x1, y1),
        GlobalPoint::new(x0, y1),
    ];
    // One running phase so the pattern does not restart at each corner.
    let mut phase = 0;
    for i in 0..4 {
        plot_dashed(surface, corners[i], corners[(i + 1) % 4], color, &mut phase);
    }
}

/// Dashed circle outline around `center`.
pub fn dashed_circle(surface: &mut Surface, center: GlobalPoint, radius: f32, color: Rgba<u8>) {
    let r = radius.max(0.0);
    let steps = (std::f32::consts::TAU * r).ceil().max(8.0) as i64;
    for i in 0..steps {
        if (i / DASH) % 2 != 0 {
            continue;
        }
        let t = i as f32 / steps as f32 * std::f32::consts::TAU;
        let gx = (center.x + r * t.cos()).floor() as i64;
        let gy = (center.y + r * t.sin()).floor() as i64;
        surface.put(gx, gy, color);
    }
}

/// Bresenham walk from `a` to `b`, plotting only while the dash phase is on.
fn plot_dashed(
    surface: &mut Surface,
    a: GlobalPoint,
    b: GlobalPoint,
    color: Rgba<u8>,
    phase: &mut i64,
) {
    let (mut x0, mut y0) = a.pixel();
    let (x1, y1) = b.pixel();
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if (*phase / DASH) % 2 == 0 {
            surface.put(x0, y0, color);
        }
        *phase += 1;
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
