//! Flood fill — region growing bounded by exact color-match connectivity.

use std::collections::VecDeque;

use image::Rgba;

use crate::canvas::Layer;
use crate::selection::SelectionMask;

/// 4-connected flood fill in the layer's local coordinates, seeded at
/// `(x, y)`. Connectivity is exact equality of all four channels with the
/// seed color. Filling a region with its own color is a no-op.
///
/// When a selection is active, each candidate pixel is translated to global
/// coordinates through the layer offset; pixels outside the document or with
/// mask alpha 0 are skipped (and the fill does not spread through them).
pub fn flood_fill(
    layer: &mut Layer,
    x: u32,
    y: u32,
    fill_color: Rgba<u8>,
    selection: &SelectionMask,
) {
    let (w, h) = (layer.surface.width(), layer.surface.height());
    if x >= w || y >= h {
        return;
    }

    let seed = layer.surface.pixel(x, y);
    if seed == fill_color {
        return;
    }

    let (off_x, off_y) = layer.offset();
    let mut visited = vec![false; w as usize * h as usize];
    let mut queue = VecDeque::new();
    queue.push_back((x, y));
    visited[y as usize * w as usize + x as usize] = true;

    while let Some((px, py)) = queue.pop_front() {
        if selection.excludes(
            (px as f32 + off_x).floor() as i64,
            (py as f32 + off_y).floor() as i64,
        ) {
            continue;
        }
        if layer.surface.pixel(px, py) != seed {
            continue;
        }
        layer.surface.set_pixel(px, py, fill_color);

        let neighbors = [
            (px.wrapping_sub(1), py),
            (px + 1, py),
            (px, py.wrapping_sub(1)),
            (px, py + 1),
        ];
        for (nx, ny) in neighbors {
            if nx >= w || ny >= h {
                continue;
            }
            let vi = ny as usize * w as usize + nx as usize;
            if !visited[vi] {
                visited[vi] = true;
                queue.push_back((nx, ny));
            }
        }
    }
}
