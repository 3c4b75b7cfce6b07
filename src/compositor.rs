//! CPU compositor — flattens the layer stack into a displayable surface.
//!
//! `render` is the interactive path: viewport pan/zoom, selection overlay,
//! crop-frame overlay and tool preview. `flatten` is the export path: the
//! same layer pass at document size with no viewport and no overlays (also
//! used for merge-down and clone-stamp source capture).
//!
//! Both are pure: the same inputs always produce bit-identical output and
//! nothing is mutated.

use image::Rgba;
use rayon::prelude::*;

use crate::canvas::{CanvasState, Layer, Surface, blend_pixel};
use crate::selection::SelectionMask;

/// Translucent blue tint drawn over the selected region (alpha ≈ 0.2).
const SELECTION_TINT: Rgba<u8> = Rgba([0, 0, 255, 51]);
/// Darkening veil drawn outside the mask in crop mode.
const CROP_VEIL: Rgba<u8> = Rgba([0, 0, 0, 128]);

// ============================================================================
// AFFINE TRANSFORM
// ============================================================================

/// Row-major 2×3 affine transform: `x' = a·x + b·y + c`, `y' = d·x + e·y + f`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Affine {
    pub fn identity() -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 0.0, e: 1.0, f: 0.0 }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self { a: 1.0, b: 0.0, c: tx, d: 0.0, e: 1.0, f: ty }
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self { a: sx, b: 0.0, c: 0.0, d: 0.0, e: sy, f: 0.0 }
    }

    pub fn rotate(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self { a: cos, b: -sin, c: 0.0, d: sin, e: cos, f: 0.0 }
    }

    /// Composition: apply `self` first, then `next`.
    pub fn then(self, next: Affine) -> Affine {
        Affine {
            a: next.a * self.a + next.b * self.d,
            b: next.a * self.b + next.b * self.e,
            c: next.a * self.c + next.b * self.f + next.c,
            d: next.d * self.a + next.e * self.d,
            e: next.d * self.b + next.e * self.e,
            f: next.d * self.c + next.e * self.f + next.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.b * y + self.c,
            self.d * x + self.e * y + self.f,
        )
    }

    /// `None` for degenerate (zero-determinant) transforms.
    pub fn invert(&self) -> Option<Affine> {
        let det = self.a * self.e - self.b * self.d;
        if det.abs() < 1e-12 {
            return None;
        }
        let ia = self.e / det;
        let ib = -self.b / det;
        let id = -self.d / det;
        let ie = self.a / det;
        Some(Affine {
            a: ia,
            b: ib,
            c: -(ia * self.c + ib * self.f),
            d: id,
            e: ie,
            f: -(id * self.c + ie * self.f),
        })
    }
}

/// A layer's document-space placement: translate to the layer origin, then
/// rotate about the surface center, then scale about the center.
fn layer_transform(layer: &Layer) -> Affine {
    let cx = layer.surface.width() as f32 / 2.0;
    let cy = layer.surface.height() as f32 / 2.0;
    Affine::translate(-cx, -cy)
        .then(Affine::scale(layer.scale_x, layer.scale_y))
        .then(Affine::rotate(layer.rotation))
        .then(Affine::translate(layer.x + cx, layer.y + cy))
}

// ============================================================================
// VIEWPORT
// ============================================================================

/// Pan/zoom state applied as a single affine for the whole render pass.
/// `pan_x`/`pan_y` are the document coordinates of the viewport's top-left
/// corner; `zoom` is output pixels per document pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub pan_x: f32,
    pub pan_y: f32,
    pub zoom: f32,
}

impl Viewport {
    /// 1:1 view of the whole document.
    pub fn document(width: u32, height: u32) -> Self {
        Self { width, height, pan_x: 0.0, pan_y: 0.0, zoom: 1.0 }
    }

    fn view_transform(&self) -> Affine {
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        Affine::translate(-self.pan_x, -self.pan_y).then(Affine::scale(zoom, zoom))
    }
}

// ============================================================================
// LAYER PASS
// ============================================================================

/// Composite one layer onto `dest` through `view`. For each destination
/// pixel the combined transform is inverted and the layer sampled nearest-
/// neighbor; misses leave the destination untouched.
fn draw_layer_view(dest: &mut Surface, layer: &Layer, view: Affine) {
    let Some(inv) = layer_transform(layer).then(view).invert() else {
        // Degenerate scale collapses the layer to nothing.
        return;
    };

    let src = &layer.surface;
    let (lw, lh) = (src.width() as i64, src.height() as i64);
    let dw = dest.width() as usize;
    let mode = layer.blend_mode;
    let opacity = layer.opacity;
    let stride = dw * 4;

    let raw: &mut [u8] = dest.as_image_mut();
    raw.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        for x in 0..dw {
            // Sample at the destination pixel center.
            let (lx, ly) = inv.apply(x as f32 + 0.5, y as f32 + 0.5);
            let (lx, ly) = (lx.floor() as i64, ly.floor() as i64);
            if lx < 0 || ly < 0 || lx >= lw || ly >= lh {
                continue;
            }
            let top = src.pixel(lx as u32, ly as u32);
            if top[3] == 0 {
                continue;
            }
            let i = x * 4;
            let base = Rgba([row[i], row[i + 1], row[i + 2], row[i + 3]]);
            let out = blend_pixel(base, top, mode, opacity);
            row[i..i + 4].copy_from_slice(&out.0);
        }
    });
}

/// Composite one layer onto a document-space surface (no viewport).
/// Used by merge-down and the flatten path.
pub fn draw_layer_onto(dest: &mut Surface, layer: &Layer) {
    draw_layer_view(dest, layer, Affine::identity());
}

// ============================================================================
// PUBLIC ENTRY POINTS
// ============================================================================

/// Render the stack through a viewport, with selection/crop overlays and an
/// optional document-space tool preview drawn last at full visibility.
pub fn render(
    state: &CanvasState,
    selection: &SelectionMask,
    viewport: &Viewport,
    preview: Option<&Surface>,
    crop_overlay: bool,
) -> Surface {
    let mut out = Surface::new(viewport.width, viewport.height);
    let view = viewport.view_transform();

    for layer in &state.layers {
        if !layer.visible {
            continue;
        }
        draw_layer_view(&mut out, layer, view);
    }

    let inv = match view.invert() {
        Some(inv) => inv,
        None => return out,
    };

    let show_selection = selection.has_selection();
    if show_selection || preview.is_some() {
        let dw = out.width() as usize;
        let stride = dw * 4;
        let raw: &mut [u8] = out.as_image_mut();
        raw.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
            for x in 0..dw {
                let (gx, gy) = inv.apply(x as f32 + 0.5, y as f32 + 0.5);
                let (gx, gy) = (gx.floor() as i64, gy.floor() as i64);
                let i = x * 4;
                let mut px = Rgba([row[i], row[i + 1], row[i + 2], row[i + 3]]);

                if show_selection {
                    if crop_overlay {
                        // Darken the frame, punch a clear hole over the mask.
                        if !selection.is_selected(gx, gy) {
                            px = blend_pixel(px, CROP_VEIL, crate::canvas::BlendMode::Normal, 1.0);
                        }
                    } else if selection.is_selected(gx, gy) {
                        px = blend_pixel(px, SELECTION_TINT, crate::canvas::BlendMode::Normal, 1.0);
                    }
                }

                // Tool preview: always visible, no layer opacity/blend applied.
                if let Some(p) = preview {
                    if let Some(c) = p.get(gx, gy) {
                        if c[3] > 0 {
                            px = blend_pixel(px, c, crate::canvas::BlendMode::Normal, 1.0);
                        }
                    }
                }

                row[i..i + 4].copy_from_slice(&px.0);
            }
        });
    }

    out
}

/// Flatten the stack at document size with no viewport and no overlays.
pub fn flatten(state: &CanvasState) -> Surface {
    let mut out = Surface::new(state.width, state.height);
    for layer in &state.layers {
        if !layer.visible {
            continue;
        }
        draw_layer_onto(&mut out, layer);
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::BlendMode;

    fn two_layer_state() -> CanvasState {
        let mut state = CanvasState::new(8, 8);
        state
            .active_layer_mut()
            .unwrap()
            .surface
            .fill(Rgba([255, 0, 0, 255]));
        state.add_layer(None);
        let top = state.active_layer_mut().unwrap();
        top.surface.fill(Rgba([0, 0, 255, 255]));
        top.opacity = 0.5;
        state
    }

    #[test]
    fn render_is_pure() {
        let state = two_layer_state();
        let selection = SelectionMask::new(8, 8);
        let vp = Viewport::document(8, 8);
        let a = render(&state, &selection, &vp, None, false);
        let b = render(&state, &selection, &vp, None, false);
        assert_eq!(a.raw(), b.raw());
    }

    #[test]
    fn half_blue_over_red_flattens_to_documented_blend() {
        let state = two_layer_state();
        let flat = flatten(&state);
        let px = flat.get(4, 4).unwrap();
        // Rounding rule documented on blend_pixel: truncation, so (127, 0, 127).
        assert!((px[0] as i16 - 127).abs() <= 1);
        assert_eq!(px[1], 0);
        assert!((px[2] as i16 - 127).abs() <= 1);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn invisible_layers_are_skipped() {
        let mut state = two_layer_state();
        let top_id = state.active_layer_id;
        state.toggle_visibility(top_id);
        let flat = flatten(&state);
        assert_eq!(flat.get(0, 0), Some(Rgba([255, 0, 0, 255])));
    }

    #[test]
    fn layer_offset_translates_content() {
        let mut state = CanvasState::new(4, 4);
        {
            let layer = state.active_layer_mut().unwrap();
            layer.surface.set_pixel(0, 0, Rgba([10, 20, 30, 255]));
            layer.x = 2.0;
            layer.y = 1.0;
        }
        let flat = flatten(&state);
        assert_eq!(flat.get(2, 1), Some(Rgba([10, 20, 30, 255])));
        assert_eq!(flat.get(0, 0), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn rotation_is_about_the_layer_center() {
        let mut state = CanvasState::new(2, 2);
        {
            let layer = state.active_layer_mut().unwrap();
            layer.surface.set_pixel(0, 0, Rgba([255, 255, 255, 255]));
            layer.rotation = std::f32::consts::PI;
        }
        let flat = flatten(&state);
        // 180° about (1,1) moves the (0,0) texel to (1,1).
        assert_eq!(flat.get(1, 1), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(flat.get(0, 0), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn zoom_scales_the_view() {
        let mut state = CanvasState::new(2, 2);
        state
            .active_layer_mut()
            .unwrap()
            .surface
            .set_pixel(0, 0, Rgba([9, 9, 9, 255]));
        let selection = SelectionMask::new(2, 2);
        let vp = Viewport { width: 4, height: 4, pan_x: 0.0, pan_y: 0.0, zoom: 2.0 };
        let out = render(&state, &selection, &vp, None, false);
        // Document pixel (0,0) covers the 2×2 output block at the origin.
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert_eq!(out.get(x, y), Some(Rgba([9, 9, 9, 255])));
        }
        assert_eq!(out.get(2, 0), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn selection_overlay_tints_only_selected_pixels() {
        let mut state = CanvasState::new(4, 4);
        state
            .active_layer_mut()
            .unwrap()
            .surface
            .fill(Rgba([255, 255, 255, 255]));
        let mut selection = SelectionMask::new(4, 4);
        selection.select_rect(0, 0, 2, 4);
        let vp = Viewport::document(4, 4);
        let out = render(&state, &selection, &vp, None, false);
        let plain = render(&state, &SelectionMask::new(4, 4), &vp, None, false);
        assert_ne!(out.get(0, 0), plain.get(0, 0));
        assert_eq!(out.get(3, 0), plain.get(3, 0));
    }

    #[test]
    fn preview_is_drawn_over_everything() {
        let state = two_layer_state();
        let mut preview = Surface::new(8, 8);
        preview.set_pixel(3, 3, Rgba([1, 2, 3, 255]));
        let vp = Viewport::document(8, 8);
        let out = render(&state, &SelectionMask::new(8, 8), &vp, Some(&preview), false);
        assert_eq!(out.get(3, 3), Some(Rgba([1, 2, 3, 255])));
    }

    #[test]
    fn blend_modes_compose_through_flatten() {
        let mut state = CanvasState::new(2, 2);
        state
            .active_layer_mut()
            .unwrap()
            .surface
            .fill(Rgba([100, 100, 100, 255]));
        state.add_layer(None);
        {
            let top = state.active_layer_mut().unwrap();
            top.surface.fill(Rgba([100, 100, 100, 255]));
            top.blend_mode = BlendMode::Additive;
        }
        let flat = flatten(&state);
        let px = flat.get(0, 0).unwrap();
        assert!((px[0] as i16 - 200).abs() <= 1);
    }
}
