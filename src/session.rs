// ============================================================================
// SESSION — explicit editing context (document + selection + history + tool)
// ============================================================================
//
// One Session is one open document plus everything an embedding needs to
// drive it: the selection mask, the undo history, the viewport and the
// current tool. There is no ambient global state; UI, tests and batch export
// all operate through the same context object.
//
// Strokes arrive as begin/continue/end calls in document (global)
// coordinates and are routed by exhaustive match on the current tool.
// ============================================================================

use image::Rgba;
use uuid::Uuid;

use crate::canvas::{CanvasState, LayerInfo, Surface, blend_pixel, BlendMode};
use crate::compositor::{self, Viewport};
use crate::coords::GlobalPoint;
use crate::history::HistoryEngine;
use crate::log_info;
use crate::ops::clone::CloneStamp;
use crate::ops::fill::flood_fill;
use crate::ops::shapes;
use crate::selection::{SelectionKind, SelectionMask};

/// Outline color for in-progress shape previews.
const SHAPE_OUTLINE: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Current tool, with its parameters. Closed set, dispatched exhaustively.
pub enum Tool {
    Brush { size: f32, color: Rgba<u8>, opacity: f32 },
    Eraser { size: f32 },
    Fill { color: Rgba<u8> },
    /// Filled rectangle spanning the stroke's anchor and release corners.
    Rect { color: Rgba<u8> },
    /// Filled circle centered at the anchor; the drag distance is the radius.
    Circle { color: Rgba<u8> },
    /// Straight line of `size` stroke width between anchor and release.
    Line { size: f32, color: Rgba<u8> },
    Marquee,
    Lasso,
    Wand { tolerance: f32 },
    /// `source` is the latched sample anchor; `None` until the first click.
    Clone { radius: f32, source: Option<GlobalPoint> },
    Crop,
}

impl Default for Tool {
    fn default() -> Self {
        Tool::Brush {
            size: 8.0,
            color: Rgba([0, 0, 0, 255]),
            opacity: 1.0,
        }
    }
}

/// In-progress stroke, present between begin_stroke and end_stroke.
enum StrokeState {
    /// Brush or eraser: the last stamped point, for segment interpolation.
    Paint { last: GlobalPoint },
    /// Clone stamp with its captured source composite.
    Clone { stamp: CloneStamp, last: GlobalPoint },
    /// Rect/circle/line gesture: nothing touches the layer until release,
    /// only the preview outline tracks `current`.
    Shape { anchor: GlobalPoint, current: GlobalPoint },
    /// Marquee/lasso/crop gesture, carried by the selection mask itself.
    Select,
}

pub struct Session {
    pub id: Uuid,
    pub canvas: CanvasState,
    pub selection: SelectionMask,
    pub history: HistoryEngine,
    pub viewport: Viewport,
    pub tool: Tool,
    stroke: Option<StrokeState>,
}

impl Session {
    /// New session over a fresh document: one white "Background" layer and
    /// an initial checkpoint so the first edit can be undone back to blank.
    pub fn new(width: u32, height: u32) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            canvas: CanvasState::new(width, height),
            selection: SelectionMask::new(width, height),
            history: HistoryEngine::default(),
            viewport: Viewport::document(width, height),
            tool: Tool::default(),
            stroke: None,
        };
        if let Some(layer) = session.canvas.active_layer_mut() {
            layer.surface.fill(Rgba([255, 255, 255, 255]));
        }
        session.save_checkpoint();
        session
    }

    /// Replace the document with a fresh one. History and selection reset.
    pub fn new_document(&mut self, width: u32, height: u32) {
        log_info!("New document {}x{}", width, height);
        self.canvas = CanvasState::new(width, height);
        if let Some(layer) = self.canvas.active_layer_mut() {
            layer.surface.fill(Rgba([255, 255, 255, 255]));
        }
        self.selection = SelectionMask::new(width, height);
        self.history = HistoryEngine::default();
        self.viewport = Viewport::document(width, height);
        self.stroke = None;
        self.save_checkpoint();
    }

    // ------------------------------------------------------------------
    // Stroke routing
    // ------------------------------------------------------------------

    pub fn begin_stroke(&mut self, p: GlobalPoint) {
        self.stroke = None;
        match &mut self.tool {
            Tool::Brush { size, color, opacity } => {
                let (size, color, opacity) = (*size, *color, *opacity);
                self.stamp_paint(p, size / 2.0, Some((color, opacity)));
                self.stroke = Some(StrokeState::Paint { last: p });
            }
            Tool::Eraser { size } => {
                let size = *size;
                self.stamp_paint(p, size / 2.0, None);
                self.stroke = Some(StrokeState::Paint { last: p });
            }
            Tool::Fill { color } => {
                let color = *color;
                self.fill_at(p, color);
            }
            Tool::Rect { .. } | Tool::Circle { .. } | Tool::Line { .. } => {
                self.stroke = Some(StrokeState::Shape {
                    anchor: p,
                    current: p,
                });
            }
            Tool::Marquee | Tool::Crop => {
                self.selection.start(p, SelectionKind::Rectangle);
                self.stroke = Some(StrokeState::Select);
            }
            Tool::Lasso => {
                self.selection.start(p, SelectionKind::Freehand);
                self.stroke = Some(StrokeState::Select);
            }
            Tool::Wand { tolerance } => {
                let tolerance = *tolerance;
                self.wand_at(p, tolerance);
            }
            Tool::Clone { radius, source } => {
                let radius = *radius;
                match *source {
                    // First click latches the sample anchor.
                    None => *source = Some(p),
                    Some(anchor) => {
                        let stamp =
                            CloneStamp::begin(compositor::flatten(&self.canvas), anchor, p);
                        if let Some(layer) = self.canvas.active_layer_mut() {
                            stamp.stamp(layer, p, radius, &self.selection);
                        }
                        self.stroke = Some(StrokeState::Clone { stamp, last: p });
                    }
                }
            }
        }
    }

    pub fn continue_stroke(&mut self, p: GlobalPoint) {
        match self.stroke.take() {
            Some(StrokeState::Paint { last }) => {
                let params = match self.tool {
                    Tool::Brush { size, color, opacity } => (size / 2.0, Some((color, opacity))),
                    Tool::Eraser { size } => (size / 2.0, None),
                    _ => return,
                };
                self.stamp_segment(last, p, params.0, params.1);
                self.stroke = Some(StrokeState::Paint { last: p });
            }
            Some(StrokeState::Clone { stamp, last }) => {
                let Tool::Clone { radius, .. } = self.tool else {
                    return;
                };
                if let Some(layer) = self.canvas.active_layer_mut() {
                    for q in segment_points(last, p) {
                        stamp.stamp(layer, q, radius, &self.selection);
                    }
                }
                self.stroke = Some(StrokeState::Clone { stamp, last: p });
            }
            Some(StrokeState::Shape { anchor, .. }) => {
                self.stroke = Some(StrokeState::Shape { anchor, current: p });
            }
            Some(StrokeState::Select) => {
                self.selection.update(p);
                self.stroke = Some(StrokeState::Select);
            }
            None => {}
        }
    }

    pub fn end_stroke(&mut self, p: GlobalPoint) {
        // A release at the last stamped point would re-stamp it (a
        // zero-length segment still yields its endpoint), double-blending
        // partial-opacity brushes on a plain click.
        let moved = match &self.stroke {
            Some(StrokeState::Paint { last }) | Some(StrokeState::Clone { last, .. }) => *last != p,
            _ => true,
        };
        if moved {
            self.continue_stroke(p);
        }
        match self.stroke.take() {
            Some(StrokeState::Paint { .. }) | Some(StrokeState::Clone { .. }) => {
                self.save_checkpoint();
            }
            Some(StrokeState::Shape { anchor, current }) => {
                self.commit_shape(anchor, current);
                self.save_checkpoint();
            }
            Some(StrokeState::Select) => {
                self.selection.end(p);
                if matches!(self.tool, Tool::Crop) {
                    self.apply_crop_gesture();
                }
            }
            None => {}
        }
    }

    /// Rasterize the finished shape gesture onto the active layer.
    fn commit_shape(&mut self, anchor: GlobalPoint, current: GlobalPoint) {
        match self.tool {
            Tool::Rect { color } => {
                if let Some(layer) = self.canvas.active_layer_mut() {
                    shapes::fill_rect(layer, anchor, current, color, &self.selection);
                }
            }
            Tool::Circle { color } => {
                let radius = (current.x - anchor.x).hypot(current.y - anchor.y);
                if let Some(layer) = self.canvas.active_layer_mut() {
                    shapes::fill_circle(layer, anchor, radius, color, &self.selection);
                }
            }
            Tool::Line { size, color } => {
                if let Some(layer) = self.canvas.active_layer_mut() {
                    shapes::stroke_line(layer, anchor, current, size, color, &self.selection);
                }
            }
            _ => {}
        }
    }

    /// Crop to the bounding box of the crop gesture's selection.
    fn apply_crop_gesture(&mut self) {
        let Some((x0, y0, x1, y1)) = self.selection.bounds() else {
            self.selection.clear();
            return;
        };
        let (w, h) = (x1 - x0 + 1, y1 - y0 + 1);
        self.crop(x0 as i32, y0 as i32, w, h);
    }

    /// Resize the document, preserving content relative to the new origin.
    pub fn crop(&mut self, x: i32, y: i32, w: u32, h: u32) {
        if w == 0 || h == 0 {
            return;
        }
        log_info!("Crop to {}x{} at ({}, {})", w, h, x, y);
        self.canvas.crop(x, y, w, h);
        self.selection.resize(w, h);
        self.viewport = Viewport::document(w, h);
        self.save_checkpoint();
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Checkpoint the current document. Called after every completed edit.
    pub fn save_checkpoint(&mut self) {
        self.history.save_state(&self.canvas);
    }

    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.history.undo() else {
            return false;
        };
        let restored = snapshot.restore();
        self.adopt(restored);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.history.redo() else {
            return false;
        };
        let restored = snapshot.restore();
        self.adopt(restored);
        true
    }

    fn adopt(&mut self, state: CanvasState) {
        if state.width != self.selection.width() || state.height != self.selection.height() {
            self.selection.resize(state.width, state.height);
            self.viewport = Viewport::document(state.width, state.height);
        }
        self.canvas = state;
        self.stroke = None;
    }

    // ------------------------------------------------------------------
    // Queries / output
    // ------------------------------------------------------------------

    pub fn active_layer(&self) -> Option<&crate::canvas::Layer> {
        self.canvas.active_layer()
    }

    /// Layer summaries ordered top-first, for display.
    pub fn layer_list(&self) -> Vec<LayerInfo> {
        self.canvas.layer_list()
    }

    /// Color-picker query: the active layer's pixel under the point, or
    /// `None` outside the layer's surface.
    pub fn sample_color(&self, p: GlobalPoint) -> Option<Rgba<u8>> {
        let layer = self.canvas.active_layer()?;
        let (lx, ly) = p.to_local(layer.offset()).pixel();
        layer.surface.get(lx, ly)
    }

    /// Composite through the viewport, with overlays. Pure.
    pub fn render(&self) -> Surface {
        let crop_overlay = matches!(self.tool, Tool::Crop) && self.selection.has_selection();
        let preview = self.shape_preview();
        compositor::render(
            &self.canvas,
            &self.selection,
            &self.viewport,
            preview.as_ref(),
            crop_overlay,
        )
    }

    /// Dashed outline of the in-progress shape gesture, in document space.
    fn shape_preview(&self) -> Option<Surface> {
        let Some(StrokeState::Shape { anchor, current }) = self.stroke else {
            return None;
        };
        let mut overlay = Surface::new(self.canvas.width, self.canvas.height);
        match self.tool {
            Tool::Rect { .. } => shapes::dashed_rect(&mut overlay, anchor, current, SHAPE_OUTLINE),
            Tool::Circle { .. } => {
                let radius = (current.x - anchor.x).hypot(current.y - anchor.y);
                shapes::dashed_circle(&mut overlay, anchor, radius, SHAPE_OUTLINE);
            }
            Tool::Line { .. } => shapes::dashed_line(&mut overlay, anchor, current, SHAPE_OUTLINE),
            _ => return None,
        }
        Some(overlay)
    }

    /// Document-sized composite with no overlays, for export.
    pub fn export_flattened(&self) -> Surface {
        compositor::flatten(&self.canvas)
    }

    // ------------------------------------------------------------------
    // Paint internals
    // ------------------------------------------------------------------

    /// Round stamp at `center`. `paint` is `Some((color, opacity))` for the
    /// brush and `None` for the eraser (which clears to transparent).
    fn stamp_paint(&mut self, center: GlobalPoint, radius: f32, paint: Option<(Rgba<u8>, f32)>) {
        let Some(layer) = self.canvas.active_layer_mut() else {
            return;
        };
        let (off_x, off_y) = layer.offset();
        let (cx, cy) = center.pixel();
        let r = radius.max(0.5);
        let ri = r.ceil() as i64;
        let r2 = r * r;

        for gy in (cy - ri)..=(cy + ri) {
            for gx in (cx - ri)..=(cx + ri) {
                let dx = (gx - cx) as f32;
                let dy = (gy - cy) as f32;
                if dx * dx + dy * dy > r2 {
                    continue;
                }
                if self.selection.excludes(gx, gy) {
                    continue;
                }
                let lx = (gx as f32 - off_x).floor() as i64;
                let ly = (gy as f32 - off_y).floor() as i64;
                match paint {
                    Some((color, opacity)) => {
                        if let Some(base) = layer.surface.get(lx, ly) {
                            let out = blend_pixel(base, color, BlendMode::Normal, opacity);
                            layer.surface.put(lx, ly, out);
                        }
                    }
                    None => layer.surface.put(lx, ly, Rgba([0, 0, 0, 0])),
                }
            }
        }
    }

    fn stamp_segment(
        &mut self,
        from: GlobalPoint,
        to: GlobalPoint,
        radius: f32,
        paint: Option<(Rgba<u8>, f32)>,
    ) {
        for q in segment_points(from, to) {
            self.stamp_paint(q, radius, paint);
        }
    }

    /// Fill-tool click: rejected when it lands outside an active selection,
    /// otherwise a flood fill on the active layer plus a checkpoint.
    fn fill_at(&mut self, p: GlobalPoint, color: Rgba<u8>) {
        let (gx, gy) = p.pixel();
        if self.selection.excludes(gx, gy) {
            log_info!("Fill at ({}, {}) outside the active selection, ignored", gx, gy);
            return;
        }
        let Some(layer) = self.canvas.active_layer_mut() else {
            return;
        };
        let local = p.to_local(layer.offset());
        let (lx, ly) = local.pixel();
        if lx < 0 || ly < 0 || lx >= layer.surface.width() as i64 || ly >= layer.surface.height() as i64
        {
            return;
        }
        flood_fill(layer, lx as u32, ly as u32, color, &self.selection);
        self.save_checkpoint();
    }

    fn wand_at(&mut self, p: GlobalPoint, tolerance: f32) {
        let Some(layer) = self.canvas.active_layer() else {
            return;
        };
        let local = p.to_local(layer.offset());
        let (lx, ly) = local.pixel();
        if lx < 0 || ly < 0 || lx >= layer.surface.width() as i64 || ly >= layer.surface.height() as i64
        {
            return;
        }
        self.selection.wand_select(layer, lx as u32, ly as u32, tolerance);
    }
}

/// Points spaced roughly one pixel apart along the segment, excluding `from`
/// (already stamped) and including `to`.
fn segment_points(from: GlobalPoint, to: GlobalPoint) -> Vec<GlobalPoint> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let steps = dx.hypot(dy).ceil().max(1.0) as u32;
    (1..=steps)
        .map(|i| {
            let t = i as f32 / steps as f32;
            GlobalPoint::new(from.x + dx * t, from.y + dy * t)
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn gp(x: f32, y: f32) -> GlobalPoint {
        GlobalPoint::new(x, y)
    }

    #[test]
    fn fill_then_undo_round_trips_the_background() {
        let mut session = Session::new(100, 100);
        session.tool = Tool::Fill { color: BLACK };
        session.begin_stroke(gp(50.0, 50.0));

        let surface = &session.active_layer().unwrap().surface;
        for p in [(0u32, 0u32), (99, 99), (50, 50)] {
            assert_eq!(surface.pixel(p.0, p.1), BLACK);
        }

        assert!(session.undo());
        let surface = &session.active_layer().unwrap().surface;
        for p in [(0u32, 0u32), (99, 99), (50, 50)] {
            assert_eq!(surface.pixel(p.0, p.1), WHITE);
        }
    }

    #[test]
    fn brush_stroke_paints_along_the_segment() {
        let mut session = Session::new(40, 40);
        session.tool = Tool::Brush {
            size: 4.0,
            color: BLACK,
            opacity: 1.0,
        };
        session.begin_stroke(gp(5.0, 20.0));
        session.continue_stroke(gp(35.0, 20.0));
        session.end_stroke(gp(35.0, 20.0));

        let surface = &session.active_layer().unwrap().surface;
        for x in [5u32, 15, 25, 35] {
            assert_eq!(surface.pixel(x, 20), BLACK, "x={x}");
        }
        assert_eq!(surface.pixel(20, 5), WHITE);
        // The stroke is one undoable step.
        assert!(session.undo());
        assert_eq!(session.active_layer().unwrap().surface.pixel(20, 20), WHITE);
    }

    #[test]
    fn single_click_applies_brush_opacity_once() {
        let mut session = Session::new(10, 10);
        session.tool = Tool::Brush {
            size: 4.0,
            color: BLACK,
            opacity: 0.5,
        };
        session.begin_stroke(gp(5.0, 5.0));
        session.end_stroke(gp(5.0, 5.0));
        let px = session.active_layer().unwrap().surface.pixel(5, 5);
        // One 50% blend over white lands near 127; a second stamp at the
        // same point would darken it to ~63.
        for c in [px[0], px[1], px[2]] {
            assert!((c as i16 - 127).abs() <= 1, "got {:?}", px);
        }
    }

    #[test]
    fn eraser_clears_to_transparent() {
        let mut session = Session::new(20, 20);
        session.tool = Tool::Eraser { size: 6.0 };
        session.begin_stroke(gp(10.0, 10.0));
        session.end_stroke(gp(10.0, 10.0));
        let surface = &session.active_layer().unwrap().surface;
        assert_eq!(surface.pixel(10, 10), Rgba([0, 0, 0, 0]));
        assert_eq!(surface.pixel(0, 0), WHITE);
    }

    #[test]
    fn brush_respects_the_selection() {
        let mut session = Session::new(20, 20);
        session.selection.select_rect(0, 0, 10, 20);
        session.tool = Tool::Brush {
            size: 20.0,
            color: BLACK,
            opacity: 1.0,
        };
        session.begin_stroke(gp(10.0, 10.0));
        session.end_stroke(gp(10.0, 10.0));
        let surface = &session.active_layer().unwrap().surface;
        assert_eq!(surface.pixel(8, 10), BLACK);
        assert_eq!(surface.pixel(12, 10), WHITE);
    }

    #[test]
    fn fill_click_outside_selection_is_rejected() {
        let mut session = Session::new(20, 20);
        session.selection.select_rect(0, 0, 5, 5);
        session.tool = Tool::Fill { color: BLACK };
        let depth = session.history.len();
        session.begin_stroke(gp(15.0, 15.0));
        let surface = &session.active_layer().unwrap().surface;
        assert_eq!(surface.pixel(15, 15), WHITE);
        assert_eq!(surface.pixel(2, 2), WHITE);
        // No checkpoint for a rejected click.
        assert_eq!(session.history.len(), depth);
    }

    #[test]
    fn rect_tool_commits_a_filled_rectangle_on_release() {
        let mut session = Session::new(30, 30);
        session.tool = Tool::Rect { color: BLACK };
        session.begin_stroke(gp(5.0, 5.0));
        session.continue_stroke(gp(15.0, 10.0));
        // Nothing reaches the layer until release.
        assert_eq!(session.active_layer().unwrap().surface.pixel(8, 8), WHITE);
        session.end_stroke(gp(15.0, 10.0));

        let surface = &session.active_layer().unwrap().surface;
        assert_eq!(surface.pixel(5, 5), BLACK);
        assert_eq!(surface.pixel(14, 9), BLACK);
        assert_eq!(surface.pixel(20, 20), WHITE);
        // The whole shape is one undoable step.
        assert!(session.undo());
        assert_eq!(session.active_layer().unwrap().surface.pixel(8, 8), WHITE);
    }

    #[test]
    fn circle_tool_fills_around_the_anchor_with_the_drag_radius() {
        let mut session = Session::new(30, 30);
        session.tool = Tool::Circle { color: BLACK };
        session.begin_stroke(gp(15.0, 15.0));
        session.end_stroke(gp(20.0, 15.0)); // radius 5

        let surface = &session.active_layer().unwrap().surface;
        assert_eq!(surface.pixel(15, 15), BLACK);
        assert_eq!(surface.pixel(15, 10), BLACK);
        assert_eq!(surface.pixel(15, 9), WHITE);
    }

    #[test]
    fn line_tool_strokes_between_press_and_release() {
        let mut session = Session::new(30, 30);
        session.tool = Tool::Line {
            size: 2.0,
            color: BLACK,
        };
        session.begin_stroke(gp(4.0, 4.0));
        session.end_stroke(gp(24.0, 4.0));

        let surface = &session.active_layer().unwrap().surface;
        assert_eq!(surface.pixel(4, 4), BLACK);
        assert_eq!(surface.pixel(14, 4), BLACK);
        assert_eq!(surface.pixel(24, 4), BLACK);
        assert_eq!(surface.pixel(14, 20), WHITE);
    }

    #[test]
    fn shape_preview_overlays_render_without_touching_the_layer() {
        let mut session = Session::new(30, 30);
        session.tool = Tool::Rect {
            color: Rgba([255, 0, 0, 255]),
        };
        session.begin_stroke(gp(2.0, 2.0));
        session.continue_stroke(gp(12.0, 8.0));
        // The dashed outline shows in the render while the layer stays white.
        let rendered = session.render();
        assert_eq!(rendered.pixel(2, 2), BLACK);
        assert_eq!(session.active_layer().unwrap().surface.pixel(2, 2), WHITE);

        session.end_stroke(gp(12.0, 8.0));
        // After release the outline is gone and the fill is committed.
        let rendered = session.render();
        assert_eq!(rendered.pixel(2, 2), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn shape_commit_respects_the_selection() {
        let mut session = Session::new(30, 30);
        session.selection.select_rect(0, 0, 10, 30);
        session.tool = Tool::Rect { color: BLACK };
        session.begin_stroke(gp(0.0, 0.0));
        session.end_stroke(gp(30.0, 30.0));

        let surface = &session.active_layer().unwrap().surface;
        assert_eq!(surface.pixel(5, 5), BLACK);
        assert_eq!(surface.pixel(15, 5), WHITE);
    }

    #[test]
    fn sample_color_reads_the_active_layer_pixel() {
        let mut session = Session::new(20, 20);
        session
            .canvas
            .active_layer_mut()
            .unwrap()
            .surface
            .set_pixel(5, 5, Rgba([10, 20, 30, 255]));
        assert_eq!(
            session.sample_color(gp(5.0, 5.0)),
            Some(Rgba([10, 20, 30, 255]))
        );
        assert_eq!(session.sample_color(gp(-3.0, 5.0)), None);
    }

    #[test]
    fn marquee_gesture_builds_a_selection() {
        let mut session = Session::new(30, 30);
        session.tool = Tool::Marquee;
        session.begin_stroke(gp(5.0, 5.0));
        session.continue_stroke(gp(20.0, 12.0));
        session.end_stroke(gp(20.0, 12.0));
        assert!(session.selection.has_selection());
        assert!(session.selection.is_selected(10, 8));
        assert!(!session.selection.is_selected(25, 25));
    }

    #[test]
    fn wand_tool_selects_the_seed_region() {
        let mut session = Session::new(30, 30);
        {
            let layer = session.canvas.active_layer_mut().unwrap();
            for y in 0..30 {
                for x in 15..30 {
                    layer.surface.set_pixel(x, y, BLACK);
                }
            }
        }
        session.tool = Tool::Wand { tolerance: 0.0 };
        session.begin_stroke(gp(3.0, 3.0));
        assert!(session.selection.is_selected(10, 10));
        assert!(!session.selection.is_selected(20, 10));
    }

    #[test]
    fn clone_tool_latches_the_source_then_paints() {
        let mut session = Session::new(30, 30);
        {
            let layer = session.canvas.active_layer_mut().unwrap();
            for y in 0..30 {
                for x in 0..10 {
                    layer.surface.set_pixel(x, y, Rgba([200, 0, 0, 255]));
                }
            }
        }
        session.tool = Tool::Clone {
            radius: 2.0,
            source: None,
        };
        // First click only latches the anchor.
        session.begin_stroke(gp(5.0, 5.0));
        session.end_stroke(gp(5.0, 5.0));
        assert_eq!(session.active_layer().unwrap().surface.pixel(20, 20), WHITE);
        assert!(matches!(
            session.tool,
            Tool::Clone { source: Some(_), .. }
        ));
        // Second stroke paints red sampled from the anchor region.
        session.begin_stroke(gp(20.0, 20.0));
        session.end_stroke(gp(20.0, 20.0));
        assert_eq!(
            session.active_layer().unwrap().surface.pixel(20, 20),
            Rgba([200, 0, 0, 255])
        );
    }

    #[test]
    fn crop_tool_resizes_the_document_and_clears_the_selection() {
        let mut session = Session::new(40, 40);
        session.tool = Tool::Crop;
        session.begin_stroke(gp(10.0, 10.0));
        session.continue_stroke(gp(30.0, 25.0));
        session.end_stroke(gp(30.0, 25.0));

        assert_eq!((session.canvas.width, session.canvas.height), (20, 15));
        assert!(!session.selection.has_selection());
        // Layer offset shifted so content stays put.
        let layer = session.active_layer().unwrap();
        assert_eq!((layer.x, layer.y), (-10.0, -10.0));
        // Undo restores the original document size.
        assert!(session.undo());
        assert_eq!((session.canvas.width, session.canvas.height), (40, 40));
    }

    #[test]
    fn undo_resizes_the_selection_mask_with_the_document() {
        let mut session = Session::new(40, 40);
        session.crop(5, 5, 20, 20);
        assert_eq!(session.selection.width(), 20);
        assert!(session.undo());
        assert_eq!(session.selection.width(), 40);
    }

    #[test]
    fn render_matches_export_for_a_plain_document() {
        let session = Session::new(16, 16);
        let rendered = session.render();
        let exported = session.export_flattened();
        assert_eq!(rendered.raw(), exported.raw());
    }

    #[test]
    fn redo_after_undo_restores_the_edit() {
        let mut session = Session::new(10, 10);
        session.tool = Tool::Fill { color: BLACK };
        session.begin_stroke(gp(5.0, 5.0));
        assert!(session.undo());
        assert!(session.redo());
        assert_eq!(session.active_layer().unwrap().surface.pixel(5, 5), BLACK);
    }
}
