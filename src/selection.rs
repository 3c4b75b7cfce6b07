//! Selection mask — raster membership over document (global) coordinates.
//!
//! A pixel is selected iff its alpha in the mask surface is nonzero. The mask
//! is sized to the document, independent of any layer's local offset. Every
//! destructive operation consults it: mask-alpha-0 pixels are immutable.
//!
//! Membership rule for coordinates outside the document: **unselected**.

use std::collections::VecDeque;

use image::Rgba;

use crate::canvas::{Layer, Surface};
use crate::coords::GlobalPoint;

/// Mask value for a selected pixel (fully opaque).
const SELECTED: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Shape being dragged out by the current selection gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionKind {
    /// Marquee: the filled rectangle from anchor to cursor, recomputed
    /// (replace, not accumulate) on every update.
    Rectangle,
    /// Lasso: a freehand path, stroked while dragging and closed + filled
    /// when the gesture ends.
    Freehand,
}

pub struct SelectionMask {
    surface: Surface,
    has_selection: bool,
    kind: SelectionKind,
    anchor: Option<GlobalPoint>,
    path: Vec<GlobalPoint>,
}

impl SelectionMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: Surface::new(width, height),
            has_selection: false,
            kind: SelectionKind::Rectangle,
            anchor: None,
            path: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn has_selection(&self) -> bool {
        self.has_selection
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// True iff the global pixel is inside the document and marked selected.
    pub fn is_selected(&self, gx: i64, gy: i64) -> bool {
        match self.surface.get(gx, gy) {
            Some(px) => px[3] > 0,
            None => false,
        }
    }

    /// True when an active selection forbids writing this global pixel.
    pub fn excludes(&self, gx: i64, gy: i64) -> bool {
        self.has_selection && !self.is_selected(gx, gy)
    }

    /// Drop the selection and return to the empty state.
    pub fn clear(&mut self) {
        self.surface.clear();
        self.has_selection = false;
        self.anchor = None;
        self.path.clear();
    }

    /// Resize to new document dimensions. Any existing selection is dropped.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface = Surface::new(width, height);
        self.has_selection = false;
        self.anchor = None;
        self.path.clear();
    }

    // ------------------------------------------------------------------
    // Interactive gesture
    // ------------------------------------------------------------------

    /// Begin a new gesture, discarding any prior mask.
    pub fn start(&mut self, p: GlobalPoint, kind: SelectionKind) {
        self.clear();
        self.has_selection = true;
        self.kind = kind;
        self.anchor = Some(p);
        if kind == SelectionKind::Freehand {
            self.path.push(p);
        }
    }

    /// Extend the in-progress shape.
    pub fn update(&mut self, p: GlobalPoint) {
        if !self.has_selection {
            return;
        }
        match self.kind {
            SelectionKind::Rectangle => {
                let Some(anchor) = self.anchor else { return };
                self.surface.clear();
                self.fill_anchored_rect(anchor, p);
            }
            SelectionKind::Freehand => {
                if let Some(prev) = self.path.last().copied() {
                    self.stroke_line(prev, p);
                }
                self.path.push(p);
            }
        }
    }

    /// Finalize the gesture: the lasso path is closed and filled, the
    /// marquee keeps its last rectangle.
    pub fn end(&mut self, p: GlobalPoint) {
        if !self.has_selection {
            return;
        }
        match self.kind {
            SelectionKind::Rectangle => {
                if let Some(anchor) = self.anchor {
                    self.surface.clear();
                    self.fill_anchored_rect(anchor, p);
                }
            }
            SelectionKind::Freehand => {
                self.path.push(p);
                self.surface.clear();
                let path = std::mem::take(&mut self.path);
                self.fill_polygon(&path);
            }
        }
        self.anchor = None;
    }

    /// Directly select a rectangle (used programmatically and by tests).
    pub fn select_rect(&mut self, x: u32, y: u32, w: u32, h: u32) {
        self.clear();
        self.has_selection = true;
        let x1 = (x + w).min(self.width());
        let y1 = (y + h).min(self.height());
        for py in y.min(self.height())..y1 {
            for px in x.min(self.width())..x1 {
                self.surface.set_pixel(px, py, SELECTED);
            }
        }
    }

    /// Bounding box of the selected region, `None` when nothing is marked.
    pub fn bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let (w, h) = (self.width(), self.height());
        let mut min_x = w;
        let mut min_y = h;
        let mut max_x = 0u32;
        let mut max_y = 0u32;
        let mut any = false;
        for y in 0..h {
            for x in 0..w {
                if self.surface.pixel(x, y)[3] > 0 {
                    any = true;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }
        any.then_some((min_x, min_y, max_x, max_y))
    }

    // ------------------------------------------------------------------
    // Magic wand
    // ------------------------------------------------------------------

    /// Region-growing selection over the layer's local pixel grid, seeded at
    /// `(x, y)`. A neighbor is admitted when the sum of absolute per-channel
    /// differences (R, G, B, A) against the seed color is at most
    /// `tolerance × 4`. Admitted pixels are translated to global coordinates
    /// via the layer offset; pixels mapping outside the document are dropped.
    /// Replaces any existing selection.
    pub fn wand_select(&mut self, layer: &Layer, x: u32, y: u32, tolerance: f32) {
        let src = &layer.surface;
        if x >= src.width() || y >= src.height() {
            return;
        }

        self.clear();
        self.has_selection = true;

        let seed = src.pixel(x, y);
        let budget = tolerance * 4.0;
        let (w, h) = (src.width(), src.height());
        let (off_x, off_y) = layer.offset();

        let mut visited = vec![false; w as usize * h as usize];
        let mut queue = VecDeque::new();
        queue.push_back((x, y));
        visited[y as usize * w as usize + x as usize] = true;

        while let Some((px, py)) = queue.pop_front() {
            // Mark in document space; out-of-document pixels are dropped.
            let gx = (px as f32 + off_x).floor() as i64;
            let gy = (py as f32 + off_y).floor() as i64;
            self.surface.put(gx, gy, SELECTED);

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
                if visited[vi] {
                    continue;
                }
                visited[vi] = true;
                if color_distance(seed, src.pixel(nx, ny)) <= budget {
                    queue.push_back((nx, ny));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Rasterization helpers
    // ------------------------------------------------------------------

    fn fill_anchored_rect(&mut self, a: GlobalPoint, b: GlobalPoint) {
        let x0 = a.x.min(b.x).floor().max(0.0) as u32;
        let y0 = a.y.min(b.y).floor().max(0.0) as u32;
        let x1 = (a.x.max(b.x).ceil().max(0.0) as u32).min(self.width());
        let y1 = (a.y.max(b.y).ceil().max(0.0) as u32).min(self.height());
        for y in y0.min(self.height())..y1 {
            for x in x0.min(self.width())..x1 {
                self.surface.set_pixel(x, y, SELECTED);
            }
        }
    }

    /// Bresenham stroke between two path points (running lasso feedback).
    fn stroke_line(&mut self, a: GlobalPoint, b: GlobalPoint) {
        let (mut x0, mut y0) = a.pixel();
        let (x1, y1) = b.pixel();
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.surface.put(x0, y0, SELECTED);
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

    /// Scanline fill of the closed polygon: for each row, collect x-intercepts
    /// of edges crossing the row center and fill between pairs.
    fn fill_polygon(&mut self, points: &[GlobalPoint]) {
        let n = points.len();
        if n < 3 {
            return;
        }
        let (w, h) = (self.width(), self.height());
        for y in 0..h {
            let yf = y as f32 + 0.5; // centre of pixel row
            let mut nodes: Vec<f32> = Vec::new();
            for i in 0..n {
                let j = (i + 1) % n;
                let yi = points[i].y;
                let yj = points[j].y;
                if (yi < yf && yj >= yf) || (yj < yf && yi >= yf) {
                    let t = (yf - yi) / (yj - yi);
                    nodes.push(points[i].x + t * (points[j].x - points[i].x));
                }
            }
            nodes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let mut k = 0;
            while k + 1 < nodes.len() {
                let x_start = (nodes[k].max(0.0) as u32).min(w);
                let x_end = (nodes[k + 1].max(0.0) as u32).min(w);
                for x in x_start..x_end {
                    self.surface.set_pixel(x, y, SELECTED);
                }
                k += 2;
            }
        }
    }
}

/// Sum of absolute per-channel differences over R, G, B and A.
fn color_distance(a: Rgba<u8>, b: Rgba<u8>) -> f32 {
    (0..4)
        .map(|i| (a[i] as f32 - b[i] as f32).abs())
        .sum()
}

// ============================================================================
// TESTS
// ============================================================================
