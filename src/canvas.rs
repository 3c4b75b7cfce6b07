use image::{Rgba, RgbaImage};

use crate::error::EditError;

// ============================================================================
// SURFACE — fixed-size RGBA raster with checked access
// ============================================================================

/// A fixed-size grid of RGBA pixels (8 bits/channel, row-major).
///
/// All coordinate access is bounds-checked: reads outside the grid return
/// `None` and writes outside the grid are dropped. The backing buffer length
/// is always exactly `width * height * 4`.
#[derive(Clone)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    /// Create a fully transparent surface. Zero dimensions are clamped to 1.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width.max(1), height.max(1)),
        }
    }

    /// Create a surface filled with a single color.
    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        let mut s = Self::new(width, height);
        s.fill(color);
        s
    }

    pub fn from_image(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }

    /// Checked read. `None` for coordinates outside the grid.
    pub fn get(&self, x: i64, y: i64) -> Option<Rgba<u8>> {
        if self.in_bounds(x, y) {
            Some(*self.pixels.get_pixel(x as u32, y as u32))
        } else {
            None
        }
    }

    /// In-bounds read for hot loops where the caller has already clamped.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.pixels.get_pixel(x, y)
    }

    /// Checked write. Out-of-bounds coordinates are silently dropped.
    pub fn put(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        if self.in_bounds(x, y) {
            self.pixels.put_pixel(x as u32, y as u32, color);
        }
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        self.pixels.put_pixel(x, y, color);
    }

    pub fn fill(&mut self, color: Rgba<u8>) {
        for px in self.pixels.pixels_mut() {
            *px = color;
        }
    }

    /// Reset every pixel to fully transparent.
    pub fn clear(&mut self) {
        self.fill(Rgba([0, 0, 0, 0]));
    }

    /// Copy of a sub-rectangle, clamped to the surface bounds.
    pub fn region(&self, x: u32, y: u32, w: u32, h: u32) -> RgbaImage {
        let x = x.min(self.width());
        let y = y.min(self.height());
        let w = w.min(self.width() - x);
        let h = h.min(self.height() - y);
        let mut out = RgbaImage::new(w.max(1), h.max(1));
        for dy in 0..h {
            for dx in 0..w {
                out.put_pixel(dx, dy, *self.pixels.get_pixel(x + dx, y + dy));
            }
        }
        out
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn as_image_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    pub fn raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }
}

// ============================================================================
// BLEND MODES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Additive,
    Overlay,
    Lighten,
    Darken,
    Difference,
    Exclusion,
    Subtract,
}

impl BlendMode {
    /// Returns all blend modes, in display order.
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Additive,
            BlendMode::Overlay,
            BlendMode::Lighten,
            BlendMode::Darken,
            BlendMode::Difference,
            BlendMode::Exclusion,
            BlendMode::Subtract,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
            BlendMode::Additive => "Additive",
            BlendMode::Overlay => "Overlay",
            BlendMode::Lighten => "Lighten",
            BlendMode::Darken => "Darken",
            BlendMode::Difference => "Difference",
            BlendMode::Exclusion => "Exclusion",
            BlendMode::Subtract => "Subtract",
        }
    }

    /// Convert to a stable u8 for binary serialization.
    pub fn to_u8(&self) -> u8 {
        match self {
            BlendMode::Normal => 0,
            BlendMode::Multiply => 1,
            BlendMode::Screen => 2,
            BlendMode::Additive => 3,
            BlendMode::Overlay => 4,
            BlendMode::Lighten => 5,
            BlendMode::Darken => 6,
            BlendMode::Difference => 7,
            BlendMode::Exclusion => 8,
            BlendMode::Subtract => 9,
        }
    }

    /// Reconstruct from a u8 (defaults to Normal for unknown values).
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => BlendMode::Multiply,
            2 => BlendMode::Screen,
            3 => BlendMode::Additive,
            4 => BlendMode::Overlay,
            5 => BlendMode::Lighten,
            6 => BlendMode::Darken,
            7 => BlendMode::Difference,
            8 => BlendMode::Exclusion,
            9 => BlendMode::Subtract,
            _ => BlendMode::Normal,
        }
    }
}

/// Composite `top` over `base` with the given blend mode and layer opacity.
///
/// Straight (unpremultiplied) alpha. Channels are computed in normalized f32,
/// scaled by 255 and truncated toward zero — so 50% blue over opaque red
/// lands on (127, 0, 127, 255).
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    // Fast path: fully transparent top pixel — nothing to blend
    if top[3] == 0 {
        return base;
    }

    // Fast path: Normal blend, full opacity, fully opaque top pixel — overwrite
    if matches!(mode, BlendMode::Normal) && opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);

    let base_r = base[0] as f32 / 255.0;
    let base_g = base[1] as f32 / 255.0;
    let base_b = base[2] as f32 / 255.0;
    let base_a = base[3] as f32 / 255.0;

    let top_r = top[0] as f32 / 255.0;
    let top_g = top[1] as f32 / 255.0;
    let top_b = top[2] as f32 / 255.0;
    let top_a = (top[3] as f32 / 255.0) * opacity;

    let (r, g, b) = match mode {
        BlendMode::Normal => (top_r, top_g, top_b),
        BlendMode::Multiply => (base_r * top_r, base_g * top_g, base_b * top_b),
        BlendMode::Screen => (
            1.0 - (1.0 - base_r) * (1.0 - top_r),
            1.0 - (1.0 - base_g) * (1.0 - top_g),
            1.0 - (1.0 - base_b) * (1.0 - top_b),
        ),
        BlendMode::Additive => (
            (base_r + top_r).min(1.0),
            (base_g + top_g).min(1.0),
            (base_b + top_b).min(1.0),
        ),
        BlendMode::Overlay => (
            overlay_channel(base_r, top_r),
            overlay_channel(base_g, top_g),
            overlay_channel(base_b, top_b),
        ),
        BlendMode::Lighten => (base_r.max(top_r), base_g.max(top_g), base_b.max(top_b)),
        BlendMode::Darken => (base_r.min(top_r), base_g.min(top_g), base_b.min(top_b)),
        BlendMode::Difference => (
            (base_r - top_r).abs(),
            (base_g - top_g).abs(),
            (base_b - top_b).abs(),
        ),
        BlendMode::Exclusion => (
            base_r + top_r - 2.0 * base_r * top_r,
            base_g + top_g - 2.0 * base_g * top_g,
            base_b + top_b - 2.0 * base_b * top_b,
        ),
        BlendMode::Subtract => (
            (base_r - top_r).max(0.0),
            (base_g - top_g).max(0.0),
            (base_b - top_b).max(0.0),
        ),
    };

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let out_r = (r * top_a + base_r * base_a * (1.0 - top_a)) / out_a;
    let out_g = (g * top_a + base_g * base_a * (1.0 - top_a)) / out_a;
    let out_b = (b * top_a + base_b * base_a * (1.0 - top_a)) / out_a;

    Rgba([
        (out_r * 255.0).clamp(0.0, 255.0) as u8,
        (out_g * 255.0).clamp(0.0, 255.0) as u8,
        (out_b * 255.0).clamp(0.0, 255.0) as u8,
        (out_a * 255.0).clamp(0.0, 255.0) as u8,
    ])
}

fn overlay_channel(base: f32, top: f32) -> f32 {
    if base < 0.5 {
        2.0 * base * top
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - top)
    }
}

// ============================================================================
// LAYER
// ============================================================================

/// An independently positioned/transformed raster surface in the stack.
pub struct Layer {
    pub id: u32,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    /// Document-space offset of the surface origin.
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Rotation about the surface center, in radians.
    pub rotation: f32,
    pub surface: Surface,
}

impl Layer {
    pub fn new(id: u32, name: String, width: u32, height: u32) -> Self {
        Self {
            id,
            name,
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            surface: Surface::new(width, height),
        }
    }

    pub fn offset(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn has_identity_transform(&self) -> bool {
        self.x == 0.0
            && self.y == 0.0
            && self.scale_x == 1.0
            && self.scale_y == 1.0
            && self.rotation == 0.0
    }

    /// Reset position/scale/rotation to identity.
    pub fn reset_transform(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
        self.scale_x = 1.0;
        self.scale_y = 1.0;
        self.rotation = 0.0;
    }

    /// Full copy: scalar state plus a deep pixel copy.
    pub fn duplicate(&self, new_id: u32, new_name: String) -> Self {
        Self {
            id: new_id,
            name: new_name,
            visible: self.visible,
            opacity: self.opacity,
            blend_mode: self.blend_mode,
            x: self.x,
            y: self.y,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            rotation: self.rotation,
            surface: self.surface.clone(),
        }
    }
}

// ============================================================================
// CANVAS STATE — the layer stack
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerDirection {
    Up,
    Down,
}

/// Summary row for layer-list display (ordered top-first).
pub struct LayerInfo {
    pub id: u32,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub active: bool,
}

/// Ordered layer stack (bottom→top) plus document dimensions.
///
/// Invariant: at least one layer always exists, and `active_layer_id` refers
/// to a member of `layers`.
pub struct CanvasState {
    pub layers: Vec<Layer>,
    pub active_layer_id: u32,
    pub layer_counter: u32,
    pub width: u32,
    pub height: u32,
}

impl CanvasState {
    /// New document with a single transparent "Background" layer.
    pub fn new(width: u32, height: u32) -> Self {
        let mut state = Self {
            layers: Vec::new(),
            active_layer_id: 0,
            layer_counter: 0,
            width: width.max(1),
            height: height.max(1),
        };
        state.add_layer(Some("Background"));
        state
    }

    pub fn active_index(&self) -> Option<usize> {
        self.layers.iter().position(|l| l.id == self.active_layer_id)
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == self.active_layer_id)
    }

    pub fn active_layer_mut(&mut self) -> Option<&mut Layer> {
        let id = self.active_layer_id;
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn layer_by_id(&self, id: u32) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Append a new transparent layer at the top of the stack and make it
    /// active. Returns the new layer's id.
    pub fn add_layer(&mut self, name: Option<&str>) -> u32 {
        self.layer_counter += 1;
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("Layer {}", self.layer_counter));
        let layer = Layer::new(self.layer_counter, name, self.width, self.height);
        let id = layer.id;
        self.layers.push(layer);
        self.active_layer_id = id;
        id
    }

    /// Remove the active layer and re-select the layer below it (or the new
    /// bottom layer when the deleted one was at index 0).
    pub fn delete_active(&mut self) -> Result<(), EditError> {
        if self.layers.len() <= 1 {
            return Err(EditError::CannotDeleteLastLayer);
        }
        let index = self.active_index().unwrap_or(0);
        self.layers.remove(index);
        self.active_layer_id = self.layers[index.saturating_sub(1)].id;
        Ok(())
    }

    /// Swap the active layer with its neighbor. No-op at the boundary.
    pub fn move_active(&mut self, direction: LayerDirection) {
        let Some(index) = self.active_index() else {
            return;
        };
        match direction {
            LayerDirection::Down if index > 0 => self.layers.swap(index, index - 1),
            LayerDirection::Up if index + 1 < self.layers.len() => {
                self.layers.swap(index, index + 1)
            }
            _ => {}
        }
    }

    pub fn toggle_visibility(&mut self, id: u32) {
        if let Some(layer) = self.layers.iter_mut().find(|l| l.id == id) {
            layer.visible = !layer.visible;
        }
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        if let Some(layer) = self.active_layer_mut() {
            layer.blend_mode = mode;
        }
    }

    pub fn set_opacity(&mut self, value: f32) {
        if let Some(layer) = self.active_layer_mut() {
            layer.opacity = value.clamp(0.0, 1.0);
        }
    }

    /// Copy of the active layer placed directly above it.
    pub fn duplicate_active(&mut self) {
        let Some(index) = self.active_index() else {
            return;
        };
        self.layer_counter += 1;
        let new_id = self.layer_counter;
        let source = &self.layers[index];
        let copy = source.duplicate(new_id, format!("{} copy", source.name));
        self.layers.insert(index + 1, copy);
        self.active_layer_id = new_id;
    }

    /// Composite the active layer onto the layer below it, honoring both
    /// layers' own opacity/blend/transform. The result becomes the lower
    /// layer's surface (document-sized, transform reset); the upper layer is
    /// removed and the lower one becomes active. Hidden layers contribute no
    /// pixels, matching the flatten path; the merged layer is visible when
    /// either source was.
    pub fn merge_down(&mut self) -> Result<(), EditError> {
        let index = self.active_index().unwrap_or(0);
        if index == 0 {
            return Err(EditError::NoLayerBelow);
        }

        let mut scratch = Surface::new(self.width, self.height);
        if self.layers[index - 1].visible {
            crate::compositor::draw_layer_onto(&mut scratch, &self.layers[index - 1]);
        }
        if self.layers[index].visible {
            crate::compositor::draw_layer_onto(&mut scratch, &self.layers[index]);
        }

        let top_visible = self.layers[index].visible;
        let below = &mut self.layers[index - 1];
        below.surface = scratch;
        below.reset_transform();
        below.opacity = 1.0;
        below.blend_mode = BlendMode::Normal;
        below.visible = below.visible || top_visible;
        let below_id = below.id;

        self.layers.remove(index);
        self.active_layer_id = below_id;
        Ok(())
    }

    /// Offset-based crop: the document is resized to `w × h` and every
    /// layer's offset shifts by `(-x, -y)` so visual content stays put
    /// relative to the new origin. Layer surfaces are not resized.
    /// Silently a no-op for degenerate dimensions.
    pub fn crop(&mut self, x: i32, y: i32, w: u32, h: u32) {
        if w == 0 || h == 0 {
            return;
        }
        self.width = w;
        self.height = h;
        for layer in &mut self.layers {
            layer.x -= x as f32;
            layer.y -= y as f32;
        }
    }

    /// Ordered top-first, for display.
    pub fn layer_list(&self) -> Vec<LayerInfo> {
        self.layers
            .iter()
            .rev()
            .map(|l| LayerInfo {
                id: l.id,
                name: l.name.clone(),
                visible: l.visible,
                opacity: l.opacity,
                blend_mode: l.blend_mode,
                active: l.id == self.active_layer_id,
            })
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
