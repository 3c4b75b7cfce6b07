//! Coordinate spaces.
//!
//! Two point types keep layer-local and document-global arithmetic apart:
//! selection masks live in global (document) space, layer pixel grids in
//! local space, and the only legal bridge between them is a layer's offset.

/// A point in a layer's own pixel grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalPoint {
    pub x: f32,
    pub y: f32,
}

/// A point in document (global) space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlobalPoint {
    pub x: f32,
    pub y: f32,
}

impl LocalPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Translate into document space using the owning layer's offset.
    pub fn to_global(self, layer_offset: (f32, f32)) -> GlobalPoint {
        GlobalPoint {
            x: self.x + layer_offset.0,
            y: self.y + layer_offset.1,
        }
    }
}

impl GlobalPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Translate into a layer's local grid using that layer's offset.
    pub fn to_local(self, layer_offset: (f32, f32)) -> LocalPoint {
        LocalPoint {
            x: self.x - layer_offset.0,
            y: self.y - layer_offset.1,
        }
    }

    /// Nearest integer pixel coordinate (may be negative / out of bounds).
    pub fn pixel(self) -> (i64, i64) {
        (self.x.floor() as i64, self.y.floor() as i64)
    }
}

impl LocalPoint {
    /// Nearest integer pixel coordinate (may be negative / out of bounds).
    pub fn pixel(self) -> (i64, i64) {
        (self.x.floor() as i64, self.y.floor() as i64)
    }
}
