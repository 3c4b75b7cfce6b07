// ============================================================================
// HISTORY — snapshot-based undo/redo
// ============================================================================
//
// Whole-document snapshots in a bounded deque. Each checkpoint deep-copies
// every layer; undo/redo rebuild a CanvasState from the stored snapshot, so
// restored pixels are byte-identical to what was captured.
// ============================================================================

use std::collections::VecDeque;

use crate::canvas::{BlendMode, CanvasState, Layer, Surface};

pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Frozen copy of one layer: scalar state plus pixels.
#[derive(Clone)]
pub struct LayerSnapshot {
    pub id: u32,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub rotation: f32,
    pub surface: Surface,
}

impl LayerSnapshot {
    fn capture(layer: &Layer) -> Self {
        Self {
            id: layer.id,
            name: layer.name.clone(),
            visible: layer.visible,
            opacity: layer.opacity,
            blend_mode: layer.blend_mode,
            x: layer.x,
            y: layer.y,
            scale_x: layer.scale_x,
            scale_y: layer.scale_y,
            rotation: layer.rotation,
            surface: layer.surface.clone(),
        }
    }

    fn restore(&self) -> Layer {
        let mut layer = Layer::new(self.id, self.name.clone(), 1, 1);
        layer.visible = self.visible;
        layer.opacity = self.opacity;
        layer.blend_mode = self.blend_mode;
        layer.x = self.x;
        layer.y = self.y;
        layer.scale_x = self.scale_x;
        layer.scale_y = self.scale_y;
        layer.rotation = self.rotation;
        layer.surface = self.surface.clone();
        layer
    }
}

/// One checkpoint of the whole document.
#[derive(Clone)]
pub struct HistorySnapshot {
    pub layers: Vec<LayerSnapshot>,
    pub active_layer_id: u32,
    pub layer_counter: u32,
    pub width: u32,
    pub height: u32,
}

impl HistorySnapshot {
    pub fn capture(state: &CanvasState) -> Self {
        Self {
            layers: state.layers.iter().map(LayerSnapshot::capture).collect(),
            active_layer_id: state.active_layer_id,
            layer_counter: state.layer_counter,
            width: state.width,
            height: state.height,
        }
    }

    pub fn restore(&self) -> CanvasState {
        CanvasState {
            layers: self.layers.iter().map(LayerSnapshot::restore).collect(),
            active_layer_id: self.active_layer_id,
            layer_counter: self.layer_counter,
            width: self.width,
            height: self.height,
        }
    }
}

/// Bounded undo/redo stack over [`HistorySnapshot`]s.
///
/// `pointer` indexes the snapshot matching the current document. Saving while
/// not at the tail discards the redo range first. When the deque is full the
/// oldest snapshot is evicted without moving the pointer, which keeps it on
/// the same logical entry.
pub struct HistoryEngine {
    snapshots: VecDeque<HistorySnapshot>,
    pointer: usize,
    capacity: usize,
}

impl HistoryEngine {
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            pointer: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.pointer > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.snapshots.is_empty() && self.pointer + 1 < self.snapshots.len()
    }

    /// Record a checkpoint of `state` as the new tail.
    pub fn save_state(&mut self, state: &CanvasState) {
        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.pointer + 1);
        }
        self.snapshots.push_back(HistorySnapshot::capture(state));
        if self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        } else {
            self.pointer = self.snapshots.len() - 1;
        }
    }

    /// Step back one checkpoint. Returns the snapshot to restore, or `None`
    /// at the oldest retained state.
    pub fn undo(&mut self) -> Option<&HistorySnapshot> {
        if self.pointer == 0 {
            return None;
        }
        self.pointer -= 1;
        self.snapshots.get(self.pointer)
    }

    /// Step forward one checkpoint. Returns `None` at the tail.
    pub fn redo(&mut self) -> Option<&HistorySnapshot> {
        if self.pointer + 1 >= self.snapshots.len() {
            return None;
        }
        self.pointer += 1;
        self.snapshots.get(self.pointer)
    }
}

impl Default for HistoryEngine {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checkpointed_state(color: Rgba<u8>) -> CanvasState {
        let mut state = CanvasState::new(8, 8);
        state.active_layer_mut().unwrap().surface.fill(color);
        state
    }

    #[test]
    fn undo_restores_byte_identical_pixels() {
        let mut history = HistoryEngine::default();
        let state = checkpointed_state(Rgba([255, 255, 255, 255]));
        history.save_state(&state);
        let before = state.layers[0].surface.raw().to_vec();

        let edited = checkpointed_state(Rgba([0, 0, 0, 255]));
        history.save_state(&edited);

        let restored = history.undo().unwrap().restore();
        assert_eq!(restored.layers[0].surface.raw(), &before[..]);
        assert_eq!(restored.width, 8);
        assert_eq!(restored.active_layer_id, state.active_layer_id);
    }

    #[test]
    fn redo_reapplies_the_undone_edit() {
        let mut history = HistoryEngine::default();
        history.save_state(&checkpointed_state(Rgba([255, 255, 255, 255])));
        history.save_state(&checkpointed_state(Rgba([9, 9, 9, 255])));

        history.undo().unwrap();
        let redone = history.redo().unwrap().restore();
        assert_eq!(redone.layers[0].surface.pixel(0, 0), Rgba([9, 9, 9, 255]));
        assert!(history.redo().is_none());
    }

    #[test]
    fn undo_at_the_oldest_snapshot_returns_none() {
        let mut history = HistoryEngine::default();
        assert!(history.undo().is_none());
        history.save_state(&checkpointed_state(Rgba([1, 1, 1, 255])));
        assert!(history.undo().is_none());
    }

    #[test]
    fn saving_after_undo_discards_the_redo_range() {
        let mut history = HistoryEngine::default();
        history.save_state(&checkpointed_state(Rgba([1, 0, 0, 255])));
        history.save_state(&checkpointed_state(Rgba([2, 0, 0, 255])));
        history.save_state(&checkpointed_state(Rgba([3, 0, 0, 255])));

        history.undo().unwrap();
        history.save_state(&checkpointed_state(Rgba([4, 0, 0, 255])));

        assert_eq!(history.len(), 3);
        assert!(history.redo().is_none());
        let prior = history.undo().unwrap().restore();
        assert_eq!(prior.layers[0].surface.pixel(0, 0), Rgba([2, 0, 0, 255]));
    }

    #[test]
    fn capacity_evicts_the_oldest_without_moving_the_pointer() {
        let mut history = HistoryEngine::new(3);
        for v in 1..=3u8 {
            history.save_state(&checkpointed_state(Rgba([v, 0, 0, 255])));
        }
        // Full: the next save evicts snapshot 1 while the pointer stays on
        // the same logical entry (now the tail's predecessor moves under it).
        history.save_state(&checkpointed_state(Rgba([4, 0, 0, 255])));
        assert_eq!(history.len(), 3);

        // Pointer still at index 2, which now holds snapshot 4.
        let undone = history.undo().unwrap().restore();
        assert_eq!(undone.layers[0].surface.pixel(0, 0), Rgba([3, 0, 0, 255]));
        let oldest = history.undo().unwrap().restore();
        assert_eq!(oldest.layers[0].surface.pixel(0, 0), Rgba([2, 0, 0, 255]));
        assert!(history.undo().is_none());
    }

    #[test]
    fn snapshots_capture_layer_transforms() {
        let mut history = HistoryEngine::default();
        let mut state = CanvasState::new(4, 4);
        {
            let layer = state.active_layer_mut().unwrap();
            layer.x = 3.0;
            layer.scale_y = 2.0;
            layer.rotation = 0.5;
        }
        history.save_state(&state);
        history.save_state(&CanvasState::new(4, 4));

        let restored = history.undo().unwrap().restore();
        let layer = &restored.layers[0];
        assert_eq!((layer.x, layer.scale_y, layer.rotation), (3.0, 2.0, 0.5));
    }
}
