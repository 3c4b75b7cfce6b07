//! Clone stamp — paints pixels copied from another location of the document.
//!
//! The source offset is latched once per stroke: the first stamp of a stroke
//! fixes `offset = source_anchor - stroke_start`, and every subsequent stamp
//! samples at `dest + offset`. The source is a flattened snapshot captured at
//! stroke begin, so the stroke never reads its own output.

use crate::canvas::{Layer, Surface};
use crate::coords::GlobalPoint;
use crate::selection::SelectionMask;

pub struct CloneStamp {
    source: Surface,
    dx: f32,
    dy: f32,
}

impl CloneStamp {
    /// Start a clone stroke. `source` is the document snapshot to sample
    /// from; the anchor-to-start delta stays fixed for the whole stroke.
    pub fn begin(source: Surface, source_anchor: GlobalPoint, stroke_start: GlobalPoint) -> Self {
        Self {
            source,
            dx: source_anchor.x - stroke_start.x,
            dy: source_anchor.y - stroke_start.y,
        }
    }

    /// Stamp a filled disc of `radius` centered on `dest` (global
    /// coordinates). Destination pixels are overwritten, not blended.
    /// Samples falling outside the source snapshot are skipped, as are
    /// destination pixels excluded by the selection mask.
    pub fn stamp(&self, layer: &mut Layer, dest: GlobalPoint, radius: f32, selection: &SelectionMask) {
        let (off_x, off_y) = layer.offset();
        let (cx, cy) = dest.pixel();
        let r = radius.max(0.0);
        let ri = r.ceil() as i64;
        let r2 = r * r;

        for gy in (cy - ri)..=(cy + ri) {
            for gx in (cx - ri)..=(cx + ri) {
                let ddx = (gx - cx) as f32;
                let ddy = (gy - cy) as f32;
                if ddx * ddx + ddy * ddy > r2 {
                    continue;
                }
                if selection.excludes(gx, gy) {
                    continue;
                }
                let sx = (gx as f32 + self.dx).floor() as i64;
                let sy = (gy as f32 + self.dy).floor() as i64;
                let Some(sample) = self.source.get(sx, sy) else {
                    continue;
                };
                let lx = (gx as f32 - off_x).floor() as i64;
                let ly = (gy as f32 - off_y).floor() as i64;
                layer.surface.put(lx, ly, sample);
            }
        }
    }
}
