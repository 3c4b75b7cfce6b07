//! RasterPad — a layered raster image editing engine.
//!
//! The core is a CPU-resident layer stack with per-layer affine state, a
//! compositor that flattens it through a viewport, a selection mask scoping
//! every destructive operation, snapshot-based undo/redo and a set of
//! stateless pixel algorithms (fill, wand, convolution, pixelate, color
//! adjustments, clone stamp). [`session::Session`] ties them together as the
//! single context object an embedding drives.

pub mod canvas;
pub mod cli;
pub mod compositor;
pub mod coords;
pub mod error;
pub mod history;
pub mod logger;
pub mod ops;
pub mod project;
pub mod selection;
pub mod session;

pub use canvas::{BlendMode, CanvasState, Layer, LayerDirection, LayerInfo, Surface};
pub use compositor::{Viewport, flatten, render};
pub use coords::{GlobalPoint, LocalPoint};
pub use error::EditError;
pub use history::{HistoryEngine, HistorySnapshot};
pub use selection::{SelectionKind, SelectionMask};
pub use session::{Session, Tool};
