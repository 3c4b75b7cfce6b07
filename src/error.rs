//! Editing error taxonomy.
//!
//! Every failure in the engine is local and non-fatal: the operation performs
//! no mutation and the live document is left exactly as it was. Out-of-bounds
//! pointer coordinates are *not* errors — they are clamped or skipped at the
//! pixel level, since interactive input routinely strays off the canvas.

use std::io;
use thiserror::Error;

/// Errors surfaced by layer-stack and persistence operations.
#[derive(Error, Debug)]
pub enum EditError {
    /// Invariant: the stack always holds at least one layer.
    #[error("cannot delete the last remaining layer")]
    CannotDeleteLastLayer,

    /// Merge-down requires a layer below the active one.
    #[error("the active layer has no layer below it")]
    NoLayerBelow,

    /// The persistence collaborator handed back structurally invalid data.
    /// Rejected before any mutation of live state.
    #[error("malformed project data: {0}")]
    MalformedProject(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<EditError> for String {
    fn from(err: EditError) -> Self {
        err.to_string()
    }
}
