//! Stateless pixel algorithms. Every operation here takes the surface (or
//! layer) it mutates plus the selection mask that scopes it; none of them
//! touch session or history state.

pub mod adjustments;
pub mod clone;
pub mod fill;
pub mod filters;
pub mod shapes;
