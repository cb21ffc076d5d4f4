//! Height fields and normal maps for raised-print ("puff") simulation.
//!
//! Brush stamps accumulate into a per-layer height field with a max
//! ("lighten") composite, so overlapping stamps from a continuous stroke
//! never push the field past the stamp's height scale. The normal map is
//! derived lazily from the height field, scoped to the dirty region.

pub mod engine;
pub mod kernel;

pub use engine::DisplacementEngine;
pub use kernel::StampKernel;
