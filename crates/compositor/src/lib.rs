//! Compositing of the layer forest into a single surface.
//!
//! The compositor reads the [`layers::LayerStore`] and never mutates source
//! surfaces. Results are published via an atomic `Arc` swap so a reader
//! never observes a partially composited buffer. Pixel-only edits go through
//! the [`InvalidationTracker`] and lead to a recomposite scoped to the dirty
//! union; structural edits force a full pass.

pub mod compositor;
pub mod effects;
pub mod invalidation;

pub use self::compositor::{CompositeDiagnostic, Compositor, CompositorStats};
pub use invalidation::{DirtyRegion, InvalidationTracker};
