//! Layer entities and the ordered layer store.
//!
//! Layers and groups live in a slotmap arena and refer to each other only by
//! opaque [`NodeId`]s; parent/child relationships are id lists, never
//! references. All structural mutation goes through [`LayerStore`], which
//! validates fully before applying any change.

pub mod effect;
pub mod mask;
pub mod node;
pub mod store;

pub use effect::{Effect, EffectId, EffectKind};
pub use mask::Mask;
pub use node::{GroupData, LayerData, LayerKind, Node, NodeId, NodeKind};
pub use store::{LayerStore, ReorderDirection};
