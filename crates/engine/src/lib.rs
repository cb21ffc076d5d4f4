//! Facade tying the layer store, compositor and displacement engine into
//! one paint engine with a single mutation surface.
//!
//! External callers (tool palettes, pointer handling, persistence, the 3D
//! renderer) talk to [`PaintEngine`] and subscribe to update notifications;
//! they never hold references into the store.

pub mod config;
pub mod engine;
pub mod notify;

pub use config::EngineConfig;
pub use engine::{PaintEngine, ScopedEdit};
pub use notify::{SubscriptionId, UpdateKind};
