//! Common utilities and types used across the paint engine.

pub mod color;
pub mod error;
pub mod geometry;

pub use color::Color;
pub use error::{EngineError, EngineResult};
pub use geometry::{MaskTransform, PixelRect, Point, Rect, Size};
