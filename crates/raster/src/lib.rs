//! Pixel surfaces and blend-mode math.
//!
//! Everything visual in the engine is stored in one of two buffer types:
//! - [`RasterSurface`]: RGBA8, straight alpha — layer content, composites,
//!   normal maps.
//! - [`ChannelSurface`]: single-channel f32 — masks and height fields.

pub mod blend;
pub mod surface;

pub use blend::BlendMode;
pub use surface::{ChannelSurface, RasterSurface};
