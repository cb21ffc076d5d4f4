//! Layer masks.

use common::geometry::{MaskTransform, PixelRect, Point, Size};
use raster::ChannelSurface;

/// Single-channel raster clipping a layer's visible alpha.
///
/// The mask's source surface is sampled through its transform; canvas pixels
/// that map outside the source are fully clipped.
#[derive(Clone, Debug)]
pub struct Mask {
    pub enabled: bool,
    /// Placement on canvas; always clamped to canvas bounds by the store.
    pub bounds: PixelRect,
    pub transform: MaskTransform,
    pub source: ChannelSurface,
}

impl Mask {
    pub fn new(source: ChannelSurface, bounds: PixelRect) -> Self {
        Self {
            enabled: true,
            bounds,
            transform: MaskTransform::identity(),
            source,
        }
    }

    /// Sample the mask's coverage at a canvas pixel (0.0 = clipped,
    /// 1.0 = fully visible). Disabled masks never clip.
    pub fn sample(&self, x: u32, y: u32) -> f32 {
        if !self.enabled {
            return 1.0;
        }

        let canvas_point = Point::new(
            x as f32 + 0.5 - self.bounds.x as f32,
            y as f32 + 0.5 - self.bounds.y as f32,
        );
        let local = match self.transform.inverse_map(canvas_point) {
            Some(p) => p,
            None => return 0.0,
        };

        if local.x < 0.0 || local.y < 0.0 {
            return 0.0;
        }
        let (sx, sy) = (local.x as u32, local.y as u32);
        if sx >= self.source.width() || sy >= self.source.height() {
            return 0.0;
        }

        self.source.get(sx, sy).clamp(0.0, 1.0)
    }

    /// Clamp the mask bounds to the canvas. Out-of-bounds masks are clamped,
    /// never rejected.
    pub fn clamp_bounds(&mut self, canvas: Size) {
        self.bounds = self.bounds.clamp_to(canvas);
    }
}
