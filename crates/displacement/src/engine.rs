//! Per-layer height field and normal map maintenance.

use crate::kernel::StampKernel;
use common::error::EngineResult;
use common::geometry::{PixelRect, Point, Size};
use layers::NodeId;
use raster::{ChannelSurface, RasterSurface};
use std::collections::HashMap;

/// Default gradient-to-channel scale used when encoding normals.
pub const DEFAULT_NORMAL_STRENGTH: f32 = 48.0;

struct LayerDisplacement {
    height: ChannelSurface,
    normal: RasterSurface,
    /// Region of `height` whose normals are stale. `None` = normal map is
    /// current.
    stale: Option<PixelRect>,
}

/// Maintains, per paintable layer, a height field built from brush stamps
/// and a lazily recomputed normal map.
pub struct DisplacementEngine {
    canvas: Size,
    normal_strength: f32,
    channels: HashMap<NodeId, LayerDisplacement>,
}

impl DisplacementEngine {
    pub fn new(canvas: Size) -> Self {
        Self::with_strength(canvas, DEFAULT_NORMAL_STRENGTH)
    }

    pub fn with_strength(canvas: Size, normal_strength: f32) -> Self {
        Self {
            canvas,
            normal_strength,
            channels: HashMap::new(),
        }
    }

    #[inline]
    pub fn canvas(&self) -> Size {
        self.canvas
    }

    /// Blend one circular stamp into a layer's height field with a max
    /// ("lighten") composite. Returns the touched region.
    ///
    /// Max-compositing is what keeps a continuous stroke bounded: however
    /// many stamps overlap, the field never exceeds the kernel peak.
    pub fn stamp_at(
        &mut self,
        layer: NodeId,
        position: Point,
        radius: f32,
        height_scale: f32,
        softness: f32,
    ) -> EngineResult<PixelRect> {
        let kernel = StampKernel::new(radius, height_scale, softness);
        let canvas = self.canvas;
        let entry = self.ensure_layer(layer)?;

        let bounds = PixelRect::new(
            (position.x - kernel.radius()).floor() as i32,
            (position.y - kernel.radius()).floor() as i32,
            (kernel.radius() * 2.0).ceil() as u32 + 1,
            (kernel.radius() * 2.0).ceil() as u32 + 1,
        )
        .clamp_to(canvas);

        for y in bounds.y..bounds.bottom() {
            for x in bounds.x..bounds.right() {
                let center = Point::new(x as f32 + 0.5, y as f32 + 0.5);
                let value = kernel.sample(center.distance(position));
                if value > 0.0 {
                    entry.height.set_max(x as u32, y as u32, value);
                }
            }
        }

        entry.stale = Some(match entry.stale {
            Some(existing) => existing.union(&bounds),
            None => bounds,
        });
        tracing::trace!(?layer, ?bounds, "stamp applied");
        Ok(bounds)
    }

    /// The raw height field for a layer (allocated on first access).
    pub fn height_field(&mut self, layer: NodeId) -> EngineResult<&ChannelSurface> {
        Ok(&self.ensure_layer(layer)?.height)
    }

    /// The normal map for a layer, recomputing stale regions first.
    pub fn normal_map(&mut self, layer: NodeId) -> EngineResult<&RasterSurface> {
        let strength = self.normal_strength;
        let entry = self.ensure_layer(layer)?;

        if let Some(stale) = entry.stale.take() {
            // Gradients reach one pixel past the edited region.
            let region = stale.inflate(1).clamp_to(entry.height.size());
            encode_normals(&entry.height, &mut entry.normal, region, strength);
        }
        Ok(&entry.normal)
    }

    /// Whether a layer has any displacement data.
    pub fn has_layer(&self, layer: NodeId) -> bool {
        self.channels.contains_key(&layer)
    }

    /// Drop a deleted layer's surfaces.
    pub fn remove_layer(&mut self, layer: NodeId) {
        self.channels.remove(&layer);
    }

    /// Reallocate every surface for a new canvas size. Prior content is
    /// discarded; displacement does not resample across aspect changes.
    pub fn resize(&mut self, canvas: Size) -> EngineResult<()> {
        let layers: Vec<NodeId> = self.channels.keys().copied().collect();
        let mut fresh = HashMap::with_capacity(layers.len());
        for layer in layers {
            fresh.insert(layer, LayerDisplacement::new(canvas)?);
        }
        self.canvas = canvas;
        self.channels = fresh;
        Ok(())
    }

    fn ensure_layer(&mut self, layer: NodeId) -> EngineResult<&mut LayerDisplacement> {
        if !self.channels.contains_key(&layer) {
            let entry = LayerDisplacement::new(self.canvas)?;
            self.channels.insert(layer, entry);
        }
        Ok(self.channels.get_mut(&layer).expect("just inserted"))
    }
}

impl LayerDisplacement {
    fn new(canvas: Size) -> EngineResult<Self> {
        let height = ChannelSurface::new(canvas.width, canvas.height)?;
        let mut normal = RasterSurface::new(canvas.width, canvas.height)?;
        encode_normals(&height, &mut normal, PixelRect::from_size(canvas), 1.0);
        Ok(Self {
            height,
            normal,
            stale: None,
        })
    }
}

/// Two-tap finite-difference gradient encoded as `128 + gradient·k`.
fn encode_normals(
    height: &ChannelSurface,
    normal: &mut RasterSurface,
    region: PixelRect,
    strength: f32,
) {
    let region = region.clamp_to(height.size());
    for y in region.y..region.bottom() {
        for x in region.x..region.right() {
            let (xi, yi) = (x as i64, y as i64);
            let gx = height.get_clamped(xi + 1, yi) - height.get_clamped(xi - 1, yi);
            let gy = height.get_clamped(xi, yi + 1) - height.get_clamped(xi, yi - 1);

            let r = (128.0 + gx * strength).clamp(0.0, 255.0) as u8;
            let g = (128.0 + gy * strength).clamp(0.0, 255.0) as u8;
            normal.set_pixel(x as u32, y as u32, common::color::Color::rgba(r, g, 255, 255));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn layer_id() -> NodeId {
        let mut map: SlotMap<NodeId, ()> = SlotMap::with_key();
        map.insert(())
    }

    #[test]
    fn test_stamp_center_and_edge_heights() {
        let mut engine = DisplacementEngine::new(Size::new(256, 256));
        let layer = layer_id();
        engine
            .stamp_at(layer, Point::new(100.0, 100.0), 20.0, 2.0, 0.5)
            .unwrap();

        let field = engine.height_field(layer).unwrap();
        let center = field.get(100, 100);
        assert!((center - 1.0).abs() < 0.05, "center ≈ 2.0·0.5, got {center}");
        assert!(field.get(120, 100) < 0.02, "≈ 0 at the radius boundary");
        assert_eq!(field.get(150, 100), 0.0);
    }

    #[test]
    fn test_stamp_is_idempotent() {
        let mut engine = DisplacementEngine::new(Size::new(128, 128));
        let layer = layer_id();
        let pos = Point::new(64.0, 64.0);
        engine.stamp_at(layer, pos, 16.0, 1.5, 0.8).unwrap();
        let once = engine.height_field(layer).unwrap().as_slice().to_vec();

        engine.stamp_at(layer, pos, 16.0, 1.5, 0.8).unwrap();
        let twice = engine.height_field(layer).unwrap().as_slice();
        assert_eq!(once.as_slice(), twice);
    }

    #[test]
    fn test_overlapping_stamps_never_exceed_height_scale() {
        let mut engine = DisplacementEngine::new(Size::new(128, 128));
        let layer = layer_id();
        for i in 0..50 {
            let pos = Point::new(60.0 + (i % 5) as f32, 60.0 + (i / 5) as f32 * 0.5);
            engine.stamp_at(layer, pos, 12.0, 2.0, 1.0).unwrap();
        }
        let field = engine.height_field(layer).unwrap();
        for &v in field.as_slice() {
            assert!(v <= 2.0 + 1e-5);
        }
    }

    #[test]
    fn test_normal_map_flat_where_unpainted() {
        let mut engine = DisplacementEngine::new(Size::new(64, 64));
        let layer = layer_id();
        engine
            .stamp_at(layer, Point::new(32.0, 32.0), 8.0, 1.0, 1.0)
            .unwrap();
        let normal = engine.normal_map(layer).unwrap();

        let flat = normal.get_pixel(5, 5);
        assert_eq!((flat.r, flat.g, flat.b), (128, 128, 255));

        // Left flank of the bump slopes up to the right: gradient > 128.
        let flank = normal.get_pixel(27, 32);
        assert!(flank.r > 128, "expected positive x-gradient, got {}", flank.r);
    }

    #[test]
    fn test_normal_map_recompute_is_lazy_and_scoped() {
        let mut engine = DisplacementEngine::new(Size::new(64, 64));
        let layer = layer_id();
        engine
            .stamp_at(layer, Point::new(16.0, 16.0), 6.0, 1.0, 1.0)
            .unwrap();
        let first = engine.normal_map(layer).unwrap().clone();

        // No new stamps: identical output, no recompute needed.
        let second = engine.normal_map(layer).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_resize_discards_content() {
        let mut engine = DisplacementEngine::new(Size::new(64, 64));
        let layer = layer_id();
        engine
            .stamp_at(layer, Point::new(32.0, 32.0), 8.0, 1.0, 1.0)
            .unwrap();
        engine.resize(Size::new(96, 48)).unwrap();

        let field = engine.height_field(layer).unwrap();
        assert_eq!(field.size(), Size::new(96, 48));
        assert!(field.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_remove_layer_drops_surfaces() {
        let mut engine = DisplacementEngine::new(Size::new(64, 64));
        let layer = layer_id();
        engine
            .stamp_at(layer, Point::new(10.0, 10.0), 4.0, 1.0, 1.0)
            .unwrap();
        assert!(engine.has_layer(layer));
        engine.remove_layer(layer);
        assert!(!engine.has_layer(layer));
    }
}
