//! Dirty rectangle tracking.

use common::geometry::{PixelRect, Size};
use layers::NodeId;
use std::collections::HashMap;

/// Once a node's accumulated dirty rectangle covers this fraction of the
/// canvas, it escalates to `Full` and the compositor runs one full pass
/// instead of many large scoped ones.
const FULL_AREA_FRACTION: f64 = 0.8;

/// Accumulated damage for one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirtyRegion {
    None,
    Rect(PixelRect),
    Full,
}

impl DirtyRegion {
    pub fn is_none(&self) -> bool {
        matches!(self, DirtyRegion::None)
    }
}

/// Tracks per-node dirty rectangles to bound recomposite cost.
pub struct InvalidationTracker {
    canvas: Size,
    regions: HashMap<NodeId, DirtyRegion>,
}

impl InvalidationTracker {
    pub fn new(canvas: Size) -> Self {
        Self {
            canvas,
            regions: HashMap::new(),
        }
    }

    /// Grow a node's stored rectangle to the union with `rect`.
    pub fn mark_dirty(&mut self, id: NodeId, rect: PixelRect) {
        let rect = rect.clamp_to(self.canvas);
        if rect.is_empty() {
            return;
        }

        let entry = self.regions.entry(id).or_insert(DirtyRegion::None);
        let grown = match *entry {
            DirtyRegion::Full => DirtyRegion::Full,
            DirtyRegion::None => DirtyRegion::Rect(rect),
            DirtyRegion::Rect(existing) => DirtyRegion::Rect(existing.union(&rect)),
        };

        *entry = match grown {
            DirtyRegion::Rect(r)
                if r.area() as f64 > self.canvas.area() as f64 * FULL_AREA_FRACTION =>
            {
                DirtyRegion::Full
            }
            other => other,
        };
    }

    /// Current accumulated region for a node.
    pub fn dirty_rect(&self, id: NodeId) -> DirtyRegion {
        self.regions.get(&id).copied().unwrap_or(DirtyRegion::None)
    }

    /// Reset a node after a consuming recomposite pass.
    pub fn clear(&mut self, id: NodeId) {
        self.regions.remove(&id);
    }

    /// Union of all tracked regions, consumed by the compositor.
    pub fn combined(&self) -> DirtyRegion {
        let mut combined = DirtyRegion::None;
        for region in self.regions.values() {
            combined = match (combined, region) {
                (_, DirtyRegion::Full) | (DirtyRegion::Full, _) => return DirtyRegion::Full,
                (DirtyRegion::None, r) => *r,
                (DirtyRegion::Rect(a), DirtyRegion::Rect(b)) => DirtyRegion::Rect(a.union(b)),
                (r, DirtyRegion::None) => r,
            };
        }
        combined
    }

    pub fn has_damage(&self) -> bool {
        self.regions.values().any(|r| !r.is_none())
    }

    pub fn clear_all(&mut self) {
        self.regions.clear();
    }

    /// Canvas resize invalidates every region outright.
    pub fn resize(&mut self, canvas: Size) {
        self.canvas = canvas;
        self.regions.clear();
    }
}
