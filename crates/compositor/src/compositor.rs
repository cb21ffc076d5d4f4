//! Main compositor implementation.

use crate::effects::apply_effect;
use crate::invalidation::{DirtyRegion, InvalidationTracker};
use common::color::Color;
use common::error::EngineResult;
use common::geometry::{PixelRect, Size};
use layers::{LayerStore, Mask, Node, NodeId, NodeKind};
use parking_lot::RwLock;
use raster::blend::blend_pixel;
use raster::{BlendMode, RasterSurface};
use rayon::prelude::*;
use std::sync::Arc;

/// Non-fatal problem encountered during a composite pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositeDiagnostic {
    /// Child id referenced by the tree but absent from the store.
    pub missing: NodeId,
}

/// Per-pass statistics.
#[derive(Clone, Debug, Default)]
pub struct CompositorStats {
    pub layers_composited: u32,
    pub groups_composited: u32,
    pub nodes_skipped: u32,
    pub composition_time_ms: f32,
}

/// Reduces the layer forest to a single surface.
///
/// The compositor only reads layer surfaces. Finished frames are swapped
/// into `published` atomically, so `output()` always returns a complete
/// composite.
pub struct Compositor {
    canvas: Size,
    published: RwLock<Arc<RasterSurface>>,
    tracker: InvalidationTracker,
    structure_dirty: bool,
    diagnostics: Vec<CompositeDiagnostic>,
    stats: CompositorStats,
}

impl Compositor {
    pub fn new(canvas: Size) -> EngineResult<Self> {
        let blank = RasterSurface::new(canvas.width, canvas.height)?;
        Ok(Self {
            canvas,
            published: RwLock::new(Arc::new(blank)),
            tracker: InvalidationTracker::new(canvas),
            structure_dirty: true,
            diagnostics: Vec::new(),
            stats: CompositorStats::default(),
        })
    }

    #[inline]
    pub fn canvas(&self) -> Size {
        self.canvas
    }

    /// The most recently published composite.
    pub fn output(&self) -> Arc<RasterSurface> {
        self.published.read().clone()
    }

    /// Record pixel-only damage for a node.
    pub fn mark_dirty(&mut self, id: NodeId, rect: PixelRect) {
        self.tracker.mark_dirty(id, rect);
    }

    /// Record a structural change (create/delete/reorder/group/ungroup/
    /// merge); the next composite runs a full pass.
    pub fn note_structure_change(&mut self) {
        self.structure_dirty = true;
    }

    pub fn tracker(&self) -> &InvalidationTracker {
        &self.tracker
    }

    /// Whether anything has changed since the last published composite.
    pub fn needs_composite(&self) -> bool {
        self.structure_dirty || self.tracker.has_damage()
    }

    pub fn diagnostics(&self) -> &[CompositeDiagnostic] {
        &self.diagnostics
    }

    pub fn stats(&self) -> &CompositorStats {
        &self.stats
    }

    /// Canvas resize: drop all cached output and damage state.
    pub fn resize(&mut self, canvas: Size) -> EngineResult<()> {
        let blank = RasterSurface::new(canvas.width, canvas.height)?;
        self.canvas = canvas;
        *self.published.write() = Arc::new(blank);
        self.tracker.resize(canvas);
        self.structure_dirty = true;
        Ok(())
    }

    /// Full recomposite of the whole tree.
    pub fn composite(&mut self, store: &LayerStore) -> EngineResult<Arc<RasterSurface>> {
        self.sync_canvas(store)?;
        let start = std::time::Instant::now();
        self.begin_pass();

        let mut dest = RasterSurface::new(self.canvas.width, self.canvas.height)?;
        let clip = PixelRect::from_size(self.canvas);
        self.composite_scope(store, store.roots(), &mut dest, clip)?;

        self.finish_pass(dest, start)
    }

    /// Recomposite restricted to the union of tracked dirty rectangles.
    ///
    /// Escalates to a full pass after a structural change or when the
    /// tracker reports `Full`. With no pending damage, the previously
    /// published surface is returned unchanged.
    pub fn composite_dirty(&mut self, store: &LayerStore) -> EngineResult<Arc<RasterSurface>> {
        self.sync_canvas(store)?;
        if self.structure_dirty {
            return self.composite(store);
        }
        let clip = match self.tracker.combined() {
            DirtyRegion::None => return Ok(self.output()),
            DirtyRegion::Full => return self.composite(store),
            DirtyRegion::Rect(rect) => rect,
        };
        // Effects can move pixels past the edited region; widen the clip by
        // the largest active reach so the scoped pass stays exact.
        let extent = max_effect_extent(store);
        let clip = if extent > 0 {
            clip.inflate(extent).clamp_to(self.canvas)
        } else {
            clip
        };

        let start = std::time::Instant::now();
        self.begin_pass();
        tracing::trace!(?clip, "scoped recomposite");

        let mut dest = (*self.output()).clone();
        dest.clear_rect(clip);
        self.composite_scope(store, store.roots(), &mut dest, clip)?;

        self.finish_pass(dest, start)
    }

    /// Composite exactly the given sibling subset in isolation, ignoring all
    /// non-member siblings. Used by merge.
    pub fn composite_subset(
        &mut self,
        store: &LayerStore,
        ids: &[NodeId],
    ) -> EngineResult<RasterSurface> {
        let canvas = store.canvas();
        let mut dest = RasterSurface::new(canvas.width, canvas.height)?;
        if ids.is_empty() {
            return Ok(dest);
        }

        let parent = store
            .get(ids[0])
            .ok_or_else(|| common::error::EngineError::invalid_id(format!("{:?}", ids[0])))?
            .parent;
        let scope: Vec<NodeId> = match parent {
            None => store.roots().to_vec(),
            Some(gid) => store
                .get(gid)
                .and_then(|n| n.as_group())
                .map(|g| g.children.iter().copied().collect())
                .unwrap_or_default(),
        };
        let members: Vec<NodeId> = scope.into_iter().filter(|id| ids.contains(id)).collect();

        let clip = PixelRect::from_size(canvas);
        self.composite_scope(store, &members, &mut dest, clip)?;
        Ok(dest)
    }

    fn sync_canvas(&mut self, store: &LayerStore) -> EngineResult<()> {
        if store.canvas() != self.canvas {
            self.resize(store.canvas())?;
        }
        Ok(())
    }

    fn begin_pass(&mut self) {
        self.diagnostics.clear();
        self.stats = CompositorStats::default();
    }

    fn finish_pass(
        &mut self,
        dest: RasterSurface,
        start: std::time::Instant,
    ) -> EngineResult<Arc<RasterSurface>> {
        self.stats.composition_time_ms = start.elapsed().as_secs_f32() * 1000.0;
        self.tracker.clear_all();
        self.structure_dirty = false;

        let frame = Arc::new(dest);
        *self.published.write() = frame.clone();
        Ok(frame)
    }

    /// Composite one sibling list bottom-to-top into `dest`, writing only
    /// within `clip`.
    fn composite_scope(
        &mut self,
        store: &LayerStore,
        ids: &[NodeId],
        dest: &mut RasterSurface,
        clip: PixelRect,
    ) -> EngineResult<()> {
        for &id in ids {
            let node = match store.get(id) {
                Some(node) => node,
                None => {
                    tracing::warn!(?id, "skipping missing child during composite");
                    self.diagnostics.push(CompositeDiagnostic { missing: id });
                    continue;
                }
            };
            if !node.visible || node.opacity <= 0.0 {
                self.stats.nodes_skipped += 1;
                continue;
            }

            match &node.kind {
                NodeKind::Group(group) => {
                    // Group isolation: children composite into a private
                    // intermediate before the group blends into its parent.
                    let children: Vec<NodeId> = group.children.iter().copied().collect();
                    let mut intermediate =
                        RasterSurface::new(self.canvas.width, self.canvas.height)?;
                    self.composite_scope(store, &children, &mut intermediate, clip)?;
                    blend_surface_into(dest, &intermediate, BlendMode::Normal, node.opacity, clip);
                    self.stats.groups_composited += 1;
                }
                NodeKind::Layer(layer) => {
                    self.composite_layer(node, layer, dest, clip);
                    self.stats.layers_composited += 1;
                }
            }
        }
        Ok(())
    }

    fn composite_layer(
        &self,
        node: &Node,
        layer: &layers::LayerData,
        dest: &mut RasterSurface,
        clip: PixelRect,
    ) {
        let masked = layer.mask.as_ref().filter(|m| m.enabled).is_some();
        let effects: Vec<_> = layer.effects.iter().filter(|e| e.enabled).collect();

        if !masked && effects.is_empty() {
            blend_surface_into(dest, &layer.content, layer.blend_mode, node.opacity, clip);
            return;
        }

        let mut source = layer.content.clone();
        if let Some(mask) = layer.mask.as_ref().filter(|m| m.enabled) {
            apply_mask(&mut source, mask);
        }
        for effect in effects {
            source = apply_effect(&effect.kind, &source);
        }
        blend_surface_into(dest, &source, layer.blend_mode, node.opacity, clip);
    }
}

fn max_effect_extent(store: &LayerStore) -> u32 {
    let mut extent = 0.0f32;
    for (_, node) in store.iter() {
        if let NodeKind::Layer(layer) = &node.kind {
            for effect in layer.effects.iter().filter(|e| e.enabled) {
                extent = extent.max(effect.kind.extent());
            }
        }
    }
    extent.ceil() as u32
}

/// Intersect a layer's alpha with its mask coverage.
fn apply_mask(surface: &mut RasterSurface, mask: &Mask) {
    let (w, h) = (surface.width(), surface.height());
    for y in 0..h {
        for x in 0..w {
            let mut px = surface.get_pixel(x, y);
            if px.a == 0 {
                continue;
            }
            let coverage = mask.sample(x, y);
            if coverage < 1.0 {
                px.a = (px.a as f32 * coverage) as u8;
                surface.set_pixel(x, y, px);
            }
        }
    }
}

/// Blend `src` into `dest` within `clip`, row-parallel.
fn blend_surface_into(
    dest: &mut RasterSurface,
    src: &RasterSurface,
    mode: BlendMode,
    opacity: f32,
    clip: PixelRect,
) {
    let clip = clip.clamp_to(dest.size()).clamp_to(src.size());
    if clip.is_empty() || opacity <= 0.0 {
        return;
    }

    let width = dest.width() as usize;
    let (y0, y1) = (clip.y as usize, clip.bottom() as usize);
    let (x0, x1) = (clip.x as usize, clip.right() as usize);
    let src_bytes = src.as_bytes();

    dest.as_bytes_mut()
        .par_chunks_exact_mut(width * 4)
        .enumerate()
        .filter(|(y, _)| *y >= y0 && *y < y1)
        .for_each(|(y, row)| {
            let src_row = &src_bytes[y * width * 4..(y + 1) * width * 4];
            for x in x0..x1 {
                let o = x * 4;
                let s = Color::rgba(src_row[o], src_row[o + 1], src_row[o + 2], src_row[o + 3]);
                if s.a == 0 {
                    continue;
                }
                let d = Color::rgba(row[o], row[o + 1], row[o + 2], row[o + 3]);
                let out = blend_pixel(d, s, mode, opacity);
                row[o] = out.r;
                row[o + 1] = out.g;
                row[o + 2] = out.b;
                row[o + 3] = out.a;
            }
        });
}
