//! The paint engine facade.

use crate::config::EngineConfig;
use crate::notify::{Notifier, SubscriptionId, UpdateKind};
use common::error::{EngineError, EngineResult};
use common::geometry::{PixelRect, Point, Size};
use compositor::{CompositeDiagnostic, Compositor};
use displacement::DisplacementEngine;
use layers::{EffectId, EffectKind, LayerKind, LayerStore, Mask, NodeId, ReorderDirection};
use raster::{BlendMode, ChannelSurface, RasterSurface};
use std::sync::Arc;

/// Owns the store, compositor and displacement engine, and keeps their
/// dirty state in sync across every mutation.
///
/// Single logical writer: all mutation goes through `&mut self`, so the
/// compositor's traversal can never interleave with a structural change.
pub struct PaintEngine {
    store: LayerStore,
    compositor: Compositor,
    displacement: DisplacementEngine,
    notifier: Notifier,
}

impl PaintEngine {
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        let canvas = config.canvas();
        Ok(Self {
            store: LayerStore::new(canvas)?,
            compositor: Compositor::new(canvas)?,
            displacement: DisplacementEngine::with_strength(canvas, config.normal_strength),
            notifier: Notifier::default(),
        })
    }

    pub fn with_canvas(canvas: Size) -> EngineResult<Self> {
        let config = EngineConfig {
            width: canvas.width,
            height: canvas.height,
            ..EngineConfig::default()
        };
        Self::new(&config)
    }

    #[inline]
    pub fn canvas(&self) -> Size {
        self.store.canvas()
    }

    /// Read-only view of the layer forest.
    #[inline]
    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    // ----- structural commands -------------------------------------------

    pub fn create_layer(&mut self, kind: LayerKind, name: &str) -> EngineResult<NodeId> {
        let id = self.store.create(kind, name)?;
        self.compositor.note_structure_change();
        Ok(id)
    }

    pub fn delete_layer(&mut self, id: NodeId) -> EngineResult<()> {
        self.store.delete(id)?;
        self.displacement.remove_layer(id);
        self.compositor.note_structure_change();
        Ok(())
    }

    pub fn duplicate_layer(&mut self, id: NodeId) -> EngineResult<NodeId> {
        let copy = self.store.duplicate(id)?;
        self.compositor.note_structure_change();
        Ok(copy)
    }

    pub fn reorder(&mut self, id: NodeId, direction: ReorderDirection) -> EngineResult<()> {
        self.store.reorder(id, direction)?;
        self.compositor.note_structure_change();
        Ok(())
    }

    pub fn group(&mut self, ids: &[NodeId]) -> EngineResult<NodeId> {
        let gid = self.store.group(ids)?;
        self.compositor.note_structure_change();
        Ok(gid)
    }

    pub fn ungroup(&mut self, gid: NodeId) -> EngineResult<()> {
        self.store.ungroup(gid)?;
        self.compositor.note_structure_change();
        Ok(())
    }

    pub fn move_into_group(&mut self, id: NodeId, gid: NodeId) -> EngineResult<()> {
        self.store.move_into_group(id, gid)?;
        self.compositor.note_structure_change();
        Ok(())
    }

    /// Composite exactly the given siblings in isolation and replace them
    /// with a single pixel layer holding that result.
    pub fn merge_layers(&mut self, ids: &[NodeId], name: &str) -> EngineResult<NodeId> {
        let merged = self.compositor.composite_subset(&self.store, ids)?;
        let id = self.store.replace_with_merged(ids, name, merged)?;
        for &old in ids {
            self.displacement.remove_layer(old);
        }
        self.compositor.note_structure_change();
        Ok(id)
    }

    /// Merge every visible top-level node into one layer.
    pub fn flatten(&mut self) -> EngineResult<NodeId> {
        let visible: Vec<NodeId> = self
            .store
            .roots()
            .iter()
            .copied()
            .filter(|&id| self.store.get(id).map(|n| n.visible).unwrap_or(false))
            .collect();
        if visible.is_empty() {
            return Err(EngineError::invalid("nothing visible to flatten"));
        }
        self.merge_layers(&visible, "Flattened")
    }

    // ----- metadata commands ---------------------------------------------

    pub fn rename(&mut self, id: NodeId, name: &str) -> EngineResult<()> {
        self.store.rename(id, name)
    }

    pub fn set_locked(&mut self, id: NodeId, locked: bool) -> EngineResult<()> {
        self.store.set_locked(id, locked)
    }

    pub fn select(&mut self, id: Option<NodeId>) {
        self.store.select(id);
    }

    pub fn selection(&self) -> Option<NodeId> {
        self.store.selection()
    }

    pub fn set_opacity(&mut self, id: NodeId, opacity: f32) -> EngineResult<()> {
        self.store.set_opacity(id, opacity)?;
        self.appearance_changed(id);
        Ok(())
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> EngineResult<()> {
        self.store.set_visible(id, visible)?;
        self.appearance_changed(id);
        Ok(())
    }

    pub fn set_blend_mode(&mut self, id: NodeId, mode: BlendMode) -> EngineResult<()> {
        self.store.set_blend_mode(id, mode)?;
        self.appearance_changed(id);
        Ok(())
    }

    pub fn set_blend_mode_name(&mut self, id: NodeId, name: &str) -> EngineResult<()> {
        self.store.set_blend_mode_name(id, name)?;
        self.appearance_changed(id);
        Ok(())
    }

    pub fn add_effect(&mut self, id: NodeId, kind: EffectKind) -> EngineResult<EffectId> {
        let effect = self.store.add_effect(id, kind)?;
        self.appearance_changed(id);
        Ok(effect)
    }

    pub fn add_effect_named(&mut self, id: NodeId, name: &str) -> EngineResult<EffectId> {
        let effect = self.store.add_effect_named(id, name)?;
        self.appearance_changed(id);
        Ok(effect)
    }

    pub fn remove_effect(&mut self, id: NodeId, effect: EffectId) -> EngineResult<()> {
        self.store.remove_effect(id, effect)?;
        self.appearance_changed(id);
        Ok(())
    }

    pub fn set_effect_enabled(
        &mut self,
        id: NodeId,
        effect: EffectId,
        enabled: bool,
    ) -> EngineResult<()> {
        self.store.set_effect_enabled(id, effect, enabled)?;
        self.appearance_changed(id);
        Ok(())
    }

    pub fn set_mask(&mut self, id: NodeId, mask: Mask) -> EngineResult<()> {
        self.store.set_mask(id, mask)?;
        self.appearance_changed(id);
        Ok(())
    }

    pub fn remove_mask(&mut self, id: NodeId) -> EngineResult<()> {
        self.store.remove_mask(id)?;
        self.appearance_changed(id);
        Ok(())
    }

    pub fn set_mask_enabled(&mut self, id: NodeId, enabled: bool) -> EngineResult<()> {
        self.store.set_mask_enabled(id, enabled)?;
        self.appearance_changed(id);
        Ok(())
    }

    /// A non-pixel change that can affect the node's whole footprint: mark
    /// the full canvas dirty for it and let the tracker escalate.
    fn appearance_changed(&mut self, id: NodeId) {
        self.compositor
            .mark_dirty(id, PixelRect::from_size(self.canvas()));
    }

    // ----- painting ------------------------------------------------------

    /// Synchronous pixel edit on the painting hot path: mutate the layer's
    /// surface within `rect`, record the damage, return. No compositing
    /// happens here.
    pub fn edit_layer<F>(&mut self, id: NodeId, rect: PixelRect, edit: F) -> EngineResult<()>
    where
        F: FnOnce(&mut RasterSurface),
    {
        let surface = self.store.layer_content_mut(id)?;
        edit(surface);
        self.compositor.mark_dirty(id, rect);
        Ok(())
    }

    /// Begin a cancellable edit. Dropping the guard without committing
    /// restores the pre-edit surface exactly.
    pub fn begin_edit(&mut self, id: NodeId) -> EngineResult<ScopedEdit<'_>> {
        let snapshot = self.store.layer_content_mut(id)?.clone();
        Ok(ScopedEdit {
            engine: self,
            layer: id,
            snapshot: Some(snapshot),
            committed: false,
        })
    }

    /// Accumulate one brush stamp into a layer's height field.
    pub fn stamp(
        &mut self,
        id: NodeId,
        position: Point,
        radius: f32,
        height_scale: f32,
        softness: f32,
    ) -> EngineResult<()> {
        if !self.store.contains(id) {
            return Err(EngineError::invalid_id(format!("{id:?}")));
        }
        self.displacement
            .stamp_at(id, position, radius, height_scale, softness)?;
        self.notifier.emit(UpdateKind::Displacement(id));
        Ok(())
    }

    // ----- outputs -------------------------------------------------------

    /// Full recomposite.
    pub fn composite(&mut self) -> EngineResult<Arc<RasterSurface>> {
        let before = self.compositor.output();
        let frame = self.compositor.composite(&self.store)?;
        if !Arc::ptr_eq(&before, &frame) {
            self.notifier.emit(UpdateKind::Composite);
        }
        Ok(frame)
    }

    /// Recomposite only what changed since the last pass.
    pub fn composite_dirty(&mut self) -> EngineResult<Arc<RasterSurface>> {
        let before = self.compositor.output();
        let frame = self.compositor.composite_dirty(&self.store)?;
        if !Arc::ptr_eq(&before, &frame) {
            self.notifier.emit(UpdateKind::Composite);
        }
        Ok(frame)
    }

    /// The most recently published composite, without recompositing.
    pub fn output(&self) -> Arc<RasterSurface> {
        self.compositor.output()
    }

    pub fn needs_composite(&self) -> bool {
        self.compositor.needs_composite()
    }

    pub fn diagnostics(&self) -> &[CompositeDiagnostic] {
        self.compositor.diagnostics()
    }

    pub fn height_field(&mut self, id: NodeId) -> EngineResult<&ChannelSurface> {
        self.displacement.height_field(id)
    }

    pub fn normal_map(&mut self, id: NodeId) -> EngineResult<&RasterSurface> {
        self.displacement.normal_map(id)
    }

    // ----- persistence boundary ------------------------------------------

    /// Raw RGBA bytes of one layer's content, for serialization.
    pub fn export(&self, id: NodeId) -> EngineResult<(Vec<u8>, u32, u32)> {
        let content = self.store.layer_content(id)?;
        Ok((
            content.as_bytes().to_vec(),
            content.width(),
            content.height(),
        ))
    }

    /// Reconstruct a pixel layer from exported bytes. Content smaller than
    /// the canvas lands at the origin; larger content is cropped.
    pub fn import(&mut self, bytes: Vec<u8>, width: u32, height: u32) -> EngineResult<NodeId> {
        let source = RasterSurface::from_bytes(width, height, bytes)?;
        let id = self.store.create(LayerKind::Pixel, "Imported")?;

        let canvas = self.canvas();
        if source.size() == canvas {
            self.store.set_layer_content(id, source)?;
        } else {
            let mut sized = RasterSurface::new(canvas.width, canvas.height)?;
            sized.copy_region(&source, sized.bounds());
            self.store.set_layer_content(id, sized)?;
        }
        self.compositor.note_structure_change();
        Ok(id)
    }

    // ----- lifecycle -----------------------------------------------------

    /// Resize the canvas. Invalidates every cached composite and
    /// displacement surface.
    pub fn resize(&mut self, canvas: Size) -> EngineResult<()> {
        self.store.resize(canvas)?;
        self.compositor.resize(canvas)?;
        self.displacement.resize(canvas)?;
        self.notifier.emit(UpdateKind::Composite);
        Ok(())
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(UpdateKind) + Send + Sync + 'static,
    {
        self.notifier.subscribe(Box::new(listener))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.notifier.unsubscribe(id);
    }
}

/// Guard for a long-running, cancellable pixel edit.
///
/// [`ScopedEdit::commit`] keeps the changes and records the damage;
/// dropping the guard uncommitted restores the pre-edit surface, leaving
/// no partial writes behind.
pub struct ScopedEdit<'a> {
    engine: &'a mut PaintEngine,
    layer: NodeId,
    snapshot: Option<RasterSurface>,
    committed: bool,
}

impl ScopedEdit<'_> {
    pub fn surface_mut(&mut self) -> EngineResult<&mut RasterSurface> {
        self.engine.store.layer_content_mut(self.layer)
    }

    /// Keep the edit and mark `dirty` for the next recomposite.
    pub fn commit(mut self, dirty: PixelRect) {
        self.committed = true;
        self.snapshot = None;
        self.engine.compositor.mark_dirty(self.layer, dirty);
    }
}

impl Drop for ScopedEdit<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Some(snapshot) = self.snapshot.take() {
            // The layer existed and was unlocked at begin_edit; the borrow
            // on the engine guarantees nothing changed since.
            if let Err(err) = self.engine.store.set_layer_content(self.layer, snapshot) {
                tracing::warn!(?err, "failed to restore cancelled edit");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::color::Color;

    fn engine() -> PaintEngine {
        PaintEngine::with_canvas(Size::new(64, 64)).unwrap()
    }

    #[test]
    fn test_edit_marks_dirty_and_composites() {
        let mut e = engine();
        let a = e.create_layer(LayerKind::Pixel, "a").unwrap();
        e.composite().unwrap();

        let rect = PixelRect::new(10, 10, 5, 5);
        e.edit_layer(a, rect, |surface| surface.fill_rect(rect, Color::RED))
            .unwrap();
        assert!(e.needs_composite());

        let out = e.composite_dirty().unwrap();
        assert_eq!(out.get_pixel(12, 12), Color::RED);
        assert_eq!(out.get_pixel(30, 30), Color::TRANSPARENT);
    }

    #[test]
    fn test_cancelled_edit_restores_surface() {
        let mut e = engine();
        let a = e.create_layer(LayerKind::Pixel, "a").unwrap();
        e.edit_layer(a, PixelRect::new(0, 0, 64, 64), |s| s.fill(Color::RED))
            .unwrap();

        {
            let mut edit = e.begin_edit(a).unwrap();
            edit.surface_mut().unwrap().fill(Color::BLUE);
            // Dropped without commit.
        }
        let (bytes, _, _) = e.export(a).unwrap();
        assert_eq!(bytes[0], 255, "red channel restored");
        assert_eq!(bytes[2], 0, "blue channel restored");
    }

    #[test]
    fn test_committed_edit_is_kept() {
        let mut e = engine();
        let a = e.create_layer(LayerKind::Pixel, "a").unwrap();

        let mut edit = e.begin_edit(a).unwrap();
        edit.surface_mut().unwrap().fill(Color::BLUE);
        edit.commit(PixelRect::new(0, 0, 64, 64));

        let out = e.composite_dirty().unwrap();
        assert_eq!(out.get_pixel(5, 5), Color::BLUE);
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut e = engine();
        let a = e.create_layer(LayerKind::Pixel, "a").unwrap();
        e.edit_layer(a, PixelRect::new(0, 0, 64, 64), |s| {
            s.fill_rect(PixelRect::new(8, 8, 16, 16), Color::rgba(10, 200, 30, 255))
        })
        .unwrap();

        let (bytes, w, h) = e.export(a).unwrap();
        let imported = e.import(bytes, w, h).unwrap();

        let original = e.export(a).unwrap();
        let copy = e.export(imported).unwrap();
        assert_eq!(original, copy);
    }

    #[test]
    fn test_stamp_rejects_missing_layer() {
        let mut e = engine();
        let a = e.create_layer(LayerKind::Pixel, "a").unwrap();
        e.delete_layer(a).unwrap();
        assert!(matches!(
            e.stamp(a, Point::new(10.0, 10.0), 5.0, 1.0, 0.5),
            Err(EngineError::InvalidLayerId(_))
        ));
    }

    #[test]
    fn test_delete_drops_displacement_data() {
        let mut e = engine();
        let a = e.create_layer(LayerKind::Pixel, "a").unwrap();
        e.stamp(a, Point::new(20.0, 20.0), 8.0, 1.0, 1.0).unwrap();
        e.delete_layer(a).unwrap();
        // Re-creating displacement data for the dead id would be a bug in
        // the caller; the engine side must have released it.
        assert!(!e.displacement.has_layer(a));
    }
}
