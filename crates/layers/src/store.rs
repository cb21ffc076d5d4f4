//! The ordered layer forest and its mutation API.

use crate::effect::{Effect, EffectId, EffectKind};
use crate::mask::Mask;
use crate::node::{LayerKind, Node, NodeId, NodeKind};
use common::error::{EngineError, EngineResult};
use common::geometry::Size;
use raster::surface::MAX_SURFACE_DIM;
use raster::{BlendMode, RasterSurface};
use slotmap::SlotMap;
use smallvec::SmallVec;

/// Direction for [`LayerStore::reorder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReorderDirection {
    Up,
    Down,
}

/// Arena-backed store of layers and groups.
///
/// Top-level nodes and group children are kept bottom-to-top; a node's
/// `order` field always equals its index within its sibling scope.
pub struct LayerStore {
    nodes: SlotMap<NodeId, Node>,
    roots: Vec<NodeId>,
    canvas: Size,
    selection: Option<NodeId>,
    next_effect_id: u64,
}

impl LayerStore {
    /// Create an empty store for a canvas of the given size.
    pub fn new(canvas: Size) -> EngineResult<Self> {
        if canvas.is_empty() || canvas.width > MAX_SURFACE_DIM || canvas.height > MAX_SURFACE_DIM {
            return Err(EngineError::SurfaceAllocation {
                width: canvas.width,
                height: canvas.height,
            });
        }
        Ok(Self {
            nodes: SlotMap::with_key(),
            roots: Vec::new(),
            canvas,
            selection: None,
            next_effect_id: 1,
        })
    }

    #[inline]
    pub fn canvas(&self) -> Size {
        self.canvas
    }

    /// Top-level nodes, bottom-to-top.
    #[inline]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over every node in the arena, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    // ----- creation / deletion -------------------------------------------

    /// Allocate a new leaf layer with a canvas-sized surface, appended at the
    /// top of the top-level z-order.
    pub fn create(&mut self, kind: LayerKind, name: impl Into<String>) -> EngineResult<NodeId> {
        let content = RasterSurface::new(self.canvas.width, self.canvas.height)?;
        let id = self
            .nodes
            .insert_with_key(|id| Node::new_layer(id, name.into(), kind, content));
        self.roots.push(id);
        self.renumber(None);
        tracing::debug!(?id, kind = kind.as_str(), "layer created");
        Ok(id)
    }

    /// Remove a node. Deleting a group deletes all of its descendants.
    pub fn delete(&mut self, id: NodeId) -> EngineResult<()> {
        self.require(id)?;
        let parent = self.nodes[id].parent;
        self.remove_from_scope(parent, id);

        let mut doomed = vec![id];
        let mut i = 0;
        while i < doomed.len() {
            if let Some(group) = self.nodes[doomed[i]].as_group() {
                doomed.extend(group.children.iter().copied());
            }
            i += 1;
        }
        for dead in doomed {
            self.nodes.remove(dead);
            if self.selection == Some(dead) {
                self.selection = None;
            }
        }

        self.renumber(parent);
        Ok(())
    }

    /// Deep-copy a node (and, for groups, its whole subtree). The duplicate
    /// is placed directly above the source in its sibling scope.
    pub fn duplicate(&mut self, id: NodeId) -> EngineResult<NodeId> {
        self.require(id)?;
        let parent = self.nodes[id].parent;
        let copy = self.clone_subtree(id, parent);

        let index = self.index_in_scope(parent, id);
        self.insert_into_scope(parent, index + 1, copy);
        self.renumber(parent);
        Ok(copy)
    }

    fn clone_subtree(&mut self, id: NodeId, parent: Option<NodeId>) -> NodeId {
        let mut node = self.nodes[id].clone();
        node.parent = parent;
        let child_ids: SmallVec<[NodeId; 4]> = match &node.kind {
            NodeKind::Group(group) => group.children.clone(),
            NodeKind::Layer(_) => SmallVec::new(),
        };
        if let NodeKind::Group(group) = &mut node.kind {
            group.children.clear();
        }

        let copy = self.nodes.insert_with_key(|new_id| {
            node.id = new_id;
            node
        });

        for child in child_ids {
            let child_copy = self.clone_subtree(child, Some(copy));
            if let Some(group) = self.nodes[copy].as_group_mut() {
                group.children.push(child_copy);
            }
        }
        self.renumber(Some(copy));
        copy
    }

    // ----- ordering ------------------------------------------------------

    /// Swap a node with its adjacent sibling. No-op at either boundary.
    pub fn reorder(&mut self, id: NodeId, direction: ReorderDirection) -> EngineResult<()> {
        self.require(id)?;
        let parent = self.nodes[id].parent;
        let index = self.index_in_scope(parent, id);
        let len = self.scope(parent).len();

        let swap_with = match direction {
            ReorderDirection::Up if index + 1 < len => index + 1,
            ReorderDirection::Down if index > 0 => index - 1,
            _ => return Ok(()),
        };

        match parent {
            None => self.roots.swap(index, swap_with),
            Some(gid) => {
                if let Some(group) = self.nodes[gid].as_group_mut() {
                    group.children.swap(index, swap_with);
                }
            }
        }
        self.renumber(parent);
        Ok(())
    }

    // ----- validated setters ---------------------------------------------

    pub fn set_opacity(&mut self, id: NodeId, opacity: f32) -> EngineResult<()> {
        self.require_mut(id)?.opacity = opacity.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> EngineResult<()> {
        self.require_mut(id)?.visible = visible;
        Ok(())
    }

    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> EngineResult<()> {
        self.require_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn set_locked(&mut self, id: NodeId, locked: bool) -> EngineResult<()> {
        self.require_layer_mut(id)?.locked = locked;
        Ok(())
    }

    pub fn set_blend_mode(&mut self, id: NodeId, mode: BlendMode) -> EngineResult<()> {
        self.require_layer_mut(id)?.blend_mode = mode;
        Ok(())
    }

    /// Set a blend mode from its UI name. Unknown names fail with
    /// `InvalidBlendMode` and leave the layer unchanged.
    pub fn set_blend_mode_name(&mut self, id: NodeId, name: &str) -> EngineResult<()> {
        self.require_layer(id)?;
        let mode = BlendMode::parse(name)?;
        self.set_blend_mode(id, mode)
    }

    // ----- effects -------------------------------------------------------

    pub fn add_effect(&mut self, id: NodeId, kind: EffectKind) -> EngineResult<EffectId> {
        self.require_layer(id)?;
        let effect_id = EffectId(self.next_effect_id);
        self.next_effect_id += 1;
        self.require_layer_mut(id)?.effects.push(Effect {
            id: effect_id,
            enabled: true,
            kind,
        });
        Ok(effect_id)
    }

    /// Add an effect by its UI type name. Unknown names fail with
    /// `InvalidEffectType` and leave the layer unchanged.
    pub fn add_effect_named(&mut self, id: NodeId, name: &str) -> EngineResult<EffectId> {
        self.require_layer(id)?;
        let kind = EffectKind::from_name(name)?;
        self.add_effect(id, kind)
    }

    /// Remove an effect by id, preserving the order of the rest.
    pub fn remove_effect(&mut self, id: NodeId, effect_id: EffectId) -> EngineResult<()> {
        let layer = self.require_layer_mut(id)?;
        let before = layer.effects.len();
        layer.effects.retain(|e| e.id != effect_id);
        if layer.effects.len() == before {
            return Err(EngineError::invalid(format!(
                "no effect {effect_id:?} on layer"
            )));
        }
        Ok(())
    }

    pub fn set_effect_enabled(
        &mut self,
        id: NodeId,
        effect_id: EffectId,
        enabled: bool,
    ) -> EngineResult<()> {
        let layer = self.require_layer_mut(id)?;
        match layer.effects.iter_mut().find(|e| e.id == effect_id) {
            Some(effect) => {
                effect.enabled = enabled;
                Ok(())
            }
            None => Err(EngineError::invalid(format!(
                "no effect {effect_id:?} on layer"
            ))),
        }
    }

    // ----- masks ---------------------------------------------------------

    /// Attach a mask, clamping its bounds to the canvas.
    pub fn set_mask(&mut self, id: NodeId, mut mask: Mask) -> EngineResult<()> {
        let canvas = self.canvas;
        mask.clamp_bounds(canvas);
        self.require_layer_mut(id)?.mask = Some(mask);
        Ok(())
    }

    pub fn remove_mask(&mut self, id: NodeId) -> EngineResult<()> {
        self.require_layer_mut(id)?.mask = None;
        Ok(())
    }

    pub fn set_mask_enabled(&mut self, id: NodeId, enabled: bool) -> EngineResult<()> {
        match &mut self.require_layer_mut(id)?.mask {
            Some(mask) => {
                mask.enabled = enabled;
                Ok(())
            }
            None => Err(EngineError::invalid("layer has no mask")),
        }
    }

    // ----- grouping ------------------------------------------------------

    /// Create a group containing the given siblings, preserving their
    /// relative order. The group lands at the bottom-most member's former
    /// position.
    pub fn group(&mut self, ids: &[NodeId]) -> EngineResult<NodeId> {
        if ids.is_empty() {
            return Err(EngineError::invalid("cannot group zero layers"));
        }
        for &id in ids {
            self.require(id)?;
        }
        let parent = self.nodes[ids[0]].parent;
        for &id in ids {
            if self.nodes[id].parent != parent {
                return Err(EngineError::invalid("grouped layers must be siblings"));
            }
        }

        let mut indices: Vec<usize> = ids.iter().map(|&id| self.index_in_scope(parent, id)).collect();
        indices.sort_unstable();
        let insert_at = indices[0];

        // Members in bottom-to-top scope order, not selection order.
        let scope: Vec<NodeId> = self.scope(parent).to_vec();
        let members: SmallVec<[NodeId; 4]> = scope
            .iter()
            .copied()
            .filter(|id| ids.contains(id))
            .collect();

        let gid = self
            .nodes
            .insert_with_key(|id| Node::new_group(id, "Group".to_string()));
        self.nodes[gid].parent = parent;

        for &member in &members {
            self.remove_from_scope(parent, member);
            self.nodes[member].parent = Some(gid);
        }
        if let Some(group) = self.nodes[gid].as_group_mut() {
            group.children = members;
        }
        self.insert_into_scope(parent, insert_at, gid);
        self.renumber(parent);
        self.renumber(Some(gid));
        Ok(gid)
    }

    /// Promote a group's children to the parent scope at the group's former
    /// position, then delete the empty group.
    pub fn ungroup(&mut self, gid: NodeId) -> EngineResult<()> {
        self.require(gid)?;
        let children: Vec<NodeId> = match self.nodes[gid].as_group() {
            Some(group) => group.children.iter().copied().collect(),
            None => return Err(EngineError::invalid_id(format!("{gid:?} is not a group"))),
        };

        let parent = self.nodes[gid].parent;
        let index = self.index_in_scope(parent, gid);
        self.remove_from_scope(parent, gid);

        for (offset, &child) in children.iter().enumerate() {
            self.nodes[child].parent = parent;
            self.insert_into_scope(parent, index + offset, child);
        }
        self.nodes.remove(gid);
        if self.selection == Some(gid) {
            self.selection = None;
        }
        self.renumber(parent);
        Ok(())
    }

    /// Move a node into a group, appended at the top of the group's stack.
    ///
    /// Rejected with `CyclicGroup` when the target is the node itself or one
    /// of its descendants.
    pub fn move_into_group(&mut self, id: NodeId, gid: NodeId) -> EngineResult<()> {
        self.require(id)?;
        if self.require(gid)?.as_group().is_none() {
            return Err(EngineError::invalid_id(format!("{gid:?} is not a group")));
        }
        if id == gid || self.is_descendant(gid, id) {
            return Err(EngineError::cyclic(format!("{gid:?} is inside {id:?}")));
        }

        let old_parent = self.nodes[id].parent;
        self.remove_from_scope(old_parent, id);
        self.nodes[id].parent = Some(gid);
        if let Some(group) = self.nodes[gid].as_group_mut() {
            group.children.push(id);
        }
        self.renumber(old_parent);
        self.renumber(Some(gid));
        Ok(())
    }

    fn is_descendant(&self, candidate: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.nodes[candidate].parent;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.nodes[p].parent;
        }
        false
    }

    // ----- merge ---------------------------------------------------------

    /// Replace a set of siblings with a single pixel layer holding their
    /// pre-composited surface. The new layer takes the topmost member's
    /// z-position. The compositing itself happens in the compositor crate;
    /// this swap is atomic from the store's point of view.
    pub fn replace_with_merged(
        &mut self,
        ids: &[NodeId],
        name: impl Into<String>,
        surface: RasterSurface,
    ) -> EngineResult<NodeId> {
        if ids.is_empty() {
            return Err(EngineError::invalid("cannot merge zero layers"));
        }
        if surface.size() != self.canvas {
            return Err(EngineError::invalid("merged surface must be canvas-sized"));
        }
        for &id in ids {
            self.require(id)?;
        }
        let parent = self.nodes[ids[0]].parent;
        for &id in ids {
            if self.nodes[id].parent != parent {
                return Err(EngineError::invalid("merged layers must be siblings"));
            }
        }

        let top_index = ids
            .iter()
            .map(|&id| self.index_in_scope(parent, id))
            .max()
            .unwrap_or(0);
        let below_top = ids
            .iter()
            .filter(|&&id| self.index_in_scope(parent, id) < top_index)
            .count();
        let insert_at = top_index - below_top;

        for &id in ids {
            self.delete(id)?;
        }

        let merged = self.nodes.insert_with_key(|id| {
            let mut node = Node::new_layer(id, name.into(), LayerKind::Pixel, surface);
            node.parent = parent;
            node
        });
        self.insert_into_scope(parent, insert_at, merged);
        self.renumber(parent);
        Ok(merged)
    }

    // ----- selection -----------------------------------------------------

    /// Select a node. Selecting a nonexistent id clears the selection
    /// rather than failing.
    pub fn select(&mut self, id: Option<NodeId>) {
        self.selection = id.filter(|&id| self.nodes.contains_key(id));
    }

    #[inline]
    pub fn selection(&self) -> Option<NodeId> {
        self.selection
    }

    // ----- canvas / content ----------------------------------------------

    /// Resize the canvas. Every layer surface is reallocated (overlapping
    /// content is preserved); mask bounds are re-clamped. Validates all
    /// allocations before touching any layer.
    pub fn resize(&mut self, canvas: Size) -> EngineResult<()> {
        if canvas.is_empty() || canvas.width > MAX_SURFACE_DIM || canvas.height > MAX_SURFACE_DIM {
            return Err(EngineError::SurfaceAllocation {
                width: canvas.width,
                height: canvas.height,
            });
        }

        let layer_ids: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, node)| !node.is_group())
            .map(|(id, _)| id)
            .collect();

        let mut replacements = Vec::with_capacity(layer_ids.len());
        for &id in &layer_ids {
            let mut surface = RasterSurface::new(canvas.width, canvas.height)?;
            let old = &self.nodes[id].as_layer().unwrap().content;
            surface.copy_region(old, surface.bounds());
            replacements.push(surface);
        }

        for (id, surface) in layer_ids.into_iter().zip(replacements) {
            let layer = self.nodes[id].as_layer_mut().unwrap();
            layer.content = surface;
            if let Some(mask) = &mut layer.mask {
                mask.clamp_bounds(canvas);
            }
        }
        self.canvas = canvas;
        tracing::debug!(width = canvas.width, height = canvas.height, "canvas resized");
        Ok(())
    }

    pub fn layer_content(&self, id: NodeId) -> EngineResult<&RasterSurface> {
        Ok(&self.require_layer(id)?.content)
    }

    /// Mutable access to a layer's pixels. Locked layers are rejected.
    pub fn layer_content_mut(&mut self, id: NodeId) -> EngineResult<&mut RasterSurface> {
        let layer = self.require_layer_mut(id)?;
        if layer.locked {
            return Err(EngineError::invalid("layer is locked"));
        }
        Ok(&mut layer.content)
    }

    /// Replace a layer's surface wholesale. Must be canvas-sized.
    pub fn set_layer_content(&mut self, id: NodeId, surface: RasterSurface) -> EngineResult<()> {
        if surface.size() != self.canvas {
            return Err(EngineError::invalid("surface must be canvas-sized"));
        }
        let layer = self.require_layer_mut(id)?;
        if layer.locked {
            return Err(EngineError::invalid("layer is locked"));
        }
        layer.content = surface;
        Ok(())
    }

    // ----- internals -----------------------------------------------------

    fn require(&self, id: NodeId) -> EngineResult<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| EngineError::invalid_id(format!("{id:?}")))
    }

    fn require_mut(&mut self, id: NodeId) -> EngineResult<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| EngineError::invalid_id(format!("{id:?}")))
    }

    fn require_layer(&self, id: NodeId) -> EngineResult<&crate::node::LayerData> {
        self.require(id)?
            .as_layer()
            .ok_or_else(|| EngineError::invalid_id(format!("{id:?} is not a layer")))
    }

    fn require_layer_mut(&mut self, id: NodeId) -> EngineResult<&mut crate::node::LayerData> {
        self.require_mut(id)?
            .as_layer_mut()
            .ok_or_else(|| EngineError::invalid_id(format!("{id:?} is not a layer")))
    }

    fn scope(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            None => &self.roots,
            Some(gid) => self
                .nodes
                .get(gid)
                .and_then(|n| n.as_group())
                .map(|g| g.children.as_slice())
                .unwrap_or(&[]),
        }
    }

    fn index_in_scope(&self, parent: Option<NodeId>, id: NodeId) -> usize {
        self.scope(parent)
            .iter()
            .position(|&n| n == id)
            .expect("node missing from its own sibling scope")
    }

    fn remove_from_scope(&mut self, parent: Option<NodeId>, id: NodeId) {
        match parent {
            None => self.roots.retain(|&n| n != id),
            Some(gid) => {
                if let Some(group) = self.nodes.get_mut(gid).and_then(|n| n.as_group_mut()) {
                    group.children.retain(|n| *n != id);
                }
            }
        }
    }

    fn insert_into_scope(&mut self, parent: Option<NodeId>, index: usize, id: NodeId) {
        match parent {
            None => {
                let index = index.min(self.roots.len());
                self.roots.insert(index, id);
            }
            Some(gid) => {
                if let Some(group) = self.nodes.get_mut(gid).and_then(|n| n.as_group_mut()) {
                    let index = index.min(group.children.len());
                    group.children.insert(index, id);
                }
            }
        }
    }

    /// Reassign contiguous `order` values within a sibling scope.
    fn renumber(&mut self, parent: Option<NodeId>) {
        let scope: Vec<NodeId> = self.scope(parent).to_vec();
        for (index, id) in scope.into_iter().enumerate() {
            self.nodes[id].order = index as u32;
        }
    }
}
