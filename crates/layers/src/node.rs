//! Layer and group nodes.

use crate::effect::Effect;
use crate::mask::Mask;
use raster::{BlendMode, RasterSurface};
use slotmap::new_key_type;
use smallvec::SmallVec;

new_key_type! {
    /// Stable opaque identifier for a layer or group node.
    pub struct NodeId;
}

/// What a leaf layer holds. Groups are a separate [`NodeKind`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    Pixel,
    Text,
    Shape,
    Adjustment,
    Background,
    SmartObject,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Pixel => "pixel",
            LayerKind::Text => "text",
            LayerKind::Shape => "shape",
            LayerKind::Adjustment => "adjustment",
            LayerKind::Background => "background",
            LayerKind::SmartObject => "smart-object",
        }
    }
}

/// A node in the layer forest.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub visible: bool,
    /// Clamped to [0, 1] on every write through the store.
    pub opacity: f32,
    /// Position within the sibling scope; unique and contiguous, renumbered
    /// on every structural change.
    pub order: u32,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

/// Tagged node payload.
#[derive(Clone, Debug)]
pub enum NodeKind {
    Layer(LayerData),
    Group(GroupData),
}

/// Payload of a leaf layer. The layer exclusively owns `content`.
#[derive(Clone, Debug)]
pub struct LayerData {
    pub kind: LayerKind,
    pub locked: bool,
    pub blend_mode: BlendMode,
    pub mask: Option<Mask>,
    /// Ordered; later effects render over earlier ones.
    pub effects: Vec<Effect>,
    pub content: RasterSurface,
}

/// Payload of a group. Children are ordered bottom-to-top.
#[derive(Clone, Debug, Default)]
pub struct GroupData {
    pub children: SmallVec<[NodeId; 4]>,
    pub collapsed: bool,
}

impl Node {
    pub fn new_layer(id: NodeId, name: String, kind: LayerKind, content: RasterSurface) -> Self {
        Self {
            id,
            name,
            visible: true,
            opacity: 1.0,
            order: 0,
            parent: None,
            kind: NodeKind::Layer(LayerData {
                kind,
                locked: false,
                blend_mode: BlendMode::Normal,
                mask: None,
                effects: Vec::new(),
                content,
            }),
        }
    }

    pub fn new_group(id: NodeId, name: String) -> Self {
        Self {
            id,
            name,
            visible: true,
            opacity: 1.0,
            order: 0,
            parent: None,
            kind: NodeKind::Group(GroupData::default()),
        }
    }

    #[inline]
    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group(_))
    }

    pub fn as_layer(&self) -> Option<&LayerData> {
        match &self.kind {
            NodeKind::Layer(layer) => Some(layer),
            NodeKind::Group(_) => None,
        }
    }

    pub fn as_layer_mut(&mut self) -> Option<&mut LayerData> {
        match &mut self.kind {
            NodeKind::Layer(layer) => Some(layer),
            NodeKind::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupData> {
        match &self.kind {
            NodeKind::Group(group) => Some(group),
            NodeKind::Layer(_) => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut GroupData> {
        match &mut self.kind {
            NodeKind::Group(group) => Some(group),
            NodeKind::Layer(_) => None,
        }
    }
}
