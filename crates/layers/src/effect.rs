//! Layer effects.

use common::color::Color;
use common::error::{EngineError, EngineResult};

/// Store-scoped effect identifier, allocated by `LayerStore::add_effect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EffectId(pub u64);

/// One entry in a layer's ordered effect list.
#[derive(Clone, Debug)]
pub struct Effect {
    pub id: EffectId,
    pub enabled: bool,
    pub kind: EffectKind,
}

/// Effect type with its parameters. Fixed enumeration; unknown names are
/// rejected at the command boundary via [`EffectKind::from_name`].
#[derive(Clone, Debug, PartialEq)]
pub enum EffectKind {
    DropShadow {
        offset_x: f32,
        offset_y: f32,
        blur: f32,
        color: Color,
    },
    InnerShadow {
        offset_x: f32,
        offset_y: f32,
        blur: f32,
        color: Color,
    },
    OuterGlow {
        radius: f32,
        color: Color,
    },
    InnerGlow {
        radius: f32,
        color: Color,
    },
    BevelEmboss {
        depth: f32,
        highlight: Color,
        shadow: Color,
    },
    Brightness {
        /// -1.0 darkens to black, 1.0 lightens to white.
        amount: f32,
    },
}

impl EffectKind {
    /// Build an effect with default parameters from a UI type name.
    pub fn from_name(name: &str) -> EngineResult<Self> {
        match name {
            "drop-shadow" => Ok(EffectKind::DropShadow {
                offset_x: 4.0,
                offset_y: 4.0,
                blur: 4.0,
                color: Color::rgba(0, 0, 0, 160),
            }),
            "inner-shadow" => Ok(EffectKind::InnerShadow {
                offset_x: 2.0,
                offset_y: 2.0,
                blur: 3.0,
                color: Color::rgba(0, 0, 0, 160),
            }),
            "outer-glow" => Ok(EffectKind::OuterGlow {
                radius: 6.0,
                color: Color::rgba(255, 255, 190, 200),
            }),
            "inner-glow" => Ok(EffectKind::InnerGlow {
                radius: 4.0,
                color: Color::rgba(255, 255, 190, 200),
            }),
            "bevel-emboss" => Ok(EffectKind::BevelEmboss {
                depth: 2.0,
                highlight: Color::rgba(255, 255, 255, 150),
                shadow: Color::rgba(0, 0, 0, 150),
            }),
            "brightness" => Ok(EffectKind::Brightness { amount: 0.0 }),
            other => Err(EngineError::invalid_effect(other)),
        }
    }

    /// How far, in pixels, an edit to the source can shift this effect's
    /// output. The compositor widens dirty regions by this much.
    pub fn extent(&self) -> f32 {
        match self {
            EffectKind::DropShadow {
                offset_x,
                offset_y,
                blur,
                ..
            }
            | EffectKind::InnerShadow {
                offset_x,
                offset_y,
                blur,
                ..
            } => offset_x.abs().max(offset_y.abs()) + blur,
            EffectKind::OuterGlow { radius, .. } | EffectKind::InnerGlow { radius, .. } => *radius,
            EffectKind::BevelEmboss { .. } => 2.0,
            EffectKind::Brightness { .. } => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::DropShadow { .. } => "drop-shadow",
            EffectKind::InnerShadow { .. } => "inner-shadow",
            EffectKind::OuterGlow { .. } => "outer-glow",
            EffectKind::InnerGlow { .. } => "inner-glow",
            EffectKind::BevelEmboss { .. } => "bevel-emboss",
            EffectKind::Brightness { .. } => "brightness",
        }
    }
}
