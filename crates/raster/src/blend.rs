//! Blend modes and per-pixel compositing math.

use common::color::Color;
use common::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Blend mode for compositing. Fixed enumeration; anything else is rejected
/// at the command boundary via [`BlendMode::parse`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    SoftLight,
    HardLight,
}

impl BlendMode {
    pub const ALL: [BlendMode; 6] = [
        BlendMode::Normal,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::SoftLight,
        BlendMode::HardLight,
    ];

    /// Parse a blend mode name as it arrives from UI commands.
    pub fn parse(name: &str) -> EngineResult<Self> {
        match name {
            "normal" => Ok(BlendMode::Normal),
            "multiply" => Ok(BlendMode::Multiply),
            "screen" => Ok(BlendMode::Screen),
            "overlay" => Ok(BlendMode::Overlay),
            "soft-light" => Ok(BlendMode::SoftLight),
            "hard-light" => Ok(BlendMode::HardLight),
            other => Err(EngineError::invalid_blend(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::SoftLight => "soft-light",
            BlendMode::HardLight => "hard-light",
        }
    }

    /// Apply the separable blend function to one channel pair (0.0 - 1.0).
    #[inline]
    pub fn apply(&self, src: f32, dst: f32) -> f32 {
        match self {
            BlendMode::Normal => src,
            BlendMode::Multiply => src * dst,
            BlendMode::Screen => 1.0 - (1.0 - dst) * (1.0 - src),
            BlendMode::Overlay => hard_light(dst, src),
            BlendMode::SoftLight => soft_light(src, dst),
            BlendMode::HardLight => hard_light(src, dst),
        }
    }
}

/// Two-branch hard-light: multiply for dark source, screen for light.
/// Overlay is the same function with source and destination swapped.
#[inline]
fn hard_light(src: f32, dst: f32) -> f32 {
    if src <= 0.5 {
        2.0 * src * dst
    } else {
        1.0 - 2.0 * (1.0 - src) * (1.0 - dst)
    }
}

/// W3C piecewise soft-light.
#[inline]
fn soft_light(src: f32, dst: f32) -> f32 {
    if src <= 0.5 {
        dst - (1.0 - 2.0 * src) * dst * (1.0 - dst)
    } else {
        let d = if dst <= 0.25 {
            ((16.0 * dst - 12.0) * dst + 4.0) * dst
        } else {
            dst.sqrt()
        };
        dst + (2.0 * src - 1.0) * (d - dst)
    }
}

/// Composite one source pixel over one destination pixel.
///
/// `result_alpha = sa·opacity + da·(1 − sa·opacity)`. The blended color is
/// mixed toward the raw source where the destination is transparent, so a
/// layer painted over empty canvas keeps its own color under every mode.
pub fn blend_pixel(dst: Color, src: Color, mode: BlendMode, opacity: f32) -> Color {
    let [sr, sg, sb, sa] = src.to_f32_array();
    let [dr, dg, db, da] = dst.to_f32_array();

    let sa = sa * opacity.clamp(0.0, 1.0);
    if sa == 0.0 {
        return dst;
    }

    let out_a = sa + da * (1.0 - sa);
    if out_a == 0.0 {
        return Color::TRANSPARENT;
    }

    let channel = |s: f32, d: f32| -> f32 {
        let blended = mode.apply(s, d);
        let mixed = (1.0 - da) * s + da * blended;
        (mixed * sa + d * da * (1.0 - sa)) / out_a
    };

    Color::from_f32(channel(sr, dr), channel(sg, dg), channel(sb, db), out_a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: u8, expected: u8) {
        assert!(
            (actual as i16 - expected as i16).abs() <= 2,
            "expected ~{expected}, got {actual}"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        for mode in BlendMode::ALL {
            assert_eq!(BlendMode::parse(mode.as_str()).unwrap(), mode);
        }
        assert!(matches!(
            BlendMode::parse("dissolve"),
            Err(EngineError::InvalidBlendMode(_))
        ));
    }

    #[test]
    fn test_normal_full_opacity_replaces() {
        let out = blend_pixel(Color::RED, Color::BLUE, BlendMode::Normal, 1.0);
        assert_eq!(out, Color::BLUE);
    }

    #[test]
    fn test_multiply_half_opacity() {
        // dst = red, src = blue at 0.5: dst·(1−0.5) + (dst·src)·0.5
        let out = blend_pixel(Color::RED, Color::BLUE, BlendMode::Multiply, 0.5);
        assert_close(out.r, 128);
        assert_close(out.g, 0);
        assert_close(out.b, 0);
        assert_eq!(out.a, 255);
    }

    #[test]
    fn test_screen_lightens() {
        let gray = Color::rgb(128, 128, 128);
        let out = blend_pixel(gray, gray, BlendMode::Screen, 1.0);
        // 1 − (1−0.502)² ≈ 0.752
        assert_close(out.r, 192);
    }

    #[test]
    fn test_overlay_branches() {
        // Dark destination multiplies, light destination screens.
        let dark = blend_pixel(Color::rgb(64, 64, 64), Color::rgb(128, 128, 128), BlendMode::Overlay, 1.0);
        assert_close(dark.r, 64);
        let light = blend_pixel(Color::rgb(192, 192, 192), Color::rgb(128, 128, 128), BlendMode::Overlay, 1.0);
        assert_close(light.r, 192);
    }

    #[test]
    fn test_blend_over_transparent_dst_keeps_src_color() {
        let out = blend_pixel(Color::TRANSPARENT, Color::BLUE, BlendMode::Multiply, 1.0);
        assert_eq!(out, Color::BLUE);
    }

    #[test]
    fn test_zero_source_alpha_is_noop() {
        let out = blend_pixel(Color::RED, Color::rgba(0, 0, 255, 0), BlendMode::Normal, 1.0);
        assert_eq!(out, Color::RED);
        let out = blend_pixel(Color::RED, Color::BLUE, BlendMode::Normal, 0.0);
        assert_eq!(out, Color::RED);
    }
}
