//! Layer effect rendering.
//!
//! Each effect takes the layer's masked raster and produces an augmented
//! raster on the same canvas-sized grid, so effects that extend beyond the
//! layer's painted bounds (drop shadow, outer glow) have room to render.
//! Effects apply in list order; later entries render over earlier ones.

use common::color::Color;
use layers::EffectKind;
use raster::RasterSurface;

pub fn apply_effect(kind: &EffectKind, src: &RasterSurface) -> RasterSurface {
    match kind {
        EffectKind::DropShadow {
            offset_x,
            offset_y,
            blur,
            color,
        } => drop_shadow(src, *offset_x, *offset_y, *blur, *color),
        EffectKind::InnerShadow {
            offset_x,
            offset_y,
            blur,
            color,
        } => inner_shadow(src, *offset_x, *offset_y, *blur, *color),
        EffectKind::OuterGlow { radius, color } => outer_glow(src, *radius, *color),
        EffectKind::InnerGlow { radius, color } => inner_glow(src, *radius, *color),
        EffectKind::BevelEmboss {
            depth,
            highlight,
            shadow,
        } => bevel_emboss(src, *depth, *highlight, *shadow),
        EffectKind::Brightness { amount } => brightness(src, *amount),
    }
}

/// Extract the alpha channel as f32 coverage.
fn silhouette(src: &RasterSurface) -> Vec<f32> {
    src.as_bytes()
        .chunks_exact(4)
        .map(|px| px[3] as f32 / 255.0)
        .collect()
}

/// Separable box blur, two passes. Radius 0 is a copy.
fn box_blur(channel: &[f32], width: u32, height: u32, radius: f32) -> Vec<f32> {
    let r = radius.round() as i64;
    if r <= 0 {
        return channel.to_vec();
    }
    let (w, h) = (width as i64, height as i64);
    let window = (2 * r + 1) as f32;

    let mut horizontal = vec![0.0f32; channel.len()];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0.0;
            for dx in -r..=r {
                let sx = (x + dx).clamp(0, w - 1);
                sum += channel[(y * w + sx) as usize];
            }
            horizontal[(y * w + x) as usize] = sum / window;
        }
    }

    let mut blurred = vec![0.0f32; channel.len()];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0.0;
            for dy in -r..=r {
                let sy = (y + dy).clamp(0, h - 1);
                sum += horizontal[(sy * w + x) as usize];
            }
            blurred[(y * w + x) as usize] = sum / window;
        }
    }
    blurred
}

fn sample_offset(channel: &[f32], width: u32, height: u32, x: i64, y: i64) -> f32 {
    if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
        return 0.0;
    }
    channel[(y * width as i64 + x) as usize]
}

/// Blurred silhouette, offset, colored, with the source rendered on top.
fn drop_shadow(src: &RasterSurface, dx: f32, dy: f32, blur: f32, color: Color) -> RasterSurface {
    let (w, h) = (src.width(), src.height());
    let alpha = silhouette(src);
    let blurred = box_blur(&alpha, w, h, blur);
    let (dx, dy) = (dx.round() as i64, dy.round() as i64);

    let mut out = src.clone();
    out.clear();
    for y in 0..h {
        for x in 0..w {
            let coverage = sample_offset(&blurred, w, h, x as i64 - dx, y as i64 - dy);
            if coverage > 0.0 {
                let mut shadow = color;
                shadow.a = (color.a as f32 * coverage) as u8;
                out.set_pixel(x, y, shadow);
            }
        }
    }
    // Source renders over its own shadow.
    for y in 0..h {
        for x in 0..w {
            let px = src.get_pixel(x, y);
            if px.a > 0 {
                out.blend_pixel(x, y, px);
            }
        }
    }
    out
}

/// Shadow cast inward from the silhouette edge, drawn over the source.
fn inner_shadow(src: &RasterSurface, dx: f32, dy: f32, blur: f32, color: Color) -> RasterSurface {
    let (w, h) = (src.width(), src.height());
    let alpha = silhouette(src);
    let inverse: Vec<f32> = alpha.iter().map(|a| 1.0 - a).collect();
    let blurred = box_blur(&inverse, w, h, blur);
    let (dx, dy) = (dx.round() as i64, dy.round() as i64);

    let mut out = src.clone();
    for y in 0..h {
        for x in 0..w {
            let own = alpha[(y * w + x) as usize];
            if own == 0.0 {
                continue;
            }
            // Outside-ness shifted by the offset; 1.0 past the border.
            let sx = x as i64 - dx;
            let sy = y as i64 - dy;
            let outside = if sx < 0 || sy < 0 || sx >= w as i64 || sy >= h as i64 {
                1.0
            } else {
                blurred[(sy * w as i64 + sx) as usize]
            };
            if outside > 0.0 {
                let mut shadow = color;
                shadow.a = (color.a as f32 * outside * own) as u8;
                out.blend_pixel(x, y, shadow);
            }
        }
    }
    out
}

/// Colored halo outside the silhouette.
fn outer_glow(src: &RasterSurface, radius: f32, color: Color) -> RasterSurface {
    let (w, h) = (src.width(), src.height());
    let alpha = silhouette(src);
    let blurred = box_blur(&alpha, w, h, radius);

    let mut out = src.clone();
    out.clear();
    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            let halo = (blurred[idx] - alpha[idx]).max(0.0);
            if halo > 0.0 {
                let mut glow = color;
                glow.a = (color.a as f32 * halo.min(1.0)) as u8;
                out.set_pixel(x, y, glow);
            }
        }
    }
    for y in 0..h {
        for x in 0..w {
            let px = src.get_pixel(x, y);
            if px.a > 0 {
                out.blend_pixel(x, y, px);
            }
        }
    }
    out
}

/// Colored glow hugging the inside of the silhouette edge.
fn inner_glow(src: &RasterSurface, radius: f32, color: Color) -> RasterSurface {
    let (w, h) = (src.width(), src.height());
    let alpha = silhouette(src);
    let inverse: Vec<f32> = alpha.iter().map(|a| 1.0 - a).collect();
    let blurred = box_blur(&inverse, w, h, radius);

    let mut out = src.clone();
    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            let own = alpha[idx];
            if own == 0.0 {
                continue;
            }
            let edge = blurred[idx].min(1.0);
            if edge > 0.0 {
                let mut glow = color;
                glow.a = (color.a as f32 * edge * own) as u8;
                out.blend_pixel(x, y, glow);
            }
        }
    }
    out
}

/// Fake relief from the alpha gradient: highlight on top-left edges,
/// shadow on bottom-right.
fn bevel_emboss(src: &RasterSurface, depth: f32, highlight: Color, shadow: Color) -> RasterSurface {
    let (w, h) = (src.width(), src.height());
    let alpha = silhouette(src);
    let at = |x: i64, y: i64| sample_offset(&alpha, w, h, x, y);

    let mut out = src.clone();
    for y in 0..h {
        for x in 0..w {
            if alpha[(y * w + x) as usize] == 0.0 {
                continue;
            }
            let (xi, yi) = (x as i64, y as i64);
            let gx = at(xi + 1, yi) - at(xi - 1, yi);
            let gy = at(xi, yi + 1) - at(xi, yi - 1);
            // Light from the top-left.
            let lit = (gx + gy) * depth;
            if lit > 0.0 {
                let mut hi = highlight;
                hi.a = (highlight.a as f32 * lit.min(1.0)) as u8;
                out.blend_pixel(x, y, hi);
            } else if lit < 0.0 {
                let mut sh = shadow;
                sh.a = (shadow.a as f32 * (-lit).min(1.0)) as u8;
                out.blend_pixel(x, y, sh);
            }
        }
    }
    out
}

/// Push painted pixels toward white (positive) or black (negative).
fn brightness(src: &RasterSurface, amount: f32) -> RasterSurface {
    let amount = amount.clamp(-1.0, 1.0);
    let mut out = src.clone();
    let adjust = |c: u8| -> u8 {
        if amount >= 0.0 {
            (c as f32 + (255.0 - c as f32) * amount).min(255.0) as u8
        } else {
            (c as f32 * (1.0 + amount)).max(0.0) as u8
        }
    };
    for chunk in out.as_bytes_mut().chunks_exact_mut(4) {
        if chunk[3] == 0 {
            continue;
        }
        chunk[0] = adjust(chunk[0]);
        chunk[1] = adjust(chunk[1]);
        chunk[2] = adjust(chunk[2]);
    }
    out
}
