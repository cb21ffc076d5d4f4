//! End-to-end behavior of the engine facade: compositing equivalences,
//! ordering round trips, merge fidelity and update notifications.

use common::color::Color;
use common::geometry::{PixelRect, Point, Size};
use engine::{PaintEngine, UpdateKind};
use layers::{LayerKind, NodeId, ReorderDirection};
use raster::BlendMode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn engine() -> PaintEngine {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    PaintEngine::with_canvas(Size::new(64, 64)).unwrap()
}

fn fill_layer(e: &mut PaintEngine, id: NodeId, color: Color) {
    let full = PixelRect::new(0, 0, 64, 64);
    e.edit_layer(id, full, |s| s.fill(color)).unwrap();
}

#[test]
fn invisible_layer_composites_like_zero_opacity() {
    let mut hidden = engine();
    let mut faded = engine();

    for e in [&mut hidden, &mut faded] {
        let base = e.create_layer(LayerKind::Pixel, "base").unwrap();
        fill_layer(e, base, Color::rgb(40, 80, 120));
    }

    let h = hidden.create_layer(LayerKind::Pixel, "top").unwrap();
    fill_layer(&mut hidden, h, Color::RED);
    hidden.set_visible(h, false).unwrap();

    let f = faded.create_layer(LayerKind::Pixel, "top").unwrap();
    fill_layer(&mut faded, f, Color::RED);
    faded.set_opacity(f, 0.0).unwrap();

    let a = hidden.composite().unwrap();
    let b = faded.composite().unwrap();
    assert_eq!(a.as_bytes(), b.as_bytes());
    assert_eq!(a.get_pixel(10, 10), Color::rgb(40, 80, 120));
}

#[test]
fn composite_is_idempotent() {
    let mut e = engine();
    let base = e.create_layer(LayerKind::Pixel, "base").unwrap();
    fill_layer(&mut e, base, Color::rgb(200, 100, 50));
    let top = e.create_layer(LayerKind::Pixel, "top").unwrap();
    e.edit_layer(top, PixelRect::new(8, 8, 20, 20), |s| {
        s.fill_rect(PixelRect::new(8, 8, 20, 20), Color::rgba(0, 0, 255, 128))
    })
    .unwrap();
    e.set_blend_mode(top, BlendMode::Screen).unwrap();

    let first = e.composite().unwrap();
    let second = e.composite().unwrap();
    assert_eq!(first.as_bytes(), second.as_bytes());
}

#[test]
fn move_up_then_down_restores_order() {
    let mut e = engine();
    let a = e.create_layer(LayerKind::Pixel, "a").unwrap();
    let b = e.create_layer(LayerKind::Pixel, "b").unwrap();
    let c = e.create_layer(LayerKind::Pixel, "c").unwrap();
    let before = e.store().roots().to_vec();
    assert_eq!(before, vec![a, b, c]);

    e.reorder(b, ReorderDirection::Up).unwrap();
    assert_eq!(e.store().roots(), &[a, c, b]);
    e.reorder(b, ReorderDirection::Down).unwrap();
    assert_eq!(e.store().roots(), before.as_slice());
}

#[test]
fn duplicate_survives_deleting_the_original() {
    let mut e = engine();
    let a = e.create_layer(LayerKind::Pixel, "a").unwrap();
    fill_layer(&mut e, a, Color::rgb(12, 34, 56));

    let copy = e.duplicate_layer(a).unwrap();
    e.delete_layer(a).unwrap();

    let (bytes, _, _) = e.export(copy).unwrap();
    assert_eq!(&bytes[0..4], &[12, 34, 56, 255]);
}

#[test]
fn multiply_at_half_opacity_over_red() {
    let mut e = engine();
    let base = e.create_layer(LayerKind::Pixel, "base").unwrap();
    fill_layer(&mut e, base, Color::RED);
    let top = e.create_layer(LayerKind::Pixel, "top").unwrap();
    fill_layer(&mut e, top, Color::BLUE);
    e.set_blend_mode(top, BlendMode::Multiply).unwrap();
    e.set_opacity(top, 0.5).unwrap();

    let out = e.composite().unwrap();
    let px = out.get_pixel(32, 32);
    // Multiply drives red to 0 at full strength; at 50% it lands halfway.
    assert!((px.r as i32 - 128).abs() <= 1, "r = {}", px.r);
    assert_eq!(px.g, 0);
    assert_eq!(px.b, 0);
    assert_eq!(px.a, 255);
}

#[test]
fn merge_preserves_the_composite() {
    let mut e = engine();
    let a = e.create_layer(LayerKind::Pixel, "a").unwrap();
    e.edit_layer(a, PixelRect::new(0, 0, 64, 64), |s| {
        s.fill_rect(PixelRect::new(4, 4, 40, 40), Color::rgba(220, 40, 40, 255))
    })
    .unwrap();

    let b = e.create_layer(LayerKind::Pixel, "b").unwrap();
    e.edit_layer(b, PixelRect::new(0, 0, 64, 64), |s| {
        s.fill_rect(PixelRect::new(20, 20, 40, 40), Color::rgba(40, 220, 40, 160))
    })
    .unwrap();
    e.set_blend_mode(b, BlendMode::Multiply).unwrap();
    e.set_opacity(b, 0.7).unwrap();

    let before = e.composite().unwrap();
    let merged = e.merge_layers(&[a, b], "merged").unwrap();
    let after = e.composite().unwrap();

    assert_eq!(before.as_bytes(), after.as_bytes());
    assert_eq!(e.store().roots(), &[merged]);
}

#[test]
fn flatten_collapses_visible_roots_only() {
    let mut e = engine();
    let a = e.create_layer(LayerKind::Pixel, "a").unwrap();
    fill_layer(&mut e, a, Color::rgb(10, 10, 10));
    let hidden = e.create_layer(LayerKind::Pixel, "hidden").unwrap();
    fill_layer(&mut e, hidden, Color::RED);
    e.set_visible(hidden, false).unwrap();
    let b = e.create_layer(LayerKind::Pixel, "b").unwrap();
    e.edit_layer(b, PixelRect::new(0, 0, 64, 64), |s| {
        s.fill_rect(PixelRect::new(0, 0, 8, 8), Color::BLUE)
    })
    .unwrap();

    let before = e.composite().unwrap();
    let flat = e.flatten().unwrap();
    let after = e.composite().unwrap();

    assert_eq!(before.as_bytes(), after.as_bytes());
    // The hidden layer is left in place, below or above the flattened one.
    assert_eq!(e.store().roots().len(), 2);
    assert!(e.store().roots().contains(&flat));
    assert!(e.store().roots().contains(&hidden));
}

#[test]
fn dirty_composite_matches_full_composite() {
    let mut e = engine();
    let base = e.create_layer(LayerKind::Pixel, "base").unwrap();
    fill_layer(&mut e, base, Color::rgb(90, 90, 90));
    let top = e.create_layer(LayerKind::Pixel, "top").unwrap();
    e.composite().unwrap();

    let rect = PixelRect::new(14, 14, 10, 10);
    e.edit_layer(top, rect, |s| s.fill_rect(rect, Color::rgba(255, 0, 0, 200)))
        .unwrap();

    let scoped = e.composite_dirty().unwrap().as_bytes().to_vec();
    // Force a structural change so the next pass rebuilds everything.
    let dummy = e.create_layer(LayerKind::Pixel, "dummy").unwrap();
    e.delete_layer(dummy).unwrap();
    let full = e.composite().unwrap();
    assert_eq!(scoped, full.as_bytes());
}

#[test]
fn composite_notifies_only_when_output_changes() {
    let mut e = engine();
    let a = e.create_layer(LayerKind::Pixel, "a").unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    e.subscribe(move |kind| {
        if kind == UpdateKind::Composite {
            c.fetch_add(1, Ordering::SeqCst);
        }
    });

    e.composite().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    // Nothing dirty: the published surface is reused, no notification.
    e.composite_dirty().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    fill_layer(&mut e, a, Color::RED);
    e.composite_dirty().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn stamp_notifies_displacement_for_that_layer() {
    let mut e = engine();
    let a = e.create_layer(LayerKind::Pixel, "a").unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    e.subscribe(move |kind| s.lock().unwrap().push(kind));

    e.stamp(a, Point::new(30.0, 30.0), 6.0, 1.0, 0.8).unwrap();
    assert_eq!(seen.lock().unwrap().as_slice(), &[UpdateKind::Displacement(a)]);

    // The stamp shows up in the height field and normal map.
    let center = e.height_field(a).unwrap().get(30, 30);
    assert!(center > 0.7, "center height {center}");
    let n = e.normal_map(a).unwrap().get_pixel(26, 30);
    assert!(n.r > 128);
}

#[test]
fn unsubscribe_stops_notifications() {
    let mut e = engine();
    let a = e.create_layer(LayerKind::Pixel, "a").unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let sub = e.subscribe(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    e.unsubscribe(sub);

    e.stamp(a, Point::new(10.0, 10.0), 4.0, 1.0, 1.0).unwrap();
    e.composite().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn group_then_ungroup_keeps_members() {
    let mut e = engine();
    let a = e.create_layer(LayerKind::Pixel, "a").unwrap();
    let b = e.create_layer(LayerKind::Pixel, "b").unwrap();
    let c = e.create_layer(LayerKind::Pixel, "c").unwrap();

    let gid = e.group(&[a, b]).unwrap();
    assert_eq!(e.store().roots(), &[gid, c]);

    e.ungroup(gid).unwrap();
    assert_eq!(e.store().roots(), &[a, b, c]);
}

#[test]
fn resize_preserves_layer_content_overlap() {
    let mut e = engine();
    let a = e.create_layer(LayerKind::Pixel, "a").unwrap();
    e.edit_layer(a, PixelRect::new(0, 0, 64, 64), |s| {
        s.fill_rect(PixelRect::new(0, 0, 16, 16), Color::RED)
    })
    .unwrap();

    e.resize(Size::new(32, 96)).unwrap();
    let out = e.composite().unwrap();
    assert_eq!(out.size(), Size::new(32, 96));
    assert_eq!(out.get_pixel(8, 8), Color::RED);
    assert_eq!(out.get_pixel(8, 80), Color::TRANSPARENT);
}
