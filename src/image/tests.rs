use std::f32::consts::TAU;

use super::*;
use Color as C;

fn mkimage<const W: usize, const H: usize>(data: [[Color; W]; H]) -> Image {
    let data = data
        .into_iter()
        .flat_map(|row| row.into_iter())
        .flat_map(|col| col.0)
        .collect::<Vec<_>>();
    Image::from_rgba8(Resolution::new(W as u32, H as u32), &data)
}

#[test]
fn rotated_views() {
    #[rustfmt::skip]
    let image = mkimage([
        [C::YELLOW, C::WHITE],
        [C::WHITE, C::RED],
    ]);

    let no_rot = image.view(RotatedRect::new(
        Rect::from_top_left(0.0, 0.0, 2.0, 2.0),
        0.0,
    ));
    assert_eq!(no_rot.get(0, 0), C::YELLOW);
    assert_eq!(no_rot.get(1, 1), C::RED);

    let flip = image.view(RotatedRect::new(
        Rect::from_top_left(0.0, 0.0, 2.0, 2.0),
        TAU / 2.0,
    ));
    assert_eq!(flip.get(0, 0), C::RED);
    assert_eq!(flip.get(1, 0), C::WHITE);
    assert_eq!(flip.get(1, 1), C::YELLOW);

    let right_angle = image.view(RotatedRect::new(
        Rect::from_top_left(0.0, 0.0, 2.0, 2.0),
        TAU / 4.0,
    ));
    assert_eq!(right_angle.get(0, 0), C::WHITE);
    assert_eq!(right_angle.get(1, 0), C::RED);
    assert_eq!(right_angle.get(0, 1), C::YELLOW);
    assert_eq!(right_angle.get(1, 1), C::WHITE);

    // two chained quarter turns
    let flip = right_angle.view(RotatedRect::new(
        Rect::from_top_left(0.0, 0.0, 2.0, 2.0),
        TAU / 4.0,
    ));
    assert_eq!(flip.get(0, 0), C::RED);
    assert_eq!(flip.get(1, 1), C::YELLOW);

    let bot_right = right_angle.view(RotatedRect::new(
        Rect::from_top_left(-1.0, 1.0, 2.0, 2.0),
        0.0,
    ));
    assert_eq!(bot_right.get(0, 0), C::NULL);
    assert_eq!(bot_right.get(1, 0), C::YELLOW);
}

#[test]
fn view_outside_image() {
    let image = mkimage([[C::RED, C::GREEN]]);

    let view = image.view(Rect::bounding([[1.0, 0.0], [2.0, 1.0]]).unwrap());
    assert_eq!(view.resolution(), Resolution::new(1, 1));
    assert_eq!(view.get(0, 0), C::GREEN);

    let view = image.view(Rect::bounding([[1.0, 0.0], [100.0, 100.0]]).unwrap());
    assert_eq!(view.width(), 99);
    assert_eq!(view.height(), 100);
    assert_eq!(view.get(0, 0), C::GREEN);
    assert_eq!(view.get(0, 1), C::NULL);
    assert_eq!(view.get(1, 0), C::NULL);
}

#[test]
fn view_mut_ignores_outside_writes() {
    let mut image = mkimage([[C::RED, C::GREEN]]);
    let mut view = image.view_mut(Rect::from_top_left(1.0, 0.0, 2.0, 2.0));
    view.set(0, 0, C::BLUE);
    view.set(1, 1, C::BLUE);
    assert_eq!(image.get(0, 0), C::RED);
    assert_eq!(image.get(1, 0), C::BLUE);
}

#[test]
fn subview_offsets() {
    let image = mkimage([[C::RED, C::GREEN, C::BLUE]]);
    let view = image.view(Rect::from_top_left(1.0, 0.0, 2.0, 1.0));
    assert_eq!(view.resolution(), Resolution::new(2, 1));
    let last = view.view(Rect::from_top_left(1.0, 0.0, 1.0, 1.0));
    assert_eq!(last.get(0, 0), C::BLUE);
}

#[test]
fn resize() {
    let image = Image::from_rgba8(Resolution::new(64, 48), &C::MAGENTA.0.repeat(64 * 48));
    let resized = image.resize(Resolution::SVGA);
    assert_eq!(resized.resolution(), Resolution::new(800, 600));
    assert_eq!(resized.get(400, 300), C::MAGENTA);
    assert_eq!(resized.get(799, 599), C::MAGENTA);
}

#[test]
#[should_panic(expected = "incorrect buffer size")]
fn from_rgba8_checks_size() {
    Image::from_rgba8(Resolution::new(2, 2), &[0; 12]);
}

#[test]
fn color_debug() {
    assert_eq!(format!("{:?}", C::MAGENTA), "#ff00ffff");
    assert_eq!(format!("{:?}", C::NULL), "#00000000");
    assert_eq!(format!("{:?}", Image::new(3, 2)), "Image(3x2)");
}

#[test]
fn draw_filled_circle() {
    let mut image = Image::new(21, 21);
    draw::circle(&mut image, 10, 10, 11)
        .filled()
        .color(C::MAGENTA);
    assert_eq!(image.get(10, 10), C::MAGENTA);
    assert_eq!(image.get(14, 10), C::MAGENTA);
    assert_eq!(image.get(0, 0), C::NULL);

    let mut outline = Image::new(21, 21);
    draw::circle(&mut outline, 10, 10, 11).color(C::MAGENTA);
    assert_eq!(outline.get(10, 10), C::NULL);
}

#[test]
fn draw_clips_to_image() {
    let mut image = Image::new(4, 4);
    draw::line(&mut image, -10, 1, 10, 1).color(C::GREEN);
    draw::rect(&mut image, Rect::from_top_left(-5.0, -5.0, 100.0, 100.0));
    draw::circle(&mut image, 1000, 1000, 51).filled();
    for x in 0..4 {
        assert_eq!(image.get(x, 1), C::GREEN);
    }
    assert_eq!(image.get(0, 0), C::NULL);
}

#[test]
fn draw_rect_outline() {
    let mut image = Image::new(8, 8);
    draw::rect(&mut image, Rect::from_top_left(1.0, 1.0, 5.0, 5.0)).color(C::MAGENTA);
    assert_eq!(image.get(1, 1), C::MAGENTA);
    assert_eq!(image.get(5, 3), C::MAGENTA);
    assert_eq!(image.get(3, 3), C::NULL);
}

#[test]
fn draw_scaled_text() {
    let mut small = Image::new(200, 100);
    draw::text(&mut small, 10, 10, "30").align_left().align_top();
    let mut large = Image::new(200, 100);
    draw::text(&mut large, 10, 10, "30")
        .scale(3)
        .align_left()
        .align_top();

    let count = |image: &Image| {
        image
            .data()
            .chunks(4)
            .filter(|px| *px == C::RED.0)
            .count()
    };
    let (small, large) = (count(&small), count(&large));
    assert!(small > 0);
    assert_eq!(large, small * 9);
}
