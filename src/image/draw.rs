//! Overlay drawing.
//!
//! Each function returns a guard that draws when dropped, so the drawing can be customized with
//! builder methods first:
//!
//! ```no_run
//! # use perceptor::image::{draw, Color, Image};
//! # let mut image = Image::new(640, 480);
//! draw::circle(&mut image, 100, 100, 31).filled().color(Color::MAGENTA);
//! draw::text(&mut image, 10, 70, "30").scale(3).align_left();
//! ```
//!
//! Everything is clipped to the image; drawing partially or completely outside of it is fine.

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    prelude::*,
    primitives::{self, Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use itertools::Itertools;

use crate::image::{AsImageViewMut, Color, ImageViewMut};
use crate::rect::Rect;

fn draw_infallible<D: Drawable<Color = Color>>(drawable: &D, target: &mut Target<'_>) {
    match drawable.draw(target) {
        Ok(_) => {}
        Err(infallible) => match infallible {},
    }
}

/// Guard returned by [`rect`].
pub struct DrawRect<'a> {
    image: ImageViewMut<'a>,
    rect: Rect,
    color: Color,
    stroke_width: u32,
}

impl DrawRect<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the stroke width (default 1).
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawRect<'_> {
    fn drop(&mut self) {
        let rectangle = Rectangle {
            top_left: Point::new(self.rect.x().round() as i32, self.rect.y().round() as i32),
            size: Size::new(
                self.rect.width().round() as u32,
                self.rect.height().round() as u32,
            ),
        };
        draw_infallible(
            &rectangle.into_styled(PrimitiveStyle::with_stroke(self.color, self.stroke_width)),
            &mut Target(self.image.reborrow()),
        );
    }
}

/// Guard returned by [`line`][line()].
pub struct DrawLine<'a> {
    image: ImageViewMut<'a>,
    start: Point,
    end: Point,
    color: Color,
    stroke_width: u32,
}

impl DrawLine<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the stroke width (default 1).
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        draw_infallible(
            &Line::new(self.start, self.end)
                .into_styled(PrimitiveStyle::with_stroke(self.color, self.stroke_width)),
            &mut Target(self.image.reborrow()),
        );
    }
}

/// Guard returned by [`text`].
pub struct DrawText<'a> {
    image: ImageViewMut<'a>,
    x: i32,
    y: i32,
    text: &'a str,
    color: Color,
    scale: u32,
    alignment: Alignment,
    baseline: Baseline,
}

impl DrawText<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Scales the 10x20 pixel font by an integer factor (default 1).
    pub fn scale(&mut self, scale: u32) -> &mut Self {
        assert!(scale > 0, "text scale must be at least 1");
        self.scale = scale;
        self
    }

    /// Aligns the top of the text with the `y` coordinate.
    pub fn align_top(&mut self) -> &mut Self {
        self.baseline = Baseline::Top;
        self
    }

    /// Aligns the baseline of the text with the `y` coordinate.
    pub fn align_baseline(&mut self) -> &mut Self {
        self.baseline = Baseline::Alphabetic;
        self
    }

    /// Aligns the left side of the text with the `x` coordinate.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let character_style = MonoTextStyle::new(&FONT_10X20, self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        let anchor = Point::new(self.x, self.y);
        let text = Text::with_text_style(self.text, anchor, character_style, text_style);
        let mut target = ScaledTarget {
            inner: Target(self.image.reborrow()),
            anchor,
            scale: self.scale as i32,
        };
        match text.draw(&mut target) {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`circle`].
pub struct DrawCircle<'a> {
    image: ImageViewMut<'a>,
    x: i32,
    y: i32,
    diameter: u32,
    stroke_width: u32,
    filled: bool,
    color: Color,
}

impl DrawCircle<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the outline width (default 1). Ignored for filled circles.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }

    /// Fills the circle instead of drawing its outline.
    pub fn filled(&mut self) -> &mut Self {
        self.filled = true;
        self
    }
}

impl Drop for DrawCircle<'_> {
    fn drop(&mut self) {
        let top_left = Point {
            x: self.x - (self.diameter / 2) as i32,
            y: self.y - (self.diameter / 2) as i32,
        };
        let circle = primitives::Circle {
            top_left,
            diameter: self.diameter,
        };
        let style = if self.filled {
            PrimitiveStyle::with_fill(self.color)
        } else {
            PrimitiveStyle::with_stroke(self.color, self.stroke_width)
        };
        draw_infallible(
            &circle.into_styled(style),
            &mut Target(self.image.reborrow()),
        );
    }
}

/// Draws an axis-aligned rectangle outline.
pub fn rect<I: AsImageViewMut>(image: &mut I, rect: Rect) -> DrawRect<'_> {
    DrawRect {
        image: image.as_view_mut(),
        rect,
        color: Color::RED,
        stroke_width: 1,
    }
}

/// Draws a line between two points.
pub fn line<I: AsImageViewMut>(
    image: &mut I,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
) -> DrawLine<'_> {
    DrawLine {
        image: image.as_view_mut(),
        start: Point::new(start_x, start_y),
        end: Point::new(end_x, end_y),
        color: Color::BLUE,
        stroke_width: 1,
    }
}

/// Draws a text string.
///
/// By default, the text is centered horizontally and vertically on `x` and `y`.
pub fn text<'a, I: AsImageViewMut>(
    image: &'a mut I,
    x: i32,
    y: i32,
    text: &'a str,
) -> DrawText<'a> {
    DrawText {
        image: image.as_view_mut(),
        x,
        y,
        text,
        color: Color::RED,
        scale: 1,
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

/// Draws a circle centered on `x` and `y`.
///
/// A circle of radius `r` around a pixel has a diameter of `2 * r + 1`.
pub fn circle<I: AsImageViewMut>(image: &mut I, x: i32, y: i32, diameter: u32) -> DrawCircle<'_> {
    DrawCircle {
        image: image.as_view_mut(),
        x,
        y,
        diameter,
        stroke_width: 1,
        filled: false,
        color: Color::GREEN,
    }
}

struct Target<'a>(ImageViewMut<'a>);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size::new(self.0.width(), self.0.height()),
        }
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(pos, color) in pixels {
            if pos.x >= 0
                && (pos.x as u32) < self.0.width()
                && pos.y >= 0
                && (pos.y as u32) < self.0.height()
            {
                self.0.set(pos.x as u32, pos.y as u32, color);
            }
        }

        Ok(())
    }
}

/// Magnifies everything drawn to it by `scale`, keeping `anchor` fixed.
struct ScaledTarget<'a> {
    inner: Target<'a>,
    anchor: Point,
    scale: i32,
}

impl Dimensions for ScaledTarget<'_> {
    fn bounding_box(&self) -> Rectangle {
        self.inner.bounding_box()
    }
}

impl DrawTarget for ScaledTarget<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (anchor, scale) = (self.anchor, self.scale);
        self.inner
            .draw_iter(pixels.into_iter().flat_map(move |Pixel(pos, color)| {
                let origin = anchor + (pos - anchor) * scale;
                (0..scale)
                    .cartesian_product(0..scale)
                    .map(move |(dy, dx)| Pixel(origin + Point::new(dx, dy), color))
            }))
    }
}
