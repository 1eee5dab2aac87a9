//! Frames, views into frames, and colors.
//!
//! Every video source hands out [`Image`]s. Networks read from an [`ImageView`], which may be
//! rotated relative to the frame; overlays in [`draw`] write through an [`ImageViewMut`].

pub mod draw;
mod jpeg;
mod resolution;

#[cfg(test)]
mod tests;

use std::fmt;

use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{imageops::FilterType, Rgba, RgbaImage};

pub use resolution::*;

use crate::rect::{Rect, RotatedRect, Vec2};

/// An owned RGBA8 frame.
///
/// Video sources convert to this layout, which is also the GUI's texture format.
#[derive(Clone)]
pub struct Image {
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Decodes a JFIF or Motion-JPEG frame.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        jpeg::decode_jpeg(data)
    }

    /// Wraps tightly packed RGBA8 rows.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is not exactly `res.num_pixels() * 4` bytes long.
    pub fn from_rgba8(res: Resolution, buf: &[u8]) -> Self {
        let expected = res.num_pixels() as usize * 4;
        assert_eq!(
            expected,
            buf.len(),
            "incorrect buffer size {} for a {} frame (expected {})",
            buf.len(),
            res,
            expected,
        );
        let mut image = Self::new(res.width(), res.height());
        image.buf.copy_from_slice(buf);
        image
    }

    /// A transparent black frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: RgbaImage::new(width, height),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// The frame's own bounds, anchored at the origin.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Stretches the frame to `res`.
    pub fn resize(&self, res: Resolution) -> Image {
        if res == self.resolution() {
            return self.clone();
        }
        Image {
            buf: image::imageops::resize(&self.buf, res.width(), res.height(), FilterType::Triangle),
        }
    }

    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the frame.
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Borrows the area `rect` of the frame.
    ///
    /// The view always has the size of `rect`. The part of it that falls outside the frame reads
    /// as [`Color::NULL`] and drops writes.
    pub fn view(&self, rect: impl Into<RotatedRect>) -> ImageView<'_> {
        ImageView {
            image: self,
            window: Window::of(self).sub(rect.into()),
        }
    }

    /// Mutable counterpart of [`Image::view`].
    pub fn view_mut(&mut self, rect: impl Into<RotatedRect>) -> ImageViewMut<'_> {
        ImageViewMut {
            window: Window::of(self).sub(rect.into()),
            image: self,
        }
    }

    /// Raw RGBA8 bytes, top row first.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({})", self.resolution())
    }
}

/// Placement of a view in frame coordinates.
#[derive(Debug, Clone, Copy)]
struct Window(RotatedRect);

impl Window {
    fn of(image: &Image) -> Self {
        Self(image.rect().into())
    }

    /// Places `rect`, given in this window's coordinates, in the frame.
    fn sub(&self, rect: RotatedRect) -> Self {
        let size = rect.rect().size();
        let top_left = self.0.transform_out(rect.center()) - size * 0.5;
        let angle = self.0.rotation_radians() + rect.rotation_radians();
        Self(RotatedRect::new(
            rect.rect().move_to(top_left.x, top_left.y),
            angle,
        ))
    }

    fn size(&self) -> (u32, u32) {
        let rect = self.0.rect();
        (rect.width() as u32, rect.height() as u32)
    }

    /// Frame pixel under the center of view pixel `(x, y)`.
    fn pixel(&self, x: u32, y: u32, image: &Image) -> Option<(u32, u32)> {
        let p = self
            .0
            .transform_out(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
        let (px, py) = (p.x.floor(), p.y.floor());
        let inside = px >= 0.0
            && py >= 0.0
            && px < image.width() as f32
            && py < image.height() as f32;
        inside.then_some((px as u32, py as u32))
    }
}

/// A read-only, possibly rotated, window into an [`Image`].
#[derive(Clone, Copy)]
pub struct ImageView<'a> {
    image: &'a Image,
    window: Window,
}

impl<'a> ImageView<'a> {
    pub fn width(&self) -> u32 {
        self.window.size().0
    }

    pub fn height(&self) -> u32 {
        self.window.size().1
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// The view's bounds in its own coordinates.
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Reads view pixel `(x, y)`, or [`Color::NULL`] if it is off the frame.
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.window
            .pixel(x, y, self.image)
            .map_or(Color::NULL, |pos| self.image.get(pos.0, pos.1))
    }

    /// Narrows this view to `rect`, given in view coordinates.
    pub fn view(&self, rect: impl Into<RotatedRect>) -> ImageView<'a> {
        ImageView {
            image: self.image,
            window: self.window.sub(rect.into()),
        }
    }
}

impl fmt::Debug for ImageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageView({})", self.resolution())
    }
}

/// A writable window into an [`Image`].
pub struct ImageViewMut<'a> {
    image: &'a mut Image,
    window: Window,
}

impl<'a> ImageViewMut<'a> {
    pub fn width(&self) -> u32 {
        self.window.size().0
    }

    pub fn height(&self) -> u32 {
        self.window.size().1
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Writes view pixel `(x, y)`. Pixels off the frame are skipped.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        if let Some(pos) = self.window.pixel(x, y, self.image) {
            self.image.buf[pos] = Rgba(color.0);
        }
    }

    pub fn reborrow(&mut self) -> ImageViewMut<'_> {
        ImageViewMut {
            image: self.image,
            window: self.window,
        }
    }
}

impl fmt::Debug for ImageViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageViewMut({})", self.resolution())
    }
}

/// Non-premultiplied sRGB color with alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// All zero, also what views read outside the frame.
    pub const NULL: Self = Self([0; 4]);
    pub const BLACK: Self = Self::from_rgb8(0, 0, 0);
    pub const WHITE: Self = Self::from_rgb8(255, 255, 255);
    pub const RED: Self = Self::from_rgb8(255, 0, 0);
    pub const GREEN: Self = Self::from_rgb8(0, 255, 0);
    pub const BLUE: Self = Self::from_rgb8(0, 0, 255);
    pub const YELLOW: Self = Self::from_rgb8(255, 255, 0);
    pub const MAGENTA: Self = Self::from_rgb8(255, 0, 255);

    /// An opaque color.
    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("#")?;
        self.0.iter().try_for_each(|c| write!(f, "{c:02x}"))
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}

/// Anything a network can read pixels from.
pub trait AsImageView {
    fn as_view(&self) -> ImageView<'_>;
}

/// Anything an overlay can be drawn on.
pub trait AsImageViewMut: AsImageView {
    fn as_view_mut(&mut self) -> ImageViewMut<'_>;
}

impl AsImageView for Image {
    fn as_view(&self) -> ImageView<'_> {
        self.view(self.rect())
    }
}

impl AsImageViewMut for Image {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        self.view_mut(self.rect())
    }
}

impl AsImageView for ImageView<'_> {
    fn as_view(&self) -> ImageView<'_> {
        *self
    }
}

impl AsImageView for ImageViewMut<'_> {
    fn as_view(&self) -> ImageView<'_> {
        ImageView {
            image: self.image,
            window: self.window,
        }
    }
}

impl AsImageViewMut for ImageViewMut<'_> {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        self.reborrow()
    }
}

impl<V: AsImageView> AsImageView for &V {
    fn as_view(&self) -> ImageView<'_> {
        (**self).as_view()
    }
}

impl<V: AsImageView> AsImageView for &mut V {
    fn as_view(&self) -> ImageView<'_> {
        (**self).as_view()
    }
}

impl<V: AsImageViewMut> AsImageViewMut for &mut V {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        (**self).as_view_mut()
    }
}
