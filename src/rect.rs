//! Rectangles in frame, network or normalized coordinates.
//!
//! Y points down everywhere, so a positive rotation turns clockwise on screen.

use std::fmt;

use nalgebra::{Rotation2, Vector2};

use crate::image::AspectRatio;

/// A 2D point or vector.
pub type Vec2 = Vector2<f32>;

/// An axis-aligned rectangle with non-negative size.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    min: Vec2,
    size: Vec2,
}

impl Rect {
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self::from_top_left(x_center - width * 0.5, y_center - height * 0.5, width, height)
    }

    #[inline]
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            min: Vec2::new(x, y),
            size: Vec2::new(width, height),
        }
    }

    fn from_min_max(min: Vec2, max: Vec2) -> Self {
        debug_assert!(min.x <= max.x && min.y <= max.y, "{min:?} > {max:?}");
        Self {
            min,
            size: max - min,
        }
    }

    /// The smallest rectangle containing every point, or `None` without points.
    pub fn bounding<I: IntoIterator<Item = T>, T: Into<Vec2>>(points: I) -> Option<Self> {
        let mut points = points.into_iter().map(|p| -> Vec2 { p.into() });
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p)));
        Some(Self::from_min_max(min, max))
    }

    /// Pads each side by `amount` times the matching dimension.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        let size = self.size * (1.0 + 2.0 * amount);
        Self::from_center(self.center().x, self.center().y, size.x, size.y)
    }

    /// Widens or heightens the rectangle around its center until it has `aspect`.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, aspect: AspectRatio) -> Self {
        let ratio = aspect.as_f32();
        let (w, h) = if self.height() * ratio >= self.width() {
            (self.height() * ratio, self.height())
        } else {
            (self.width(), self.width() / ratio)
        };
        Self::from_center(self.center().x, self.center().y, w, h)
    }

    #[inline]
    pub fn top_left(&self) -> Vec2 {
        self.min
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.min.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.min.y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.size.y
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.min + self.size * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.size
    }

    fn max(&self) -> Vec2 {
        self.min + self.size
    }

    fn area(&self) -> f32 {
        self.size.x * self.size.y
    }

    /// Same size, top left corner at `(x, y)`.
    #[must_use]
    pub fn move_to(&self, x: f32, y: f32) -> Rect {
        Rect::from_top_left(x, y, self.width(), self.height())
    }

    /// The overlapping area, or `None` if the rectangles are apart.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let min = self.min.sup(&other.min);
        let max = self.max().inf(&other.max());
        (min.x <= max.x && min.y <= max.y).then(|| Rect::from_min_max(min, max))
    }

    /// Intersection over union. 0 when both rectangles are empty.
    pub fn iou(&self, other: &Self) -> f32 {
        let inter = self.intersection(other).map_or(0.0, |r| r.area());
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }

    /// Top left, top right, bottom right, bottom left.
    pub fn corners(&self) -> [Vec2; 4] {
        let (min, max) = (self.min, self.max());
        [
            min,
            Vec2::new(max.x, min.y),
            max,
            Vec2::new(min.x, max.y),
        ]
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect({}x{} at {},{})",
            self.size.x, self.size.y, self.min.x, self.min.y
        )
    }
}

/// A [`Rect`] turned clockwise around its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    #[inline]
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    /// The smallest rectangle at angle `radians` that contains every point.
    ///
    /// Returns `None` without points.
    pub fn bounding<T: Into<Vec2>, I: IntoIterator<Item = T>>(
        radians: f32,
        points: I,
    ) -> Option<Self> {
        // Bounds are taken in a frame turned back by `radians`.
        let back = Rotation2::new(-radians);
        let aligned = Rect::bounding(points.into_iter().map(|p| {
            let p: Vec2 = p.into();
            back * p
        }))?;
        let center = Rotation2::new(radians) * aligned.center();
        let size = aligned.size();
        Some(Self::new(
            Rect::from_center(center.x, center.y, size.x, size.y),
            radians,
        ))
    }

    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        self.radians
    }

    /// The rectangle before rotation.
    #[inline]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    pub fn center(&self) -> Vec2 {
        self.rect.center()
    }

    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        Self::new(self.rect.grow_rel(amount), self.radians)
    }

    #[must_use]
    pub fn grow_to_fit_aspect(&self, aspect: AspectRatio) -> Self {
        Self::new(self.rect.grow_to_fit_aspect(aspect), self.radians)
    }

    /// Corners in parent coordinates, in [`Rect::corners`] order.
    pub fn rotated_corners(&self) -> [Vec2; 4] {
        let rot = Rotation2::new(self.radians);
        let center = self.center();
        self.rect.corners().map(|p| center + rot * (p - center))
    }

    /// Maps a point relative to the unrotated top left corner to parent coordinates.
    pub fn transform_out(&self, pt: impl Into<Vec2>) -> Vec2 {
        let half = self.rect.size() * 0.5;
        self.center() + Rotation2::new(self.radians) * (pt.into() - half)
    }
}

impl From<Rect> for RotatedRect {
    fn from(rect: Rect) -> Self {
        Self::new(rect, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::TAU;

    use approx::{assert_abs_diff_eq, AbsDiffEq};

    use super::*;

    impl AbsDiffEq for Rect {
        type Epsilon = f32;

        fn default_epsilon() -> f32 {
            1e-5
        }

        fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
            self.min.abs_diff_eq(&other.min, epsilon) && self.size.abs_diff_eq(&other.size, epsilon)
        }
    }

    impl AbsDiffEq for RotatedRect {
        type Epsilon = f32;

        fn default_epsilon() -> f32 {
            1e-5
        }

        fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
            self.rect.abs_diff_eq(&other.rect, epsilon)
                && self.radians.abs_diff_eq(&other.radians, epsilon)
        }
    }

    fn v(x: f32, y: f32) -> Vec2 {
        Vec2::new(x, y)
    }

    #[test]
    fn intersection() {
        let outer = Rect::from_top_left(0.0, 0.0, 10.0, 10.0);
        let point = Rect::from_top_left(5.0, 5.0, 0.0, 0.0);
        assert_eq!(outer.intersection(&point), Some(point));
        assert_eq!(
            Rect::from_top_left(0.0, 0.0, 4.0, 4.0)
                .intersection(&Rect::from_top_left(6.0, 0.0, 4.0, 10.0)),
            None,
        );
        assert_eq!(
            outer.intersection(&Rect::from_top_left(8.0, -2.0, 4.0, 4.0)),
            Some(Rect::from_top_left(8.0, 0.0, 2.0, 2.0)),
        );
    }

    #[test]
    fn iou() {
        let smaller = Rect::from_center(9.0, 9.0, 1.0, 1.0);
        let bigger = Rect::from_center(9.0, 9.0, 2.0, 2.0);
        assert_eq!(smaller.iou(&bigger), 0.25);
        assert_eq!(bigger.iou(&smaller), 0.25);

        let far = Rect::from_center(100.0, 9.0, 2.0, 2.0);
        assert_eq!(bigger.iou(&far), 0.0);

        let zero = Rect::from_center(0.0, 0.0, 0.0, 0.0);
        assert_eq!(zero.iou(&zero), 0.0);
    }

    #[test]
    fn bounding() {
        assert_eq!(
            Rect::bounding([[0.0, 0.0], [1.0, 1.0], [-1.0, -1.0]]).unwrap(),
            Rect::from_center(0.0, 0.0, 2.0, 2.0),
        );
        assert_eq!(
            Rect::bounding([[0.0, 0.0], [10.0, 0.0]]).unwrap(),
            Rect::from_center(5.0, 0.0, 10.0, 0.0),
        );
        assert!(Rect::bounding(Vec::<Vec2>::new()).is_none());
    }

    #[test]
    fn fit_aspect() {
        assert_eq!(
            Rect::from_center(10.0, 10.0, 50.0, 100.0).grow_to_fit_aspect(AspectRatio::SQUARE),
            Rect::from_center(10.0, 10.0, 100.0, 100.0),
        );
        assert_eq!(
            Rect::from_center(10.0, 10.0, 100.0, 50.0).grow_to_fit_aspect(AspectRatio::SQUARE),
            Rect::from_center(10.0, 10.0, 100.0, 100.0),
        );
    }

    #[test]
    fn grow_rel_keeps_center() {
        let rect = Rect::from_top_left(0.0, 0.0, 10.0, 20.0);
        assert_eq!(rect.grow_rel(0.5), Rect::from_center(5.0, 10.0, 20.0, 40.0));
        assert_eq!(rect.move_to(3.0, 4.0).center(), v(8.0, 14.0));
    }

    #[test]
    fn transform_out() {
        let offset = RotatedRect::new(Rect::from_top_left(10.0, 20.0, 1.0, 1.0), 0.0);
        assert_eq!(offset.transform_out([0.0, 0.0]), v(10.0, 20.0));

        // quarter turn clockwise: the top left corner ends up top right
        let right = RotatedRect::new(Rect::from_top_left(0.0, 0.0, 1.0, 1.0), TAU / 4.0);
        assert_abs_diff_eq!(right.transform_out([0.0, 0.0]), v(1.0, 0.0), epsilon = 1e-5);
        assert_abs_diff_eq!(right.transform_out([0.5, 0.5]), v(0.5, 0.5), epsilon = 1e-5);
        assert_abs_diff_eq!(right.transform_out([0.0, -1.0]), v(2.0, 0.0), epsilon = 1e-5);

        let flipped = RotatedRect::new(Rect::from_top_left(10.0, 20.0, 1.0, 1.0), TAU / 2.0);
        assert_abs_diff_eq!(flipped.transform_out([0.0, 0.0]), v(11.0, 21.0), epsilon = 1e-4);
    }

    #[test]
    fn rotated_rect_bounding() {
        assert!(RotatedRect::bounding::<Vec2, _>(0.0, []).is_none());
        assert_eq!(
            RotatedRect::bounding(0.0, [[0.0, 0.0], [1.0, 1.0]]).unwrap(),
            Rect::from_top_left(0.0, 0.0, 1.0, 1.0).into(),
        );
        assert_abs_diff_eq!(
            RotatedRect::bounding(TAU / 2.0, [[0.0, 0.0], [1.0, 1.0]]).unwrap(),
            RotatedRect::new(Rect::from_top_left(0.0, 0.0, 1.0, 1.0), TAU / 2.0),
            epsilon = 1e-5,
        );
        assert_abs_diff_eq!(
            RotatedRect::bounding(TAU / 4.0, [[0.0, 0.0], [9.0, 9.0]]).unwrap(),
            RotatedRect::new(Rect::from_top_left(0.0, 0.0, 9.0, 9.0), TAU / 4.0),
            epsilon = 1e-4,
        );
    }

    #[test]
    fn corners() {
        let rect = Rect::from_center(1.0, 1.0, 4.0, 2.0);
        assert_eq!(
            rect.corners(),
            [v(-1.0, 0.0), v(3.0, 0.0), v(3.0, 2.0), v(-1.0, 2.0)]
        );

        let rotated = RotatedRect::new(Rect::from_center(0.0, 0.0, 2.0, 2.0), TAU / 4.0);
        assert_abs_diff_eq!(rotated.rotated_corners()[0], v(1.0, -1.0), epsilon = 1e-5);
    }
}
