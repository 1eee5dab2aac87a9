//! Utilities for numerics.

use std::cmp::Ordering;

/// An `f32` that implements [`Ord`] according to the IEEE 754 totalOrder predicate.
#[derive(Debug, Clone, Copy)]
pub struct TotalF32(pub f32);

impl PartialEq for TotalF32 {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TotalF32 {}

impl PartialOrd for TotalF32 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalF32 {
    fn cmp(&self, other: &Self) -> Ordering {
        f32::total_cmp(&self.0, &other.0)
    }
}

/// Applies the standard sigmoid/logistic function to the input.
pub fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// Converts a normalized coordinate in range `0.0..=1.0` to a pixel coordinate along an axis of
/// length `extent`.
///
/// The result is truncated toward zero, so slightly negative coordinates map to pixel 0 and
/// coordinates past the edge map past the last pixel. Callers that draw with the result are
/// expected to clip.
pub fn to_pixel(norm: f32, extent: u32) -> i32 {
    (norm * extent as f32) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_midpoint() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn total_order() {
        let mut v = vec![TotalF32(0.5), TotalF32(-1.0), TotalF32(f32::NAN), TotalF32(0.25)];
        v.sort();
        assert_eq!(v[0].0, -1.0);
        assert_eq!(v[1].0, 0.25);
        assert_eq!(v[2].0, 0.5);
        assert!(v[3].0.is_nan());
    }

    #[test]
    fn pixel_truncation() {
        assert_eq!(to_pixel(0.5, 640), 320);
        assert_eq!(to_pixel(0.9999, 10), 9);
        assert_eq!(to_pixel(-0.05, 10), 0);
        assert_eq!(to_pixel(-0.15, 10), -1);
    }
}
