//! Non-maximum suppression.
//!
//! SSD networks report each object several times, once per overlapping anchor. Every cluster of
//! overlapping detections is merged into its confidence-weighted average, which jitters less
//! between frames than keeping the best member.

use crate::{iter::zip_exact, num::TotalF32, rect::Rect};

use super::{Detection, Keypoint};

#[derive(Default)]
pub struct NonMaxSuppression {
    cluster: Vec<Detection>,
    out_buf: Vec<Detection>,
}

impl NonMaxSuppression {
    /// IoU at which two detections belong to the same cluster.
    pub const IOU_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self::default()
    }

    /// Merges overlapping `detections`, draining the vector.
    ///
    /// Merged detections come out in order of descending confidence.
    pub fn process(
        &mut self,
        detections: &mut Vec<Detection>,
    ) -> impl Iterator<Item = Detection> + '_ {
        self.out_buf.clear();

        // Ascending, so `pop` yields the most confident detection.
        detections.sort_by_key(|det| TotalF32(det.confidence));

        while let Some(seed) = detections.pop() {
            let seed_rect = seed.bounding_rect();
            self.cluster.clear();
            let mut i = 0;
            while i < detections.len() {
                if seed_rect.iou(&detections[i].bounding_rect()) >= Self::IOU_THRESH {
                    self.cluster.push(detections.remove(i));
                } else {
                    i += 1;
                }
            }
            self.out_buf.push(weighted_average(&seed, &self.cluster));
        }

        self.cluster.clear();
        self.out_buf.drain(..)
    }
}

/// Averages `seed` and `others` weighted by confidence; the result keeps `seed`'s confidence.
fn weighted_average(seed: &Detection, others: &[Detection]) -> Detection {
    let mut center = [0.0, 0.0];
    let mut size = [0.0, 0.0];
    // Angles are averaged as unit vectors so that clusters straddling ±π stay intact.
    let mut angle_sin = 0.0;
    let mut angle_cos = 0.0;
    let mut keypoints = vec![Keypoint::new(0.0, 0.0); seed.keypoints().len()];
    let mut divisor = 0.0;

    for det in std::iter::once(seed).chain(others) {
        let factor = det.confidence();
        divisor += factor;

        let rect = det.bounding_rect();
        center[0] += rect.center().x * factor;
        center[1] += rect.center().y * factor;
        size[0] += rect.width() * factor;
        size[1] += rect.height() * factor;
        angle_sin += det.angle().sin() * factor;
        angle_cos += det.angle().cos() * factor;
        for (acc, kp) in zip_exact(keypoints.iter_mut(), det.keypoints()) {
            acc.x += kp.x * factor;
            acc.y += kp.y * factor;
        }
    }

    if divisor <= 0.0 {
        return seed.clone();
    }

    for kp in &mut keypoints {
        kp.x /= divisor;
        kp.y /= divisor;
    }

    let mut avg = Detection::with_keypoints(
        seed.confidence(),
        Rect::from_center(
            center[0] / divisor,
            center[1] / divisor,
            size[0] / divisor,
            size[1] / divisor,
        ),
        keypoints,
    );
    avg.set_angle(f32::atan2(angle_sin, angle_cos));
    avg
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use std::f32::consts::PI;

    use super::*;
    use crate::rect::Vec2;

    #[test]
    fn keeps_disjoint_detections() {
        let mut nms = NonMaxSuppression::new();
        let a = Detection::new(0.7, Rect::from_center(0.0, 0.0, 1.0, 1.0));
        let b = Detection::new(0.9, Rect::from_center(5.0, 0.0, 1.0, 1.0));

        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].confidence(), 0.9);
        assert_eq!(detections[1].confidence(), 0.7);
        assert_eq!(detections[1].bounding_rect(), Rect::from_center(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn average_is_confidence_weighted() {
        let mut nms = NonMaxSuppression::new();
        let rect = Rect::from_center(-1.0, 3.0, 1.0, 1.0);
        let mut a = Detection::with_keypoints(1.0, rect, vec![Keypoint::new(0.0, 0.0)]);
        a.set_angle(0.3);
        let b = Detection::with_keypoints(
            0.5,
            Rect::from_center(-1.0, 3.0, 1.5, 1.5),
            vec![Keypoint::new(3.0, 6.0)],
        );
        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        assert_eq!(d.confidence(), 1.0);
        assert_relative_eq!(d.bounding_rect().center(), Vec2::new(-1.0, 3.0));
        assert_relative_eq!(d.bounding_rect().width(), 1.75 / 1.5);
        assert_relative_eq!(d.bounding_rect().height(), 1.75 / 1.5);
        assert_relative_eq!(d.angle(), f32::atan2(0.3f32.sin(), 0.3f32.cos() + 0.5));
        assert_eq!(d.keypoints(), &[Keypoint::new(1.0, 2.0)]);
    }

    #[test]
    fn average_angle_wraps_around() {
        let mut nms = NonMaxSuppression::new();
        let rect = Rect::from_center(100.0, 100.0, 40.0, 40.0);
        let mut a = Detection::new(0.9, rect);
        a.set_angle(PI - 0.05);
        let mut b = Detection::new(0.9, rect);
        b.set_angle(-PI + 0.05);

        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 1);
        assert_relative_eq!(detections[0].angle().abs(), PI, epsilon = 1e-4);
    }

    #[test]
    fn empty_input() {
        let mut nms = NonMaxSuppression::new();
        assert_eq!(nms.process(&mut Vec::new()).count(), 0);
    }
}
