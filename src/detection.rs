//! Single-class object detection shared by the palm and face detectors.

pub mod nms;
pub mod ssd;

use crate::image::{AsImageView, ImageView, Resolution};
use crate::nn::{Cnn, Outputs};
use crate::rect::{Rect, Vec2};
use crate::timer::Timer;

use self::nms::NonMaxSuppression;

/// Trait implemented by neural networks that detect objects in an input image.
pub trait Network: Send + Sync + 'static {
    /// Returns the [`Cnn`] to use for detection.
    fn cnn(&self) -> &Cnn;

    /// Extracts all detections with confidence above `threshold` from the network's output.
    ///
    /// Keypoint and detection positions are expected to be in the coordinate system of the
    /// network's input.
    fn extract(&self, outputs: &Outputs, threshold: f32, detections: &mut Detections);
}

/// The detections produced by one run of a [`Detector`].
#[derive(Debug, Default)]
pub struct Detections {
    vec: Vec<Detection>,
}

impl Detections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    pub fn clear(&mut self) {
        self.vec.clear();
    }

    pub fn push(&mut self, detection: Detection) {
        self.vec.push(detection);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.vec.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Detection> {
        self.vec.iter_mut()
    }
}

impl<'a> IntoIterator for &'a Detections {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.vec.iter()
    }
}

/// A generic object detector wrapping a detection [`Network`].
///
/// Input images of any aspect ratio are accepted: the network sees a letterboxed view, and all
/// results are mapped back into the coordinate system of the input image.
pub struct Detector {
    network: Box<dyn Network>,
    detections: Detections,
    t_infer: Timer,
    t_extract: Timer,
    t_nms: Timer,
    thresh: f32,
    nms: NonMaxSuppression,
}

impl Detector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new<N: Network>(network: N) -> Self {
        Self {
            network: Box::new(network),
            detections: Detections::new(),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
            t_nms: Timer::new("nms"),
            thresh: Self::DEFAULT_THRESHOLD,
            nms: NonMaxSuppression::new(),
        }
    }

    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    /// Sets the minimum confidence a detection needs to be reported.
    #[inline]
    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    /// Runs the network on `image` and returns the filtered detections, in image pixels.
    pub fn detect<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&Detections> {
        self.detect_impl(image.as_view())
    }

    fn detect_impl(&mut self, image: ImageView<'_>) -> anyhow::Result<&Detections> {
        self.detections.clear();

        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();
        let aspect = input_res
            .aspect_ratio()
            .ok_or_else(|| anyhow::anyhow!("network input resolution {input_res} is empty"))?;

        // Pad the image to the network's aspect ratio.
        let rect = image.rect().grow_to_fit_aspect(aspect);
        let view = image.view(rect);
        let outputs = self.t_infer.time(|| cnn.estimate(&view))?;
        log::trace!("inference result: {:?}", outputs);

        self.t_extract.time(|| {
            self.network
                .extract(&outputs, self.thresh, &mut self.detections)
        });

        self.t_nms.time(|| {
            let filtered = self.nms.process(&mut self.detections.vec).collect::<Vec<_>>();
            self.detections.vec = filtered;
        });

        let scale = rect.width() / input_res.width() as f32;
        let offset = rect.top_left();
        for det in self.detections.iter_mut() {
            det.map_coords(|pt| pt * scale + offset);
        }

        Ok(&self.detections)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract, &self.t_nms].into_iter()
    }
}

/// A detected object.
///
/// Consists of a [`Rect`] enclosing the object, a confidence value between 0.0 and 1.0, the
/// clockwise rotation of the object (0.0 for networks that don't compute one), and a possibly
/// empty list of [`Keypoint`]s.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the angle of the detected object, in radians, clockwise.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Applies `f` to the box center and every keypoint; box size is scaled along with it.
    ///
    /// `f` has to be an affine map with uniform scaling.
    pub(crate) fn map_coords(&mut self, f: impl Fn(Vec2) -> Vec2) {
        let center = f(self.rect.center());
        let scale = (f(Vec2::new(1.0, 0.0)) - f(Vec2::zeros())).x;
        self.rect = Rect::from_center(
            center.x,
            center.y,
            self.rect.width() * scale,
            self.rect.height() * scale,
        );
        for kp in &mut self.keypoints {
            let p = f(kp.pos());
            *kp = Keypoint::new(p.x, p.y);
        }
    }
}

/// A 2D keypoint of a [`Detection`].
///
/// The meaning of a keypoint depends on the network and on its index in the keypoint list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn map_coords_scales_and_offsets() {
        let mut det = Detection::with_keypoints(
            0.9,
            Rect::from_center(10.0, 20.0, 4.0, 8.0),
            vec![Keypoint::new(1.0, 2.0)],
        );
        let offset = Vec2::new(-5.0, 3.0);
        det.map_coords(|pt| pt * 2.0 + offset);

        let rect = det.bounding_rect();
        assert_relative_eq!(rect.center(), Vec2::new(15.0, 43.0));
        assert_relative_eq!(rect.width(), 8.0);
        assert_relative_eq!(rect.height(), 16.0);
        assert_eq!(det.keypoints()[0], Keypoint::new(-3.0, 7.0));
        assert_eq!(det.confidence(), 0.9);
    }

    #[test]
    fn detections_collection() {
        let mut dets = Detections::new();
        assert!(dets.is_empty());
        dets.push(Detection::new(0.5, Rect::from_center(0.0, 0.0, 1.0, 1.0)));
        dets.push(Detection::new(0.7, Rect::from_center(1.0, 0.0, 1.0, 1.0)));
        assert_eq!(dets.len(), 2);
        assert_eq!(
            dets.iter().map(|d| d.confidence()).collect::<Vec<_>>(),
            [0.5, 0.7]
        );
        dets.clear();
        assert!(dets.is_empty());
    }
}
