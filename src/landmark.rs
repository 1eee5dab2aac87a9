//! Landmark estimation and region-of-interest tracking.

use crate::image::{AsImageView, AspectRatio, ImageView, Resolution};
use crate::nn::{Cnn, Outputs};
use crate::rect::RotatedRect;
use crate::timer::Timer;

type Position = [f32; 3];

/// A fixed-size list of landmark positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks {
    positions: Box<[Position]>,
}

impl Landmarks {
    /// Creates a [`Landmarks`] collection of `len` landmarks, all at the origin.
    pub fn new(len: usize) -> Self {
        Self {
            positions: vec![[0.0; 3]; len].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, index: usize) -> Landmark {
        Landmark::new(self.positions[index])
    }

    pub fn set(&mut self, index: usize, landmark: Landmark) {
        self.positions[index] = landmark.pos;
    }

    pub fn iter(&self) -> impl Iterator<Item = Landmark> + Clone + '_ {
        self.positions.iter().copied().map(Landmark::new)
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Position] {
        &mut self.positions
    }

    pub fn map_positions(&mut self, mut f: impl FnMut(Position) -> Position) {
        for pos in self.positions_mut() {
            *pos = f(*pos);
        }
    }
}

/// A landmark in 3D space.
///
/// X and Y are in the coordinate system of whatever image the landmarks refer to. Z is depth,
/// in the same units as X.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Landmark {
    pos: Position,
}

impl Landmark {
    pub fn new(position: Position) -> Self {
        Self { pos: position }
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.pos
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.pos[0]
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.pos[1]
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.pos[2]
    }
}

/// Landmark estimation results produced by a [`Network`].
pub trait Estimate: Clone + Send + Sync + 'static {
    fn landmarks(&self) -> &Landmarks;

    fn landmarks_mut(&mut self) -> &mut Landmarks;

    /// Returns the estimated clockwise rotation of the object, in radians.
    ///
    /// [`LandmarkTracker`] uses this to keep the object upright in its region of interest.
    /// [`None`] means the region keeps its current rotation.
    fn angle_radians(&self) -> Option<f32> {
        None
    }
}

/// Estimates that report whether the object is still in view.
pub trait Confidence {
    /// Presence score in range 0.0 to 1.0.
    fn confidence(&self) -> f32;
}

/// Trait implemented by wrapper types around landmark networks.
pub trait Network: Send + Sync + 'static {
    type Output: Estimate;

    fn cnn(&self) -> &Cnn;

    /// Extracts the network outputs into `estimate`.
    ///
    /// Landmark positions are expected to be in the coordinate system of the network's input.
    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output);
}

/// Runs a landmark [`Network`] and maps its results back to the input image.
pub struct Estimator<E: Estimate> {
    network: Box<dyn Network<Output = E>>,
    estimate: E,
    t_infer: Timer,
    t_extract: Timer,
}

impl<E: Estimate + Default> Estimator<E> {
    pub fn new<N: Network<Output = E>>(network: N) -> Self {
        Self {
            network: Box::new(network),
            estimate: E::default(),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
        }
    }
}

impl<E: Estimate> Estimator<E> {
    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract].into_iter()
    }

    /// Performs landmark estimation on `image`.
    ///
    /// Images whose aspect ratio differs from the network input are padded (or, for views, widened
    /// into the surrounding image). The returned landmarks use the coordinates of `image`.
    pub fn estimate<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&mut E> {
        self.estimate_impl(image.as_view())
    }

    fn estimate_impl(&mut self, image: ImageView<'_>) -> anyhow::Result<&mut E> {
        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();
        let aspect = input_res
            .aspect_ratio()
            .ok_or_else(|| anyhow::anyhow!("network input resolution {input_res} is empty"))?;

        let rect = image.rect().grow_to_fit_aspect(aspect);
        let view = image.view(rect);
        let outputs = self.t_infer.time(|| cnn.estimate(&view))?;
        log::trace!("inference result: {:?}", outputs);

        self.t_extract
            .time(|| self.network.extract(&outputs, &mut self.estimate));

        let scale = rect.width() / input_res.width() as f32;
        let (dx, dy) = (rect.x(), rect.y());
        self.estimate
            .landmarks_mut()
            .map_positions(|[x, y, z]| [x * scale + dx, y * scale + dy, z * scale]);

        Ok(&mut self.estimate)
    }
}

/// Follows an object across frames by re-centering a region of interest (RoI) on the landmarks
/// estimated inside it.
///
/// The tracker only holds the RoI. The [`Estimator`] is passed to every [`LandmarkTracker::track`]
/// call, so several trackers can share one network.
#[derive(Debug, Clone)]
pub struct LandmarkTracker {
    aspect_ratio: AspectRatio,
    roi: Option<RotatedRect>,
    loss_thresh: f32,
    roi_padding: f32,
}

impl LandmarkTracker {
    pub const DEFAULT_LOSS_THRESHOLD: f32 = 0.5;

    pub const DEFAULT_ROI_PADDING: f32 = 0.3;

    /// Creates a tracker for an estimator whose network input has the given aspect ratio.
    pub fn new(aspect_ratio: AspectRatio) -> Self {
        Self {
            aspect_ratio,
            roi: None,
            loss_thresh: Self::DEFAULT_LOSS_THRESHOLD,
            roi_padding: Self::DEFAULT_ROI_PADDING,
        }
    }

    /// Sets the presence value below which tracking is considered lost.
    pub fn set_loss_threshold(&mut self, threshold: f32) {
        self.loss_thresh = threshold;
    }

    /// Sets the padding added around the landmarks' bounding rectangle to form the next RoI.
    ///
    /// The padding is relative to width and height and added on every side.
    ///
    /// # Panics
    ///
    /// Panics when `padding` is negative or NaN.
    pub fn set_roi_padding(&mut self, padding: f32) {
        assert!(padding >= 0.0, "invalid RoI padding {padding}");
        self.roi_padding = padding;
    }

    /// Returns the current RoI, or [`None`] if nothing is tracked.
    pub fn roi(&self) -> Option<&RotatedRect> {
        self.roi.as_ref()
    }

    /// Sets the RoI as-is, without padding.
    pub fn set_roi(&mut self, roi: impl Into<RotatedRect>) {
        self.roi = Some(roi.into());
    }

    /// Drops the RoI if `confidence` is below the loss threshold.
    ///
    /// Returns whether tracking continues.
    fn keep_tracking(&mut self, confidence: f32) -> bool {
        if confidence < self.loss_thresh {
            log::trace!(
                "tracking lost: confidence {} below {}",
                confidence,
                self.loss_thresh,
            );
            self.roi = None;
        }
        self.roi.is_some()
    }

    /// Estimates landmarks inside the current RoI of `full_image` and moves the RoI along.
    ///
    /// Returns `Ok(None)` when no RoI is set, or when the estimate's presence dropped below the
    /// loss threshold, which also clears the RoI.
    pub fn track<E, V>(
        &mut self,
        estimator: &mut Estimator<E>,
        full_image: &V,
    ) -> anyhow::Result<Option<TrackingResult<E>>>
    where
        E: Estimate + Confidence,
        V: AsImageView,
    {
        self.track_impl(estimator, full_image.as_view())
    }

    fn track_impl<E: Estimate + Confidence>(
        &mut self,
        estimator: &mut Estimator<E>,
        full_image: ImageView<'_>,
    ) -> anyhow::Result<Option<TrackingResult<E>>> {
        let Some(roi) = self.roi else {
            return Ok(None);
        };
        let view_rect = roi.grow_to_fit_aspect(self.aspect_ratio);
        let view = full_image.view(view_rect);
        let estimate = estimator.estimate(&view)?;
        if !self.keep_tracking(estimate.confidence()) {
            return Ok(None);
        }

        let mut estimate = estimate.clone();
        let angle = roi.rotation_radians() + estimate.angle_radians().unwrap_or(0.0);

        estimate.landmarks_mut().map_positions(|[x, y, z]| {
            let p = view_rect.transform_out([x, y]);
            [p.x, p.y, z]
        });

        let updated_roi = RotatedRect::bounding(
            angle,
            estimate.landmarks().iter().map(|lm| [lm.x(), lm.y()]),
        )
        .ok_or_else(|| anyhow::anyhow!("landmark estimate contains no landmarks"))?;

        self.roi = Some(updated_roi.grow_rel(self.roi_padding));

        Ok(Some(TrackingResult {
            view_rect,
            estimate,
        }))
    }
}

/// The result of a successful [`LandmarkTracker::track`] call.
#[derive(Debug, Clone)]
pub struct TrackingResult<E> {
    view_rect: RotatedRect,
    estimate: E,
}

impl<E: Estimate> TrackingResult<E> {
    /// The rectangle of the full image the landmarks were estimated in.
    pub fn view_rect(&self) -> RotatedRect {
        self.view_rect
    }

    /// The estimate, with landmark X/Y in full image coordinates.
    pub fn into_estimate(self) -> E {
        self.estimate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmarks_access() {
        let mut lms = Landmarks::new(3);
        assert_eq!(lms.len(), 3);
        assert!(lms.iter().all(|lm| lm.position() == [0.0; 3]));

        lms.set(1, Landmark::new([1.0, 2.0, 3.0]));
        assert_eq!(lms.get(1).x(), 1.0);
        assert_eq!(lms.get(1).y(), 2.0);
        assert_eq!(lms.get(1).z(), 3.0);

        lms.map_positions(|[x, y, z]| [x * 2.0, y, z]);
        assert_eq!(lms.positions()[1], [2.0, 2.0, 3.0]);
    }

    #[test]
    fn tracker_roi() {
        let mut tracker = LandmarkTracker::new(AspectRatio::SQUARE);
        assert!(tracker.roi().is_none());
        let rect = crate::rect::Rect::from_center(5.0, 5.0, 2.0, 2.0);
        tracker.set_roi(rect);
        assert_eq!(tracker.roi().map(|r| *r.rect()), Some(rect));
    }

    #[test]
    fn lost_below_threshold() {
        let mut tracker = LandmarkTracker::new(AspectRatio::SQUARE);
        tracker.set_loss_threshold(0.7);
        tracker.set_roi(crate::rect::Rect::from_center(5.0, 5.0, 2.0, 2.0));

        assert!(tracker.keep_tracking(0.7));
        assert!(tracker.roi().is_some());
        assert!(!tracker.keep_tracking(0.69));
        assert!(tracker.roi().is_none());
        // stays lost until a new RoI is set
        assert!(!tracker.keep_tracking(1.0));
    }

    #[test]
    #[should_panic]
    fn rejects_negative_padding() {
        LandmarkTracker::new(AspectRatio::SQUARE).set_roi_padding(-0.1);
    }
}
