//! Per-frame hand tracking: palm detection seeds landmark trackers.

use crate::detection::Detector;
use crate::image::{AsImageView, AspectRatio, ImageView};
use crate::landmark::{Estimator, LandmarkTracker};
use crate::rect::{Rect, RotatedRect};
use crate::timer::Timer;

use super::detection::{hand_roi, PalmNetwork};
use super::landmark::{HandLandmarkNetwork, LandmarkResult};
use super::ModelComplexity;

/// Parameters of a [`HandTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerParams {
    /// Run palm detection on every frame instead of following hands between frames.
    pub static_image_mode: bool,
    pub max_hands: usize,
    /// Minimum palm detection confidence.
    pub detection_confidence: f32,
    /// Minimum hand presence to keep tracking a hand.
    pub tracking_confidence: f32,
    pub model_complexity: ModelComplexity,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            static_image_mode: false,
            max_hands: 2,
            detection_confidence: 0.5,
            tracking_confidence: 0.5,
            model_complexity: ModelComplexity::Full,
        }
    }
}

/// A hand found in a frame.
#[derive(Debug, Clone)]
pub struct Hand {
    landmarks: LandmarkResult,
    view_rect: RotatedRect,
}

impl Hand {
    /// Landmarks, with X/Y in pixels of the processed frame.
    pub fn landmarks(&self) -> &LandmarkResult {
        &self.landmarks
    }

    /// The region of the frame the landmarks were estimated in.
    pub fn view_rect(&self) -> RotatedRect {
        self.view_rect
    }
}

/// Finds hands in a sequence of frames.
///
/// In tracking mode, each hand is followed by a [`LandmarkTracker`] and palm detection only runs
/// while fewer than `max_hands` hands are tracked. In static mode every frame is processed from
/// scratch.
pub struct HandTracker {
    detector: Detector,
    estimator: Estimator<LandmarkResult>,
    slots: HandSlots,
    t_total: Timer,
}

impl HandTracker {
    /// Intersection over union above which a palm detection is considered an already tracked hand.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    /// Presence a hand needs in static mode.
    pub const STATIC_PRESENCE_THRESH: f32 = 0.5;

    /// RoI padding of the trackers, relative to the landmarks' bounding rectangle.
    pub const ROI_PADDING: f32 = 0.5;

    /// Loads the palm detection and hand landmark networks.
    pub fn new(params: TrackerParams) -> anyhow::Result<Self> {
        let mut detector = Detector::new(PalmNetwork::load(params.model_complexity)?);
        detector.set_threshold(params.detection_confidence);
        let estimator = Estimator::new(HandLandmarkNetwork::load(params.model_complexity)?);
        let input_res = estimator.input_resolution();
        let roi_aspect = input_res
            .aspect_ratio()
            .ok_or_else(|| anyhow::anyhow!("invalid landmark network input {input_res}"))?;
        log::debug!("hand tracker initialized with {:?}", params);

        Ok(Self {
            detector,
            estimator,
            slots: HandSlots::new(params, roi_aspect),
            t_total: Timer::new("hands"),
        })
    }

    pub fn params(&self) -> &TrackerParams {
        &self.slots.params
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_total]
            .into_iter()
            .chain(self.detector.timers())
            .chain(self.estimator.timers())
    }

    /// Processes the next frame, returning at most `max_hands` hands.
    pub fn process<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<Vec<Hand>> {
        let _guard = self.t_total.start();
        let image = image.as_view();
        let estimator = &mut self.estimator;
        let slots = &mut self.slots;

        slots.forget_if_static();
        let mut hands = slots.follow(|tracker| track_hand(tracker, estimator, &image))?;
        if slots.has_room(hands.len()) {
            let detections = self.detector.detect(&image)?;
            log::trace!("{} palm detections", detections.len());
            // Detections come out of NMS sorted by descending confidence.
            let rois = detections.iter().map(hand_roi).collect::<Vec<_>>();
            slots.seed(rois, &mut hands, |tracker| track_hand(tracker, estimator, &image))?;
        }
        slots.forget_if_static();

        Ok(hands)
    }
}

fn track_hand(
    tracker: &mut LandmarkTracker,
    estimator: &mut Estimator<LandmarkResult>,
    image: &ImageView<'_>,
) -> anyhow::Result<Option<Hand>> {
    Ok(tracker.track(estimator, image)?.map(|res| Hand {
        view_rect: res.view_rect(),
        landmarks: res.into_estimate(),
    }))
}

/// The trackers carried from frame to frame.
///
/// `track` runs the landmark network for one tracker and returns `None` when the hand is lost.
struct HandSlots {
    params: TrackerParams,
    roi_aspect: AspectRatio,
    iou_thresh: f32,
    trackers: Vec<LandmarkTracker>,
}

impl HandSlots {
    fn new(params: TrackerParams, roi_aspect: AspectRatio) -> Self {
        Self {
            params,
            roi_aspect,
            iou_thresh: HandTracker::DEFAULT_IOU_THRESH,
            trackers: Vec::new(),
        }
    }

    fn forget_if_static(&mut self) {
        if self.params.static_image_mode {
            self.trackers.clear();
        }
    }

    fn has_room(&self, found: usize) -> bool {
        found < self.params.max_hands
    }

    fn loss_threshold(&self) -> f32 {
        if self.params.static_image_mode {
            HandTracker::STATIC_PRESENCE_THRESH
        } else {
            self.params.tracking_confidence
        }
    }

    /// Moves every tracker to its hand in the new frame. Lost trackers are dropped, and so is
    /// a tracker that converged on a hand another one already follows.
    fn follow<F>(&mut self, mut track: F) -> anyhow::Result<Vec<Hand>>
    where
        F: FnMut(&mut LandmarkTracker) -> anyhow::Result<Option<Hand>>,
    {
        let mut hands = Vec::with_capacity(self.trackers.len());
        let mut kept = Vec::with_capacity(self.trackers.len());
        for mut tracker in self.trackers.drain(..) {
            let Some(hand) = track(&mut tracker)? else {
                log::trace!("hand lost");
                continue;
            };
            let Some(roi) = tracker.roi().copied() else { continue };
            if overlaps_any(&kept, &roi, self.iou_thresh) {
                log::trace!("dropping duplicate hand tracker at {:?}", roi);
                continue;
            }
            hands.push(hand);
            kept.push(tracker);
        }
        self.trackers = kept;
        Ok(hands)
    }

    /// Starts trackers on palm RoIs, in order, until `max_hands` hands are found.
    ///
    /// RoIs overlapping a tracked hand are skipped. A RoI whose first estimate fails leaves its
    /// slot to the next one.
    fn seed<F>(
        &mut self,
        rois: Vec<RotatedRect>,
        hands: &mut Vec<Hand>,
        mut track: F,
    ) -> anyhow::Result<()>
    where
        F: FnMut(&mut LandmarkTracker) -> anyhow::Result<Option<Hand>>,
    {
        for roi in rois {
            if !self.has_room(hands.len()) {
                break;
            }
            if overlaps_any(&self.trackers, &roi, self.iou_thresh) {
                continue;
            }

            let mut tracker = LandmarkTracker::new(self.roi_aspect);
            tracker.set_roi_padding(HandTracker::ROI_PADDING);
            tracker.set_loss_threshold(self.loss_threshold());
            tracker.set_roi(roi);
            if let Some(hand) = track(&mut tracker)? {
                hands.push(hand);
                self.trackers.push(tracker);
            }
        }
        Ok(())
    }
}

fn overlaps_any(trackers: &[LandmarkTracker], roi: &RotatedRect, thresh: f32) -> bool {
    let rect = bounding_rect(roi);
    trackers
        .iter()
        .filter_map(|t| t.roi())
        .any(|other| bounding_rect(other).iou(&rect) >= thresh)
}

fn bounding_rect(roi: &RotatedRect) -> Rect {
    // `rotated_corners` always yields 4 points.
    Rect::bounding(roi.rotated_corners()).unwrap_or(*roi.rect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params() {
        let params = TrackerParams::default();
        assert!(!params.static_image_mode);
        assert_eq!(params.max_hands, 2);
        assert_eq!(params.detection_confidence, 0.5);
        assert_eq!(params.tracking_confidence, 0.5);
        assert_eq!(params.model_complexity, ModelComplexity::Full);
    }

    fn slots(params: TrackerParams) -> HandSlots {
        HandSlots::new(params, AspectRatio::SQUARE)
    }

    fn square(x: f32, y: f32) -> RotatedRect {
        Rect::from_center(x, y, 20.0, 20.0).into()
    }

    fn tracker_at(roi: RotatedRect) -> LandmarkTracker {
        let mut tracker = LandmarkTracker::new(AspectRatio::SQUARE);
        tracker.set_roi(roi);
        tracker
    }

    /// Stands in for the landmark network: every RoI left of `x_max` holds a hand.
    fn hands_left_of(
        x_max: f32,
    ) -> impl FnMut(&mut LandmarkTracker) -> anyhow::Result<Option<Hand>> {
        move |tracker| {
            Ok(tracker
                .roi()
                .filter(|roi| roi.center().x < x_max)
                .map(|roi| Hand {
                    landmarks: LandmarkResult::default(),
                    view_rect: *roi,
                }))
        }
    }

    fn centers(hands: &[Hand]) -> Vec<f32> {
        hands.iter().map(|h| h.view_rect().center().x).collect()
    }

    #[test]
    fn seeding_stops_at_max_hands() {
        let mut slots = slots(TrackerParams::default());
        let mut hands = Vec::new();
        let rois = vec![square(50.0, 50.0), square(150.0, 50.0), square(250.0, 50.0)];
        slots.seed(rois, &mut hands, hands_left_of(f32::MAX)).unwrap();

        assert_eq!(centers(&hands), [50.0, 150.0]);
        assert_eq!(slots.trackers.len(), 2);
        assert!(!slots.has_room(hands.len()));
    }

    #[test]
    fn seeding_skips_tracked_hands() {
        let mut slots = slots(TrackerParams {
            max_hands: 4,
            ..TrackerParams::default()
        });
        slots.trackers.push(tracker_at(square(50.0, 50.0)));

        let mut hands = Vec::new();
        let rois = vec![
            // IoU 1/3 with the tracked hand
            square(60.0, 50.0),
            // IoU 1/4
            square(62.0, 50.0),
            // duplicate of the hand seeded just before
            square(63.0, 50.0),
            square(150.0, 50.0),
        ];
        slots.seed(rois, &mut hands, hands_left_of(f32::MAX)).unwrap();

        assert_eq!(centers(&hands), [62.0, 150.0]);
        assert_eq!(slots.trackers.len(), 3);
    }

    #[test]
    fn failed_seed_frees_slot() {
        let mut slots = slots(TrackerParams {
            max_hands: 1,
            ..TrackerParams::default()
        });
        let mut hands = Vec::new();
        let rois = vec![square(150.0, 50.0), square(50.0, 50.0)];
        slots.seed(rois, &mut hands, hands_left_of(100.0)).unwrap();

        assert_eq!(centers(&hands), [50.0]);
        assert_eq!(slots.trackers.len(), 1);
    }

    #[test]
    fn follow_drops_lost_and_duplicate_trackers() {
        let mut slots = slots(TrackerParams::default());
        for x in [50.0, 52.0, 150.0, 250.0] {
            slots.trackers.push(tracker_at(square(x, 50.0)));
        }

        let hands = slots.follow(hands_left_of(200.0)).unwrap();
        assert_eq!(centers(&hands), [50.0, 150.0]);
        assert_eq!(slots.trackers.len(), 2);
    }

    #[test]
    fn static_mode_starts_from_scratch() {
        let params = TrackerParams {
            tracking_confidence: 0.8,
            ..TrackerParams::default()
        };

        let mut tracking = slots(params);
        tracking.trackers.push(tracker_at(square(50.0, 50.0)));
        tracking.forget_if_static();
        assert_eq!(tracking.trackers.len(), 1);
        assert_eq!(tracking.loss_threshold(), 0.8);

        let mut still = slots(TrackerParams {
            static_image_mode: true,
            ..params
        });
        still.trackers.push(tracker_at(square(50.0, 50.0)));
        still.forget_if_static();
        assert!(still.trackers.is_empty());
        assert_eq!(still.loss_threshold(), HandTracker::STATIC_PRESENCE_THRESH);
        assert_eq!(HandTracker::STATIC_PRESENCE_THRESH, 0.5);
    }

    #[test]
    fn overlap_check() {
        let mut tracker = LandmarkTracker::new(AspectRatio::SQUARE);
        tracker.set_roi(Rect::from_center(50.0, 50.0, 20.0, 20.0));
        let trackers = [tracker];

        let same = RotatedRect::from(Rect::from_center(52.0, 50.0, 20.0, 20.0));
        let far = RotatedRect::from(Rect::from_center(150.0, 50.0, 20.0, 20.0));
        assert!(overlaps_any(&trackers, &same, 0.3));
        assert!(!overlaps_any(&trackers, &far, 0.3));
        assert!(!overlaps_any(&[], &same, 0.3));
    }
}
