//! The [`HandDetector`] wrapper: hand tracking with normalized results and landmark overlays.

use crate::image::{draw, AsImageViewMut, Color, Image, ImageViewMut, Resolution};
use crate::num::to_pixel;

use super::landmark::{Handedness, CONNECTIVITY, NUM_LANDMARKS};
use super::tracking::{Hand, HandTracker, TrackerParams};
use super::ModelComplexity;

/// Options of a [`HandDetector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandDetectorOptions {
    params: TrackerParams,
}

impl Default for HandDetectorOptions {
    fn default() -> Self {
        Self {
            params: TrackerParams::default(),
        }
    }
}

impl HandDetectorOptions {
    /// Treats every frame as an unrelated image (default `false`).
    pub fn static_image_mode(mut self, static_image_mode: bool) -> Self {
        self.params.static_image_mode = static_image_mode;
        self
    }

    /// Maximum number of hands to report (default 2).
    pub fn max_hands(mut self, max_hands: usize) -> Self {
        self.params.max_hands = max_hands;
        self
    }

    /// Minimum palm detection confidence (default 0.5).
    pub fn detection_confidence(mut self, confidence: f32) -> Self {
        self.params.detection_confidence = confidence;
        self
    }

    /// Minimum hand presence to keep tracking (default 0.5).
    pub fn tracking_confidence(mut self, confidence: f32) -> Self {
        self.params.tracking_confidence = confidence;
        self
    }

    pub fn model_complexity(mut self, complexity: ModelComplexity) -> Self {
        self.params.model_complexity = complexity;
        self
    }

    pub fn params(&self) -> &TrackerParams {
        &self.params
    }
}

/// A landmark position in normalized image coordinates.
///
/// `x` and `y` are in `0.0..=1.0` for points inside the frame. `z` is depth relative to the wrist,
/// scaled like `x`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// The landmarks of one hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    landmarks: [NormalizedLandmark; NUM_LANDMARKS],
    handedness: Handedness,
    presence: f32,
}

impl HandLandmarks {
    /// Normalizes the pixel landmarks of `hand`, found in a frame of size `res`.
    pub fn from_hand(hand: &Hand, res: Resolution) -> Self {
        let (w, h) = (res.width() as f32, res.height() as f32);
        let mut landmarks = [NormalizedLandmark::default(); NUM_LANDMARKS];
        for (out, lm) in landmarks.iter_mut().zip(hand.landmarks().landmarks().iter()) {
            *out = NormalizedLandmark {
                x: lm.x() / w,
                y: lm.y() / h,
                z: lm.z() / w,
            };
        }

        Self {
            landmarks,
            handedness: hand.landmarks().handedness(),
            presence: hand.landmarks().presence(),
        }
    }

    pub fn new(
        landmarks: [NormalizedLandmark; NUM_LANDMARKS],
        handedness: Handedness,
        presence: f32,
    ) -> Self {
        Self {
            landmarks,
            handedness,
            presence,
        }
    }

    pub fn landmarks(&self) -> &[NormalizedLandmark; NUM_LANDMARKS] {
        &self.landmarks
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Converts the landmarks to pixel positions in an image of size `res`.
    pub fn positions(&self, res: Resolution) -> Vec<LandmarkPosition> {
        self.landmarks
            .iter()
            .enumerate()
            .map(|(id, lm)| LandmarkPosition {
                id,
                x: to_pixel(lm.x, res.width()),
                y: to_pixel(lm.y, res.height()),
            })
            .collect()
    }
}

/// A landmark index with its pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LandmarkPosition {
    pub id: usize,
    pub x: i32,
    pub y: i32,
}

/// The hands found in the last frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandsResult {
    hands: Vec<HandLandmarks>,
}

impl HandsResult {
    pub fn new(hands: Vec<HandLandmarks>) -> Self {
        Self { hands }
    }

    pub fn hands(&self) -> &[HandLandmarks] {
        &self.hands
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }

    /// Returns the pixel positions of hand `hand_no` in an image of size `res`.
    ///
    /// Empty if there is no such hand.
    pub fn positions(&self, hand_no: usize, res: Resolution) -> Vec<LandmarkPosition> {
        self.hands
            .get(hand_no)
            .map(|hand| hand.positions(res))
            .unwrap_or_default()
    }
}

const CONNECTION_COLOR: Color = Color::from_rgb8(224, 224, 224);

/// Draws the connections of a hand as light gray lines and its landmarks as red dots.
pub fn draw_landmarks<I: AsImageViewMut>(image: &mut I, hand: &HandLandmarks) {
    draw_landmarks_impl(&mut image.as_view_mut(), hand);
}

fn draw_landmarks_impl(image: &mut ImageViewMut<'_>, hand: &HandLandmarks) {
    let positions = hand.positions(image.resolution());
    for (a, b) in CONNECTIVITY {
        let (a, b) = (positions[*a as usize], positions[*b as usize]);
        draw::line(image, a.x, a.y, b.x, b.y)
            .color(CONNECTION_COLOR)
            .stroke_width(2);
    }
    for pos in &positions {
        draw::circle(image, pos.x, pos.y, 5)
            .color(Color::RED)
            .filled();
    }
}

/// Detects and tracks hands, keeping the last result for position queries.
pub struct HandDetector {
    options: HandDetectorOptions,
    tracker: HandTracker,
    results: HandsResult,
}

impl HandDetector {
    /// Creates a hand detector, loading its networks from the model directory.
    pub fn new(options: HandDetectorOptions) -> anyhow::Result<Self> {
        Ok(Self {
            options,
            tracker: HandTracker::new(options.params)?,
            results: HandsResult::default(),
        })
    }

    pub fn options(&self) -> &HandDetectorOptions {
        &self.options
    }

    /// Finds the hands in `image`, storing the result for [`HandDetector::find_position`].
    ///
    /// With `draw` set, every hand's connections and landmarks are drawn onto `image`. Returns the
    /// (possibly annotated) image.
    pub fn find_hands<'a>(
        &mut self,
        image: &'a mut Image,
        draw: bool,
    ) -> anyhow::Result<&'a mut Image> {
        let res = image.resolution();
        let hands = self.tracker.process(&*image)?;
        self.results = HandsResult::new(
            hands
                .iter()
                .map(|hand| HandLandmarks::from_hand(hand, res))
                .collect(),
        );

        if draw {
            for hand in self.results.hands() {
                draw_landmarks(image, hand);
            }
        }

        Ok(image)
    }

    /// Returns the pixel positions of the landmarks of hand `hand_no` from the last
    /// [`HandDetector::find_hands`] call.
    ///
    /// With `draw` set, a filled blue circle of radius 5 is drawn at every landmark. Returns an
    /// empty list if fewer hands were found.
    pub fn find_position(
        &self,
        image: &mut Image,
        hand_no: usize,
        draw: bool,
    ) -> Vec<LandmarkPosition> {
        let positions = self.results.positions(hand_no, image.resolution());
        if draw {
            for pos in &positions {
                draw::circle(image, pos.x, pos.y, 11)
                    .color(Color::BLUE)
                    .filled();
            }
        }
        positions
    }

    /// The result of the last [`HandDetector::find_hands`] call.
    pub fn results(&self) -> &HandsResult {
        &self.results
    }

    pub fn tracker(&self) -> &HandTracker {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand() -> HandLandmarks {
        let mut landmarks = [NormalizedLandmark::default(); NUM_LANDMARKS];
        for (i, lm) in landmarks.iter_mut().enumerate() {
            lm.x = 0.1 + i as f32 * 0.04;
            lm.y = 0.5;
        }
        landmarks[4] = NormalizedLandmark {
            x: 0.999,
            y: 0.2505,
            z: 0.0,
        };
        HandLandmarks::new(landmarks, Handedness::Right, 0.9)
    }

    #[test]
    fn options_builder() {
        let opts = HandDetectorOptions::default()
            .static_image_mode(true)
            .max_hands(1)
            .detection_confidence(0.7)
            .tracking_confidence(0.6)
            .model_complexity(ModelComplexity::Lite);
        let params = opts.params();
        assert!(params.static_image_mode);
        assert_eq!(params.max_hands, 1);
        assert_eq!(params.detection_confidence, 0.7);
        assert_eq!(params.tracking_confidence, 0.6);
        assert_eq!(params.model_complexity, ModelComplexity::Lite);
    }

    #[test]
    fn positions_truncate() {
        let res = HandsResult::new(vec![hand()]);
        let positions = res.positions(0, Resolution::new(640, 480));
        assert_eq!(positions.len(), NUM_LANDMARKS);
        assert_eq!(positions[4], LandmarkPosition { id: 4, x: 639, y: 120 });
        assert_eq!(positions[0], LandmarkPosition { id: 0, x: 64, y: 240 });
        assert!(positions.iter().enumerate().all(|(i, p)| p.id == i));
    }

    #[test]
    fn missing_hand_has_no_positions() {
        assert!(HandsResult::default()
            .positions(0, Resolution::new(640, 480))
            .is_empty());
        let res = HandsResult::new(vec![hand()]);
        assert!(res.positions(1, Resolution::new(640, 480)).is_empty());
    }

    #[test]
    fn draws_landmarks() {
        let mut image = Image::new(100, 100);
        draw_landmarks(&mut image, &hand());
        // landmark 0 at (10, 50)
        assert_eq!(image.get(10, 50), Color::RED);
        assert_eq!(image.get(10, 10), Color::NULL);
    }
}
