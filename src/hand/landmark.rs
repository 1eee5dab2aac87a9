//! Hand landmark estimation.

use crate::iter::zip_exact;
use crate::landmark::{Confidence, Estimate, Landmarks, Network};
use crate::nn::{self, Cnn, CnnInputShape, ColorMapper, Outputs};
use crate::rect::Vec2;

use nalgebra::{Rotation2, Vector2};

use super::ModelComplexity;

/// Number of landmarks estimated per hand.
pub const NUM_LANDMARKS: usize = 21;

/// Landmarks, presence and handedness estimated by [`HandLandmarkNetwork`].
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkResult {
    landmarks: Landmarks,
    presence: f32,
    raw_handedness: f32,
}

impl Default for LandmarkResult {
    fn default() -> Self {
        Self {
            landmarks: Landmarks::new(NUM_LANDMARKS),
            presence: 0.0,
            raw_handedness: 0.0,
        }
    }
}

impl LandmarkResult {
    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    /// Returns the position of a landmark, in the coordinates of the image it was estimated on.
    pub fn landmark_position(&self, index: LandmarkIdx) -> [f32; 3] {
        self.landmarks.positions()[index as usize]
    }

    /// Hand presence score in range 0.0 to 1.0.
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Returns which hand this is, assuming an unmirrored camera image.
    pub fn handedness(&self) -> Handedness {
        if self.raw_handedness > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }

    /// Computes the clockwise rotation of the hand compared to an upright position (fingers up).
    pub fn rotation_radians(&self) -> f32 {
        let [fx, fy, _] = self.landmark_position(LandmarkIdx::MiddleFingerMcp);
        let [wx, wy, _] = self.landmark_position(LandmarkIdx::Wrist);
        let rel = Vec2::new(wx - fx, wy - fy);
        Rotation2::rotation_between(&Vector2::y(), &rel).angle()
    }
}

impl Estimate for LandmarkResult {
    fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }

    fn angle_radians(&self) -> Option<f32> {
        Some(self.rotation_radians())
    }
}

impl Confidence for LandmarkResult {
    fn confidence(&self) -> f32 {
        self.presence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// Names of the hand landmarks, in network output order.
///
/// - **CMC**: carpometacarpal joint, the lowest joint of the thumb.
/// - **MCP**: metacarpophalangeal joint, the knuckles.
/// - **PIP**/**DIP**: proximal and distal interphalangeal joints.
/// - **Tip**: the tip of the finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Landmark pairs connected by a line when drawing a hand.
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // palm
        (Wrist, ThumbCmc),
        (Wrist, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

/// The hand landmark network, taking a 224x224 RGB image of a single upright hand.
pub struct HandLandmarkNetwork {
    cnn: Cnn,
}

impl HandLandmarkNetwork {
    pub fn load(complexity: ModelComplexity) -> anyhow::Result<Self> {
        let file = match complexity {
            ModelComplexity::Lite => "hand_landmark_lite.onnx",
            ModelComplexity::Full => "hand_landmark_full.onnx",
        };
        let cnn = Cnn::new(
            nn::model_file(file)?,
            CnnInputShape::NCHW,
            ColorMapper::linear(0.0..=1.0),
        )?;
        Ok(Self { cnn })
    }
}

impl Network for HandLandmarkNetwork {
    type Output = LandmarkResult;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut LandmarkResult) {
        extract(outputs, estimate);
    }
}

pub(crate) fn extract(outputs: &Outputs, estimate: &mut LandmarkResult) {
    let screen_landmarks = &outputs[0];
    let presence_flag = &outputs[1];
    let handedness = &outputs[2];

    assert_eq!(screen_landmarks.shape(), &[1, NUM_LANDMARKS * 3]);
    assert_eq!(presence_flag.shape(), &[1, 1]);
    assert_eq!(handedness.shape(), &[1, 1]);

    estimate.presence = presence_flag.index([0, 0]).as_singular();
    estimate.raw_handedness = handedness.index([0, 0]).as_singular();
    for (xyz, out) in zip_exact(
        screen_landmarks.index([0]).as_slice().chunks_exact(3),
        estimate.landmarks.positions_mut(),
    ) {
        out.copy_from_slice(xyz);
    }
}
